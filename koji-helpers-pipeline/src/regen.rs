//! gojira's action: have Koji regenerate a buildroot's repo and wait for it.

use koji_helpers_core::{ActionError, ActionPipeline, ChangeSnapshot};
use koji_helpers_tools::KojiClient;

use crate::error::PipelineError;

pub const STAGE: &str = "regen";

/// State a `newRepo` task must reach for the regen to count as done.
const TASK_CLOSED: &str = "closed";

#[derive(Debug, Clone)]
pub struct RegenPipeline {
    koji: KojiClient,
    buildroot: String,
}

impl RegenPipeline {
    pub fn new(koji: KojiClient, buildroot: impl Into<String>) -> Self {
        Self {
            koji,
            buildroot: buildroot.into(),
        }
    }

    pub fn regen(&self) -> Result<(), PipelineError> {
        let task = self.koji.regen_repo(&self.buildroot)?;
        tracing::info!(buildroot = %self.buildroot, task = %task, "newRepo task started");
        self.koji.wait_repo(&self.buildroot)?;
        let state = self.koji.task_state(&task)?;
        tracing::info!(buildroot = %self.buildroot, task = %task, state = %state, "newRepo task ended");
        if state == TASK_CLOSED {
            Ok(())
        } else {
            Err(PipelineError::TaskFailed {
                task: task.0,
                state,
            })
        }
    }
}

impl ActionPipeline for RegenPipeline {
    fn describe(&self) -> String {
        format!("regen-repo {}", self.buildroot)
    }

    fn execute(&mut self, changes: &ChangeSnapshot) -> Result<(), ActionError> {
        tracing::info!(
            buildroot = %self.buildroot,
            urls = %changes.subject_list(),
            "triggering regen",
        );
        self.regen()
            .map_err(|e| ActionError::stage(STAGE, self.buildroot.clone(), e))
    }
}
