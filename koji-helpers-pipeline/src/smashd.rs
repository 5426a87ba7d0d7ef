//! smashd's action: sign, compose, publish and notify for one settled batch.

use koji_helpers_core::config::ComposeMethod;
use koji_helpers_core::{ActionError, ActionPipeline, ChangeSnapshot, Config};
use koji_helpers_tools::KojiClient;

use crate::compose::Composer;
use crate::error::PipelineError;
use crate::notifier::{self, Notifier};
use crate::signer::Signer;

/// Every stage runs even when an earlier one failed; all failures are
/// reported together.
pub struct SmashdPipeline {
    signer: Signer,
    composer: Composer,
    notifier: Option<Notifier>,
}

impl SmashdPipeline {
    pub fn new(signer: Signer, composer: Composer, notifier: Option<Notifier>) -> Self {
        Self {
            signer,
            composer,
            notifier,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let smashd = config.smashd()?;
        let signer = Signer::new(
            KojiClient::new(&config.tools.koji),
            &config.tools.sigul,
            config.repositories.clone(),
        );
        let composer = Composer::new(
            smashd.compose,
            &config.tools,
            smashd.repo_dir.clone(),
            config.repositories.clone(),
        );
        let notifier = smashd
            .notifications
            .clone()
            .map(|settings| Notifier::new(settings, &config.tools.sendmail))
            .transpose()?;
        Ok(Self::new(signer, composer, notifier))
    }
}

impl ActionPipeline for SmashdPipeline {
    fn describe(&self) -> String {
        let mut stages = vec!["sign", "compose"];
        if self.composer.method() == ComposeMethod::Mash {
            stages.push("sync");
        }
        if self.notifier.is_some() {
            stages.push("notify");
        }
        stages.join(" → ")
    }

    fn execute(&mut self, changes: &ChangeSnapshot) -> Result<(), ActionError> {
        let mut failures = self.signer.sign(changes);
        failures.extend(self.composer.compose_all(changes));
        if let Some(notifier) = &self.notifier {
            if let Err(err) = notifier.notify(changes) {
                tracing::error!(error = %err, "notification failed");
                failures.push(ActionError::stage(
                    notifier::STAGE,
                    changes.subject_list(),
                    err,
                ));
            }
        }
        ActionError::collect(failures)
    }
}
