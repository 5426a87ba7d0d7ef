//! Sign stage: make sure every RPM arriving in a tag is signed with that
//! tag's key and that Koji has written out the signed copies.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use koji_helpers_core::config::RepositoryConfig;
use koji_helpers_core::{ActionError, ChangeSnapshot, ConfigError, Evidence};
use koji_helpers_tools::{run_tool, KojiClient};

use crate::error::PipelineError;

pub const STAGE: &str = "sign";

/// Drives `sigul` for the tags of one settled batch.
#[derive(Debug, Clone)]
pub struct Signer {
    koji: KojiClient,
    sigul: PathBuf,
    repositories: BTreeMap<String, RepositoryConfig>,
}

impl Signer {
    pub fn new(
        koji: KojiClient,
        sigul: impl Into<PathBuf>,
        repositories: BTreeMap<String, RepositoryConfig>,
    ) -> Self {
        Self {
            koji,
            sigul: sigul.into(),
            repositories,
        }
    }

    /// Sign the arriving builds of every tag in `changes`.
    ///
    /// Each tag is handled independently; the failures of all tags are
    /// returned rather than stopping at the first.
    pub fn sign(&self, changes: &ChangeSnapshot) -> Vec<ActionError> {
        tracing::info!(tags = %changes.subject_list(), "signing");
        let mut failures = Vec::new();
        for (tag, evidence) in changes {
            let Some(activity) = evidence.as_tagging() else {
                continue;
            };
            if activity.arriving.is_empty() {
                continue;
            }
            if let Err(err) = self.sign_tag(&tag.0, &activity.arriving.builds) {
                tracing::error!(tag = %tag, error = %err, "signing failed");
                failures.push(ActionError::stage(STAGE, tag.0.clone(), err));
            }
        }
        tracing::info!("signing completed");
        failures
    }

    /// RPMs built by `builds` that `tag` holds no signed copy of yet.
    ///
    /// A tag event may be a move rather than a fresh build, so some or all
    /// of the RPMs can already be signed.
    pub fn unsigned_rpms(
        &self,
        tag: &str,
        builds: &BTreeSet<String>,
    ) -> Result<Vec<String>, PipelineError> {
        let mut built = BTreeSet::new();
        for build in builds {
            tracing::debug!(build = %build, "getting RPMs for build");
            built.extend(self.koji.build_rpms(build)?);
        }
        let signed = self.koji.list_signed(tag)?;
        tracing::debug!(built = built.len(), signed = signed.len(), "compared RPM sets");
        Ok(built.difference(&signed).cloned().collect())
    }

    fn sign_tag(&self, tag: &str, builds: &BTreeSet<String>) -> Result<(), PipelineError> {
        let repo = self
            .repositories
            .get(tag)
            .ok_or_else(|| ConfigError::MissingRepository(tag.to_string()))?;

        let unsigned = self.unsigned_rpms(tag, builds)?;
        if unsigned.is_empty() {
            tracing::info!(tag, "no builds need signing");
            return Ok(());
        }

        tracing::info!(tag, rpms = ?unsigned, "signing builds");
        let mut args = vec![
            "--batch".to_string(),
            "sign-rpms".to_string(),
            "--store-in-koji".to_string(),
            "--koji-only".to_string(),
            repo.sigul_key_name.clone(),
        ];
        args.extend(unsigned);
        // sigul reads the passphrase NUL-terminated from stdin in batch mode.
        let passphrase = format!("{}\0", repo.sigul_key_pass);
        run_tool("sigul", &self.sigul, &args, Some(passphrase.as_bytes()))?;

        let key = repo.koji_key();
        let builds: Vec<String> = builds.iter().cloned().collect();
        tracing::info!(tag, key = %key, builds = ?builds, "writing signed RPMs");
        self.koji.write_signed_rpm(&key, &builds)?;
        Ok(())
    }
}
