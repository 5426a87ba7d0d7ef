//! YAML configuration for the koji-helpers daemons.
//!
//! # Example
//!
//! ```yaml
//! state_dir: /var/lib/koji-helpers
//! smashd:
//!   check_interval: 30
//!   quiescent_period: 120
//!   min_interval: 10
//!   max_interval: 3600
//!   exclude_tags: [trashcan]
//!   compose: dist-repo
//!   notifications:
//!     from: koji@example.com
//!     to: [builders@example.com]
//! repositories:
//!   f38-candidates:
//!     gpg_key_id: 1A2B3C4D
//!     sigul_key_name: f38
//!     sigul_key_pass: secret
//! buildroots:
//!   f38-build:
//!     arches: [x86_64, aarch64]
//!     dependencies: ["https://mirror.example.com/f38/$basearch/"]
//! ```
//!
//! Durations are given in (possibly fractional) seconds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/koji-helpers/config.yaml";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/koji-helpers";

/// Gojira's floor for both intervals; anything faster is abusive towards
/// the mirrors being polled.
pub const GOJIRA_MIN_INTERVAL_SECS: f64 = 60.0;

// ---------------------------------------------------------------------------
// Seconds
// ---------------------------------------------------------------------------

/// A non-negative number of seconds as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seconds(pub f64);

impl Seconds {
    pub fn as_duration(self) -> Duration {
        Duration::from_secs_f64(self.0.max(0.0))
    }

    fn is_valid(self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Paths of the external executables the collaborators drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub koji: PathBuf,
    pub sigul: PathBuf,
    pub mash: PathBuf,
    pub rsync: PathBuf,
    pub sendmail: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            koji: PathBuf::from("/usr/bin/koji"),
            sigul: PathBuf::from("/usr/bin/sigul"),
            mash: PathBuf::from("/usr/bin/mash"),
            rsync: PathBuf::from("/usr/bin/rsync"),
            sendmail: PathBuf::from("/usr/sbin/sendmail"),
        }
    }
}

/// Bounded retry for transient collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub attempts: u32,
    pub rest: Seconds,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            rest: Seconds(10.0),
        }
    }
}

/// How smashd turns a tag into a consumable package repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComposeMethod {
    /// Submit `koji dist-repo`; Koji composes under its own `repos-dist`.
    #[default]
    DistRepo,
    /// Run `mash` into a scratch dir, then rsync into `repo_dir`.
    Mash,
}

/// Mail sent after every settled smashd batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    pub from: String,
    pub to: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Optional tera template replacing the built-in body.
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// The sign-and-compose daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmashdConfig {
    #[serde(default = "default_smashd_check_interval")]
    pub check_interval: Seconds,
    #[serde(default = "default_smashd_quiescent_period")]
    pub quiescent_period: Seconds,
    #[serde(default = "default_smashd_min_interval")]
    pub min_interval: Seconds,
    #[serde(default = "default_max_interval")]
    pub max_interval: Seconds,
    #[serde(default)]
    pub exclude_tags: Vec<String>,
    #[serde(default)]
    pub compose: ComposeMethod,
    /// Root of the published repositories (mash method only).
    #[serde(default)]
    pub repo_dir: Option<PathBuf>,
    #[serde(default)]
    pub notifications: Option<NotificationConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Per-tag signing and composition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    pub gpg_key_id: String,
    pub sigul_key_name: String,
    pub sigul_key_pass: String,
    /// Location of the mashed repo, relative to both the mash output and
    /// `smashd.repo_dir`.
    #[serde(default)]
    pub mash_path: Option<PathBuf>,
}

impl RepositoryConfig {
    /// Koji insists on lowercase key IDs.
    pub fn koji_key(&self) -> String {
        self.gpg_key_id.to_lowercase()
    }
}

/// The external-repository monitor daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GojiraConfig {
    pub min_interval: Seconds,
    pub max_interval: Seconds,
    pub http_timeout: Seconds,
    pub retry: RetryConfig,
}

impl Default for GojiraConfig {
    fn default() -> Self {
        Self {
            min_interval: Seconds(GOJIRA_MIN_INTERVAL_SECS),
            max_interval: default_max_interval(),
            http_timeout: Seconds(30.0),
            retry: RetryConfig::default(),
        }
    }
}

/// One Koji buildroot and the external repositories it depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildrootConfig {
    pub arches: Vec<String>,
    /// Repository base URLs; `$basearch` is substituted per arch.
    pub dependencies: Vec<String>,
}

impl BuildrootConfig {
    /// Every `repomd.xml` URL to watch, one per arch × dependency.
    pub fn dependency_urls(&self) -> Vec<String> {
        let mut urls = Vec::new();
        for arch in &self.arches {
            for dep in &self.dependencies {
                let url = format!("{}/repodata/repomd.xml", dep.trim_end_matches('/'));
                urls.push(url.replace("$basearch", arch));
            }
        }
        urls
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

/// Root of the koji-helpers YAML configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub tools: ToolPaths,
    #[serde(default)]
    pub smashd: Option<SmashdConfig>,
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryConfig>,
    #[serde(default)]
    pub gojira: GojiraConfig,
    #[serde(default)]
    pub buildroots: BTreeMap<String, BuildrootConfig>,
}

impl Config {
    /// Parse and validate YAML text; `origin` only labels errors.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(smashd) = &self.smashd {
            check_bounds("smashd", smashd.min_interval, smashd.max_interval)?;
            check_seconds("smashd.check_interval", smashd.check_interval)?;
            check_seconds("smashd.quiescent_period", smashd.quiescent_period)?;
            check_seconds("smashd.retry.rest", smashd.retry.rest)?;

            if let Some(notify) = &smashd.notifications {
                if notify.to.is_empty() {
                    return Err(ConfigError::Invalid(
                        "smashd.notifications.to needs at least one recipient".to_string(),
                    ));
                }
            }

            if smashd.compose == ComposeMethod::Mash {
                if smashd.repo_dir.is_none() {
                    return Err(ConfigError::Invalid(
                        "smashd.repo_dir is required when compose is 'mash'".to_string(),
                    ));
                }
                if let Some((tag, _)) = self
                    .repositories
                    .iter()
                    .find(|(_, repo)| repo.mash_path.is_none())
                {
                    return Err(ConfigError::Invalid(format!(
                        "repository '{tag}' needs mash_path when compose is 'mash'"
                    )));
                }
            }
        }

        check_bounds("gojira", self.gojira.min_interval, self.gojira.max_interval)?;
        check_seconds("gojira.http_timeout", self.gojira.http_timeout)?;
        check_seconds("gojira.retry.rest", self.gojira.retry.rest)?;

        for (name, buildroot) in &self.buildroots {
            if buildroot.arches.is_empty() || buildroot.dependencies.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "buildroot '{name}' needs at least one arch and one dependency"
                )));
            }
        }
        Ok(())
    }

    /// The smashd section, required to run smashd.
    pub fn smashd(&self) -> Result<&SmashdConfig, ConfigError> {
        self.smashd.as_ref().ok_or(ConfigError::MissingSection("smashd"))
    }

    /// Signing/composition settings for `tag`.
    pub fn repository(&self, tag: &str) -> Result<&RepositoryConfig, ConfigError> {
        self.repositories
            .get(tag)
            .ok_or_else(|| ConfigError::MissingRepository(tag.to_string()))
    }
}

/// Load and validate the config at `path`.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Config::parse(&contents, path)
}

/// `load_at` convenience wrapper for [`DEFAULT_CONFIG_PATH`].
pub fn load() -> Result<Config, ConfigError> {
    load_at(Path::new(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn check_seconds(field: &str, value: Seconds) -> Result<(), ConfigError> {
    if value.is_valid() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must be a non-negative number of seconds"
        )))
    }
}

fn check_bounds(section: &str, min: Seconds, max: Seconds) -> Result<(), ConfigError> {
    check_seconds(&format!("{section}.min_interval"), min)?;
    check_seconds(&format!("{section}.max_interval"), max)?;
    if min.0 <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{section}.min_interval must be greater than zero"
        )));
    }
    if min.0 > max.0 {
        return Err(ConfigError::Invalid(format!(
            "{section}.min_interval ({}) exceeds max_interval ({})",
            min.0, max.0
        )));
    }
    Ok(())
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn default_subject() -> String {
    "Tag events have affected package repositories".to_string()
}

fn default_smashd_check_interval() -> Seconds {
    Seconds(10.0)
}

fn default_smashd_quiescent_period() -> Seconds {
    Seconds(30.0)
}

fn default_smashd_min_interval() -> Seconds {
    Seconds(5.0)
}

fn default_max_interval() -> Seconds {
    Seconds(3600.0)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
