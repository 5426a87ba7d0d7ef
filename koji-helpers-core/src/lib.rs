//! koji-helpers core library: domain types, collaborator traits, config, errors.
//!
//! - [`types`]: subjects, evidence, change snapshots, watermarks
//! - [`source`]: the [`ChangeSource`] and [`ActionPipeline`] seams
//! - [`config`]: YAML configuration load + validation
//! - [`error`]: [`ConfigError`], [`ActionError`]

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::Config;
pub use error::{ActionError, ConfigError};
pub use source::{ActionPipeline, ChangeSource};
pub use types::{
    BuildSet, ChangeSnapshot, Evidence, Fingerprint, SubjectKey, TagActivity, Watermark,
};
