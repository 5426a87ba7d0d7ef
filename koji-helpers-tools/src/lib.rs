//! # koji-helpers-tools
//!
//! Narrow, typed access to the external systems the daemons observe and
//! drive: the Koji CLI, arbitrary helper executables, and HTTP repository
//! metadata. Also home of the two [`ChangeSource`] implementations.
//!
//! [`ChangeSource`]: koji_helpers_core::ChangeSource

pub mod error;
pub mod history;
pub mod koji;
pub mod metadata;
pub mod parse;
pub mod retry;
pub mod runner;

pub use error::ToolError;
pub use history::TagHistorySource;
pub use koji::{KojiClient, TaskId};
pub use metadata::{FingerprintFetcher, HttpFingerprints, RepoMetadataSource};
pub use retry::RetryPolicy;
pub use runner::{run_tool, ToolOutput};
