//! koji-helpers daemon runtime: quiescence monitors, their persisted state
//! and the tokio loop that drives them.

pub mod deadletter;
mod error;
pub mod intervals;
pub mod monitor;
pub mod paths;
pub mod quiescence;
mod runtime;
pub mod state_store;
pub mod status;

pub use deadletter::{DeadLetter, DeadLetterJournal};
pub use error::DaemonError;
pub use intervals::{IntervalBounds, IntervalController};
pub use monitor::{CycleOutcome, Monitor, Phase};
pub use paths::MonitorId;
pub use quiescence::QuiescenceTracker;
pub use runtime::{
    gojira_monitor, init_tracing, run_gojira, run_monitors, run_smashd, smashd_monitor,
    start_blocking, Launcher,
};
pub use state_store::{MonitorState, StateStore};
pub use status::{configured_monitors, summarize, summarize_all, StateStatus, StateSummary};
