//! # koji-helpers-pipeline
//!
//! The action pipelines run once per settled batch:
//!
//! - [`SmashdPipeline`]: sign → compose (→ sync) → notify, for tag events
//! - [`RegenPipeline`]: `regen-repo` for a buildroot whose external repos changed

pub mod compose;
pub mod error;
pub mod notifier;
pub mod regen;
pub mod signer;
pub mod smashd;

pub use compose::Composer;
pub use error::PipelineError;
pub use notifier::Notifier;
pub use regen::RegenPipeline;
pub use signer::Signer;
pub use smashd::SmashdPipeline;
