pub mod config;
pub mod gojira;
pub mod smashd;
pub mod state;

use std::path::Path;

use anyhow::{Context, Result};

use koji_helpers_core::Config;

pub(crate) fn load_config(path: &Path) -> Result<Config> {
    koji_helpers_core::config::load_at(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}
