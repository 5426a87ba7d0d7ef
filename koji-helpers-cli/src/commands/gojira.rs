//! `koji-helpers gojira`: one metadata monitor per buildroot.

use std::path::Path;

use anyhow::{bail, Context, Result};

use koji_helpers_daemon::{init_tracing, run_gojira, start_blocking};

pub fn run(config_path: &Path, json_logs: bool) -> Result<()> {
    init_tracing(json_logs);
    let config = super::load_config(config_path)?;
    if config.buildroots.is_empty() {
        bail!("no buildroots configured for gojira");
    }
    tracing::info!(buildroots = config.buildroots.len(), "starting gojira");
    start_blocking(run_gojira(config)).context("gojira exited with error")
}
