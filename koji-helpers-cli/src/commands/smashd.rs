//! `koji-helpers smashd`: sign, compose and notify in the foreground.

use std::path::Path;

use anyhow::{Context, Result};

use koji_helpers_daemon::{init_tracing, run_smashd, start_blocking};

pub fn run(config_path: &Path, json_logs: bool) -> Result<()> {
    init_tracing(json_logs);
    let config = super::load_config(config_path)?;
    config.smashd().context("smashd is not configured")?;
    start_blocking(run_smashd(config)).context("smashd exited with error")
}
