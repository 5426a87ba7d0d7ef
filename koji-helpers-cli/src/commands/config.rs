//! `koji-helpers config`: validate and summarize the configuration.

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use koji_helpers_core::config::ComposeMethod;
use koji_helpers_core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Load and validate the configuration, then print a summary.
    Check,
}

pub fn run(config_path: &Path, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Check => {
            let config = super::load_config(config_path)?;
            println!("{} {}", "valid:".green().bold(), config_path.display());
            print_summary(&config);
        }
    }
    Ok(())
}

fn print_summary(config: &Config) {
    println!("state_dir: {}", config.state_dir.display());

    match &config.smashd {
        Some(smashd) => {
            let compose = match smashd.compose {
                ComposeMethod::DistRepo => "dist-repo",
                ComposeMethod::Mash => "mash",
            };
            println!(
                "smashd: compose={compose} repositories={} excluded_tags={} notifications={}",
                config.repositories.len(),
                smashd.exclude_tags.len(),
                if smashd.notifications.is_some() { "on" } else { "off" },
            );
            println!(
                "  check={}s settle={}s bounds=[{}s, {}s]",
                smashd.check_interval.0,
                smashd.quiescent_period.0,
                smashd.min_interval.0,
                smashd.max_interval.0,
            );
        }
        None => println!("smashd: {}", "not configured".yellow()),
    }

    if config.buildroots.is_empty() {
        println!("gojira: {}", "no buildroots".yellow());
        return;
    }
    println!(
        "gojira: {} buildroots bounds=[{}s, {}s]",
        config.buildroots.len(),
        config.gojira.min_interval.0,
        config.gojira.max_interval.0,
    );
    for (name, buildroot) in &config.buildroots {
        println!("  {name}: {} repomd urls", buildroot.dependency_urls().len());
    }
}
