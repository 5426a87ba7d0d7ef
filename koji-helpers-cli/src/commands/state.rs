//! `koji-helpers state`: what each monitor last persisted.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use koji_helpers_daemon::{summarize_all, StateStatus, StateSummary};

#[derive(Subcommand, Debug)]
pub enum StateCommand {
    /// Show every configured monitor's state file.
    Show {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct StateReportJson<'a> {
    state_dir: &'a Path,
    monitors: &'a [StateSummary],
}

#[derive(Tabled)]
struct StateTableRow {
    #[tabled(rename = "monitor")]
    monitor: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "watermark")]
    watermark: String,
    #[tabled(rename = "baseline")]
    baseline: usize,
    #[tabled(rename = "dead letters")]
    dead_letters: usize,
}

pub fn run(config_path: &Path, command: StateCommand) -> Result<()> {
    let config = super::load_config(config_path)?;
    match command {
        StateCommand::Show { json } => {
            let summaries = summarize_all(&config);
            if json {
                let payload = StateReportJson {
                    state_dir: &config.state_dir,
                    monitors: &summaries,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload)
                        .context("failed to serialize state JSON")?
                );
            } else {
                print_table(&config.state_dir, summaries);
            }
        }
    }
    Ok(())
}

fn print_table(state_dir: &Path, summaries: Vec<StateSummary>) {
    println!(
        "koji-helpers v{} | {} monitors | state in {}",
        env!("CARGO_PKG_VERSION"),
        summaries.len(),
        state_dir.display(),
    );
    if summaries.is_empty() {
        println!("No monitors configured.");
        return;
    }

    let mut problems = Vec::new();
    let rows: Vec<StateTableRow> = summaries
        .into_iter()
        .map(|summary| {
            if let Some(error) = &summary.error {
                problems.push(format!("{}: {error}", summary.monitor));
            }
            StateTableRow {
                status: status_label(summary.status),
                watermark: summary
                    .watermark
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                baseline: summary.baseline_entries,
                dead_letters: summary.dead_letters,
                monitor: summary.monitor,
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for problem in problems {
        println!("{} {problem}", "!".red().bold());
    }
}

fn status_label(status: StateStatus) -> String {
    match status {
        StateStatus::Ok => "ok".green().to_string(),
        StateStatus::Absent => "absent".yellow().to_string(),
        StateStatus::Corrupt => "corrupt".red().to_string(),
    }
}
