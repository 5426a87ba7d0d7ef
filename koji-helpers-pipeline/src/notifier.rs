//! Notify stage: mail a plain-text summary of a batch's tag traffic.
//!
//! The body comes from a tera template (embedded default, or the file named
//! by `notifications.template`); headers are added here and the message is
//! handed to `sendmail -t`.

use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tera::Tera;

use koji_helpers_core::config::NotificationConfig;
use koji_helpers_core::ChangeSnapshot;
use koji_helpers_tools::run_tool;

use crate::error::{io_err, PipelineError};

pub const STAGE: &str = "notify";

const TEMPLATE_NAME: &str = "notification.txt";
const DEFAULT_TEMPLATE: &str = include_str!("templates/notification.txt.tera");

/// Rendering payload for the notification template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationContext {
    pub subject: String,
    pub generated_at: String,
    pub tags: Vec<TagSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSummary {
    pub name: String,
    pub arriving: Vec<String>,
    pub departing: Vec<String>,
}

impl NotificationContext {
    pub fn from_changes(subject: &str, changes: &ChangeSnapshot) -> Self {
        let tags = changes
            .iter()
            .filter_map(|(tag, evidence)| {
                let activity = evidence.as_tagging()?;
                Some(TagSummary {
                    name: tag.0.clone(),
                    arriving: activity.arriving.builds.iter().cloned().collect(),
                    departing: activity.departing.builds.iter().cloned().collect(),
                })
            })
            .collect();
        Self {
            subject: subject.to_string(),
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            tags,
        }
    }
}

pub struct Notifier {
    tera: Tera,
    settings: NotificationConfig,
    sendmail: PathBuf,
}

impl Notifier {
    /// Build a notifier, compiling the template up front so a broken
    /// override is reported at startup rather than after the first batch.
    pub fn new(settings: NotificationConfig, sendmail: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let template = match &settings.template {
            Some(path) => std::fs::read_to_string(path).map_err(|e| io_err(path, e))?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, &template)?;
        Ok(Self {
            tera,
            settings,
            sendmail: sendmail.into(),
        })
    }

    /// The complete RFC 822 message for `changes`.
    pub fn render(&self, changes: &ChangeSnapshot) -> Result<String, PipelineError> {
        let ctx = NotificationContext::from_changes(&self.settings.subject, changes);
        let body = self
            .tera
            .render(TEMPLATE_NAME, &tera::Context::from_serialize(&ctx)?)?;
        Ok(format!(
            "From: {}\nTo: {}\nSubject: {}\nContent-Type: text/plain; charset=utf-8\n\n{}",
            self.settings.from,
            self.settings.to.join(", "),
            self.settings.subject,
            body
        ))
    }

    pub fn notify(&self, changes: &ChangeSnapshot) -> Result<(), PipelineError> {
        tracing::info!(recipients = ?self.settings.to, "sending notification");
        let message = self.render(changes)?;
        run_tool("sendmail", &self.sendmail, &["-t"], Some(message.as_bytes()))?;
        Ok(())
    }
}
