//! Tag-history change source: which tags saw builds arrive or depart
//! between two watermarks.

use koji_helpers_core::{ChangeSnapshot, ChangeSource, Watermark};

use crate::koji::KojiClient;
use crate::parse;
use crate::retry::RetryPolicy;

/// Diffs Koji's tag history by time window.
#[derive(Debug, Clone)]
pub struct TagHistorySource {
    koji: KojiClient,
    exclude_tags: Vec<String>,
    retry: RetryPolicy,
}

impl TagHistorySource {
    pub fn new(koji: KojiClient, exclude_tags: Vec<String>, retry: RetryPolicy) -> Self {
        Self {
            koji,
            exclude_tags,
            retry,
        }
    }
}

impl ChangeSource for TagHistorySource {
    fn describe(&self) -> String {
        "koji tag history".to_string()
    }

    fn query(&mut self, after: &Watermark, before: &Watermark) -> ChangeSnapshot {
        tracing::debug!(%after, %before, "checking for tag events");
        let window = format!("list-history {after} .. {before}");
        match self
            .retry
            .run(&window, || self.koji.list_history(after, before))
        {
            Some(history) => parse::tag_changes(&history, &self.exclude_tags),
            None => ChangeSnapshot::new(),
        }
    }
}
