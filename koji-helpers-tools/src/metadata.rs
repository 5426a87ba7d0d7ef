//! Metadata-fingerprint change source: which external repositories of a
//! buildroot published new metadata since the last acknowledged batch.
//!
//! Koji only cares about a repository's metadata, so a `HEAD` of
//! `repodata/repomd.xml` and its `etag`/`last-modified` pair is enough to
//! tell that the repository changed.

use std::time::Duration;

use koji_helpers_core::{
    ChangeSnapshot, ChangeSource, Evidence, Fingerprint, SubjectKey, Watermark,
};

use crate::error::ToolError;
use crate::retry::RetryPolicy;

/// Fetches the current fingerprint of one metadata URL.
pub trait FingerprintFetcher: Send {
    fn fetch(&self, url: &str) -> Result<Fingerprint, ToolError>;
}

/// [`FingerprintFetcher`] over HTTP `HEAD`.
pub struct HttpFingerprints {
    agent: ureq::Agent,
}

impl HttpFingerprints {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl FingerprintFetcher for HttpFingerprints {
    fn fetch(&self, url: &str) -> Result<Fingerprint, ToolError> {
        tracing::debug!(url, "fetching headers");
        let response = self.agent.head(url).call().map_err(|err| ToolError::Http {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        let header = |name: &'static str| {
            response
                .header(name)
                .map(str::to_string)
                .ok_or_else(|| ToolError::MissingHeader {
                    url: url.to_string(),
                    header: name,
                })
        };
        Ok(Fingerprint {
            etag: header("etag")?,
            last_modified: header("last-modified")?,
        })
    }
}

/// Diffs present repository fingerprints against an acknowledged baseline.
pub struct RepoMetadataSource<F = HttpFingerprints> {
    buildroot: String,
    urls: Vec<String>,
    fetcher: F,
    retry: RetryPolicy,
    baseline: ChangeSnapshot,
    present: ChangeSnapshot,
}

impl<F: FingerprintFetcher> RepoMetadataSource<F> {
    pub fn new(buildroot: impl Into<String>, urls: Vec<String>, fetcher: F, retry: RetryPolicy) -> Self {
        Self {
            buildroot: buildroot.into(),
            urls,
            fetcher,
            retry,
            baseline: ChangeSnapshot::new(),
            present: ChangeSnapshot::new(),
        }
    }

    pub fn baseline(&self) -> &ChangeSnapshot {
        &self.baseline
    }

    /// Fingerprint every URL. URLs that keep failing after the retry policy
    /// is exhausted are left out for this cycle.
    fn present_metadata(&self) -> ChangeSnapshot {
        let mut metadata = ChangeSnapshot::new();
        for url in &self.urls {
            if let Some(fp) = self.retry.run(url, || self.fetcher.fetch(url)) {
                metadata.insert(SubjectKey::from(url.as_str()), Evidence::Fingerprint(fp));
            }
        }
        metadata
    }
}

impl<F: FingerprintFetcher> ChangeSource for RepoMetadataSource<F> {
    fn describe(&self) -> String {
        format!("external repos of {}", self.buildroot)
    }

    fn restore(&mut self, baseline: Option<ChangeSnapshot>) {
        match baseline {
            Some(baseline) => {
                tracing::debug!(
                    buildroot = %self.buildroot,
                    urls = baseline.len(),
                    "restored last-known metadata",
                );
                self.baseline = baseline;
            }
            None => {
                // Nothing persisted: assume an immediate regen is unnecessary.
                self.baseline = self.present_metadata();
                tracing::debug!(
                    buildroot = %self.buildroot,
                    urls = self.baseline.len(),
                    "initialized last-known metadata from present state",
                );
            }
        }
    }

    fn query(&mut self, _after: &Watermark, _before: &Watermark) -> ChangeSnapshot {
        self.present = self.present_metadata();
        let changes: ChangeSnapshot = self
            .present
            .iter()
            .filter(|(url, fp)| self.baseline.get(url) != Some(*fp))
            .map(|(url, fp)| (url.clone(), fp.clone()))
            .collect();
        tracing::debug!(
            buildroot = %self.buildroot,
            changed = changes.len(),
            "present changes",
        );
        changes
    }

    fn acknowledge(&mut self) -> Option<ChangeSnapshot> {
        let present = std::mem::take(&mut self.present);
        self.baseline.merge(present);
        Some(self.baseline.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Scripted fetcher: each URL pops its next canned result; an exhausted
    /// script repeats the last fingerprint served.
    #[derive(Default)]
    struct Scripted {
        script: Mutex<HashMap<String, VecDeque<Result<Fingerprint, String>>>>,
    }

    impl Scripted {
        fn push(&self, url: &str, result: Result<&str, &str>) {
            let mut script = self.script.lock().unwrap();
            script.entry(url.to_string()).or_default().push_back(
                result.map(fp).map_err(str::to_string),
            );
        }
    }

    impl FingerprintFetcher for &Scripted {
        fn fetch(&self, url: &str) -> Result<Fingerprint, ToolError> {
            let mut script = self.script.lock().unwrap();
            let queue = script.entry(url.to_string()).or_default();
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            match next {
                Some(Ok(fp)) => Ok(fp),
                Some(Err(reason)) => Err(ToolError::Http {
                    url: url.to_string(),
                    reason,
                }),
                None => Err(ToolError::Http {
                    url: url.to_string(),
                    reason: "unscripted".to_string(),
                }),
            }
        }
    }

    fn fp(etag: &str) -> Fingerprint {
        Fingerprint {
            etag: etag.to_string(),
            last_modified: "Mon, 01 May 2017 12:00:00 GMT".to_string(),
        }
    }

    const A: &str = "http://mirror/a/repodata/repomd.xml";
    const B: &str = "http://mirror/b/repodata/repomd.xml";

    fn window() -> (Watermark, Watermark) {
        (Watermark::now(), Watermark::now())
    }

    #[test]
    fn absent_baseline_adopts_present_metadata() {
        let fetcher = Scripted::default();
        fetcher.push(A, Ok("1"));
        let mut source = RepoMetadataSource::new(
            "f38-build",
            vec![A.to_string()],
            &fetcher,
            RetryPolicy::once(),
        );
        source.restore(None);
        let (after, before) = window();
        assert!(source.query(&after, &before).is_empty());
    }

    #[test]
    fn changed_fingerprint_is_reported_until_acknowledged() {
        let fetcher = Scripted::default();
        fetcher.push(A, Ok("1"));
        fetcher.push(A, Ok("2"));
        fetcher.push(B, Ok("1"));
        let mut source = RepoMetadataSource::new(
            "f38-build",
            vec![A.to_string(), B.to_string()],
            &fetcher,
            RetryPolicy::once(),
        );
        source.restore(None);
        let (after, before) = window();

        let changes = source.query(&after, &before);
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes.get(&SubjectKey::from(A)).and_then(Evidence::as_fingerprint),
            Some(&fp("2"))
        );

        let persisted = source.acknowledge().expect("baseline");
        assert_eq!(persisted.len(), 2);
        assert!(source.query(&after, &before).is_empty());
    }

    #[test]
    fn unreachable_url_is_skipped_not_fatal() {
        let fetcher = Scripted::default();
        fetcher.push(A, Ok("2"));
        fetcher.push(B, Err("connection refused"));
        let mut source = RepoMetadataSource::new(
            "f38-build",
            vec![A.to_string(), B.to_string()],
            &fetcher,
            RetryPolicy::new(3, Duration::ZERO),
        );
        source.restore(Some(ChangeSnapshot::new()));
        let (after, before) = window();

        let changes = source.query(&after, &before);
        assert_eq!(changes.len(), 1);
        assert!(changes.contains(&SubjectKey::from(A)));
        assert!(!changes.contains(&SubjectKey::from(B)));
    }

    #[test]
    fn acknowledge_keeps_baseline_of_unreachable_urls() {
        let fetcher = Scripted::default();
        fetcher.push(A, Ok("2"));
        fetcher.push(B, Err("timeout"));
        let baseline: ChangeSnapshot = [
            (SubjectKey::from(A), Evidence::Fingerprint(fp("1"))),
            (SubjectKey::from(B), Evidence::Fingerprint(fp("1"))),
        ]
        .into_iter()
        .collect();
        let mut source = RepoMetadataSource::new(
            "f38-build",
            vec![A.to_string(), B.to_string()],
            &fetcher,
            RetryPolicy::once(),
        );
        source.restore(Some(baseline));
        let (after, before) = window();
        source.query(&after, &before);

        let persisted = source.acknowledge().expect("baseline");
        assert_eq!(
            persisted.get(&SubjectKey::from(A)).and_then(Evidence::as_fingerprint),
            Some(&fp("2"))
        );
        assert_eq!(
            persisted.get(&SubjectKey::from(B)).and_then(Evidence::as_fingerprint),
            Some(&fp("1"))
        );
    }
}
