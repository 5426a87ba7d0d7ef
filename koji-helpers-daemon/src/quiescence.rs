//! Quiescence detection: has the set of affected subjects stopped changing
//! for at least the settle period?
//!
//! The tracker only ever compares whole snapshots. Any difference, including
//! new evidence for a subject already seen, restarts the timer for the whole
//! batch; an empty snapshot clears everything.

use std::time::Duration;

use tokio::time::Instant;

use koji_helpers_core::ChangeSnapshot;

#[derive(Debug, Clone)]
pub struct QuiescenceTracker {
    settle_period: Duration,
    reference: ChangeSnapshot,
    quiesce_start: Option<Instant>,
}

impl QuiescenceTracker {
    pub fn new(settle_period: Duration) -> Self {
        Self {
            settle_period,
            reference: ChangeSnapshot::new(),
            quiesce_start: None,
        }
    }

    pub fn settle_period(&self) -> Duration {
        self.settle_period
    }

    pub fn set_settle_period(&mut self, settle_period: Duration) {
        self.settle_period = settle_period;
    }

    /// Feed the snapshot observed at `now`.
    pub fn update(&mut self, current: &ChangeSnapshot, now: Instant) {
        if current.is_empty() {
            self.reset();
            return;
        }
        if *current != self.reference {
            self.reference = current.clone();
            self.quiesce_start = Some(now);
        }
    }

    /// True once a non-empty snapshot has held unchanged for the settle
    /// period.
    pub fn has_quiesced(&self, now: Instant) -> bool {
        self.quiescent_for(now)
            .is_some_and(|stable| stable >= self.settle_period)
    }

    /// How long the current non-empty snapshot has been stable, if any.
    pub fn quiescent_for(&self, now: Instant) -> Option<Duration> {
        self.quiesce_start
            .map(|start| now.saturating_duration_since(start))
    }

    pub fn is_pending(&self) -> bool {
        self.quiesce_start.is_some()
    }

    /// Forget the reference and the timer.
    pub fn reset(&mut self) {
        self.reference.clear();
        self.quiesce_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koji_helpers_core::{Evidence, SubjectKey, TagActivity};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn tagged(tag: &str, builds: &[&str]) -> ChangeSnapshot {
        let mut activity = TagActivity::default();
        for build in builds {
            activity.arriving.record(*build, "jdoe");
        }
        let mut snapshot = ChangeSnapshot::new();
        snapshot.insert(SubjectKey::from(tag), Evidence::Tagging(activity));
        snapshot
    }

    #[test]
    fn steady_snapshot_quiesces_after_settle_period() {
        let t0 = Instant::now();
        let mut tracker = QuiescenceTracker::new(secs(30));
        let batch = tagged("T1", &["a"]);

        for t in [0, 10] {
            tracker.update(&batch, t0 + secs(t));
            assert!(!tracker.has_quiesced(t0 + secs(t)));
        }
        assert!(!tracker.has_quiesced(t0 + secs(29)));
        assert!(tracker.has_quiesced(t0 + secs(30)));
        tracker.update(&batch, t0 + secs(40));
        assert!(tracker.has_quiesced(t0 + secs(40)));
    }

    #[test]
    fn new_evidence_restarts_the_whole_batch() {
        let t0 = Instant::now();
        let mut tracker = QuiescenceTracker::new(secs(30));
        tracker.update(&tagged("T1", &["a"]), t0);
        tracker.update(&tagged("T1", &["a", "b"]), t0 + secs(20));

        assert!(!tracker.has_quiesced(t0 + secs(30)));
        assert!(!tracker.has_quiesced(t0 + secs(49)));
        assert!(tracker.has_quiesced(t0 + secs(50)));
    }

    #[test]
    fn identical_snapshot_never_resets_timer() {
        let t0 = Instant::now();
        let mut tracker = QuiescenceTracker::new(secs(30));
        let batch = tagged("T1", &["a"]);
        tracker.update(&batch, t0);
        tracker.update(&batch.clone(), t0 + secs(25));
        assert_eq!(tracker.quiescent_for(t0 + secs(25)), Some(secs(25)));
    }

    #[test]
    fn empty_snapshot_clears_pending_quiescence() {
        let t0 = Instant::now();
        let mut tracker = QuiescenceTracker::new(secs(30));
        let batch = tagged("T1", &["a"]);
        tracker.update(&batch, t0);
        assert!(tracker.has_quiesced(t0 + secs(31)));

        tracker.update(&ChangeSnapshot::new(), t0 + secs(31));
        assert!(!tracker.is_pending());
        assert!(!tracker.has_quiesced(t0 + secs(100)));

        // The same batch coming back counts as new.
        tracker.update(&batch, t0 + secs(40));
        assert!(!tracker.has_quiesced(t0 + secs(69)));
        assert!(tracker.has_quiesced(t0 + secs(70)));
    }

    #[test]
    fn flapping_snapshot_restarts_every_poll() {
        let t0 = Instant::now();
        let mut tracker = QuiescenceTracker::new(secs(30));
        let one = tagged("T1", &["a"]);
        let two = tagged("T2", &["a"]);
        for step in 0..10u64 {
            let now = t0 + secs(step * 20);
            tracker.update(if step % 2 == 0 { &one } else { &two }, now);
            assert!(!tracker.has_quiesced(now + secs(19)));
        }
    }

    #[test]
    fn never_quiesced_without_a_snapshot() {
        let tracker = QuiescenceTracker::new(Duration::ZERO);
        assert!(!tracker.has_quiesced(Instant::now()));
    }

    #[test]
    fn zero_settle_period_quiesces_immediately() {
        let t0 = Instant::now();
        let mut tracker = QuiescenceTracker::new(Duration::ZERO);
        tracker.update(&tagged("T1", &["a"]), t0);
        assert!(tracker.has_quiesced(t0));
    }
}
