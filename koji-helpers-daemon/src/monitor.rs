//! The orchestration loop of one monitor instance.
//!
//! ```text
//! IDLE ──non-empty──▶ ACCUMULATING ──settle period unchanged──▶ SETTLED
//!  ▲                    │  ▲    │                                  │
//!  └──────empty─────────┘  └────┘ changed (timer restarts)         │
//!  └──────────────── pipeline done (success or failure) ───────────┘
//! ```
//!
//! Each cycle captures a mark, queries the source for `(watermark, mark)`,
//! feeds the tracker and, once settled, runs the pipeline synchronously.
//! After the pipeline the watermark moves to the mark whatever the outcome
//! and is persisted at once; only a successful run retunes the intervals.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;

use koji_helpers_core::{ActionPipeline, ChangeSnapshot, ChangeSource, Watermark};

use crate::deadletter::{DeadLetter, DeadLetterJournal, Window};
use crate::error::DaemonError;
use crate::intervals::IntervalController;
use crate::paths::MonitorId;
use crate::quiescence::QuiescenceTracker;
use crate::state_store::{MonitorState, StateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Accumulating,
    Settled,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Accumulating => "accumulating",
            Phase::Settled => "settled",
        })
    }
}

/// What one poll cycle amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing changed in the window.
    Idle,
    /// Changes seen; waiting for them to settle.
    Accumulating { subjects: usize },
    /// A settled batch went through the pipeline.
    Completed { subjects: usize, success: bool },
}

pub struct Monitor {
    id: MonitorId,
    source: Box<dyn ChangeSource>,
    pipeline: Box<dyn ActionPipeline>,
    tracker: QuiescenceTracker,
    intervals: IntervalController,
    store: StateStore,
    journal: DeadLetterJournal,
    watermark: Watermark,
    phase: Phase,
}

impl Monitor {
    /// Restore persisted state and hand any saved baseline to the source.
    ///
    /// May block: a metadata source without a baseline fetches the present
    /// fingerprints here.
    pub fn open(
        id: MonitorId,
        mut source: Box<dyn ChangeSource>,
        pipeline: Box<dyn ActionPipeline>,
        intervals: IntervalController,
        store: StateStore,
        journal: DeadLetterJournal,
    ) -> Self {
        let state = store.load();
        source.restore(state.baseline);
        Self {
            id,
            source,
            pipeline,
            tracker: QuiescenceTracker::new(intervals.settle_period()),
            intervals,
            store,
            journal,
            watermark: state.watermark,
            phase: Phase::Idle,
        }
    }

    pub fn id(&self) -> &MonitorId {
        &self.id
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn intervals(&self) -> &IntervalController {
        &self.intervals
    }

    /// One poll cycle. `mark` is the wall-clock upper bound of the query;
    /// `now` drives the quiescence timer.
    ///
    /// Pipeline failures are absorbed here. An error means the monitor
    /// cannot keep its state durable and must stop.
    pub fn poll_cycle(&mut self, mark: Watermark, now: Instant) -> Result<CycleOutcome, DaemonError> {
        let mark = if mark < self.watermark {
            tracing::warn!(
                monitor = %self.id,
                watermark = %self.watermark,
                mark = %mark,
                "clock is behind the watermark; holding the window at the watermark",
            );
            self.watermark
        } else {
            mark
        };
        tracing::debug!(monitor = %self.id, after = %self.watermark, before = %mark, "checking for changes");
        let changes = self.source.query(&self.watermark, &mark);
        self.tracker.update(&changes, now);

        if changes.is_empty() {
            self.phase = Phase::Idle;
            return Ok(CycleOutcome::Idle);
        }

        if !self.tracker.has_quiesced(now) {
            self.phase = Phase::Accumulating;
            tracing::debug!(
                monitor = %self.id,
                subjects = changes.len(),
                settle_period_secs = self.tracker.settle_period().as_secs_f64(),
                "changes detected; awaiting quiescence",
            );
            return Ok(CycleOutcome::Accumulating {
                subjects: changes.len(),
            });
        }

        self.phase = Phase::Settled;
        tracing::debug!(monitor = %self.id, "quiescence achieved");
        let success = self.run_pipeline(&changes, mark);
        self.advance(mark)?;
        self.tracker.reset();
        self.phase = Phase::Idle;
        Ok(CycleOutcome::Completed {
            subjects: changes.len(),
            success,
        })
    }

    fn run_pipeline(&mut self, changes: &ChangeSnapshot, mark: Watermark) -> bool {
        tracing::info!(
            monitor = %self.id,
            pipeline = %self.pipeline.describe(),
            subjects = %changes.subject_list(),
            "running pipeline for settled changes",
        );
        let started = std::time::Instant::now();
        match self.pipeline.execute(changes) {
            Ok(()) => {
                let elapsed = started.elapsed();
                tracing::info!(monitor = %self.id, elapsed_secs = elapsed.as_secs_f64(), "pipeline completed");
                self.intervals.on_pipeline_completed(elapsed);
                self.tracker.set_settle_period(self.intervals.settle_period());
                true
            }
            Err(err) => {
                tracing::error!(monitor = %self.id, error = %err, "pipeline failed");
                let letter = DeadLetter {
                    failed_at: Utc::now(),
                    window: Window {
                        after: self.watermark,
                        before: mark,
                    },
                    error: err.to_string(),
                    changes: changes.clone(),
                };
                if let Err(journal_err) = self.journal.append(&letter) {
                    tracing::error!(
                        monitor = %self.id,
                        path = %self.journal.path().display(),
                        error = %journal_err,
                        "could not record failed batch",
                    );
                }
                false
            }
        }
    }

    /// Persist `mark` as the new watermark. The watermark never moves back.
    fn advance(&mut self, mark: Watermark) -> Result<(), DaemonError> {
        let mark = mark.max(self.watermark);
        let baseline = self.source.acknowledge();
        let state = MonitorState {
            watermark: mark,
            baseline,
            saved_at: Utc::now(),
        };
        self.store.save(&state)?;
        self.watermark = mark;
        Ok(())
    }

    /// Poll until `shutdown` fires or a cycle fails.
    ///
    /// Each cycle runs on the blocking pool; shutdown is only observed while
    /// sleeping between cycles.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), DaemonError> {
        tracing::info!(
            monitor = %self.id,
            source = %self.source.describe(),
            watermark = %self.watermark,
            "started; waiting for changes",
        );
        loop {
            let mut monitor = self;
            let (returned, outcome) = tokio::task::spawn_blocking(move || {
                let outcome = monitor.poll_cycle(Watermark::now(), Instant::now());
                (monitor, outcome)
            })
            .await
            .map_err(|err| DaemonError::Join("monitor cycle".to_string(), err.to_string()))?;
            self = returned;

            if let Err(err) = outcome {
                tracing::error!(monitor = %self.id, error = %err, "died due to unexpected error");
                return Err(err);
            }

            let pause: Duration = self.intervals.check_interval();
            tracing::debug!(monitor = %self.id, phase = %self.phase, sleep_secs = pause.as_secs_f64(), "sleeping");
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(monitor = %self.id, "stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}
