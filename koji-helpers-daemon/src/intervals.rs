//! Self-tuning poll cadence.
//!
//! After each successful pipeline run the settle period becomes half of how
//! long the run took, and the check interval a quarter of that, both held
//! within `[min, max]`. Slow pipelines therefore make the monitor wait
//! longer for activity to settle and poll less often.

use std::time::Duration;

use koji_helpers_core::config::Seconds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalBounds {
    min: Duration,
    max: Duration,
}

impl IntervalBounds {
    /// A `max` below `min` is raised to `min`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn from_seconds(min: Seconds, max: Seconds) -> Self {
        Self::new(min.as_duration(), max.as_duration())
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn clamp(&self, value: Duration) -> Duration {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalController {
    bounds: IntervalBounds,
    check_interval: Duration,
    settle_period: Duration,
}

impl IntervalController {
    /// Initial values are clamped into `bounds` like every later value.
    pub fn new(bounds: IntervalBounds, check_interval: Duration, settle_period: Duration) -> Self {
        Self {
            bounds,
            check_interval: bounds.clamp(check_interval),
            settle_period: bounds.clamp(settle_period),
        }
    }

    pub fn bounds(&self) -> IntervalBounds {
        self.bounds
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn settle_period(&self) -> Duration {
        self.settle_period
    }

    /// Retune from the duration of a successful pipeline run.
    pub fn on_pipeline_completed(&mut self, elapsed: Duration) {
        self.settle_period = self.bounds.clamp(elapsed / 2);
        self.check_interval = self.bounds.clamp(self.settle_period / 4);
        tracing::info!(
            check_interval_secs = self.check_interval.as_secs_f64(),
            settle_period_secs = self.settle_period.as_secs_f64(),
            "check-interval/settle-period adjusted",
        );
    }
}
