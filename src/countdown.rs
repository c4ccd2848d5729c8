use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Marker shown once a deadline has passed.
pub const OVERDUE_LABEL: &str = "overdue";

/// Default recomputation period for countdown labels.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Whole seconds until the deadline; negative once it has passed.
pub fn remaining_seconds(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (deadline - now).num_seconds()
}

/// Renders the remaining time as zero-padded `HH:MM` (hours may exceed 24,
/// seconds are discarded), or the overdue marker once the deadline passes.
pub fn countdown_label(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = remaining_seconds(deadline, now);
    if remaining > 0 {
        let hours = remaining / 3600;
        let minutes = (remaining % 3600) / 60;
        format!("{:02}:{:02}", hours, minutes)
    } else {
        OVERDUE_LABEL.to_string()
    }
}

/// One shared periodic tick for every active record, checked from the event
/// loop instead of a timer per task. No persistence side effects; it only
/// schedules label recomputation.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    last: Option<Instant>,
    running: bool,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Ticker {
            period,
            last: None,
            running: true,
        }
    }

    /// True when a full period has elapsed since the last report (and on the
    /// first call). Always false after `stop`.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        match self.last {
            Some(prev) if prev.elapsed() < self.period => false,
            _ => {
                self.last = Some(Instant::now());
                true
            }
        }
    }

    /// Idempotent: stopping an already-stopped ticker is a no-op.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
