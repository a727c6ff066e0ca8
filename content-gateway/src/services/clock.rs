//! Strictly increasing timestamps for record sort keys.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out UTC timestamps that never repeat or go backwards within a process,
/// even when the wall clock does.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut previous = self.last_micros.load(Ordering::Acquire);
        loop {
            let next = wall.max(previous + 1);
            match self.last_micros.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now),
                Err(actual) => previous = actual,
            }
        }
    }

    /// [`now`](Self::now) rendered as a sort key.
    pub fn now_sort_key(&self) -> String {
        format_sort_key(&self.now())
    }
}

/// Fixed-width ISO-8601 (`2026-10-19T08:15:02.123456Z`), so that lexical
/// order matches chronological order.
pub fn format_sort_key(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
