// Clock - the injected source of "now" for phase decisions

use crate::Timestamp;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Clock cannot move backwards: at {current}, requested {requested}")]
    Rewind { current: Timestamp, requested: Timestamp },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Source of the current time, in unix seconds.
///
/// Implementations must never go backwards.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp().max(0) as Timestamp
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Jump forward to `to`
    pub fn advance_to(&self, to: Timestamp) -> Result<(), ClockError> {
        let current = self.now.load(Ordering::SeqCst);
        if to < current {
            return Err(ClockError::Rewind {
                current,
                requested: to,
            });
        }
        self.now.store(to, Ordering::SeqCst);
        Ok(())
    }

    /// Move forward by `secs`
    pub fn advance_by(&self, secs: u64) -> Timestamp {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Parse an RFC 3339 date into unix seconds
pub fn parse_timestamp(s: &str) -> Result<Timestamp, ClockError> {
    let parsed = DateTime::parse_from_rfc3339(s).map_err(|e| ClockError::InvalidTimestamp(e.to_string()))?;
    let secs = parsed.timestamp();
    if secs < 0 {
        return Err(ClockError::InvalidTimestamp(format!("{} is before 1970", s)));
    }
    Ok(secs as Timestamp)
}

/// Render unix seconds as RFC 3339
pub fn format_timestamp(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
