//! Request counters keyed by bucket and window.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{KeyclassError, Result};

/// Storage for per-key, per-window request counts.
///
/// Entries must be retained for at least twice the window length so that
/// queries spanning adjacent windows stay valid.
#[async_trait]
pub trait Counter: Send + Sync {
    /// Number of requests counted for `key` in the window starting at `window_start`.
    async fn get(&self, key: &str, window_start: DateTime<Utc>) -> Result<u64>;

    /// Count one more request for `key` in the window starting at `window_start`.
    async fn increment(&self, key: &str, window_start: DateTime<Utc>) -> Result<()>;
}

/// Start of the fixed window of length `window` that contains `now`.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>> {
    let window_ms = i64::try_from(window.as_millis())
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or_else(|| KeyclassError::Counter(format!("unsupported window length: {:?}", window)))?;
    let now_ms = now.timestamp_millis();
    DateTime::from_timestamp_millis(now_ms - now_ms.rem_euclid(window_ms))
        .ok_or_else(|| KeyclassError::Counter("window start out of range".to_string()))
}

struct Slot {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// In-process counter backed by a sharded map.
///
/// Time only advances through the window starts callers pass in: a slot
/// expires once a window starting at or after its expiry has been seen.
/// Expired windows are dropped lazily, at most once per retention period.
pub struct InMemoryCounter {
    slots: DashMap<(String, i64), Slot>,
    retention: TimeDelta,
    latest: Mutex<Option<DateTime<Utc>>>,
    last_sweep: Mutex<Option<DateTime<Utc>>>,
}

impl InMemoryCounter {
    /// Create a counter that keeps each window for `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
            latest: Mutex::new(None),
            last_sweep: Mutex::new(None),
        }
    }

    /// Create a counter sized for a strategy's window (retains two windows).
    pub fn for_window(window: Duration) -> Self {
        Self::new(window.saturating_mul(2))
    }

    /// Number of live (key, window) slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every slot that expired before `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.expires_at > now);
        let removed = before.saturating_sub(self.slots.len());
        if removed > 0 {
            debug!(removed = removed, "Purged expired counter windows");
        }
    }

    /// Record `window_start` and return the latest window start seen so far.
    fn advance(&self, window_start: DateTime<Utc>) -> DateTime<Utc> {
        let mut latest = self.latest.lock();
        let now = match *latest {
            Some(seen) if seen >= window_start => seen,
            _ => window_start,
        };
        *latest = Some(now);
        now
    }

    fn maybe_sweep(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_sweep.lock();
            match *last {
                Some(swept) if now - swept < self.retention => return,
                Some(_) => *last = Some(now),
                None => {
                    *last = Some(now);
                    return;
                }
            }
        }
        self.purge_expired(now);
    }

    fn expires_at(&self, window_start: DateTime<Utc>) -> DateTime<Utc> {
        window_start
            .checked_add_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl Counter for InMemoryCounter {
    async fn get(&self, key: &str, window_start: DateTime<Utc>) -> Result<u64> {
        let now = self.advance(window_start);
        self.maybe_sweep(now);

        let slot_key = (key.to_string(), window_start.timestamp_millis());
        let count = self
            .slots
            .get(&slot_key)
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.count)
            .unwrap_or(0);

        trace!(key = %key, window_start = %window_start, count = count, "Counter read");
        Ok(count)
    }

    async fn increment(&self, key: &str, window_start: DateTime<Utc>) -> Result<()> {
        self.advance(window_start);
        let expires_at = self.expires_at(window_start);
        let mut slot = self
            .slots
            .entry((key.to_string(), window_start.timestamp_millis()))
            .or_insert_with(|| {
                debug!(key = %key, window_start = %window_start, "Creating counter window");
                Slot {
                    count: 0,
                    expires_at,
                }
            });
        slot.count += 1;
        Ok(())
    }
}
