use serde::Serialize;
use std::sync::Mutex;

/// Counters describing how rounds have resolved so far.
pub struct LocatorMetrics {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_inserted: usize,
    pub rounds_released: usize,
    pub fixes: usize,
    pub no_results: usize,
    pub offset_misses: usize,
}

impl LocatorMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_insert(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.events_inserted += 1;
        }
    }

    pub fn record_round(&self, fixed: bool, offset_misses: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.rounds_released += 1;
            metrics.offset_misses += offset_misses;
            if fixed {
                metrics.fixes += 1;
            } else {
                metrics.no_results += 1;
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for LocatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
