use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by every pipeline of one [`crate::Ingest`].
#[derive(Debug, Default)]
pub struct IngestStats {
    appended: AtomicU64,
    placeholders: AtomicU64,
    append_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub appended: u64,
    pub placeholders: u64,
    pub append_failures: u64,
}

impl IngestStats {
    pub(crate) fn record_append(&self) {
        self.appended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_placeholder(&self) {
        self.placeholders.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_append_failure(&self) {
        self.append_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            appended: self.appended.load(Ordering::Relaxed),
            placeholders: self.placeholders.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
        }
    }
}
