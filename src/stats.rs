//! Periodic queue-depth reporting for outputs.
//!
//! Enabled by `--output-udp-stats`. A reporter thread logs and resets the
//! recorded depths every few seconds; recording is a couple of atomic
//! stores on the write path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config;

#[derive(Clone)]
pub struct QueueStats {
    latest: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl QueueStats {
    /// Starts the reporter thread for `label`.
    pub fn new(label: &'static str) -> QueueStats {
        let stats = QueueStats {
            latest: Arc::new(AtomicUsize::new(0)),
            max: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
        };

        let reporter = stats.clone();
        let _ = std::thread::Builder::new()
            .name(format!("{label}-stats"))
            .spawn(move || loop {
                std::thread::sleep(Duration::from_secs(config::STATS_REPORT_INTERVAL_SECS));
                let latest = reporter.latest.load(Ordering::Relaxed);
                let max = reporter.max.swap(0, Ordering::Relaxed);
                let writes = reporter.writes.swap(0, Ordering::Relaxed);
                info!("{label}: queue depth latest={latest} max={max} writes={writes}");
            });

        stats
    }

    /// Records the queue depth observed by one write.
    pub fn record(&self, depth: usize) {
        self.latest.store(depth, Ordering::Relaxed);
        self.max.fetch_max(depth, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}
