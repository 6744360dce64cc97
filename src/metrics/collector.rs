//! Collector loops: one cancellable task per metric domain.
//!
//! Every loop samples its source once per [`crate::COLLECT_INTERVAL`],
//! reduces the raw reading with the pure functions below, and publishes a
//! typed [`MetricUpdate`] to the supervisor. A failed source read skips
//! the cycle and retries on the next tick; the last published value
//! stands until then. Cancellation is observed at each sleep boundary.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::debug;

use crate::metrics::data::{Domain, MetricUpdate};
use crate::metrics::source::{CpuSource, CpuTimes, DiskSource, DiskStats, MemorySource, ProcEntry, ProcessSource};
use crate::COLLECT_INTERVAL;

const KB_PER_GB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Delta tracker for the cumulative CPU counters.
///
/// The first sample only establishes the baseline; no usage value exists
/// until a second sample provides a delta.
#[derive(Debug, Default)]
pub struct CpuTracker {
    prev: Option<(u64, u64)>,
}

impl CpuTracker {
    /// Fold in one sample, returning the usage percentage when a valid
    /// delta exists. A zero total delta yields `None` so the previous
    /// published value is retained.
    pub fn update(&mut self, times: CpuTimes) -> Option<f64> {
        let idle = times.idle_all();
        let total = times.total();
        let usage = match self.prev {
            Some((prev_idle, prev_total)) => {
                let total_diff = total.saturating_sub(prev_total);
                let idle_diff = idle.saturating_sub(prev_idle);
                if total_diff > 0 {
                    Some(100.0 * (1.0 - idle_diff as f64 / total_diff as f64))
                } else {
                    None
                }
            }
            None => None,
        };
        self.prev = Some((idle, total));
        usage
    }
}

/// Reduce `/proc/meminfo` counters (kilobytes) to (total, used) binary GB.
///
/// Free memory counts `MemFree`, `Buffers`, and `Cached`; missing
/// counters are treated as zero.
pub fn memory_usage_gb(counters: &HashMap<String, u64>) -> (f64, f64) {
    let kb = |key: &str| counters.get(key).copied().unwrap_or(0) as f64;
    let total = kb("MemTotal") / KB_PER_GB;
    let free = (kb("MemFree") + kb("Buffers") + kb("Cached")) / KB_PER_GB;
    (total, total - free)
}

/// Reduce raw block counts to (total GB, used GB, used percent).
///
/// An empty filesystem reports 0% rather than dividing by zero.
pub fn disk_usage_gb(stats: DiskStats) -> (f64, f64, f64) {
    let total = (stats.blocks * stats.fragment_size) as f64 / BYTES_PER_GB;
    let available = (stats.blocks_available * stats.fragment_size) as f64 / BYTES_PER_GB;
    let used = total - available;
    let used_percent = if total > 0.0 { 100.0 * used / total } else { 0.0 };
    (total, used, used_percent)
}

/// Count entries that look like real processes: an all-digit (PID) name
/// with a readable, non-empty command line. Kernel threads and transient
/// entries fail the second check.
pub fn count_running(entries: &[ProcEntry]) -> usize {
    entries
        .iter()
        .filter(|e| !e.name.is_empty() && e.name.bytes().all(|b| b.is_ascii_digit()))
        .filter(|e| e.cmdline_readable)
        .count()
}

/// Sleep one collection interval, returning true if cancellation arrived.
async fn sleep_or_cancel(shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = shutdown.changed() => true,
        _ = time::sleep(COLLECT_INTERVAL) => false,
    }
}

/// CPU collector loop. Publishes only after the first valid delta.
pub async fn run_cpu_collector(
    mut source: Box<dyn CpuSource>,
    tx: mpsc::Sender<MetricUpdate>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tracker = CpuTracker::default();
    loop {
        match source.sample() {
            Ok(times) => {
                if let Some(usage_percent) = tracker.update(times) {
                    if tx.send(MetricUpdate::Cpu { usage_percent }).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                debug!(domain = %Domain::Cpu, error = %err, "source read failed, skipping cycle");
            }
        }
        if sleep_or_cancel(&mut shutdown).await {
            return;
        }
    }
}

/// Memory collector loop. Publishes every cycle.
pub async fn run_memory_collector(
    mut source: Box<dyn MemorySource>,
    tx: mpsc::Sender<MetricUpdate>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        match source.sample() {
            Ok(counters) => {
                let (total_gb, used_gb) = memory_usage_gb(&counters);
                if tx
                    .send(MetricUpdate::Memory { total_gb, used_gb })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(err) => {
                debug!(domain = %Domain::Memory, error = %err, "source read failed, skipping cycle");
            }
        }
        if sleep_or_cancel(&mut shutdown).await {
            return;
        }
    }
}

/// Disk collector loop. Publishes every cycle.
pub async fn run_disk_collector(
    mut source: Box<dyn DiskSource>,
    tx: mpsc::Sender<MetricUpdate>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        match source.sample() {
            Ok(stats) => {
                let (total_gb, used_gb, used_percent) = disk_usage_gb(stats);
                if tx
                    .send(MetricUpdate::Disk {
                        total_gb,
                        used_gb,
                        used_percent,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(err) => {
                debug!(domain = %Domain::Disk, error = %err, "source read failed, skipping cycle");
            }
        }
        if sleep_or_cancel(&mut shutdown).await {
            return;
        }
    }
}

/// Process-count collector loop. Publishes every cycle.
pub async fn run_process_collector(
    mut source: Box<dyn ProcessSource>,
    tx: mpsc::Sender<MetricUpdate>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        match source.entries() {
            Ok(entries) => {
                let running = count_running(&entries);
                if tx
                    .send(MetricUpdate::Processes { running })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(err) => {
                debug!(domain = %Domain::Processes, error = %err, "source read failed, skipping cycle");
            }
        }
        if sleep_or_cancel(&mut shutdown).await {
            return;
        }
    }
}
