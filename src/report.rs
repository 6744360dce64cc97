//! Rendering and snapshot logging.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{MonitorError, Result};
use crate::metrics::data::MetricsSnapshot;

/// Render the fixed-layout dashboard for one snapshot.
///
/// Pure: identical snapshots produce identical text.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let memory_percent = if snapshot.memory_total_gb > 0.0 {
        100.0 * snapshot.memory_used_gb / snapshot.memory_total_gb
    } else {
        0.0
    };

    let mut out = String::new();
    out.push_str("Host Monitor\n");
    out.push_str("----------------------------------------------\n");
    out.push_str(&format!("CPU Usage: {:.1}%\n", snapshot.cpu_usage_percent));
    out.push_str(&format!(
        "Memory Usage: {:.1} GB / {:.1} GB ({:.1}%)\n",
        snapshot.memory_used_gb, snapshot.memory_total_gb, memory_percent
    ));
    out.push_str(&format!(
        "Disk Usage: {:.1} GB / {:.1} GB ({:.1}%)\n",
        snapshot.disk_used_gb, snapshot.disk_total_gb, snapshot.disk_used_percent
    ));
    out.push_str(&format!("Running Processes: {}\n", snapshot.running_processes));
    out.push_str("----------------------------------------------\n");
    out
}

/// Format one appended log line. Pure given the timestamp.
pub fn format_log_line(snapshot: &MetricsSnapshot, timestamp: DateTime<Local>) -> String {
    format!(
        "[{}] CPU: {:.1}%, Memory: {:.1}GB/{:.1}GB, Disk: {:.1}GB/{:.1}GB, Processes: {}",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        snapshot.cpu_usage_percent,
        snapshot.memory_used_gb,
        snapshot.memory_total_gb,
        snapshot.disk_used_gb,
        snapshot.disk_total_gb,
        snapshot.running_processes,
    )
}

/// Append-only log of displayed snapshots, one line per display tick.
#[derive(Debug)]
pub struct SnapshotLogger {
    file: File,
    path: PathBuf,
}

impl SnapshotLogger {
    /// Open the log for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| MonitorError::LogOpen {
                path: path.clone(),
                source,
            })?;
        Ok(Self { file, path })
    }

    /// Path this logger appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line for the given snapshot, stamped with local time.
    pub fn append(&mut self, snapshot: &MetricsSnapshot) -> Result<()> {
        writeln!(self.file, "{}", format_log_line(snapshot, Local::now()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            cpu_usage_percent: 42.31,
            memory_total_gb: 15.26,
            memory_used_gb: 9.54,
            disk_total_gb: 3.81,
            disk_used_gb: 2.86,
            disk_used_percent: 75.0,
            running_processes: 312,
        }
    }

    #[test]
    fn test_render_layout() {
        let text = render(&sample_snapshot());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Host Monitor");
        assert_eq!(lines[2], "CPU Usage: 42.3%");
        assert_eq!(lines[3], "Memory Usage: 9.5 GB / 15.3 GB (62.5%)");
        assert_eq!(lines[4], "Disk Usage: 2.9 GB / 3.8 GB (75.0%)");
        assert_eq!(lines[5], "Running Processes: 312");
    }

    #[test]
    fn test_render_is_pure() {
        let snapshot = sample_snapshot();
        assert_eq!(render(&snapshot), render(&snapshot.clone()));
    }

    #[test]
    fn test_render_handles_zero_snapshot() {
        // Before any domain is ready the snapshot is all zeros; rendering
        // must not divide by zero.
        let text = render(&MetricsSnapshot::default());
        assert!(text.contains("Memory Usage: 0.0 GB / 0.0 GB (0.0%)"));
        assert!(text.contains("Disk Usage: 0.0 GB / 0.0 GB (0.0%)"));
    }

    #[test]
    fn test_log_line_format() {
        let timestamp = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let line = format_log_line(&sample_snapshot(), timestamp);
        assert_eq!(
            line,
            "[2025-03-14 09:26:53] CPU: 42.3%, Memory: 9.5GB/15.3GB, Disk: 2.9GB/3.8GB, Processes: 312"
        );
    }

    #[test]
    fn test_log_line_is_pure_given_timestamp() {
        let timestamp = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let snapshot = sample_snapshot();
        assert_eq!(
            format_log_line(&snapshot, timestamp),
            format_log_line(&snapshot.clone(), timestamp)
        );
    }

    #[test]
    fn test_logger_appends_one_line_per_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshots.log");

        let mut logger = SnapshotLogger::open(&path).expect("open");
        assert_eq!(logger.path(), path);
        logger.append(&sample_snapshot()).expect("append");
        logger.append(&sample_snapshot()).expect("append");
        drop(logger);

        let contents = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert!(line.starts_with('['));
            assert!(line.ends_with("Processes: 312"));
        }

        // Reopening must append, not truncate.
        let mut logger = SnapshotLogger::open(&path).expect("reopen");
        logger.append(&sample_snapshot()).expect("append");
        drop(logger);
        let contents = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn test_logger_open_failure_names_path() {
        let err = SnapshotLogger::open("/definitely/not/here/snapshots.log")
            .expect_err("open should fail");
        assert!(err.to_string().contains("snapshots.log"));
    }
}
