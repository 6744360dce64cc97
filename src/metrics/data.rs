//! Data structures for host metrics.

use serde::{Deserialize, Serialize};

/// The four metric domains, each sampled by its own collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Cpu,
    Memory,
    Disk,
    Processes,
}

impl Domain {
    /// Fixed collector spawn order.
    pub const ALL: [Domain; 4] = [Domain::Cpu, Domain::Memory, Domain::Disk, Domain::Processes];

    /// Label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Cpu => "cpu",
            Domain::Memory => "memory",
            Domain::Disk => "disk",
            Domain::Processes => "processes",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The latest published value of every metric domain.
///
/// Zero-initialized; a field is only meaningful once its domain is
/// marked ready in [`Readiness`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Aggregate CPU usage percentage (0.0 to 100.0)
    pub cpu_usage_percent: f64,
    /// Total system memory in binary gigabytes
    pub memory_total_gb: f64,
    /// Used system memory in binary gigabytes (total minus free, buffers, and cache)
    pub memory_used_gb: f64,
    /// Total root filesystem capacity in binary gigabytes
    pub disk_total_gb: f64,
    /// Used root filesystem space in binary gigabytes
    pub disk_used_gb: f64,
    /// Root filesystem usage percentage (0.0 to 100.0)
    pub disk_used_percent: f64,
    /// Number of running processes with a readable command line
    pub running_processes: usize,
}

impl MetricsSnapshot {
    /// Fold one collector update into the snapshot.
    pub fn apply(&mut self, update: &MetricUpdate) {
        match *update {
            MetricUpdate::Cpu { usage_percent } => {
                self.cpu_usage_percent = usage_percent;
            }
            MetricUpdate::Memory { total_gb, used_gb } => {
                self.memory_total_gb = total_gb;
                self.memory_used_gb = used_gb;
            }
            MetricUpdate::Disk {
                total_gb,
                used_gb,
                used_percent,
            } => {
                self.disk_total_gb = total_gb;
                self.disk_used_gb = used_gb;
                self.disk_used_percent = used_percent;
            }
            MetricUpdate::Processes { running } => {
                self.running_processes = running;
            }
        }
    }
}

/// A typed update event published by one collector.
///
/// All fields of a domain travel in one event, so the supervisor never
/// observes a half-written metric group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricUpdate {
    Cpu {
        usage_percent: f64,
    },
    Memory {
        total_gb: f64,
        used_gb: f64,
    },
    Disk {
        total_gb: f64,
        used_gb: f64,
        used_percent: f64,
    },
    Processes {
        running: usize,
    },
}

impl MetricUpdate {
    /// The domain that produced this update.
    pub fn domain(&self) -> Domain {
        match self {
            MetricUpdate::Cpu { .. } => Domain::Cpu,
            MetricUpdate::Memory { .. } => Domain::Memory,
            MetricUpdate::Disk { .. } => Domain::Disk,
            MetricUpdate::Processes { .. } => Domain::Processes,
        }
    }
}

/// Per-domain readiness: true once a domain has published at least one
/// valid value in this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    cpu: bool,
    memory: bool,
    disk: bool,
    processes: bool,
}

impl Readiness {
    /// Mark a domain ready. Monotonic: a ready domain never reverts.
    pub fn mark(&mut self, domain: Domain) {
        match domain {
            Domain::Cpu => self.cpu = true,
            Domain::Memory => self.memory = true,
            Domain::Disk => self.disk = true,
            Domain::Processes => self.processes = true,
        }
    }

    /// Whether the given domain has published at least once.
    pub fn is_ready(&self, domain: Domain) -> bool {
        match domain {
            Domain::Cpu => self.cpu,
            Domain::Memory => self.memory,
            Domain::Disk => self.disk,
            Domain::Processes => self.processes,
        }
    }

    /// Whether every domain has published at least once.
    pub fn all(&self) -> bool {
        self.cpu && self.memory && self.disk && self.processes
    }
}
