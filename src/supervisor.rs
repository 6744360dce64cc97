//! Supervisor: owns the authoritative snapshot, spawns the collectors,
//! drives the display cadence, and reaps everything at shutdown.
//!
//! Lifecycle: `Init -> Starting -> Running -> ShuttingDown -> Terminated`.
//! Startup is all-or-nothing: if any collector fails to start, every
//! previously started collector is cancelled and joined before the error
//! is returned.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{MonitorError, Result};
use crate::metrics::collector::{
    run_cpu_collector, run_disk_collector, run_memory_collector, run_process_collector,
};
use crate::metrics::data::{Domain, MetricUpdate, MetricsSnapshot, Readiness};
use crate::metrics::source::SourceFactory;
use crate::report::{render, SnapshotLogger};
use crate::{COLLECT_INTERVAL, DEFAULT_DISPLAY_INTERVAL_SECS, DEFAULT_LOG_FILE};

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// How long shutdown waits for a collector before aborting its task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Runtime configuration for a monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Cadence at which the dashboard is rendered and logged
    pub display_interval: Duration,
    /// Whether to append each displayed snapshot to the log file
    pub log_enabled: bool,
    /// Path of the snapshot log
    pub log_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            display_interval: Duration::from_secs(DEFAULT_DISPLAY_INTERVAL_SECS),
            log_enabled: false,
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl MonitorConfig {
    /// Set the display cadence.
    pub fn with_display_interval(mut self, interval: Duration) -> Self {
        self.display_interval = interval;
        self
    }

    /// Enable or disable snapshot logging.
    pub fn with_log(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }

    /// Set the snapshot log path.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }
}

/// Supervisor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    Starting,
    Running,
    ShuttingDown,
    Terminated,
}

/// Requests shutdown on behalf of the signal task. Idempotent.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Set the run-wide cancellation flag.
    pub fn request(&self) {
        let _ = self.0.send(true);
    }
}

struct CollectorHandle {
    domain: Domain,
    task: JoinHandle<()>,
}

/// Coordinates the four collectors and the display loop.
pub struct Supervisor {
    config: MonitorConfig,
    state: SupervisorState,
    snapshot: MetricsSnapshot,
    readiness: Readiness,
    shutdown_tx: Arc<watch::Sender<bool>>,
    updates_tx: Option<mpsc::Sender<MetricUpdate>>,
    updates_rx: mpsc::Receiver<MetricUpdate>,
    collectors: Vec<CollectorHandle>,
    logger: Option<SnapshotLogger>,
}

impl Supervisor {
    pub fn new(config: MonitorConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            config,
            state: SupervisorState::Init,
            snapshot: MetricsSnapshot::default(),
            readiness: Readiness::default(),
            shutdown_tx: Arc::new(shutdown_tx),
            updates_tx: Some(updates_tx),
            updates_rx,
            collectors: Vec::new(),
            logger: None,
        }
    }

    /// Handle for requesting shutdown from outside the run loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Latest applied snapshot. Fields of domains that are not yet ready
    /// still hold their zero defaults.
    pub fn snapshot(&self) -> &MetricsSnapshot {
        &self.snapshot
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Bring the monitor up: open the snapshot log if enabled, then spawn
    /// the collectors in fixed order.
    pub async fn start(&mut self, factory: &dyn SourceFactory) -> Result<()> {
        let updates_tx = match self.updates_tx.take() {
            Some(tx) => tx,
            None => return Err(MonitorError::config_error("supervisor already started")),
        };
        self.state = SupervisorState::Starting;

        if self.config.log_enabled {
            match SnapshotLogger::open(&self.config.log_path) {
                Ok(logger) => {
                    info!(path = %logger.path().display(), "snapshot log opened");
                    self.logger = Some(logger);
                }
                Err(err) => {
                    self.state = SupervisorState::Terminated;
                    return Err(err);
                }
            }
        }

        for domain in Domain::ALL {
            match self.spawn_collector(domain, factory, updates_tx.clone()) {
                Ok(handle) => {
                    info!(domain = %domain, "collector started");
                    self.collectors.push(handle);
                }
                Err(err) => {
                    warn!(domain = %domain, error = %err, "collector failed to start, rolling back");
                    self.rollback().await;
                    return Err(err);
                }
            }
        }

        // The collectors hold the only senders from here on.
        drop(updates_tx);
        self.state = SupervisorState::Running;
        Ok(())
    }

    fn spawn_collector(
        &self,
        domain: Domain,
        factory: &dyn SourceFactory,
        tx: mpsc::Sender<MetricUpdate>,
    ) -> Result<CollectorHandle> {
        let as_spawn_error = |err: MonitorError| MonitorError::spawn_error(domain, err.to_string());
        let shutdown = self.shutdown_tx.subscribe();
        let task = match domain {
            Domain::Cpu => {
                let source = factory.cpu().map_err(as_spawn_error)?;
                tokio::spawn(run_cpu_collector(source, tx, shutdown))
            }
            Domain::Memory => {
                let source = factory.memory().map_err(as_spawn_error)?;
                tokio::spawn(run_memory_collector(source, tx, shutdown))
            }
            Domain::Disk => {
                let source = factory.disk().map_err(as_spawn_error)?;
                tokio::spawn(run_disk_collector(source, tx, shutdown))
            }
            Domain::Processes => {
                let source = factory.processes().map_err(as_spawn_error)?;
                tokio::spawn(run_process_collector(source, tx, shutdown))
            }
        };
        Ok(CollectorHandle { domain, task })
    }

    /// Cancel and reap every collector started so far, then release the log.
    async fn rollback(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.collectors.drain(..) {
            if let Err(err) = handle.task.await {
                warn!(domain = %handle.domain, error = %err, "collector task did not exit cleanly");
            }
        }
        self.logger = None;
        self.state = SupervisorState::Terminated;
    }

    /// Drive the display loop until shutdown is requested, then reap the
    /// collectors. Renders only once every domain has published and the
    /// display interval has elapsed; polls at the collection cadence
    /// while waiting.
    pub async fn run(&mut self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut poll = time::interval(COLLECT_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_render = Instant::now();

        while self.state == SupervisorState::Running {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                update = self.updates_rx.recv() => match update {
                    Some(update) => self.apply(update),
                    // Every collector has gone away; nothing left to display.
                    None => break,
                },
                _ = poll.tick() => {
                    if self.readiness.all() && Instant::now() >= next_render {
                        self.display();
                        next_render = Instant::now() + self.config.display_interval;
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        self.shutdown().await;
    }

    fn apply(&mut self, update: MetricUpdate) {
        self.snapshot.apply(&update);
        self.readiness.mark(update.domain());
    }

    fn display(&mut self) {
        // ANSI clear, then the fixed-layout dashboard.
        print!("\x1b[2J\x1b[1;1H{}", render(&self.snapshot));
        println!(
            "(Updating every {} seconds... Press Ctrl+C to exit)",
            self.config.display_interval.as_secs()
        );
        if let Some(logger) = self.logger.as_mut() {
            if let Err(err) = logger.append(&self.snapshot) {
                warn!(error = %err, "failed to append snapshot to log");
            }
        }
    }

    /// Cancel all collectors, wait for each with a bounded grace period
    /// (aborting laggards), and close the log.
    pub async fn shutdown(&mut self) {
        if self.state == SupervisorState::Terminated {
            return;
        }
        self.state = SupervisorState::ShuttingDown;
        let _ = self.shutdown_tx.send(true);

        for mut handle in self.collectors.drain(..) {
            match time::timeout(SHUTDOWN_GRACE, &mut handle.task).await {
                Ok(Ok(())) => debug!(domain = %handle.domain, "collector stopped"),
                Ok(Err(err)) => {
                    warn!(domain = %handle.domain, error = %err, "collector task failed")
                }
                Err(_) => {
                    warn!(domain = %handle.domain, "collector unresponsive, aborting");
                    handle.task.abort();
                    let _ = handle.task.await;
                }
            }
        }

        self.logger = None;
        self.state = SupervisorState::Terminated;
        info!("supervisor terminated");
    }
}
