// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup recovery, serving, ordered graceful shutdown.

use crate::config::Config;
use crate::ws::ConnectionManager;
use am_core::event::{data_keys, EventDraft, EventType};
use am_core::{Clock, SystemClock, WorkflowStatus};
use am_engine::{
    ApprovalGates, DriverRegistry, EventBus, EventEmitter, NoopNotify, NotifyAdapter,
    PipelineRegistry, Supervisor, SupervisorConfig, SupervisorDeps, WorktreeHealthMonitor,
};
use am_storage::{Database, RetentionPolicy, StorageError};
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Reason stamped on workflows found non-terminal at startup.
pub const RESTART_REASON: &str = "server restarted unexpectedly";

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared handle the HTTP and WebSocket layers work against.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub bus: EventBus,
    pub emitter: Arc<EventEmitter<SystemClock>>,
    pub supervisor: Supervisor<SystemClock>,
    pub connections: Arc<ConnectionManager>,
    pub clock: SystemClock,
    pub started_at: Instant,
    /// Flipped after recovery, cleared when draining begins
    pub ready: Arc<AtomicBool>,
    /// Middleware 503s new workflow POSTs once set
    pub shutting_down: Arc<AtomicBool>,
}

/// The running daemon: state plus the resources only teardown touches.
pub struct Daemon {
    pub state: AppState,
    monitor: Option<WorktreeHealthMonitor>,
    // NOTE(lifetime): held to maintain the exclusive PID lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl Daemon {
    /// Bring the daemon up: lock, open the store (migrations run), recover
    /// interrupted workflows, start the engine and the health monitor.
    ///
    /// Must be called from within a tokio runtime (spawns the monitor).
    pub fn startup(config: Config) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(&config.state_dir)?;
        let lock_file = acquire_pid_lock(&config)?;

        let db = Arc::new(Database::open(&config.db_path)?);
        let clock = SystemClock;
        let bus = EventBus::new(config.bus_capacity);
        let emitter = Arc::new(EventEmitter::new(Arc::clone(&db), bus.clone(), clock.clone()));
        let gates = Arc::new(ApprovalGates::new(Arc::clone(&emitter)));

        // Recovery runs before the listener exists, so clients can never
        // observe a pre-recovery status.
        recover_interrupted(&db, &emitter)?;

        let notify: Arc<dyn NotifyAdapter> = if crate::env::notifications_disabled() {
            Arc::new(NoopNotify)
        } else {
            Arc::new(am_engine::DesktopNotify::new())
        };

        let supervisor = Supervisor::new(
            SupervisorDeps {
                db: Arc::clone(&db),
                emitter: Arc::clone(&emitter),
                gates,
                pipelines: PipelineRegistry::builtin(),
                drivers: DriverRegistry::builtin(),
                notify,
                clock: clock.clone(),
            },
            SupervisorConfig {
                max_concurrent: config.max_concurrent,
                retry_after_secs: config.retry_after_secs,
                max_review_iterations: config.max_review_iterations,
                ..Default::default()
            },
        );

        let monitor = WorktreeHealthMonitor::spawn(supervisor.clone(), config.check_interval);

        let state = AppState {
            config: Arc::new(config),
            db,
            bus,
            emitter,
            supervisor,
            connections: Arc::new(ConnectionManager::new()),
            clock,
            started_at: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
            shutting_down: Arc::new(AtomicBool::new(false)),
        };

        Ok(Self { state, monitor: Some(monitor), lock_file })
    }

    /// Serve until a shutdown signal, then run the ordered teardown.
    pub async fn run(self) -> Result<(), LifecycleError> {
        let addr = self.state.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LifecycleError::BindFailed(addr, e))?;
        self.state.ready.store(true, Ordering::SeqCst);
        info!(%addr, "amelia daemon ready");

        // The listener keeps serving while executors drain so clients can
        // still approve/cancel parked workflows; only after the drain does
        // the server itself stop.
        let stop = Arc::new(Notify::new());
        let drain = {
            let state = self.state.clone();
            let stop = Arc::clone(&stop);
            tokio::spawn(async move {
                shutdown_signal().await;
                info!("shutdown signal received, draining");
                state.shutting_down.store(true, Ordering::SeqCst);
                state.ready.store(false, Ordering::SeqCst);

                if !state.supervisor.drain(state.config.shutdown_timeout).await {
                    warn!("drain window expired with executors still running");
                }
                state.supervisor.shutdown(state.config.executor_grace).await;
                stop.notify_one();
            })
        };

        let app = crate::http::router(self.state.clone());
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.notified().await })
            .await?;
        let _ = drain.await;

        self.teardown().await;
        Ok(())
    }

    /// Ordered teardown after the listener has stopped: health monitor,
    /// WebSocket close, retention, then the store and lock drop with self.
    async fn teardown(mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop().await;
        }

        self.state.connections.close_all().await;

        let policy = RetentionPolicy {
            retention_days: self.state.config.retention_days,
            max_events_per_workflow: self.state.config.max_events_per_workflow,
        };
        match self.state.db.run_retention(&policy, self.state.clock.epoch_ms()) {
            Ok(report) => info!(
                workflows_deleted = report.workflows_deleted,
                events_deleted = report.events_deleted,
                events_trimmed = report.events_trimmed,
                "shutdown retention finished"
            ),
            Err(e) => warn!(error = %e, "shutdown retention failed"),
        }

        if let Err(e) = std::fs::remove_file(&self.state.config.lock_path) {
            warn!(error = %e, "failed to remove PID file");
        }
        info!("daemon shutdown complete");
    }
}

/// Mark workflows left non-terminal by a previous process as failed (or
/// cancelled, for ones that never started) through the event log, so the
/// log and the status cache stay in agreement.
pub fn recover_interrupted(
    db: &Database,
    emitter: &EventEmitter<SystemClock>,
) -> Result<usize, LifecycleError> {
    let interrupted = db.active_workflows()?;
    let count = interrupted.len();

    for workflow in interrupted {
        let draft = match workflow.status {
            // pending → failed is not a legal transition; a workflow that
            // never started is recovered as cancelled instead.
            WorkflowStatus::Pending => EventDraft::new(
                EventType::WorkflowCancelled,
                "system",
                "Workflow cancelled",
            )
            .with_data(serde_json::json!({ data_keys::REASON: RESTART_REASON })),
            _ => EventDraft::new(
                EventType::WorkflowFailed,
                "system",
                format!("Workflow failed: {RESTART_REASON}"),
            )
            .with_data(serde_json::json!({ data_keys::REASON: RESTART_REASON })),
        };
        if let Err(e) = emitter.emit(workflow.id, draft) {
            warn!(workflow_id = %workflow.id, error = %e, "failed to recover workflow");
        } else {
            info!(workflow_id = %workflow.id, was = %workflow.status, "recovered interrupted workflow");
        }
    }

    Ok(count)
}

fn acquire_pid_lock(config: &Config) -> Result<File, LifecycleError> {
    // Open without truncating: a live daemon's PID must survive a second
    // process bouncing off the lock.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let _ = lock_file.set_len(0);
    let _ = writeln!(lock_file, "{}", std::process::id());
    Ok(lock_file)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
