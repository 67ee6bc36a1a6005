//! The application lifespan manager.

use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::resources::Resources;
use crate::scheduler::CronScheduler;
use crate::task::{BoxedError, Task};

/// Errors bounding a lifespan phase.
///
/// Startup and shutdown failures are distinct variants so the caller can
/// always tell which phase went wrong.
#[derive(Debug, Error)]
pub enum LifespanError {
    /// A startup task failed.
    #[error("startup task '{name}' failed: {source}")]
    StartupTask {
        /// The failing task's name.
        name: String,
        /// The underlying failure.
        #[source]
        source: BoxedError,
    },

    /// The startup phase exceeded its timeout.
    #[error("startup timed out after {0:?}")]
    StartupTimeout(Duration),

    /// A shutdown task failed.
    #[error("shutdown task '{name}' failed: {source}")]
    ShutdownTask {
        /// The failing task's name.
        name: String,
        /// The underlying failure.
        #[source]
        source: BoxedError,
    },

    /// The shutdown phase exceeded its timeout.
    #[error("shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
}

/// Result type alias for lifespan operations.
pub type Result<T> = std::result::Result<T, LifespanError>;

/// Bounds the application's running lifetime.
///
/// [`Lifespan::enter`] runs the startup tasks in registration order, starts
/// the cron scheduler and registers the cron tasks; [`Lifespan::exit`] stops
/// the scheduler first, then runs the shutdown tasks. Each phase runs under
/// its own timeout; exceeding it aborts the phase's remaining steps but not
/// operations already in flight.
///
/// # Example
///
/// ```
/// use trellis_schedule::{Lifespan, Task, Unit};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut lifespan = Lifespan::new()
///     .on_startup(Task::new("warm-cache").run(|| async { Ok(()) }))
///     .cron(Task::new("heartbeat").every(30, Unit::Seconds).run(|| async { Ok(()) }));
///
/// let resources = lifespan.enter().await.unwrap();
/// assert!(resources.is_empty());
/// lifespan.exit().await.unwrap();
/// # });
/// ```
pub struct Lifespan {
    startup_tasks: Vec<Task>,
    shutdown_tasks: Vec<Task>,
    cron_tasks: Vec<Task>,
    scheduler: CronScheduler,
    resources: Resources,
    startup_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Default for Lifespan {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifespan {
    /// Creates an empty lifespan with 30-second phase timeouts.
    pub fn new() -> Self {
        Self {
            startup_tasks: Vec::new(),
            shutdown_tasks: Vec::new(),
            cron_tasks: Vec::new(),
            scheduler: CronScheduler::new(),
            resources: Resources::new(),
            startup_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    /// Appends a startup task; tasks run in registration order.
    #[must_use]
    pub fn on_startup(mut self, task: Task) -> Self {
        self.startup_tasks.push(task);
        self
    }

    /// Appends a shutdown task; tasks run in registration order.
    #[must_use]
    pub fn on_shutdown(mut self, task: Task) -> Self {
        self.shutdown_tasks.push(task);
        self
    }

    /// Appends a recurring task, registered with the scheduler on enter.
    #[must_use]
    pub fn cron(mut self, task: Task) -> Self {
        self.cron_tasks.push(task);
        self
    }

    /// Stores a shared resource for the enter handoff.
    #[must_use]
    pub fn resource<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.resources.insert(value);
        self
    }

    /// Overrides the startup phase timeout.
    #[must_use]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Overrides the shutdown phase timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Overrides the scheduler's poll resolution.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.scheduler = CronScheduler::with_poll_interval(poll_interval);
        self
    }

    /// Returns the embedded scheduler.
    pub fn scheduler(&self) -> &CronScheduler {
        &self.scheduler
    }

    /// Runs the startup phase.
    ///
    /// Returns a snapshot of the shared resources for the caller to thread
    /// into per-request context.
    ///
    /// # Errors
    ///
    /// [`LifespanError::StartupTask`] if a task fails, or
    /// [`LifespanError::StartupTimeout`] when the phase exceeds its timeout;
    /// either aborts the remaining startup steps.
    pub async fn enter(&mut self) -> Result<Resources> {
        info!("starting application");
        let deadline = self.startup_timeout;
        timeout(deadline, async {
            for task in &self.startup_tasks {
                run_phase_task(task)
                    .await
                    .map_err(|source| LifespanError::StartupTask {
                        name: task.name.clone(),
                        source,
                    })?;
            }
            self.scheduler.start();
            for task in self.cron_tasks.clone() {
                self.scheduler.add_task(task).await;
            }
            Ok(())
        })
        .await
        .map_err(|_| LifespanError::StartupTimeout(deadline))??;
        info!(cron_tasks = self.cron_tasks.len(), "application startup complete");
        Ok(self.resources.clone())
    }

    /// Runs the shutdown phase: scheduler first, then the shutdown tasks.
    ///
    /// # Errors
    ///
    /// [`LifespanError::ShutdownTask`] or [`LifespanError::ShutdownTimeout`];
    /// the variants are distinct from their startup counterparts so the
    /// caller can tell which phase hung.
    pub async fn exit(&mut self) -> Result<()> {
        info!("shutting down application");
        let deadline = self.shutdown_timeout;
        timeout(deadline, async {
            self.scheduler.stop().await;
            self.scheduler.clear().await;
            for task in &self.shutdown_tasks {
                run_phase_task(task)
                    .await
                    .map_err(|source| LifespanError::ShutdownTask {
                        name: task.name.clone(),
                        source,
                    })?;
            }
            Ok(())
        })
        .await
        .map_err(|_| LifespanError::ShutdownTimeout(deadline))??;
        info!("shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for Lifespan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifespan")
            .field("startup_tasks", &self.startup_tasks.len())
            .field("shutdown_tasks", &self.shutdown_tasks.len())
            .field("cron_tasks", &self.cron_tasks.len())
            .finish()
    }
}

/// Runs one startup/shutdown task; a task without a callable is skipped.
async fn run_phase_task(task: &Task) -> std::result::Result<(), BoxedError> {
    let Some(func) = &task.func else {
        warn!(task = %task.name, "skipping lifecycle task without a callable");
        return Ok(());
    };
    debug!(task = %task.name, "running lifecycle task");
    func.invoke().await
}
