//! Task descriptions for startup, shutdown and cron work.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// Boxed error returned by task callables.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one task invocation.
pub type TaskResult = Result<(), BoxedError>;

/// The future an async task callable resolves to.
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

/// Time unit scaling a task's interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Interval in seconds.
    Seconds,
    /// Interval in minutes.
    Minutes,
    /// Interval in hours.
    Hours,
    /// Interval in days.
    Days,
}

impl Unit {
    /// Scales an interval count into a duration.
    pub fn scale(&self, interval: i64) -> Duration {
        match self {
            Self::Seconds => Duration::seconds(interval),
            Self::Minutes => Duration::minutes(interval),
            Self::Hours => Duration::hours(interval),
            Self::Days => Duration::days(interval),
        }
    }

    /// Returns the unit name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A task callable: either async, or blocking work that must be offloaded
/// to the blocking pool so it does not stall the event loop.
#[derive(Clone)]
pub enum TaskFunc {
    /// An async callable, awaited directly.
    Async(Arc<dyn Fn() -> TaskFuture + Send + Sync>),
    /// A blocking callable, run via `spawn_blocking`.
    Blocking(Arc<dyn Fn() -> TaskResult + Send + Sync>),
}

impl TaskFunc {
    /// Invokes the callable once.
    pub async fn invoke(&self) -> TaskResult {
        match self {
            Self::Async(func) => func().await,
            Self::Blocking(func) => {
                let func = Arc::clone(func);
                tokio::task::spawn_blocking(move || func())
                    .await
                    .map_err(|join_error| Box::new(join_error) as BoxedError)?
            }
        }
    }
}

impl std::fmt::Debug for TaskFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Async(_) => f.write_str("TaskFunc::Async"),
            Self::Blocking(_) => f.write_str("TaskFunc::Blocking"),
        }
    }
}

/// A declarative task description consumed by the lifespan manager and the
/// cron scheduler.
///
/// Startup and shutdown tasks only need a name and a callable; cron tasks
/// additionally need an interval and unit, and may pin their first run with
/// [`Task::at`].
///
/// # Example
///
/// ```
/// use trellis_schedule::{Task, Unit};
///
/// let task = Task::new("heartbeat")
///     .every(30, Unit::Seconds)
///     .run(|| async { Ok(()) });
/// assert_eq!(task.interval, Some(30));
/// ```
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task name.
    pub name: String,
    /// Interval count; required for cron tasks.
    pub interval: Option<i64>,
    /// Interval unit; required for cron tasks.
    pub unit: Option<Unit>,
    /// Explicit first-run time; defaults to registration time.
    pub start_time: Option<DateTime<Utc>>,
    /// The callable to run.
    pub func: Option<TaskFunc>,
}

impl Task {
    /// Creates an empty task description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: None,
            unit: None,
            start_time: None,
            func: None,
        }
    }

    /// Sets the recurrence interval.
    #[must_use]
    pub fn every(mut self, interval: i64, unit: Unit) -> Self {
        self.interval = Some(interval);
        self.unit = Some(unit);
        self
    }

    /// Pins the first run to an explicit time.
    #[must_use]
    pub fn at(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Sets an async callable.
    #[must_use]
    pub fn run<F, Fut>(mut self, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.func = Some(TaskFunc::Async(Arc::new(move || Box::pin(func()))));
        self
    }

    /// Sets a blocking callable, offloaded to the blocking pool when run.
    #[must_use]
    pub fn run_blocking<F>(mut self, func: F) -> Self
    where
        F: Fn() -> TaskResult + Send + Sync + 'static,
    {
        self.func = Some(TaskFunc::Blocking(Arc::new(func)));
        self
    }
}
