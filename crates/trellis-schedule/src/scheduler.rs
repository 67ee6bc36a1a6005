//! The cron-style scheduler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::task::{Task, TaskFunc, Unit};

/// A registered recurring task with its timing state.
#[derive(Clone)]
pub struct ScheduledTask {
    /// Unique task name.
    pub name: String,
    /// The callable to run.
    pub func: TaskFunc,
    /// Interval count.
    pub interval: i64,
    /// Interval unit.
    pub unit: Unit,
    /// First-run time.
    pub start_time: DateTime<Utc>,
    /// Completion time of the most recent successful run.
    pub last_run: Option<DateTime<Utc>>,
    /// When the task is next due.
    pub next_run: DateTime<Utc>,
}

impl ScheduledTask {
    fn new(
        name: String,
        func: TaskFunc,
        interval: i64,
        unit: Unit,
        start_time: Option<DateTime<Utc>>,
    ) -> Self {
        let start_time = start_time.unwrap_or_else(Utc::now);
        Self {
            name,
            func,
            interval,
            unit,
            start_time,
            last_run: None,
            next_run: start_time,
        }
    }

    /// Recomputes when this task should run next.
    ///
    /// Without a previous run the task is due at its start time; afterwards
    /// it is due one scaled interval after the last completion.
    pub fn calculate_next_run(&mut self) {
        self.next_run = match self.last_run {
            None => self.start_time,
            Some(last_run) => last_run + self.unit.scale(self.interval),
        };
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("unit", &self.unit)
            .field("last_run", &self.last_run)
            .field("next_run", &self.next_run)
            .finish()
    }
}

/// A polling scheduler firing named recurring tasks.
///
/// One loop polls at a fixed resolution; every cycle it collects all tasks
/// whose `next_run` has passed and fires them concurrently. Distinct tasks
/// may overlap freely; tasks sharing external state must synchronize
/// themselves.
///
/// A failed run is logged and its timing state left untouched, so the task
/// is reconsidered on the very next cycle. That is an immediate-retry policy
/// with no backoff: a task that keeps failing will fire every poll tick.
pub struct CronScheduler {
    tasks: Arc<Mutex<HashMap<String, ScheduledTask>>>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    loop_handle: Option<JoinHandle<()>>,
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CronScheduler {
    /// Creates a scheduler polling at the default one-second resolution.
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_secs(1))
    }

    /// Creates a scheduler with a custom poll resolution.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            poll_interval,
            loop_handle: None,
        }
    }

    /// Registers a task.
    ///
    /// A task missing its callable, interval or unit is logged and ignored;
    /// a malformed registration never fails the rest of a batch. Registering
    /// a name twice replaces the earlier entry.
    pub async fn add_task(&self, task: Task) {
        let (Some(func), Some(interval), Some(unit)) = (task.func, task.interval, task.unit)
        else {
            warn!(task = %task.name, "skipping task with missing func, interval or unit");
            return;
        };
        info!(task = %task.name, interval, unit = %unit, "added scheduled task");
        let scheduled = ScheduledTask::new(task.name.clone(), func, interval, unit, task.start_time);
        self.tasks.lock().await.insert(task.name, scheduled);
    }

    /// Removes a task by name; returns whether it existed.
    pub async fn remove_task(&self, name: &str) -> bool {
        let removed = self.tasks.lock().await.remove(name).is_some();
        if removed {
            info!(task = %name, "removed scheduled task");
        }
        removed
    }

    /// Removes every registered task.
    pub async fn clear(&self) {
        self.tasks.lock().await.clear();
    }

    /// Returns a snapshot of a task's current state.
    pub async fn task(&self, name: &str) -> Option<ScheduledTask> {
        self.tasks.lock().await.get(name).cloned()
    }

    /// Lists all registered task names.
    pub async fn task_names(&self) -> Vec<String> {
        self.tasks.lock().await.keys().cloned().collect()
    }

    /// Number of registered tasks.
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether the polling loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the polling loop; a no-op if already running.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let tasks = Arc::clone(&self.tasks);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;
        self.loop_handle = Some(tokio::spawn(async move {
            info!("cron scheduler started");
            let mut in_flight = JoinSet::new();
            while running.load(Ordering::SeqCst) {
                // Prune handles of completed runs.
                while in_flight.try_join_next().is_some() {}

                let now = Utc::now();
                let due: Vec<ScheduledTask> = {
                    let guard = tasks.lock().await;
                    guard
                        .values()
                        .filter(|task| task.next_run <= now)
                        .cloned()
                        .collect()
                };
                if !due.is_empty() {
                    debug!(count = due.len(), "firing due scheduled tasks");
                }
                for task in due {
                    in_flight.spawn(run_due_task(task, Arc::clone(&tasks)));
                }

                tokio::time::sleep(poll_interval).await;
            }
            // Stop aborts whatever is still in flight; runs are not
            // guaranteed to finish once the scheduler is told to stop.
            in_flight.shutdown().await;
            info!("cron scheduler stopped");
        }));
    }

    /// Stops the scheduler.
    ///
    /// The loop observes the flag at the next polling boundary, aborts any
    /// tracked in-flight runs and exits; this call waits for it.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.loop_handle.take() {
            if let Err(join_error) = handle.await {
                error!(%join_error, "scheduler loop ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("running", &self.is_running())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Runs one due task and updates its timing state on success.
async fn run_due_task(task: ScheduledTask, tasks: Arc<Mutex<HashMap<String, ScheduledTask>>>) {
    debug!(task = %task.name, "running scheduled task");
    match task.func.invoke().await {
        Ok(()) => {
            let mut guard = tasks.lock().await;
            // The task may have been removed while it was running.
            if let Some(entry) = guard.get_mut(&task.name) {
                entry.last_run = Some(Utc::now());
                entry.calculate_next_run();
                debug!(task = %task.name, next_run = %entry.next_run, "scheduled task completed");
            }
        }
        Err(error) => {
            // Timing state is left untouched so the task is retried on the
            // next polling cycle.
            error!(task = %task.name, %error, "scheduled task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_task_is_ignored() {
        let scheduler = CronScheduler::new();
        scheduler.add_task(Task::new("no-func").every(1, Unit::Seconds)).await;
        scheduler
            .add_task(Task::new("no-interval").run(|| async { Ok(()) }))
            .await;
        assert_eq!(scheduler.task_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_and_remove_task() {
        let scheduler = CronScheduler::new();
        scheduler
            .add_task(Task::new("beat").every(5, Unit::Minutes).run(|| async { Ok(()) }))
            .await;
        assert_eq!(scheduler.task_names().await, ["beat"]);
        assert!(scheduler.remove_task("beat").await);
        assert!(!scheduler.remove_task("beat").await);
    }

    #[tokio::test]
    async fn test_next_run_defaults_to_start_time() {
        let start = Utc::now() + chrono::Duration::hours(1);
        let scheduler = CronScheduler::new();
        scheduler
            .add_task(
                Task::new("later")
                    .every(1, Unit::Hours)
                    .at(start)
                    .run(|| async { Ok(()) }),
            )
            .await;
        let snapshot = scheduler.task("later").await.unwrap();
        assert_eq!(snapshot.next_run, start);
        assert!(snapshot.last_run.is_none());
    }

    #[test]
    fn test_calculate_next_run_after_success() {
        let mut task = ScheduledTask::new(
            "t".to_string(),
            TaskFunc::Blocking(Arc::new(|| Ok(()))),
            10,
            Unit::Seconds,
            None,
        );
        let completed = Utc::now();
        task.last_run = Some(completed);
        task.calculate_next_run();
        assert_eq!(task.next_run, completed + chrono::Duration::seconds(10));
    }
}
