//! Application lifespan management with an embedded cron-style scheduler.
//!
//! The crate has three pieces:
//!
//! - [`Task`]: a declarative description of work to run, either once at a
//!   lifecycle boundary or on a recurring interval.
//! - [`CronScheduler`]: a polling loop that fires due recurring tasks
//!   concurrently and tracks their timing state.
//! - [`Lifespan`]: ties startup tasks, shutdown tasks and the scheduler
//!   into two timeout-guarded phases, and hands a [`Resources`] snapshot
//!   to the host application on enter.
//!
//! # Example
//!
//! ```
//! use trellis_schedule::{Lifespan, Task, Unit};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut lifespan = Lifespan::new()
//!     .on_startup(Task::new("connect").run(|| async { Ok(()) }))
//!     .cron(Task::new("prune").every(1, Unit::Hours).run(|| async { Ok(()) }))
//!     .on_shutdown(Task::new("disconnect").run(|| async { Ok(()) }));
//!
//! let _resources = lifespan.enter().await.unwrap();
//! assert!(lifespan.scheduler().is_running());
//! lifespan.exit().await.unwrap();
//! # });
//! ```

pub mod lifespan;
pub mod resources;
pub mod scheduler;
pub mod task;

pub use lifespan::{Lifespan, LifespanError};
pub use resources::Resources;
pub use scheduler::{CronScheduler, ScheduledTask};
pub use task::{BoxedError, Task, TaskFunc, TaskFuture, TaskResult, Unit};
