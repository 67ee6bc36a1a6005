//! Ordering and failure behavior of the lifespan phases.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use trellis_schedule::{Lifespan, LifespanError, Task, Unit};

fn logging_task(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Task {
    let log = Arc::clone(log);
    let entry = name.to_string();
    Task::new(name).run(move || {
        let log = Arc::clone(&log);
        let entry = entry.clone();
        async move {
            log.lock().unwrap().push(entry);
            Ok(())
        }
    })
}

#[tokio::test]
async fn test_startup_and_shutdown_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut lifespan = Lifespan::new()
        .on_startup(logging_task("connect-db", &log))
        .on_startup(logging_task("warm-cache", &log))
        .on_shutdown(logging_task("flush", &log))
        .on_shutdown(logging_task("disconnect", &log));

    lifespan.enter().await.unwrap();
    lifespan.exit().await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        ["connect-db", "warm-cache", "flush", "disconnect"]
    );
}

#[tokio::test]
async fn test_startup_task_failure_names_the_task() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut lifespan = Lifespan::new()
        .on_startup(logging_task("first", &log))
        .on_startup(Task::new("migrate").run(|| async { Err("table locked".into()) }))
        .on_startup(logging_task("never", &log));

    let error = lifespan.enter().await.unwrap_err();
    match error {
        LifespanError::StartupTask { name, .. } => assert_eq!(name, "migrate"),
        other => panic!("unexpected error: {other}"),
    }
    // The failing task aborts the rest of the phase.
    assert_eq!(*log.lock().unwrap(), ["first"]);
}

#[tokio::test]
async fn test_startup_timeout_is_distinct_from_shutdown_timeout() {
    let mut lifespan = Lifespan::new()
        .startup_timeout(Duration::from_millis(20))
        .on_startup(Task::new("hang").run(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }));

    let error = lifespan.enter().await.unwrap_err();
    assert!(matches!(error, LifespanError::StartupTimeout(_)));

    let mut lifespan = Lifespan::new()
        .shutdown_timeout(Duration::from_millis(20))
        .on_shutdown(Task::new("hang").run(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }));
    lifespan.enter().await.unwrap();
    let error = lifespan.exit().await.unwrap_err();
    assert!(matches!(error, LifespanError::ShutdownTimeout(_)));
}

#[tokio::test]
async fn test_enter_registers_cron_tasks_and_exit_clears_them() {
    let mut lifespan = Lifespan::new()
        .poll_interval(Duration::from_millis(10))
        .cron(Task::new("heartbeat").every(1, Unit::Hours).run(|| async { Ok(()) }))
        .cron(Task::new("prune").every(1, Unit::Days).run(|| async { Ok(()) }));

    lifespan.enter().await.unwrap();
    assert!(lifespan.scheduler().is_running());
    assert_eq!(lifespan.scheduler().task_count().await, 2);

    lifespan.exit().await.unwrap();
    assert!(!lifespan.scheduler().is_running());
    assert_eq!(lifespan.scheduler().task_count().await, 0);
}

#[tokio::test]
async fn test_resources_are_returned_from_enter() {
    #[derive(Debug)]
    struct Pool {
        url: String,
    }

    let mut lifespan = Lifespan::new().resource(Pool {
        url: "postgres://localhost/app".to_string(),
    });

    let resources = lifespan.enter().await.unwrap();
    let pool = resources.get::<Pool>().unwrap();
    assert_eq!(pool.url, "postgres://localhost/app");
    lifespan.exit().await.unwrap();
}
