//! Full request flow through the transport boundary, lifespan included.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use trellis_core::{AppConfig, Application, TestClient, TestClientError};
use trellis_http::{HttpError, Request, Response};
use trellis_router::{Route, RouteGroup};
use trellis_schedule::{Lifespan, Task};

async fn root(_req: Request) -> Result<Response, HttpError> {
    Ok(Response::text("Hello\n"))
}

async fn ping(_req: Request) -> Result<Response, HttpError> {
    Ok(Response::text("Pong\n"))
}

async fn whoami(req: Request) -> Result<Response, HttpError> {
    Ok(Response::text(format!("host: {}", req.host)))
}

async fn echo(mut req: Request) -> Result<Response, HttpError> {
    let body = req.body().await.to_vec();
    Ok(Response::ok().body(body))
}

#[tokio::test]
async fn test_ping_and_missing() {
    let mut app = Application::new(AppConfig::new());
    app.add_routes(vec![
        Route::get("/", root).into(),
        Route::get("/ping", ping).into(),
    ])
    .unwrap();

    let client = TestClient::start(app).await.unwrap();

    let response = client.get("http://localhost/ping").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "Pong\n");

    let response = client.get("http://localhost/missing").await.unwrap();
    assert_eq!(response.status, 404);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_subdomain_dispatch_over_the_wire() {
    let mut app = Application::new(AppConfig::new().domain("example.com"));
    app.add_routes(vec![
        Route::get("/", root).into(),
        RouteGroup::new("api")
            .subdomain("api")
            .route(Route::get("/whoami", whoami))
            .into(),
    ])
    .unwrap();

    let client = TestClient::start(app).await.unwrap();

    let response = client.get("http://api.example.com/whoami").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "host: api.example.com");

    // Subdomain routes are invisible on the base domain.
    let response = client.get("http://example.com/whoami").await.unwrap();
    assert_eq!(response.status, 404);

    let response = client.get("http://evil.com/whoami").await.unwrap();
    assert_eq!(response.status, 403);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_request_body_round_trip() {
    let mut app = Application::new(AppConfig::new());
    app.add_routes(vec![Route::post("/echo", echo).into()]).unwrap();

    let client = TestClient::start(app).await.unwrap();
    let response = client
        .post("http://localhost/echo", b"payload".to_vec())
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "payload");
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lifespan_tasks_run_around_the_requests() {
    let started = Arc::new(AtomicU32::new(0));
    let stopped = Arc::new(AtomicU32::new(0));

    let on_start = Arc::clone(&started);
    let on_stop = Arc::clone(&stopped);
    let lifespan = Lifespan::new()
        .on_startup(Task::new("init").run(move || {
            let on_start = Arc::clone(&on_start);
            async move {
                on_start.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
        .on_shutdown(Task::new("teardown").run(move || {
            let on_stop = Arc::clone(&on_stop);
            async move {
                on_stop.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

    let mut app = Application::new(AppConfig::new()).with_lifespan(lifespan);
    app.add_routes(vec![Route::get("/ping", ping).into()]).unwrap();

    let client = TestClient::start(app).await.unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 0);

    let response = client.get("http://localhost/ping").await.unwrap();
    assert_eq!(response.status, 200);

    client.shutdown().await.unwrap();
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_startup_surfaces_through_start() {
    let lifespan =
        Lifespan::new().on_startup(Task::new("migrate").run(|| async { Err("locked".into()) }));
    let app = Application::new(AppConfig::new()).with_lifespan(lifespan);

    let error = TestClient::start(app).await.unwrap_err();
    match error {
        TestClientError::StartupFailed(message) => assert!(message.contains("migrate")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_startup_resources_are_visible_to_the_app() {
    #[derive(Debug)]
    struct ApiKeys {
        admin: String,
    }

    let lifespan = Lifespan::new().resource(ApiKeys {
        admin: "s3cret".to_string(),
    });
    let app = Application::new(AppConfig::new()).with_lifespan(lifespan);

    let client = TestClient::start(app).await.unwrap();
    let keys = client.app().resources().await.get::<ApiKeys>().unwrap();
    assert_eq!(keys.admin, "s3cret");
    client.shutdown().await.unwrap();
}
