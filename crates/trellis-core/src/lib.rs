//! # trellis-core
//!
//! Application assembly for the trellis web framework: configuration, the
//! ASGI-style `call` entry point the hosting transport drives, and an
//! in-memory test client.
//!
//! ## Quick Start
//!
//! ```
//! use trellis_core::{AppConfig, Application, TestClient};
//! use trellis_http::{HttpError, Request, Response};
//! use trellis_router::Route;
//!
//! async fn ping(_req: Request) -> Result<Response, HttpError> {
//!     Ok(Response::text("Pong\n"))
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut app = Application::new(AppConfig::new());
//! app.add_routes(vec![Route::get("/ping", ping).into()]).unwrap();
//!
//! let client = TestClient::start(app).await.unwrap();
//! let response = client.get("http://localhost/ping").await.unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(response.text(), "Pong\n");
//! client.shutdown().await.unwrap();
//! # });
//! ```

pub mod application;
pub mod config;
pub mod testing;

pub use application::Application;
pub use config::AppConfig;
pub use testing::{TestClient, TestClientError, TestResponse};
