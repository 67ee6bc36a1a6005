//! Application assembly and the ASGI-style entry point.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use trellis_http::{Receiver, Request, Response, Scope, SendEvent, Sender};
use trellis_router::{Dispatcher, ErrorHandler, Result as RouteResult, RouteEntry, RouteTable};
use trellis_schedule::{Lifespan, Resources};

use crate::config::AppConfig;

/// The assembled application: routes, middleware, lifespan and config.
///
/// Built once at startup, then driven entirely through [`Application::call`]
/// by the hosting transport. Routes are registered with [`add_routes`] before
/// the application starts serving; the table is read-only during dispatch.
///
/// [`add_routes`]: Application::add_routes
///
/// # Example
///
/// ```
/// use trellis_core::{AppConfig, Application};
/// use trellis_http::{HttpError, Request, Response};
/// use trellis_router::Route;
///
/// async fn ping(_req: Request) -> Result<Response, HttpError> {
///     Ok(Response::text("Pong\n"))
/// }
///
/// let mut app = Application::new(AppConfig::new());
/// app.add_routes(vec![Route::get("/ping", ping).into()]).unwrap();
/// assert_eq!(app.table().route_count(), 1);
/// ```
pub struct Application {
    config: AppConfig,
    table: RouteTable,
    lifespan: Mutex<Option<Lifespan>>,
    resources: Mutex<Resources>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl Application {
    /// Creates an application with an empty route table.
    pub fn new(config: AppConfig) -> Self {
        let table = RouteTable::new(config.domain.clone());
        Self {
            config,
            table,
            lifespan: Mutex::new(None),
            resources: Mutex::new(Resources::new()),
            error_handler: None,
        }
    }

    /// Attaches the lifespan manager driven by the lifespan protocol.
    #[must_use]
    pub fn with_lifespan(self, lifespan: Lifespan) -> Self {
        Self {
            lifespan: Mutex::new(Some(lifespan)),
            ..self
        }
    }

    /// Installs an error handler at the dispatch boundary.
    #[must_use]
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Registers a batch of routes and groups.
    ///
    /// # Errors
    ///
    /// Any [`trellis_router::RouteError`]; a failed batch leaves the table
    /// untouched.
    pub fn add_routes(&mut self, entries: Vec<RouteEntry>) -> RouteResult<()> {
        self.table.add_routes(entries)
    }

    /// The application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The compiled route table.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// A snapshot of the shared resources handed over at startup.
    ///
    /// Empty until the lifespan startup phase has completed.
    pub async fn resources(&self) -> Resources {
        self.resources.lock().await.clone()
    }

    /// Generates the URL for a named route.
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> Option<String> {
        self.table.url_for(name, params)
    }

    /// The ASGI-style entry point, invoked by the hosting transport once per
    /// connection scope.
    ///
    /// An HTTP scope is dispatched to its handler and answered with exactly
    /// one response; a handler error that escapes the dispatch boundary is
    /// answered with a 500. A lifespan scope runs the startup/shutdown
    /// protocol loop until the host sends `Shutdown` or disconnects.
    pub async fn call(&self, scope: Scope, receive: Receiver, send: Sender) {
        match scope {
            Scope::Http(http_scope) => self.handle_http(http_scope, receive, send).await,
            Scope::Lifespan => self.handle_lifespan(receive, send).await,
        }
    }

    async fn handle_http(
        &self,
        scope: trellis_http::HttpScope,
        receive: Receiver,
        send: Sender,
    ) {
        let request = Request::from_scope(scope, receive);
        let dispatcher = Dispatcher::new(&self.table, self.config.debug);
        let dispatcher = match &self.error_handler {
            Some(handler) => dispatcher.with_error_handler(handler.as_ref()),
            None => dispatcher,
        };
        match dispatcher.dispatch(request).await {
            Ok(response) => response.send(&send).await,
            Err(dispatch_error) => {
                error!(app = %self.config.name, error = %dispatch_error, "unhandled handler error");
                Response::internal_server_error().send(&send).await;
            }
        }
    }

    async fn handle_lifespan(&self, receive: Receiver, send: Sender) {
        use trellis_http::ReceiveEvent;

        loop {
            match receive.recv().await {
                ReceiveEvent::Startup => {
                    let result = match self.lifespan.lock().await.as_mut() {
                        Some(lifespan) => lifespan.enter().await,
                        None => Ok(Resources::new()),
                    };
                    match result {
                        Ok(resources) => {
                            *self.resources.lock().await = resources;
                            info!(app = %self.config.name, "application started");
                            send.send(SendEvent::StartupComplete).await;
                        }
                        Err(lifespan_error) => {
                            error!(app = %self.config.name, error = %lifespan_error, "startup failed");
                            send.send(SendEvent::StartupFailed {
                                message: lifespan_error.to_string(),
                            })
                            .await;
                        }
                    }
                }
                ReceiveEvent::Shutdown => {
                    let result = match self.lifespan.lock().await.as_mut() {
                        Some(lifespan) => lifespan.exit().await,
                        None => Ok(()),
                    };
                    match result {
                        Ok(()) => {
                            info!(app = %self.config.name, "application stopped");
                            send.send(SendEvent::ShutdownComplete).await;
                        }
                        Err(lifespan_error) => {
                            error!(app = %self.config.name, error = %lifespan_error, "shutdown failed");
                            send.send(SendEvent::ShutdownFailed {
                                message: lifespan_error.to_string(),
                            })
                            .await;
                        }
                    }
                    return;
                }
                ReceiveEvent::Disconnect => return,
                // Stray body chunks carry no meaning on a lifespan channel.
                ReceiveEvent::Body { .. } => {}
            }
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("routes", &self.table.route_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_http::{HttpError, HttpScope, Method, ReceiveEvent};
    use trellis_router::Route;
    use trellis_schedule::Task;

    async fn ping(_req: Request) -> Result<Response, HttpError> {
        Ok(Response::text("Pong\n"))
    }

    fn collecting_sender() -> (Sender, tokio::sync::mpsc::UnboundedReceiver<SendEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let sender = Sender::new(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        });
        (sender, rx)
    }

    #[tokio::test]
    async fn test_http_scope_produces_start_and_body() {
        let mut app = Application::new(AppConfig::new());
        app.add_routes(vec![Route::get("/ping", ping).into()]).unwrap();

        let scope = Scope::Http(HttpScope {
            method: Method::Get,
            path: "/ping".to_string(),
            headers: Vec::new(),
        });
        let (sender, mut events) = collecting_sender();
        app.call(scope, Receiver::empty(), sender).await;

        assert!(matches!(
            events.recv().await,
            Some(SendEvent::ResponseStart { status: 200, .. })
        ));
        assert_eq!(
            events.recv().await,
            Some(SendEvent::ResponseBody {
                body: b"Pong\n".to_vec()
            })
        );
    }

    #[tokio::test]
    async fn test_lifespan_without_manager_acks_both_phases() {
        let app = Application::new(AppConfig::new());
        let events = std::sync::Arc::new(std::sync::Mutex::new(vec![
            ReceiveEvent::Startup,
            ReceiveEvent::Shutdown,
        ]));
        let queue = std::sync::Arc::clone(&events);
        let receiver = Receiver::new(move || {
            let queue = std::sync::Arc::clone(&queue);
            async move {
                let mut queue = queue.lock().unwrap();
                if queue.is_empty() {
                    ReceiveEvent::Disconnect
                } else {
                    queue.remove(0)
                }
            }
        });
        let (sender, mut acks) = collecting_sender();
        app.call(Scope::Lifespan, receiver, sender).await;

        assert_eq!(acks.recv().await, Some(SendEvent::StartupComplete));
        assert_eq!(acks.recv().await, Some(SendEvent::ShutdownComplete));
    }

    #[tokio::test]
    async fn test_failed_startup_is_acked_with_message() {
        let lifespan = Lifespan::new()
            .on_startup(Task::new("migrate").run(|| async { Err("table locked".into()) }));
        let app = Application::new(AppConfig::new()).with_lifespan(lifespan);

        let sent = std::sync::Arc::new(std::sync::Mutex::new(vec![ReceiveEvent::Startup]));
        let queue = std::sync::Arc::clone(&sent);
        let receiver = Receiver::new(move || {
            let queue = std::sync::Arc::clone(&queue);
            async move {
                let mut queue = queue.lock().unwrap();
                if queue.is_empty() {
                    ReceiveEvent::Disconnect
                } else {
                    queue.remove(0)
                }
            }
        });
        let (sender, mut acks) = collecting_sender();
        app.call(Scope::Lifespan, receiver, sender).await;

        match acks.recv().await {
            Some(SendEvent::StartupFailed { message }) => {
                assert!(message.contains("migrate"));
            }
            other => panic!("unexpected ack: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_url_for_delegates_to_the_table() {
        let mut app = Application::new(AppConfig::new());
        app.add_routes(vec![Route::get("/users/<int:id>", ping).name("user-detail").into()])
            .unwrap();
        let params = HashMap::from([("id".to_string(), "7".to_string())]);
        assert_eq!(app.url_for("user-detail", &params), Some("/users/7".to_string()));
    }
}
