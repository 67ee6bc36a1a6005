//! In-memory test client driving [`Application::call`] without sockets.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use trellis_http::{HttpScope, Method, ReceiveEvent, Receiver, Scope, SendEvent, Sender};

use crate::application::Application;

/// Errors raised by the test client.
#[derive(Debug, Error)]
pub enum TestClientError {
    /// The application refused to start.
    #[error("startup failed: {0}")]
    StartupFailed(String),

    /// The application failed to shut down cleanly.
    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),

    /// The lifespan or response channel closed unexpectedly.
    #[error("transport channel closed unexpectedly")]
    TransportClosed,
}

/// A collected response from the application.
#[derive(Debug, Clone)]
pub struct TestResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in send order.
    pub headers: Vec<(String, String)>,
    /// Accumulated body bytes.
    pub body: Vec<u8>,
}

impl TestResponse {
    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Gets a response header, case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Drives an [`Application`] through its transport boundary in memory.
///
/// [`TestClient::start`] performs the lifespan startup handshake and keeps
/// the protocol channel open; requests are then issued as plain method calls
/// and [`TestClient::shutdown`] completes the lifespan.
///
/// # Example
///
/// ```no_run
/// use trellis_core::{AppConfig, Application, TestClient};
///
/// # async fn demo(app: Application) {
/// let client = TestClient::start(app).await.unwrap();
/// let response = client.get("http://localhost/ping").await.unwrap();
/// assert_eq!(response.status, 200);
/// client.shutdown().await.unwrap();
/// # }
/// ```
pub struct TestClient {
    app: Arc<Application>,
    lifespan_tx: mpsc::UnboundedSender<ReceiveEvent>,
    lifespan_rx: mpsc::UnboundedReceiver<SendEvent>,
    protocol: JoinHandle<()>,
}

impl TestClient {
    /// Starts the application: spawns the lifespan protocol task and runs
    /// the startup handshake.
    ///
    /// # Errors
    ///
    /// [`TestClientError::StartupFailed`] when the application acks startup
    /// with a failure, [`TestClientError::TransportClosed`] when the
    /// protocol channel drops without an ack.
    pub async fn start(app: Application) -> Result<Self, TestClientError> {
        let app = Arc::new(app);
        let (lifespan_tx, receiver) = channel_receiver();
        let (sender, mut lifespan_rx) = channel_sender();

        let protocol = tokio::spawn({
            let app = Arc::clone(&app);
            async move {
                app.call(Scope::Lifespan, receiver, sender).await;
            }
        });

        lifespan_tx
            .send(ReceiveEvent::Startup)
            .map_err(|_| TestClientError::TransportClosed)?;
        match lifespan_rx.recv().await {
            Some(SendEvent::StartupComplete) => Ok(Self {
                app,
                lifespan_tx,
                lifespan_rx,
                protocol,
            }),
            Some(SendEvent::StartupFailed { message }) => {
                Err(TestClientError::StartupFailed(message))
            }
            _ => Err(TestClientError::TransportClosed),
        }
    }

    /// Issues a GET request.
    ///
    /// # Errors
    ///
    /// See [`TestClient::request`].
    pub async fn get(&self, url: &str) -> Result<TestResponse, TestClientError> {
        self.request(Method::Get, url, Vec::new(), Vec::new()).await
    }

    /// Issues a POST request with a body.
    ///
    /// # Errors
    ///
    /// See [`TestClient::request`].
    pub async fn post(&self, url: &str, body: Vec<u8>) -> Result<TestResponse, TestClientError> {
        self.request(Method::Post, url, Vec::new(), body).await
    }

    /// Issues a request and collects the full response.
    ///
    /// URL parsing is deliberately minimal: `scheme://host/path`. The host
    /// from the URL becomes the Host header unless the explicit headers
    /// already carry one.
    ///
    /// # Errors
    ///
    /// [`TestClientError::TransportClosed`] when the application ends the
    /// exchange without a response start.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Result<TestResponse, TestClientError> {
        let (host, path) = split_url(url);
        let mut headers = headers;
        if !host.is_empty() && !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("host")) {
            headers.push(("Host".to_string(), host));
        }
        debug!(method = %method, path = %path, "test client request");

        let scope = Scope::Http(HttpScope {
            method,
            path,
            headers,
        });
        let (body_tx, receiver) = channel_receiver();
        let _ = body_tx.send(ReceiveEvent::Body {
            body,
            more_body: false,
        });
        let (sender, mut events) = channel_sender();

        self.app.call(scope, receiver, sender).await;

        let Some(SendEvent::ResponseStart { status, headers }) = events.recv().await else {
            return Err(TestClientError::TransportClosed);
        };
        let mut body = Vec::new();
        while let Some(event) = events.recv().await {
            if let SendEvent::ResponseBody { body: chunk } = event {
                body.extend_from_slice(&chunk);
            }
        }
        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    /// Runs the shutdown handshake and joins the protocol task.
    ///
    /// # Errors
    ///
    /// [`TestClientError::ShutdownFailed`] when the application acks
    /// shutdown with a failure, [`TestClientError::TransportClosed`] when
    /// the channel drops without an ack.
    pub async fn shutdown(mut self) -> Result<(), TestClientError> {
        self.lifespan_tx
            .send(ReceiveEvent::Shutdown)
            .map_err(|_| TestClientError::TransportClosed)?;
        let ack = self.lifespan_rx.recv().await;
        let _ = self.protocol.await;
        match ack {
            Some(SendEvent::ShutdownComplete) => Ok(()),
            Some(SendEvent::ShutdownFailed { message }) => {
                Err(TestClientError::ShutdownFailed(message))
            }
            _ => Err(TestClientError::TransportClosed),
        }
    }

    /// The application under test.
    pub fn app(&self) -> &Application {
        &self.app
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient").finish_non_exhaustive()
    }
}

/// Builds a [`Receiver`] backed by an unbounded channel; a closed channel
/// reads as a disconnect.
fn channel_receiver() -> (mpsc::UnboundedSender<ReceiveEvent>, Receiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let rx = Arc::new(Mutex::new(rx));
    let receiver = Receiver::new(move || {
        let rx = Arc::clone(&rx);
        async move {
            rx.lock()
                .await
                .recv()
                .await
                .unwrap_or(ReceiveEvent::Disconnect)
        }
    });
    (tx, receiver)
}

/// Builds a [`Sender`] that forwards events into an unbounded channel.
fn channel_sender() -> (Sender, mpsc::UnboundedReceiver<SendEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = Sender::new(move |event| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event);
        }
    });
    (sender, rx)
}

/// Splits `scheme://host/path` into host and path; both parts optional.
fn split_url(url: &str) -> (String, String) {
    let rest = url
        .find("://")
        .map_or(url, |idx| &url[idx + 3..]);
    match rest.find('/') {
        Some(idx) => (rest[..idx].to_string(), rest[idx..].to_string()),
        None => (rest.to_string(), "/".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_url() {
        assert_eq!(
            split_url("http://example.com/ping"),
            ("example.com".to_string(), "/ping".to_string())
        );
        assert_eq!(
            split_url("https://api.example.com:8000"),
            ("api.example.com:8000".to_string(), "/".to_string())
        );
        assert_eq!(split_url("/ping"), (String::new(), "/ping".to_string()));
    }
}
