//! The transport boundary.
//!
//! The hosting server parses sockets and HTTP framing; this core only sees
//! three things: a connection scope, a receive primitive and a send primitive.
//! The event types below are the complete vocabulary exchanged across that
//! boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Method;

/// A boxed future for async transport operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Connection scope handed to the application by the host runtime.
#[derive(Debug, Clone)]
pub enum Scope {
    /// A single HTTP request/response exchange.
    Http(HttpScope),
    /// The lifespan protocol channel (startup/shutdown handshake).
    Lifespan,
}

/// Request metadata carried by an HTTP scope.
#[derive(Debug, Clone)]
pub struct HttpScope {
    /// HTTP method, parsed by the transport.
    pub method: Method,
    /// Request path (no query string).
    pub path: String,
    /// Raw header pairs as received on the wire.
    pub headers: Vec<(String, String)>,
}

/// Events the application receives from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    /// A chunk of the request body.
    Body {
        /// The chunk bytes.
        body: Vec<u8>,
        /// Whether more chunks follow.
        more_body: bool,
    },
    /// The client disconnected.
    Disconnect,
    /// Lifespan scope: the host asks the application to start.
    Startup,
    /// Lifespan scope: the host asks the application to shut down.
    Shutdown,
}

/// Events the application sends to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEvent {
    /// Status line and headers; sent exactly once per response.
    ResponseStart {
        /// HTTP status code.
        status: u16,
        /// Ordered header pairs.
        headers: Vec<(String, String)>,
    },
    /// Response body bytes.
    ResponseBody {
        /// The body bytes.
        body: Vec<u8>,
    },
    /// Lifespan scope: startup finished successfully.
    StartupComplete,
    /// Lifespan scope: startup failed.
    StartupFailed {
        /// Why startup failed.
        message: String,
    },
    /// Lifespan scope: shutdown finished successfully.
    ShutdownComplete,
    /// Lifespan scope: shutdown failed.
    ShutdownFailed {
        /// Why shutdown failed.
        message: String,
    },
}

/// The receive primitive: an async source of [`ReceiveEvent`]s.
///
/// Cloneable so a request and its clones share the same underlying stream.
#[derive(Clone)]
pub struct Receiver(Arc<dyn Fn() -> BoxFuture<'static, ReceiveEvent> + Send + Sync>);

impl Receiver {
    /// Wraps an async callable producing transport events.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ReceiveEvent> + Send + 'static,
    {
        Self(Arc::new(move || Box::pin(f())))
    }

    /// A receiver that always yields an empty final body chunk.
    ///
    /// Useful for constructing requests without a transport, e.g. in tests.
    pub fn empty() -> Self {
        Self::new(|| async {
            ReceiveEvent::Body {
                body: Vec::new(),
                more_body: false,
            }
        })
    }

    /// Awaits the next event from the transport.
    pub async fn recv(&self) -> ReceiveEvent {
        (self.0)().await
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Receiver")
    }
}

/// The send primitive: an async sink for [`SendEvent`]s.
#[derive(Clone)]
pub struct Sender(Arc<dyn Fn(SendEvent) -> BoxFuture<'static, ()> + Send + Sync>);

impl Sender {
    /// Wraps an async callable consuming transport events.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(SendEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Arc::new(move |event| Box::pin(f(event))))
    }

    /// Sends one event to the transport.
    pub async fn send(&self, event: SendEvent) {
        (self.0)(event).await;
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sender")
    }
}
