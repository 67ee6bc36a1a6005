//! HTTP response type.

use crate::transport::{SendEvent, Sender};

/// An HTTP response.
///
/// Headers are kept as an ordered list, matching the order they will be
/// written to the transport.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Ordered response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Creates a 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Creates a response with plain text content.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: vec![(
                "Content-Type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.into().into_bytes(),
        }
    }

    /// Creates a response with HTML content.
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: vec![(
                "Content-Type".to_string(),
                "text/html; charset=utf-8".to_string(),
            )],
            body: body.into().into_bytes(),
        }
    }

    /// Creates a response with JSON content.
    pub fn json<T: serde::Serialize>(data: &T) -> Self {
        match serde_json::to_vec(data) {
            Ok(body) => Self {
                status: 200,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body,
            },
            Err(_) => Self::internal_server_error(),
        }
    }

    /// Creates a redirect response.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".to_string(), url.into())],
            body: Vec::new(),
        }
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request() -> Self {
        Self::new(400).body("Bad Request")
    }

    /// Creates a 401 Unauthorized response.
    pub fn unauthorized() -> Self {
        Self::new(401).body("Unauthorized")
    }

    /// Creates a 403 Forbidden response.
    pub fn forbidden() -> Self {
        Self::new(403).body("Forbidden")
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::new(404).body("Not Found")
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_server_error() -> Self {
        Self::new(500).body("Internal Server Error")
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Sets the status code.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the body as a string.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Returns the status text for the current status code.
    pub fn status_text(&self) -> &'static str {
        match self.status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }

    /// Emits the response onto the transport as exactly two messages: the
    /// status line with headers, then the body.
    pub async fn send(&self, sender: &Sender) {
        sender
            .send(SendEvent::ResponseStart {
                status: self.status,
                headers: self.headers.clone(),
            })
            .await;
        sender
            .send(SendEvent::ResponseBody {
                body: self.body.clone(),
            })
            .await;
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}
