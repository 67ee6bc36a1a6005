//! HTTP request type.

use std::collections::HashMap;

use crate::error::HttpError;
use crate::transport::{HttpScope, ReceiveEvent, Receiver};

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method
    Get,
    /// POST method
    Post,
    /// PUT method
    Put,
    /// PATCH method
    Patch,
    /// DELETE method
    Delete,
    /// HEAD method
    Head,
    /// OPTIONS method
    Options,
}

impl Method {
    /// Parses a method from a string, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Returns the uppercase verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| HttpError::InvalidMethod(s.to_string()))
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Path parameters extracted from the URL.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    params: HashMap<String, String>,
}

impl PathParams {
    /// Creates new empty path params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Gets a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Gets a parameter value or returns an error.
    pub fn require(&self, key: &str) -> Result<&str, HttpError> {
        self.get(key)
            .ok_or_else(|| HttpError::BadRequest(format!("missing path parameter: {key}")))
    }

    /// Parses a parameter as a specific type.
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Returns the number of captured parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true when no parameters were captured.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns an iterator over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// An HTTP request.
///
/// Requests are cloneable; clones share the underlying transport receiver, so
/// the body stream may only be consumed once per connection.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Host header value (may include a port).
    pub host: String,
    /// Request headers as received.
    pub headers: Vec<(String, String)>,
    /// Path parameters extracted from URL patterns.
    pub params: PathParams,
    /// Per-request context for data injected by middleware.
    pub context: HashMap<String, serde_json::Value>,
    receiver: Receiver,
    body: Option<Vec<u8>>,
}

impl Request {
    /// Creates a request without a transport, for assembling test requests.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            host: String::new(),
            headers: Vec::new(),
            params: PathParams::new(),
            context: HashMap::new(),
            receiver: Receiver::empty(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Creates a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Builds a request from a transport scope and receive primitive.
    pub fn from_scope(scope: HttpScope, receiver: Receiver) -> Self {
        let host = scope
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("host"))
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        Self {
            method: scope.method,
            path: scope.path,
            host,
            headers: scope.headers,
            params: PathParams::new(),
            context: HashMap::new(),
            receiver,
            body: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if key.eq_ignore_ascii_case("host") {
            self.host.clone_from(&value);
        }
        self.headers.push((key, value));
        self
    }

    /// Sets the Host header.
    #[must_use]
    pub fn with_host(self, host: impl Into<String>) -> Self {
        self.header("Host", host)
    }

    /// Gets a header value, case-insensitively.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Reads the full request body from the transport.
    ///
    /// Chunks are accumulated until the transport signals the final one. The
    /// result is cached, so repeated calls return the same bytes.
    pub async fn body(&mut self) -> &[u8] {
        if self.body.is_none() {
            let mut collected = Vec::new();
            loop {
                match self.receiver.recv().await {
                    ReceiveEvent::Body { body, more_body } => {
                        collected.extend_from_slice(&body);
                        if !more_body {
                            break;
                        }
                    }
                    _ => break,
                }
            }
            self.body = Some(collected);
        }
        self.body.as_deref().unwrap_or_default()
    }

    /// Reads the body and parses it as JSON.
    pub async fn json<T: serde::de::DeserializeOwned>(&mut self) -> Result<T, HttpError> {
        let body = self.body().await;
        Ok(serde_json::from_slice(body)?)
    }
}
