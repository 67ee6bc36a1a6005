//! Per-request dispatch: domain resolution, route lookup and the
//! middleware/handler pipeline.

use thiserror::Error;
use tracing::{debug, warn};

use trellis_http::{BoxFuture, HttpError, Request, Response};

use crate::middleware::MiddlewareResult;
use crate::table::RouteTable;

/// Errors escaping a dispatch call.
///
/// "Not found" and "host mismatch" are not errors; they come back as
/// ordinary 404/403 responses.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler failed and no error handler was installed.
    #[error("handler error: {0}")]
    Handler(#[from] HttpError),
}

/// Maps handler errors to responses at the dispatch boundary.
///
/// Installing one makes every handler failure produce a response; without
/// one, failures surface as [`DispatchError::Handler`] to the caller.
pub trait ErrorHandler: Send + Sync {
    /// Produces the response for a failed handler invocation.
    fn handle<'a>(&'a self, request: &'a Request, error: &'a HttpError) -> BoxFuture<'a, Response>;
}

/// Maps an error to a plain-text response with the error's status code.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle<'a>(
        &'a self,
        _request: &'a Request,
        error: &'a HttpError,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            Response::new(error.status())
                .header("Content-Type", "text/plain; charset=utf-8")
                .body(error.to_string())
        })
    }
}

/// Resolves requests against an immutable [`RouteTable`] and runs the
/// middleware/handler pipeline.
///
/// Matching considers the path only: the declared method set is carried for
/// diagnostics but does not narrow the match. Overlapping patterns resolve
/// first-match-wins in registration order.
pub struct Dispatcher<'a> {
    table: &'a RouteTable,
    debug: bool,
    error_handler: Option<&'a dyn ErrorHandler>,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher over the given table.
    ///
    /// In debug mode a host that does not match the configured domain falls
    /// back to the domainless bucket instead of being rejected.
    pub fn new(table: &'a RouteTable, debug: bool) -> Self {
        Self {
            table,
            debug,
            error_handler: None,
        }
    }

    /// Installs an error handler at the dispatch boundary.
    #[must_use]
    pub fn with_error_handler(mut self, handler: &'a dyn ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Dispatches one request to its handler, producing exactly one response.
    ///
    /// Pipeline: request-phase middleware run level by level, outermost
    /// first; an intercepting middleware short-circuits everything after it.
    /// Then the handler runs with the captured path parameters, and
    /// response-phase middleware run the levels in reverse, each seeing and
    /// possibly replacing the latest response.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Handler`] when the handler fails and no error
    /// handler is installed.
    pub async fn dispatch(&self, mut request: Request) -> Result<Response, DispatchError> {
        let Some(domain) = self.resolve_domain(&request.host) else {
            warn!(host = %request.host, "host does not match the configured domain");
            return Ok(Response::forbidden());
        };

        let Some((config, params)) = self.table.lookup(&domain, &request.path) else {
            debug!(domain = %domain, path = %request.path, "no route matched");
            return Ok(Response::not_found());
        };
        debug!(template = %config.template, domain = %domain, "route matched");
        request.params = params;

        for level in &config.levels {
            for mw in &level.before {
                if let MiddlewareResult::Intercept(response) =
                    mw.intercept(&mut request, None).await
                {
                    debug!(middleware = mw.name(), "request intercepted");
                    return Ok(response);
                }
            }
        }

        let mut response = match (config.handler)(request.clone()).await {
            Ok(response) => response,
            Err(error) => match self.error_handler {
                Some(handler) => handler.handle(&request, &error).await,
                None => return Err(DispatchError::Handler(error)),
            },
        };

        for level in config.levels.iter().rev() {
            for mw in &level.after {
                if let MiddlewareResult::Intercept(replacement) =
                    mw.intercept(&mut request, Some(&response)).await
                {
                    response = replacement;
                }
            }
        }

        Ok(response)
    }

    /// Derives the lookup key from the Host header, or `None` for a host the
    /// application must reject.
    fn resolve_domain(&self, host: &str) -> Option<String> {
        let host = host.split(':').next().unwrap_or_default();
        let base = self.table.base_domain();
        if base.is_empty() {
            return Some(String::new());
        }
        if host == base {
            return Some(base.to_string());
        }
        if host.ends_with(&format!(".{base}")) {
            return Some(host.to_string());
        }
        if self.debug {
            return Some(String::new());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Route;
    use trellis_http::Method;

    async fn ok_handler(_req: Request) -> Result<Response, HttpError> {
        Ok(Response::text("ok"))
    }

    async fn failing_handler(_req: Request) -> Result<Response, HttpError> {
        Err(HttpError::Internal("boom".to_string()))
    }

    fn table_with(routes: Vec<crate::route::RouteEntry>, domain: &str) -> RouteTable {
        let mut table = RouteTable::new(domain);
        table.add_routes(routes).unwrap();
        table
    }

    #[tokio::test]
    async fn test_not_found_is_a_response() {
        let table = table_with(vec![Route::get("/", ok_handler).into()], "");
        let dispatcher = Dispatcher::new(&table, false);
        let response = dispatcher
            .dispatch(Request::new(Method::Get, "/missing"))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_host_mismatch_is_forbidden() {
        let table = table_with(vec![Route::get("/", ok_handler).into()], "example.com");
        let dispatcher = Dispatcher::new(&table, false);
        let request = Request::get("/").with_host("evil.com");
        let response = dispatcher.dispatch(request).await.unwrap();
        assert_eq!(response.status, 403);
    }

    #[tokio::test]
    async fn test_debug_mode_falls_back_instead_of_403() {
        let table = table_with(vec![Route::get("/", ok_handler).into()], "example.com");
        let dispatcher = Dispatcher::new(&table, true);
        let request = Request::get("/").with_host("evil.com");
        // Falls back to the domainless bucket, which has nothing registered.
        let response = dispatcher.dispatch(request).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_port_is_stripped_from_host() {
        let table = table_with(vec![Route::get("/", ok_handler).into()], "example.com");
        let dispatcher = Dispatcher::new(&table, false);
        let request = Request::get("/").with_host("example.com:8000");
        let response = dispatcher.dispatch(request).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_handler_error_without_error_handler() {
        let table = table_with(vec![Route::get("/", failing_handler).into()], "");
        let dispatcher = Dispatcher::new(&table, false);
        let result = dispatcher.dispatch(Request::get("/")).await;
        assert!(matches!(result, Err(DispatchError::Handler(_))));
    }

    #[tokio::test]
    async fn test_default_error_handler_maps_status() {
        let table = table_with(vec![Route::get("/", failing_handler).into()], "");
        let handler = DefaultErrorHandler;
        let dispatcher = Dispatcher::new(&table, false).with_error_handler(&handler);
        let response = dispatcher.dispatch(Request::get("/")).await.unwrap();
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn test_path_params_reach_the_handler() {
        async fn echo_id(req: Request) -> Result<Response, HttpError> {
            Ok(Response::text(req.params.require("id")?.to_string()))
        }
        let table = table_with(vec![Route::get("/users/<int:id>", echo_id).into()], "");
        let dispatcher = Dispatcher::new(&table, false);
        let response = dispatcher.dispatch(Request::get("/users/42")).await.unwrap();
        assert_eq!(response.body_string(), Some("42".to_string()));
    }
}
