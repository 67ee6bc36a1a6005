//! Declarative route and route group definitions.

use std::future::Future;
use std::sync::Arc;

use trellis_http::{BoxFuture, HttpError, Method, Request, Response};

use crate::middleware::Middleware;

/// The future a handler invocation resolves to.
pub type HandlerFuture = BoxFuture<'static, Result<Response, HttpError>>;

/// A boxed async handler function.
pub type Handler = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// A single route definition: methods, path template, handler and any
/// route-level middleware.
///
/// The path template is compiled at registration time, after group prefixes
/// have been applied; see `RouteTable::add_routes`.
#[derive(Clone)]
pub struct Route {
    /// Display name, usable for reverse URL lookup when non-empty.
    pub name: String,
    /// HTTP methods this route accepts.
    pub methods: Vec<Method>,
    /// Path template, before group prefixes are applied.
    pub path: String,
    /// Request handler.
    pub handler: Handler,
    /// Route-level middleware; forms the innermost middleware level.
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Route {
    /// Creates a route accepting the given methods.
    pub fn new<F, Fut>(methods: Vec<Method>, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self {
            name: String::new(),
            methods,
            path: path.into(),
            handler: Arc::new(move |req| Box::pin(handler(req))),
            middlewares: Vec::new(),
        }
    }

    /// Creates a GET route.
    pub fn get<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self::new(vec![Method::Get], path, handler)
    }

    /// Creates a POST route.
    pub fn post<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self::new(vec![Method::Post], path, handler)
    }

    /// Creates a PUT route.
    pub fn put<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self::new(vec![Method::Put], path, handler)
    }

    /// Creates a PATCH route.
    pub fn patch<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self::new(vec![Method::Patch], path, handler)
    }

    /// Creates a DELETE route.
    pub fn delete<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self::new(vec![Method::Delete], path, handler)
    }

    /// Creates a HEAD route.
    pub fn head<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self::new(vec![Method::Head], path, handler)
    }

    /// Creates an OPTIONS route.
    pub fn options<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self::new(vec![Method::Options], path, handler)
    }

    /// Sets the route name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attaches a middleware to this route.
    #[must_use]
    pub fn middleware(self, mw: impl Middleware + 'static) -> Self {
        self.middleware_arc(Arc::new(mw))
    }

    /// Attaches an already-shared middleware instance.
    #[must_use]
    pub fn middleware_arc(mut self, mw: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(mw);
        self
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("path", &self.path)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// A group of routes sharing a prefix, subdomain and middleware.
///
/// Groups nest to arbitrary depth; nested groups inherit and extend the
/// parent's prefix, subdomain and middleware, never replace them.
pub struct RouteGroup {
    /// Display name for diagnostics.
    pub name: String,
    /// Path prefix applied to every child; must start with `/` when set.
    pub prefix: String,
    /// Subdomain label applied to every child.
    pub subdomain: String,
    /// Group-level middleware; runs outside child middleware.
    pub middlewares: Vec<Arc<dyn Middleware>>,
    /// Child routes and nested groups, in declaration order.
    pub children: Vec<RouteEntry>,
}

impl RouteGroup {
    /// Creates an empty group with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            subdomain: String::new(),
            middlewares: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sets the group's path prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the group's subdomain label.
    #[must_use]
    pub fn subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = subdomain.into();
        self
    }

    /// Attaches a middleware to this group.
    #[must_use]
    pub fn middleware(self, mw: impl Middleware + 'static) -> Self {
        self.middleware_arc(Arc::new(mw))
    }

    /// Attaches an already-shared middleware instance.
    #[must_use]
    pub fn middleware_arc(mut self, mw: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(mw);
        self
    }

    /// Adds a child route.
    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.children.push(RouteEntry::Route(route));
        self
    }

    /// Adds a nested group.
    #[must_use]
    pub fn group(mut self, group: RouteGroup) -> Self {
        self.children.push(RouteEntry::Group(group));
        self
    }
}

impl std::fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGroup")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("subdomain", &self.subdomain)
            .field("middlewares", &self.middlewares.len())
            .field("children", &self.children.len())
            .finish()
    }
}

/// An entry in a route declaration list: a concrete route or a nested group.
#[derive(Debug)]
pub enum RouteEntry {
    /// A single route.
    Route(Route),
    /// A nested group.
    Group(RouteGroup),
}

impl From<Route> for RouteEntry {
    fn from(route: Route) -> Self {
        Self::Route(route)
    }
}

impl From<RouteGroup> for RouteEntry {
    fn from(group: RouteGroup) -> Self {
        Self::Group(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok_handler(_req: Request) -> Result<Response, HttpError> {
        Ok(Response::ok())
    }

    #[test]
    fn test_route_builders() {
        let route = Route::get("/ping", ok_handler).name("Ping");
        assert_eq!(route.methods, [Method::Get]);
        assert_eq!(route.path, "/ping");
        assert_eq!(route.name, "Ping");
    }

    #[test]
    fn test_group_nesting() {
        let group = RouteGroup::new("api")
            .prefix("/api")
            .subdomain("api")
            .route(Route::get("/", ok_handler))
            .group(RouteGroup::new("v1").prefix("/v1"));
        assert_eq!(group.children.len(), 2);
        assert_eq!(group.prefix, "/api");
        assert_eq!(group.subdomain, "api");
    }
}
