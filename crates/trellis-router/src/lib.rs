//! # trellis-router
//!
//! Declarative URL routing for the trellis web framework.
//!
//! This crate provides:
//! - Path template compilation with typed parameters and wildcards
//! - `Route` and arbitrarily nested `RouteGroup` declarations with
//!   prefix/subdomain/middleware inheritance
//! - A domain-keyed `RouteTable` built once at registration time
//! - A `Dispatcher` executing the before-middleware → handler →
//!   after-middleware pipeline per request
//!
//! ## Quick Start
//!
//! ```
//! use trellis_http::{HttpError, Request, Response};
//! use trellis_router::{Dispatcher, Route, RouteGroup, RouteTable};
//!
//! async fn ping(_req: Request) -> Result<Response, HttpError> {
//!     Ok(Response::text("Pong\n"))
//! }
//!
//! async fn get_cat(req: Request) -> Result<Response, HttpError> {
//!     Ok(Response::text(format!("cat {}", req.params.require("cat_id")?)))
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut table = RouteTable::domainless();
//! table.add_routes(vec![
//!     Route::get("/ping", ping).name("Ping").into(),
//!     RouteGroup::new("api")
//!         .prefix("/api")
//!         .route(Route::get("/cats/<int:cat_id>", get_cat))
//!         .into(),
//! ]).unwrap();
//!
//! let dispatcher = Dispatcher::new(&table, false);
//! let response = dispatcher.dispatch(Request::get("/api/cats/7")).await.unwrap();
//! assert_eq!(response.body_string(), Some("cat 7".to_string()));
//! # });
//! ```
//!
//! ## Route resolution order
//!
//! Lookup is first-match-wins in registration order, not most-specific-wins:
//! when two patterns overlap, whichever was declared first handles the
//! request. Matching considers the request path only.
//!
//! ## Middleware pipeline
//!
//! Middleware attach per nesting level. Request-phase middleware run from the
//! outermost group inwards; any interception stops the whole dispatch.
//! Response-phase middleware run the levels in reverse, innermost first, each
//! seeing (and optionally replacing) the latest response.

mod dispatch;
mod error;
mod middleware;
mod pattern;
mod route;
mod table;

pub use dispatch::{DefaultErrorHandler, DispatchError, Dispatcher, ErrorHandler};
pub use error::{Result, RouteError};
pub use middleware::{Middleware, MiddlewareLevel, MiddlewareResult, Phase};
pub use pattern::PathPattern;
pub use route::{Handler, HandlerFuture, Route, RouteEntry, RouteGroup};
pub use table::{RouteConfig, RouteTable};
