//! # trellis-http
//!
//! HTTP request/response types and the transport boundary for the trellis
//! web framework.
//!
//! This crate provides:
//! - `Method`, `Request` and `Response` types
//! - Path parameter storage (`PathParams`)
//! - The transport event vocabulary (`Scope`, `ReceiveEvent`, `SendEvent`)
//!   and the `Receiver`/`Sender` primitives the host runtime supplies
//!
//! The actual socket and HTTP-parsing layer is out of scope; a host runtime
//! drives an application by handing it a scope plus a receive/send pair.
//!
//! ## Quick Start
//!
//! ```
//! use trellis_http::{Request, Response};
//!
//! let req = Request::get("/users/123").with_host("example.com");
//! assert_eq!(req.host, "example.com");
//!
//! let res = Response::text("Hello, World!");
//! assert_eq!(res.status, 200);
//! ```

mod error;
mod request;
mod response;
mod transport;

pub use error::{HttpError, Result};
pub use request::{Method, PathParams, Request};
pub use response::Response;
pub use transport::{BoxFuture, HttpScope, ReceiveEvent, Receiver, Scope, SendEvent, Sender};
