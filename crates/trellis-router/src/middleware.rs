//! Middleware traits and the per-level before/after buckets.

use std::sync::Arc;

use trellis_http::{BoxFuture, Request, Response};

/// Which phase of the pipeline a middleware attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Runs before the handler, outermost level first.
    Request,
    /// Runs after the handler, innermost level first.
    Response,
}

/// Outcome of a middleware invocation.
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Proceed to the next middleware or the handler.
    Continue,
    /// Stop the pipeline (request phase) or replace the response
    /// (response phase) with the given response.
    Intercept(Response),
}

/// A shared, stateless pipeline hook.
///
/// Instances are reference-counted and may be attached to many routes; the
/// router only reads [`Middleware::attach_to`] and [`Middleware::priority`],
/// it never mutates the middleware itself.
///
/// In the request phase `response` is `None`; in the response phase it holds
/// the latest response produced so far.
pub trait Middleware: Send + Sync {
    /// Display name, used in logs.
    fn name(&self) -> &str;

    /// The phase this middleware attaches to.
    fn attach_to(&self) -> Phase;

    /// Ordering within a level's bucket; lower priorities run first.
    fn priority(&self) -> i32 {
        0
    }

    /// Inspects the request (and response, in the response phase).
    fn intercept<'a>(
        &'a self,
        request: &'a mut Request,
        response: Option<&'a Response>,
    ) -> BoxFuture<'a, MiddlewareResult>;
}

/// One nesting tier's middleware, split into phase buckets.
///
/// Levels are kept separate rather than flattened so the response phase can
/// walk them in reverse, giving the usual onion-style execution order.
#[derive(Clone, Default)]
pub struct MiddlewareLevel {
    /// Request-phase middleware, sorted by ascending priority.
    pub before: Vec<Arc<dyn Middleware>>,
    /// Response-phase middleware, sorted by ascending priority.
    pub after: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareLevel {
    /// Splits one level's declared middleware into phase buckets, each
    /// stable-sorted by ascending priority.
    pub fn from_declared(declared: &[Arc<dyn Middleware>]) -> Self {
        let mut before: Vec<Arc<dyn Middleware>> = Vec::new();
        let mut after: Vec<Arc<dyn Middleware>> = Vec::new();
        for mw in declared {
            match mw.attach_to() {
                Phase::Request => before.push(Arc::clone(mw)),
                Phase::Response => after.push(Arc::clone(mw)),
            }
        }
        before.sort_by_key(|mw| mw.priority());
        after.sort_by_key(|mw| mw.priority());
        Self { before, after }
    }

    /// Returns true when neither bucket holds any middleware.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

impl std::fmt::Debug for MiddlewareLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareLevel")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: &'static str,
        phase: Phase,
        priority: i32,
    }

    impl Middleware for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn attach_to(&self) -> Phase {
            self.phase
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn intercept<'a>(
            &'a self,
            _request: &'a mut Request,
            _response: Option<&'a Response>,
        ) -> BoxFuture<'a, MiddlewareResult> {
            Box::pin(async { MiddlewareResult::Continue })
        }
    }

    fn named(name: &'static str, phase: Phase, priority: i32) -> Arc<dyn Middleware> {
        Arc::new(Named {
            name,
            phase,
            priority,
        })
    }

    #[test]
    fn test_buckets_sorted_by_priority() {
        let level = MiddlewareLevel::from_declared(&[
            named("a", Phase::Request, 5),
            named("b", Phase::Request, 1),
            named("c", Phase::Response, 0),
        ]);
        let before: Vec<&str> = level.before.iter().map(|m| m.name()).collect();
        assert_eq!(before, ["b", "a"]);
        assert_eq!(level.after.len(), 1);
    }

    #[test]
    fn test_stable_sort_preserves_declaration_order() {
        let level = MiddlewareLevel::from_declared(&[
            named("first", Phase::Request, 0),
            named("second", Phase::Request, 0),
        ]);
        let before: Vec<&str> = level.before.iter().map(|m| m.name()).collect();
        assert_eq!(before, ["first", "second"]);
    }
}
