//! Error types for route registration.

use thiserror::Error;

/// Errors raised while compiling patterns or registering routes.
///
/// All of these are registration-time failures: they surface at application
/// assembly, never during request dispatch.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A group prefix does not start with `/` or contains `//`.
    #[error("invalid route prefix {0:?}: must start with '/' and contain no '//'")]
    InvalidPrefix(String),

    /// A subdomain label contains characters outside `[a-zA-Z0-9.-]`.
    #[error("invalid subdomain {0:?}: only alphanumeric characters, dots and hyphens are allowed")]
    InvalidSubdomain(String),

    /// Two routes resolved to the same path template under one domain.
    #[error("duplicate route {path:?} for domain {domain:?}")]
    DuplicateRoute {
        /// The domain key the conflict occurred under.
        domain: String,
        /// The conflicting path template.
        path: String,
    },

    /// A template captures the same parameter name twice.
    #[error("cannot have multiple parameters with name: {0}")]
    DuplicateParameter(String),

    /// A typed parameter references an unknown value pattern.
    #[error("invalid value pattern name: {name} in {fragment}")]
    InvalidValuePatternName {
        /// The unrecognized type prefix.
        name: String,
        /// The parameter fragment it appeared in.
        fragment: String,
    },

    /// A template contains more than one `*` wildcard.
    #[error("a route pattern cannot contain more than one star sign: {0:?}")]
    MultipleWildcards(String),

    /// A route declares no HTTP methods.
    #[error("route {0:?} has an empty method set")]
    EmptyMethods(String),

    /// The substituted pattern failed to compile as a regex.
    #[error("failed to compile pattern for {template:?}")]
    PatternSyntax {
        /// The offending template.
        template: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },
}

/// Result type alias for routing operations.
pub type Result<T, E = RouteError> = std::result::Result<T, E>;
