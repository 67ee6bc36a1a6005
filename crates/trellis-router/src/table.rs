//! Route registration and lookup.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use trellis_http::{Method, PathParams};

use crate::error::{Result, RouteError};
use crate::middleware::MiddlewareLevel;
use crate::pattern::PathPattern;
use crate::route::{Handler, Route, RouteEntry, RouteGroup};

/// A fully registered route: the flattened template, its compiled matcher,
/// the handler and the ordered middleware levels.
#[derive(Clone)]
pub struct RouteConfig {
    /// Route display name.
    pub name: String,
    /// Declared HTTP methods, kept for diagnostics.
    pub methods: Vec<Method>,
    /// Flattened path template (group prefixes applied).
    pub template: String,
    /// Compiled matcher for the flattened template.
    pub pattern: PathPattern,
    /// The handler to invoke on a match.
    pub handler: Handler,
    /// Middleware levels, outermost group first, the route's own level last.
    pub levels: Vec<MiddlewareLevel>,
}

impl std::fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteConfig")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("template", &self.template)
            .field("levels", &self.levels.len())
            .finish()
    }
}

/// The domain-keyed route table.
///
/// Built once from route declarations and then treated as immutable by the
/// dispatcher, so concurrent read-only lookups are safe. Buckets preserve
/// registration order: lookup is first-match-wins by declaration order, and
/// overlapping patterns resolve to whichever was registered first.
///
/// With an empty base domain the table runs in domainless mode: every route
/// registers under a single empty-string key and declared subdomains are
/// ignored (with a one-time warning).
pub struct RouteTable {
    base_domain: String,
    domains: HashMap<String, Vec<RouteConfig>>,
    named: HashMap<String, PathPattern>,
    max_depth: usize,
    warned_domainless: bool,
}

impl RouteTable {
    /// Creates a table for the given base domain; an empty string selects
    /// domainless mode.
    pub fn new(base_domain: impl Into<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
            domains: HashMap::new(),
            named: HashMap::new(),
            max_depth: 0,
            warned_domainless: false,
        }
    }

    /// Creates a table in domainless mode.
    pub fn domainless() -> Self {
        Self::new("")
    }

    /// Registers a batch of routes and groups.
    ///
    /// The batch is staged and validated as a whole before anything is
    /// committed: a failure leaves the table exactly as it was, never
    /// partially updated.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`]: invalid prefix or subdomain, pattern compilation
    /// failures, an empty method set, or a duplicate flattened template under
    /// one domain key.
    pub fn add_routes(&mut self, entries: Vec<RouteEntry>) -> Result<()> {
        let mut staged = Vec::new();
        let mut depth = 0;
        for entry in entries {
            self.stage_entry(entry, "", "", &[], 0, &mut staged, &mut depth)?;
        }

        let mut seen: HashSet<(String, String)> = HashSet::new();
        for (domain, config) in &staged {
            let in_table = self
                .domains
                .get(domain)
                .is_some_and(|bucket| bucket.iter().any(|c| c.template == config.template));
            if in_table || !seen.insert((domain.clone(), config.template.clone())) {
                return Err(RouteError::DuplicateRoute {
                    domain: domain.clone(),
                    path: config.template.clone(),
                });
            }
        }

        for (domain, config) in staged {
            debug!(domain = %domain, template = %config.template, "registered route");
            if !config.name.is_empty() {
                self.named
                    .insert(config.name.clone(), config.pattern.clone());
            }
            self.domains.entry(domain).or_default().push(config);
        }
        self.max_depth = self.max_depth.max(depth);
        Ok(())
    }

    fn stage_entry(
        &mut self,
        entry: RouteEntry,
        prefix: &str,
        subdomain: &str,
        levels: &[MiddlewareLevel],
        depth: usize,
        staged: &mut Vec<(String, RouteConfig)>,
        max_depth: &mut usize,
    ) -> Result<()> {
        *max_depth = (*max_depth).max(depth);
        match entry {
            RouteEntry::Route(route) => {
                self.stage_route(route, prefix, subdomain, levels, staged)
            }
            RouteEntry::Group(group) => {
                self.stage_group(group, prefix, subdomain, levels, depth, staged, max_depth)
            }
        }
    }

    fn stage_route(
        &mut self,
        route: Route,
        prefix: &str,
        subdomain: &str,
        levels: &[MiddlewareLevel],
        staged: &mut Vec<(String, RouteConfig)>,
    ) -> Result<()> {
        if route.methods.is_empty() {
            return Err(RouteError::EmptyMethods(route.path));
        }
        let template = format!("{prefix}{}", route.path);
        validate_prefix(&template)?;
        let pattern = PathPattern::compile(&template)?;

        let mut route_levels = levels.to_vec();
        route_levels.push(MiddlewareLevel::from_declared(&route.middlewares));

        let domain = self.domain_key(subdomain);
        staged.push((
            domain,
            RouteConfig {
                name: route.name,
                methods: route.methods,
                template,
                pattern,
                handler: route.handler,
                levels: route_levels,
            },
        ));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn stage_group(
        &mut self,
        group: RouteGroup,
        prefix: &str,
        subdomain: &str,
        levels: &[MiddlewareLevel],
        depth: usize,
        staged: &mut Vec<(String, RouteConfig)>,
        max_depth: &mut usize,
    ) -> Result<()> {
        if !group.prefix.is_empty() {
            validate_prefix(&group.prefix)?;
        }
        if !group.subdomain.is_empty() {
            validate_subdomain(&group.subdomain)?;
        }

        let prefix = format!("{prefix}{}", group.prefix);
        if !prefix.is_empty() {
            validate_prefix(&prefix)?;
        }

        // Inner labels sit left of outer labels, next to the base domain on
        // the right: group "a" containing group "b" yields "b.a".
        let subdomain = if group.subdomain.is_empty() {
            subdomain.to_string()
        } else if subdomain.is_empty() {
            group.subdomain.clone()
        } else {
            format!("{}.{subdomain}", group.subdomain)
        };

        let mut group_levels = levels.to_vec();
        group_levels.push(MiddlewareLevel::from_declared(&group.middlewares));

        for child in group.children {
            self.stage_entry(
                child,
                &prefix,
                &subdomain,
                &group_levels,
                depth + 1,
                staged,
                max_depth,
            )?;
        }
        Ok(())
    }

    fn domain_key(&mut self, subdomain: &str) -> String {
        if self.base_domain.is_empty() {
            if !subdomain.is_empty() && !self.warned_domainless {
                warn!(
                    subdomain,
                    "no base domain configured; declared subdomains are ignored"
                );
                self.warned_domainless = true;
            }
            return String::new();
        }
        if subdomain.is_empty() {
            self.base_domain.clone()
        } else {
            format!("{subdomain}.{}", self.base_domain)
        }
    }

    /// Finds the first route in the domain's bucket whose pattern accepts
    /// the path, scanning in registration order.
    pub fn lookup(&self, domain: &str, path: &str) -> Option<(&RouteConfig, PathParams)> {
        let bucket = self.domains.get(domain)?;
        bucket
            .iter()
            .find_map(|config| config.pattern.match_path(path).map(|params| (config, params)))
    }

    /// Generates a URL for a named route.
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> Option<String> {
        self.named.get(name).and_then(|p| p.reverse(params))
    }

    /// Returns the configured base domain (empty in domainless mode).
    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Total number of registered routes across all domains.
    pub fn route_count(&self) -> usize {
        self.domains.values().map(Vec::len).sum()
    }

    /// Number of distinct domain keys with at least one route.
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// Returns true when no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Deepest group nesting observed so far, for diagnostics; nesting depth
    /// is not bounded.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("base_domain", &self.base_domain)
            .field("routes", &self.route_count())
            .field("domains", &self.domain_count())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if !prefix.starts_with('/') || prefix.contains("//") {
        return Err(RouteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

fn validate_subdomain(subdomain: &str) -> Result<()> {
    let valid = !subdomain.is_empty()
        && subdomain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(RouteError::InvalidSubdomain(subdomain.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_http::{HttpError, Request, Response};

    async fn ok_handler(_req: Request) -> Result<Response, HttpError> {
        Ok(Response::ok())
    }

    #[test]
    fn test_single_route_under_base_domain() {
        let mut table = RouteTable::new("example.com");
        table
            .add_routes(vec![Route::get("/", ok_handler).into()])
            .unwrap();
        assert!(table.lookup("example.com", "/").is_some());
        assert!(table.lookup("api.example.com", "/").is_none());
    }

    #[test]
    fn test_group_prefix_and_subdomain() {
        let mut table = RouteTable::new("example.com");
        let group = RouteGroup::new("api")
            .subdomain("api")
            .prefix("/v1")
            .route(Route::get("/cats/<int:cat_id>", ok_handler));
        table.add_routes(vec![group.into()]).unwrap();

        let (config, params) = table.lookup("api.example.com", "/v1/cats/7").unwrap();
        assert_eq!(config.template, "/v1/cats/<int:cat_id>");
        assert_eq!(params.get("cat_id"), Some("7"));
    }

    #[test]
    fn test_nested_subdomains_accumulate_inner_left() {
        let mut table = RouteTable::new("example.com");
        let inner = RouteGroup::new("inner")
            .subdomain("b")
            .route(Route::get("/x", ok_handler));
        let outer = RouteGroup::new("outer").subdomain("a").group(inner);
        table.add_routes(vec![outer.into()]).unwrap();

        assert!(table.lookup("b.a.example.com", "/x").is_some());
        assert_eq!(table.max_depth(), 2);
    }

    #[test]
    fn test_duplicate_route_is_a_hard_error() {
        let mut table = RouteTable::new("example.com");
        table
            .add_routes(vec![Route::get("/ping", ok_handler).into()])
            .unwrap();
        let err = table
            .add_routes(vec![Route::post("/ping", ok_handler).into()])
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { .. }));
        // The failed batch left the table untouched.
        assert_eq!(table.route_count(), 1);
    }

    #[test]
    fn test_failed_batch_commits_nothing() {
        let mut table = RouteTable::new("example.com");
        let err = table.add_routes(vec![
            Route::get("/ok", ok_handler).into(),
            Route::get("/bad/*/*", ok_handler).into(),
        ]);
        assert!(err.is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let mut table = RouteTable::new("example.com");
        let group = RouteGroup::new("bad")
            .prefix("api")
            .route(Route::get("/", ok_handler));
        assert!(matches!(
            table.add_routes(vec![group.into()]),
            Err(RouteError::InvalidPrefix(_))
        ));

        let doubled = RouteGroup::new("worse")
            .prefix("/api//v1")
            .route(Route::get("/", ok_handler));
        assert!(matches!(
            table.add_routes(vec![doubled.into()]),
            Err(RouteError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_invalid_subdomain_rejected() {
        let mut table = RouteTable::new("example.com");
        let group = RouteGroup::new("bad")
            .subdomain("api_internal")
            .route(Route::get("/", ok_handler));
        assert!(matches!(
            table.add_routes(vec![group.into()]),
            Err(RouteError::InvalidSubdomain(_))
        ));
    }

    #[test]
    fn test_domainless_mode_collapses_subdomains() {
        let mut table = RouteTable::domainless();
        let group = RouteGroup::new("api")
            .subdomain("api")
            .route(Route::get("/ping", ok_handler));
        table.add_routes(vec![group.into()]).unwrap();
        assert!(table.lookup("", "/ping").is_some());
        assert_eq!(table.domain_count(), 1);
    }

    #[test]
    fn test_first_match_wins_by_registration_order() {
        let mut table = RouteTable::domainless();
        table
            .add_routes(vec![
                Route::get("/users/{name}", ok_handler).name("by_name").into(),
                Route::get("/users/{int:id}", ok_handler).name("by_id").into(),
            ])
            .unwrap();
        // "/users/7" matches both patterns; declaration order decides.
        let (config, _) = table.lookup("", "/users/7").unwrap();
        assert_eq!(config.name, "by_name");
    }

    #[test]
    fn test_empty_methods_rejected() {
        let mut table = RouteTable::domainless();
        let route = Route::new(Vec::new(), "/x", ok_handler);
        assert!(matches!(
            table.add_routes(vec![route.into()]),
            Err(RouteError::EmptyMethods(_))
        ));
    }

    #[test]
    fn test_url_for_named_route() {
        let mut table = RouteTable::domainless();
        table
            .add_routes(vec![Route::get("/users/{int:id}", ok_handler)
                .name("user_detail")
                .into()])
            .unwrap();
        let params: HashMap<String, String> =
            [("id".to_string(), "42".to_string())].into_iter().collect();
        assert_eq!(
            table.url_for("user_detail", &params),
            Some("/users/42".to_string())
        );
        assert_eq!(table.url_for("missing", &params), None);
    }
}
