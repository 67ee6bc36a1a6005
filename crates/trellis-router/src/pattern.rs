//! Path template compilation.
//!
//! A template is turned into an anchored, case-insensitive regex plus the
//! ordered list of parameter names it captures. Three equivalent parameter
//! syntaxes are accepted:
//!
//! - `/<cat_id>` or `/<int:cat_id>` (angle brackets)
//! - `/{cat_id}` or `/{int:cat_id}` (mustache)
//! - `/:cat_id` (colon, always untyped)
//!
//! A single `*` wildcard captures the remaining path into a `tail` parameter.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use trellis_http::PathParams;

use crate::error::{Result, RouteError};

/// Literal characters escaped before substitution; everything else in a
/// template is either path text or parameter syntax.
const ESCAPED_CHARS: [char; 5] = ['.', '[', ']', '(', ')'];

/// Returns the value pattern registered under the given type name.
fn value_pattern(name: &str) -> Option<&'static str> {
    match name {
        "string" | "str" => Some(r"[^/]+"),
        "path" => Some(r".*"),
        "int" => Some(r"\d+"),
        "float" => Some(r"\d+(?:\.\d+)?"),
        "uuid" => Some(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        ),
        _ => None,
    }
}

/// Builds the `/(?P<name>pattern)` fragment for one parameter.
///
/// A `type:name` parameter looks its pattern up in the registry; a bare name
/// falls back to the `string` pattern.
fn parameter_fragment(param: &str) -> Result<String> {
    if let Some((type_name, name)) = param.split_once(':') {
        let pattern =
            value_pattern(type_name).ok_or_else(|| RouteError::InvalidValuePatternName {
                name: type_name.to_string(),
                fragment: param.to_string(),
            })?;
        Ok(format!("/(?P<{name}>{pattern})"))
    } else {
        Ok(format!("/(?P<{param}>[^/]+)"))
    }
}

/// Replaces every `token_rx` match in `pattern` with its parameter fragment.
fn substitute_parameters(pattern: &str, token_rx: &Regex) -> Result<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut last = 0;
    for caps in token_rx.captures_iter(pattern) {
        let whole = caps.get(0).expect("group 0 is the whole match");
        out.push_str(&pattern[last..whole.start()]);
        out.push_str(&parameter_fragment(&caps[1])?);
        last = whole.end();
    }
    out.push_str(&pattern[last..]);
    Ok(out)
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// The original template string.
    template: String,
    /// Compiled matcher, anchored and case-insensitive.
    regex: Regex,
    /// Parameter names in the order they appear in the template.
    param_names: Vec<String>,
}

impl PathPattern {
    /// Compiles a path template into a matcher.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_router::PathPattern;
    ///
    /// let pattern = PathPattern::compile("/api/cats/<int:cat_id>").unwrap();
    /// let params = pattern.match_path("/api/cats/42").unwrap();
    /// assert_eq!(params.get("cat_id"), Some("42"));
    /// assert!(pattern.match_path("/api/cats/fluffy").is_none());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::MultipleWildcards`] for more than one `*`,
    /// [`RouteError::InvalidValuePatternName`] for an unknown type prefix,
    /// [`RouteError::DuplicateParameter`] when two parameters share a name,
    /// and [`RouteError::PatternSyntax`] if the final regex will not compile.
    pub fn compile(template: &str) -> Result<Self> {
        let angle_rx = Regex::new(r"/<([^>]+)>").expect("static token pattern");
        let mustache_rx = Regex::new(r"/\{([^}]+)\}").expect("static token pattern");
        let colon_rx = Regex::new(r"/:([^/]+)").expect("static token pattern");
        let named_group_rx = Regex::new(r"\?P<([^>]+)>").expect("static token pattern");

        let mut pattern = String::with_capacity(template.len());
        for c in template.chars() {
            if ESCAPED_CHARS.contains(&c) {
                pattern.push('\\');
            }
            pattern.push(c);
        }

        if pattern.contains('*') {
            if pattern.matches('*').count() > 1 {
                return Err(RouteError::MultipleWildcards(template.to_string()));
            }
            // After "/" the preceding slash becomes optional so both "/files"
            // and "/files/a/b" match "/files/*".
            if pattern.contains("/*") {
                pattern = pattern.replacen('*', "?(?P<tail>.*)", 1);
            } else {
                pattern = pattern.replacen('*', "(?P<tail>.*)", 1);
            }
        }

        if pattern.contains('<') {
            pattern = substitute_parameters(&pattern, &angle_rx)?;
        }
        if pattern.contains('{') {
            pattern = substitute_parameters(&pattern, &mustache_rx)?;
        }
        if pattern.contains("/:") {
            pattern = colon_rx
                .replace_all(&pattern, "/(?P<${1}>[^/]+)")
                .into_owned();
        }

        let mut param_names = Vec::new();
        for caps in named_group_rx.captures_iter(&pattern) {
            let name = caps[1].to_string();
            if param_names.contains(&name) {
                return Err(RouteError::DuplicateParameter(name));
            }
            param_names.push(name);
        }

        // Accept both "/foo" and "/foo/", except after a wildcard tail where
        // the tail already swallows any trailing slash.
        if pattern.len() > 1 && !pattern.ends_with("(?P<tail>.*)") {
            pattern.push_str("/?");
        }

        let regex = RegexBuilder::new(&format!("^{pattern}$"))
            .case_insensitive(true)
            .build()
            .map_err(|source| RouteError::PatternSyntax {
                template: template.to_string(),
                source,
            })?;

        Ok(Self {
            template: template.to_string(),
            regex,
            param_names,
        })
    }

    /// Matches a concrete request path against this pattern.
    ///
    /// Returns the captured parameters on a match, `None` otherwise; a
    /// non-matching path is normal control flow, not an error.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        let mut params = PathParams::new();
        for name in &self.param_names {
            if let Some(value) = caps.name(name) {
                params.insert(name.clone(), value.as_str());
            }
        }
        Some(params)
    }

    /// Substitutes parameter values back into the template, producing a
    /// concrete URL path for reverse lookup.
    ///
    /// Returns `None` if any parameter is missing from `params`.
    pub fn reverse(&self, params: &HashMap<String, String>) -> Option<String> {
        let token_rx =
            Regex::new(r"/<([^>]+)>|/\{([^}]+)\}|/:([^/]+)|\*").expect("static token pattern");
        let mut out = String::new();
        let mut last = 0;
        for caps in token_rx.captures_iter(&self.template) {
            let whole = caps.get(0).expect("group 0 is the whole match");
            out.push_str(&self.template[last..whole.start()]);
            let name = if let Some(rich) = caps.get(1).or_else(|| caps.get(2)) {
                let rich = rich.as_str();
                rich.split_once(':').map_or(rich, |(_, name)| name)
            } else if let Some(plain) = caps.get(3) {
                plain.as_str()
            } else {
                "tail"
            };
            if whole.as_str() != "*" {
                out.push('/');
            }
            out.push_str(params.get(name)?);
            last = whole.end();
        }
        out.push_str(&self.template[last..]);
        Some(out)
    }

    /// Returns the original template string.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the parameter names in template order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }
}
