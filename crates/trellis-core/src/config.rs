//! Application configuration.

/// Static application settings.
///
/// Construction is explicit; nothing is read from the environment. An empty
/// `domain` puts the router in domainless mode, where every route is served
/// regardless of the request's Host header.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Display name, used in logs.
    pub name: String,
    /// Debug mode: host mismatches fall back to the domainless bucket
    /// instead of being rejected with 403.
    pub debug: bool,
    /// Base domain for subdomain dispatch; empty for domainless mode.
    pub domain: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "trellis".to_string(),
            debug: false,
            domain: String::new(),
        }
    }
}

impl AppConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables debug mode.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the base domain.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::new();
        assert_eq!(config.name, "trellis");
        assert!(!config.debug);
        assert!(config.domain.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = AppConfig::new().name("api").debug(true).domain("example.com");
        assert_eq!(config.name, "api");
        assert!(config.debug);
        assert_eq!(config.domain, "example.com");
    }
}
