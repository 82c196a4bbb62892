//! Client identifiers for per-client rate limiting.
//!
//! An identifier maps a request context to the string that keys the
//! per-client bucket cache. The registry is populated during application
//! build; `"IP"` is built in and is the default.

use std::collections::HashMap;
use std::sync::Arc;

use trellis_core::Context;

/// Maps a request to the client key used by per-client rate limiting.
pub type ClientIdentifier = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// The built-in IP identifier: `X-Forwarded-For` (first entry), then
/// `X-Real-IP`, then the peer address.
#[must_use]
pub fn ip_identifier() -> ClientIdentifier {
    Arc::new(|ctx: &Context| ctx.client_ip())
}

/// Per-application identifier table.
#[derive(Clone)]
pub struct IdentifierRegistry {
    map: HashMap<String, ClientIdentifier>,
}

impl Default for IdentifierRegistry {
    fn default() -> Self {
        let mut map = HashMap::new();
        map.insert("IP".to_string(), ip_identifier());
        Self { map }
    }
}

impl IdentifierRegistry {
    /// Creates a registry with the built-in `"IP"` identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identifier under a name. Build-time only.
    pub fn register(&mut self, name: impl Into<String>, identifier: ClientIdentifier) {
        self.map.insert(name.into(), identifier);
    }

    /// Resolves an identifier by name, falling back to `"IP"` for unknown
    /// or empty names.
    #[must_use]
    pub fn resolve(&self, name: &str) -> ClientIdentifier {
        self.map
            .get(name)
            .or_else(|| self.map.get("IP"))
            .cloned()
            .expect("IP identifier is always registered")
    }
}

impl std::fmt::Debug for IdentifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierRegistry")
            .field("names", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue, Method, Uri};

    #[test]
    fn ip_identifier_reads_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        let ctx = Context::new(Method::GET, Uri::from_static("/"), headers, None);
        assert_eq!(ip_identifier()(&ctx), "203.0.113.7");
    }

    #[test]
    fn unknown_name_falls_back_to_ip() {
        let registry = IdentifierRegistry::new();
        let ctx = Context::new(
            Method::GET,
            Uri::from_static("/"),
            HeaderMap::new(),
            Some("192.0.2.4:100".parse().unwrap()),
        );
        assert_eq!(registry.resolve("missing")(&ctx), "192.0.2.4");
    }

    #[test]
    fn custom_identifier_wins() {
        let mut registry = IdentifierRegistry::new();
        registry.register("API_KEY", Arc::new(|_ctx| "key-123".to_string()));
        let ctx = Context::new(Method::GET, Uri::from_static("/"), HeaderMap::new(), None);
        assert_eq!(registry.resolve("API_KEY")(&ctx), "key-123");
    }
}
