//! CORS interceptor.
//!
//! Sets response headers and never rejects. When the request's `Origin`
//! matches an allow-list entry it is echoed in
//! `Access-Control-Allow-Origin`; the configured methods, headers,
//! credentials and max-age headers are emitted whenever their fields are
//! set. Headers are accumulated on the context and merged into the final
//! response by the single response writer, so error responses carry them
//! too.

use http::header::HeaderName;
use http::HeaderValue;
use trellis_core::Context;

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::types::{Outcome, Request};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin`.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods`.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers`.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials`.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age`.
    pub const MAX_AGE: &str = "access-control-max-age";
}

/// CORS configuration.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Origin allow-list. Entries may carry a scheme and `*` wildcards;
    /// matching is equality, suffix, or scheme + host-suffix with the
    /// wildcards stripped.
    pub allow_origins: Vec<String>,
    /// Value for `Access-Control-Allow-Methods`, when non-empty.
    pub allow_methods: Vec<String>,
    /// Value for `Access-Control-Allow-Headers`, when non-empty.
    pub allow_headers: Vec<String>,
    /// Emits `Access-Control-Allow-Credentials: true` when set.
    pub allow_credentials: bool,
    /// Value for `Access-Control-Max-Age`, in seconds, when set.
    pub max_age: Option<u64>,
}

impl CorsConfig {
    /// Whether an origin matches the allow-list.
    #[must_use]
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allow_origins.iter().any(|entry| {
            let entry = entry.replace('*', "");
            if entry.is_empty() {
                return true;
            }
            if origin == entry || origin.ends_with(&entry) {
                return true;
            }
            // Scheme-qualified entries match scheme plus host suffix.
            if let (Some((entry_scheme, entry_host)), Some((origin_scheme, origin_host))) =
                (entry.split_once("://"), origin.split_once("://"))
            {
                return entry_scheme == origin_scheme && origin_host.ends_with(entry_host);
            }
            false
        })
    }
}

/// The CORS interceptor.
pub struct CorsInterceptor {
    config: CorsConfig,
}

impl CorsInterceptor {
    /// Wraps a configuration.
    #[must_use]
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn apply(&self, ctx: &mut Context, request: &Request) {
        let origin = request
            .headers()
            .get(http::header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(origin) = origin {
            if self.config.origin_allowed(&origin) {
                if let Ok(value) = HeaderValue::from_str(&origin) {
                    ctx.insert_response_header(
                        HeaderName::from_static(headers::ALLOW_ORIGIN),
                        value,
                    );
                }
            }
        }
        if !self.config.allow_methods.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.config.allow_methods.join(", ")) {
                ctx.insert_response_header(HeaderName::from_static(headers::ALLOW_METHODS), value);
            }
        }
        if !self.config.allow_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.config.allow_headers.join(", ")) {
                ctx.insert_response_header(HeaderName::from_static(headers::ALLOW_HEADERS), value);
            }
        }
        if self.config.allow_credentials {
            ctx.insert_response_header(
                HeaderName::from_static(headers::ALLOW_CREDENTIALS),
                HeaderValue::from_static("true"),
            );
        }
        if let Some(max_age) = self.config.max_age {
            if let Ok(value) = HeaderValue::from_str(&max_age.to_string()) {
                ctx.insert_response_header(HeaderName::from_static(headers::MAX_AGE), value);
            }
        }
    }
}

impl Interceptor for CorsInterceptor {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn around<'a>(
        &'a self,
        ctx: &'a mut Context,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            self.apply(ctx, &request);
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Method, Uri};

    fn config() -> CorsConfig {
        CorsConfig {
            allow_origins: vec![
                "https://app.example.com".to_string(),
                "*.trusted.io".to_string(),
                "https://*.corp.net".to_string(),
            ],
            allow_methods: vec!["GET".to_string(), "POST".to_string()],
            allow_headers: vec!["content-type".to_string()],
            allow_credentials: true,
            max_age: Some(3600),
        }
    }

    #[test]
    fn equality_match() {
        assert!(config().origin_allowed("https://app.example.com"));
        assert!(!config().origin_allowed("https://evil.example.com"));
    }

    #[test]
    fn suffix_match_with_wildcard_stripped() {
        assert!(config().origin_allowed("https://sub.trusted.io"));
        assert!(config().origin_allowed("http://deep.sub.trusted.io"));
        assert!(!config().origin_allowed("https://nottrusted.org"));
    }

    #[test]
    fn scheme_and_host_suffix_match() {
        assert!(config().origin_allowed("https://svc.corp.net"));
        assert!(!config().origin_allowed("http://svc.corp.net"));
    }

    #[tokio::test]
    async fn headers_accumulate_on_context() {
        use crate::test_util::OkHandler;

        let interceptor = CorsInterceptor::new(config());
        let mut ctx = Context::new(
            Method::GET,
            Uri::from_static("/x"),
            HeaderMap::new(),
            None,
        );
        let request = http::Request::builder()
            .uri("/x")
            .header(http::header::ORIGIN, "https://app.example.com")
            .body(Bytes::new())
            .unwrap();

        let handler = OkHandler::default();
        let chain = Next::chain(&[], &handler);
        interceptor.around(&mut ctx, request, chain).await.unwrap();

        let response_headers = ctx.response_headers();
        assert_eq!(
            response_headers.get(headers::ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
        assert_eq!(
            response_headers.get(headers::ALLOW_METHODS).unwrap(),
            "GET, POST"
        );
        assert_eq!(
            response_headers.get(headers::ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
        assert_eq!(response_headers.get(headers::MAX_AGE).unwrap(), "3600");
    }

    #[tokio::test]
    async fn disallowed_origin_still_passes_through() {
        use crate::test_util::OkHandler;

        let interceptor = CorsInterceptor::new(config());
        let mut ctx = Context::new(
            Method::GET,
            Uri::from_static("/x"),
            HeaderMap::new(),
            None,
        );
        let request = http::Request::builder()
            .uri("/x")
            .header(http::header::ORIGIN, "https://evil.example.org")
            .body(Bytes::new())
            .unwrap();

        let handler = OkHandler::default();
        let chain = Next::chain(&[], &handler);
        let outcome = interceptor.around(&mut ctx, request, chain).await;
        assert!(outcome.is_ok());
        assert!(ctx.response_headers().get(headers::ALLOW_ORIGIN).is_none());
        // Non-origin headers are still emitted.
        assert!(ctx.response_headers().get(headers::ALLOW_METHODS).is_some());
    }
}
