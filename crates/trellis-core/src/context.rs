//! Per-request context.
//!
//! A [`Context`] is built by the dispatcher for every request and carries
//! the negotiated media types, captured path parameters, and a typed
//! extension map through the interceptor chain and into the handler.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http::header::HeaderName;
use http::{HeaderMap, HeaderValue, Method, Uri};
use uuid::Uuid;

use crate::media::{ContentTypeParams, MediaType};
use crate::params::PathParams;

/// A unique, time-ordered identifier for a request (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed extension storage.
///
/// Values are keyed by type, so distinct extensions cannot collide. Values
/// are stored behind `Arc` so the map stays cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Creates an empty extension map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Returns a reference to the value of type `T`, if present.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Removes and returns the value of type `T`, if present.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
    }
}

/// Per-request state.
///
/// Handlers receive an owned clone, so anything placed in [`Extensions`]
/// must be shareable; the built-in fields are all cheap to clone.
#[derive(Debug, Clone)]
pub struct Context {
    request_id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    path_params: PathParams,
    accept: MediaType,
    content_type: MediaType,
    content_params: ContentTypeParams,
    started_at: Instant,
    deadline: Option<Instant>,
    response_headers: HeaderMap,
    extensions: Extensions,
}

impl Context {
    /// Creates a context for a request. Negotiated media types are derived
    /// from the `Accept` and `Content-Type` headers.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, remote_addr: Option<SocketAddr>) -> Self {
        let accept = MediaType::from_accept(
            headers
                .get(http::header::ACCEPT)
                .and_then(|v| v.to_str().ok()),
        );
        let (content_type, content_params) = MediaType::from_content_type(
            headers
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        Self {
            request_id: RequestId::new(),
            method,
            uri,
            headers,
            remote_addr,
            path_params: PathParams::new(),
            accept,
            content_type,
            content_params,
            started_at: Instant::now(),
            deadline: None,
            response_headers: HeaderMap::new(),
            extensions: Extensions::new(),
        }
    }

    /// The request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The peer socket address, when known.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Captured path parameters.
    #[must_use]
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Replaces the captured path parameters. Called by the dispatcher after
    /// route resolution.
    pub fn set_path_params(&mut self, params: PathParams) {
        self.path_params = params;
    }

    /// The negotiated response media type.
    #[must_use]
    pub fn accept(&self) -> MediaType {
        self.accept
    }

    /// The request body media type.
    #[must_use]
    pub fn content_type(&self) -> MediaType {
        self.content_type
    }

    /// Parameters from the `Content-Type` header (e.g. multipart boundary).
    #[must_use]
    pub fn content_params(&self) -> &ContentTypeParams {
        &self.content_params
    }

    /// When request processing started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// The deadline handlers are expected to honor, if one was set.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets the request deadline.
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Headers accumulated by interceptors (e.g. CORS) to be merged into the
    /// final response by the single response writer.
    #[must_use]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Adds a header to be merged into the final response.
    pub fn insert_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    /// The typed extension map.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// The typed extension map, mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Best-effort client IP: `X-Forwarded-For` (first entry), then
    /// `X-Real-IP`, then the peer address.
    #[must_use]
    pub fn client_ip(&self) -> String {
        if let Some(xff) = self.headers.get("x-forwarded-for") {
            if let Ok(value) = xff.to_str() {
                if let Some(first) = value.split(',').next() {
                    let first = first.trim();
                    if !first.is_empty() {
                        return first.to_string();
                    }
                }
            }
        }
        if let Some(real_ip) = self.headers.get("x-real-ip") {
            if let Ok(value) = real_ip.to_str() {
                if !value.is_empty() {
                    return value.to_string();
                }
            }
        }
        self.remote_addr
            .map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_headers(headers: HeaderMap) -> Context {
        Context::new(
            Method::GET,
            Uri::from_static("/test"),
            headers,
            Some("10.1.2.3:5000".parse().unwrap()),
        )
    }

    #[test]
    fn negotiates_media_types_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("text/html"));
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=abc"),
        );
        let ctx = ctx_with_headers(headers);
        assert_eq!(ctx.accept(), MediaType::Html);
        assert_eq!(ctx.content_type(), MediaType::MultipartForm);
        assert_eq!(ctx.content_params().get("boundary").map(String::as_str), Some("abc"));
    }

    #[test]
    fn defaults_to_json_without_headers() {
        let ctx = ctx_with_headers(HeaderMap::new());
        assert_eq!(ctx.accept(), MediaType::Json);
        assert_eq!(ctx.content_type(), MediaType::Json);
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let ctx = ctx_with_headers(headers);
        assert_eq!(ctx.client_ip(), "203.0.113.9");
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let ctx = ctx_with_headers(HeaderMap::new());
        assert_eq!(ctx.client_ip(), "10.1.2.3");
    }

    #[test]
    fn extensions_are_typed() {
        #[derive(Debug, PartialEq)]
        struct Marker(u32);
        #[derive(Debug, PartialEq)]
        struct Other(u32);

        let mut ctx = ctx_with_headers(HeaderMap::new());
        ctx.extensions_mut().insert(Marker(7));
        ctx.extensions_mut().insert(Other(9));
        assert_eq!(ctx.extensions().get::<Marker>(), Some(&Marker(7)));
        assert_eq!(ctx.extensions().get::<Other>(), Some(&Other(9)));

        let cloned = ctx.clone();
        assert_eq!(cloned.extensions().get::<Marker>(), Some(&Marker(7)));
    }

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }
}
