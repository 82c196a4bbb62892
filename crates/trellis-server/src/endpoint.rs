//! Typed endpoint declarations.
//!
//! An [`Endpoint`] pairs a routing pattern and method set with a typed
//! async handler: input and output are both [`Record`]s. Endpoints are
//! declared by the application, mounted onto a named server, and frozen at
//! mount time.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use http::Method;
use trellis_bind::{compile, CustomValidators, DecrypterRegistry, Record};
use trellis_codec::CodecRegistry;
use trellis_config::{BreakerSettings, LimiterSettings};
use trellis_core::{Context, Problem};
use trellis_guard::{
    BreakerConfig, BreakerInterceptor, CircuitBreaker, CorsConfig, CorsInterceptor,
    IdentifierRegistry, Interceptor, LimiterConfig, RateLimitInterceptor, RateLimiter,
    RecoverInterceptor,
};

use crate::error::BuildError;
use crate::pipeline::{EndpointHandler, EndpointSpec, ErrorHandler, UserHandler};

/// Everything endpoint assembly needs from the application: the frozen
/// registries and the per-endpoint traffic-control settings.
pub struct MountResources {
    /// The codec registry.
    pub codecs: Arc<CodecRegistry>,
    /// The decrypter registry.
    pub decrypters: Arc<DecrypterRegistry>,
    /// The client-identifier registry.
    pub identifiers: Arc<IdentifierRegistry>,
    /// Application-registered validators.
    pub validators: Arc<CustomValidators>,
    /// Per-endpoint breaker settings, keyed by endpoint name.
    pub breakers: HashMap<String, BreakerSettings>,
    /// Per-endpoint limiter settings, keyed by endpoint name.
    pub limiters: HashMap<String, LimiterSettings>,
    /// CORS configuration, when enabled.
    pub cors: Option<CorsConfig>,
    /// The server-level error handler.
    pub error_handler: ErrorHandler,
}

/// A typed endpoint declaration.
pub struct Endpoint<I: Record, O: Record> {
    name: String,
    pattern: String,
    methods: Vec<Method>,
    handler: UserHandler<I, O>,
    error_handler: Option<ErrorHandler>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<I: Record, O: Record> Endpoint<I, O> {
    /// Declares an endpoint.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let ep = Endpoint::new(
    ///     "getUser",
    ///     "/users/{id}",
    ///     [Method::GET],
    ///     |_ctx, input: GetUserInput| async move {
    ///         Ok(User { id: input.id, name: "ada".into() })
    ///     },
    /// );
    /// ```
    pub fn new<F, Fut>(
        name: impl Into<String>,
        pattern: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        handler: F,
    ) -> Self
    where
        F: Fn(Context, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, Problem>> + Send + 'static,
    {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            methods: methods.into_iter().collect(),
            handler: Arc::new(move |ctx, input| Box::pin(handler(ctx, input))),
            error_handler: None,
            interceptors: Vec::new(),
        }
    }

    /// Overrides the error handler for this endpoint.
    #[must_use]
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Appends a user interceptor. User interceptors run inside the
    /// built-in stack, in declaration order.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// The endpoint's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assembles the endpoint against the application's resources.
    pub(crate) fn mount(self, resources: &MountResources, debug: bool) -> Result<EndpointSpec, BuildError> {
        if self.name.is_empty() {
            return Err(BuildError::UnnamedEndpoint {
                pattern: self.pattern,
            });
        }
        if self.methods.is_empty() {
            return Err(BuildError::NoMethods {
                endpoint: self.name,
            });
        }

        let validator = compile::<I>(&resources.validators).map_err(|source| {
            BuildError::Validator {
                endpoint: self.name.clone(),
                source,
            }
        })?;

        let breaker = Arc::new(CircuitBreaker::new(
            self.name.clone(),
            breaker_config(resources.breakers.get(&self.name)),
        ));
        let limiter_config = limiter_config(resources.limiters.get(&self.name));
        let identify = resources.identifiers.resolve(
            resources
                .limiters
                .get(&self.name)
                .map(|s| s.client_identifier_type.as_str())
                .unwrap_or(""),
        );
        let limiter = Arc::new(RateLimiter::new(&limiter_config, identify));

        let mut interceptors: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(RecoverInterceptor::new()),
            Arc::new(BreakerInterceptor::new(breaker)),
            Arc::new(RateLimitInterceptor::new(limiter)),
        ];
        if let Some(cors) = &resources.cors {
            interceptors.push(Arc::new(CorsInterceptor::new(cors.clone())));
        }
        interceptors.extend(self.interceptors);

        let handler = EndpointHandler {
            name: self.name.clone(),
            debug,
            validator,
            user: self.handler,
            codecs: resources.codecs.clone(),
            decrypters: resources.decrypters.clone(),
        };

        Ok(EndpointSpec {
            name: self.name,
            pattern: self.pattern,
            methods: self.methods,
            interceptors,
            handler: Arc::new(handler),
            error_handler: self
                .error_handler
                .unwrap_or_else(|| resources.error_handler.clone()),
        })
    }
}

/// A type-erased endpoint awaiting mount.
pub(crate) struct MountableEndpoint {
    pub(crate) name: String,
    mount: Box<dyn FnOnce(&MountResources, bool) -> Result<EndpointSpec, BuildError> + Send>,
}

impl MountableEndpoint {
    pub(crate) fn new<I: Record, O: Record>(endpoint: Endpoint<I, O>) -> Self {
        Self {
            name: endpoint.name.clone(),
            mount: Box::new(move |resources, debug| endpoint.mount(resources, debug)),
        }
    }

    pub(crate) fn mount(
        self,
        resources: &MountResources,
        debug: bool,
    ) -> Result<EndpointSpec, BuildError> {
        (self.mount)(resources, debug)
    }
}

fn breaker_config(settings: Option<&BreakerSettings>) -> BreakerConfig {
    match settings {
        None => BreakerConfig::default(),
        Some(s) => BreakerConfig {
            max_requests: s.max_requests,
            interval: std::time::Duration::from_millis(s.interval_ms),
            timeout: std::time::Duration::from_millis(s.timeout_ms),
            max_consecutive_failures: s.max_consecutive_failures,
            max_failure_ratio: s.failure_ratio,
        },
    }
}

fn limiter_config(settings: Option<&LimiterSettings>) -> LimiterConfig {
    match settings {
        None => LimiterConfig::default(),
        Some(s) => LimiterConfig {
            token_rate: s.token_rate,
            token_bucket_size: s.token_bucket_size,
            client_token_rate: s.client_token_rate,
            client_token_bucket_size: s.client_token_bucket_size,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_config_defaults_when_unconfigured() {
        let config = breaker_config(None);
        assert_eq!(config.max_requests, 5);
        assert_eq!(config.max_consecutive_failures, 10);
        assert!((config.max_failure_ratio - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn breaker_config_maps_milliseconds() {
        let settings = BreakerSettings {
            max_requests: 2,
            interval_ms: 1000,
            timeout_ms: 50,
            max_consecutive_failures: 1,
            failure_ratio: 1.0,
        };
        let config = breaker_config(Some(&settings));
        assert_eq!(config.timeout, std::time::Duration::from_millis(50));
        assert_eq!(config.interval, std::time::Duration::from_secs(1));
    }

    #[test]
    fn limiter_config_defaults_to_500() {
        let config = limiter_config(None);
        assert!((config.token_rate - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.token_bucket_size, 500);
        assert!(config.client_token_rate.is_none());
    }
}
