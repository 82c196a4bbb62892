//! The per-request dispatcher.
//!
//! One dispatcher serves one logical server: it negotiates media types
//! into the request context, resolves the section tree, and runs the
//! matched endpoint's assembled chain. No match renders a 404 through the
//! negotiated serializer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use trellis_core::i18n::{self, MessageId};
use trellis_core::{Context, Problem};
use trellis_guard::Response;
use trellis_router::{classify, Router, RouterBuildError, ALLOWED_METHODS};

use crate::error::BuildError;
use crate::pipeline::{EndpointSpec, ErrorHandler};

/// Routes requests to assembled endpoints.
pub struct Dispatcher {
    router: Router<usize>,
    endpoints: Vec<Arc<EndpointSpec>>,
    error_handler: ErrorHandler,
}

impl Dispatcher {
    /// Builds the dispatcher from assembled endpoints.
    ///
    /// # Errors
    ///
    /// Collects every invalid pattern segment, disallowed method, and
    /// duplicate (pattern, method) pair across the endpoint set.
    pub(crate) fn new(
        specs: Vec<EndpointSpec>,
        error_handler: ErrorHandler,
    ) -> Result<Self, Vec<BuildError>> {
        let mut errors = Vec::new();

        // Per-endpoint validation first, so every broken endpoint is
        // reported with its own name.
        for spec in &specs {
            for method in &spec.methods {
                if !ALLOWED_METHODS.contains(method) {
                    errors.push(BuildError::Route {
                        endpoint: spec.name.clone(),
                        source: RouterBuildError::MethodNotAllowed {
                            method: method.clone(),
                        },
                    });
                }
            }
            if let Err(source) = validate_pattern(&spec.pattern) {
                errors.push(BuildError::Route {
                    endpoint: spec.name.clone(),
                    source,
                });
            }
        }

        let mut builder = Router::builder();
        let mut owners: HashMap<(Method, String), String> = HashMap::new();
        for (idx, spec) in specs.iter().enumerate() {
            for method in &spec.methods {
                owners.insert((method.clone(), spec.pattern.clone()), spec.name.clone());
                builder = builder.route(method.clone(), spec.pattern.clone(), idx);
            }
        }

        let router = match builder.build() {
            Ok(router) => Some(router),
            Err(source) => {
                let endpoint = match &source {
                    RouterBuildError::DuplicateRoute { pattern, method } => owners
                        .get(&(method.clone(), pattern.clone()))
                        .cloned()
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                errors.push(BuildError::Route { endpoint, source });
                None
            }
        };

        match (router, errors.is_empty()) {
            (Some(router), true) => Ok(Self {
                router,
                endpoints: specs.into_iter().map(Arc::new).collect(),
                error_handler,
            }),
            _ => Err(errors),
        }
    }

    /// Number of endpoints mounted.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Handles one request end to end.
    pub async fn dispatch(
        &self,
        request: http::Request<Bytes>,
        remote: Option<SocketAddr>,
    ) -> Response {
        let (parts, body) = request.into_parts();
        let mut ctx = Context::new(
            parts.method.clone(),
            parts.uri.clone(),
            parts.headers.clone(),
            remote,
        );

        let Some(resolved) = self.router.resolve(&parts.method, parts.uri.path()) else {
            tracing::debug!(
                method = %parts.method,
                path = parts.uri.path(),
                "no endpoint matched"
            );
            let problem = Problem::not_found(i18n::message(MessageId::ResourceNotFound, &[]));
            return (self.error_handler)(&ctx, &problem);
        };

        let spec = self.endpoints[*resolved.handler].clone();
        ctx.set_path_params(resolved.params);
        tracing::trace!(
            request_id = %ctx.request_id(),
            endpoint = %spec.name,
            "dispatching"
        );
        let request = http::Request::from_parts(parts, body);
        spec.invoke(ctx, request).await
    }
}

fn validate_pattern(pattern: &str) -> Result<(), RouterBuildError> {
    let trimmed = pattern.trim();
    if trimmed != "/" && !trimmed.starts_with('/') {
        return Err(RouterBuildError::InvalidPattern {
            pattern: pattern.to_string(),
        });
    }
    let mut folded = trimmed.to_string();
    while folded.contains("//") {
        folded = folded.replace("//", "/");
    }
    if folded != "/" {
        for segment in folded.trim_start_matches('/').split('/') {
            classify(segment)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_validation() {
        assert!(validate_pattern("/users/{id}").is_ok());
        assert!(validate_pattern("/").is_ok());
        assert!(validate_pattern("/files/*").is_ok());
        assert!(validate_pattern("users").is_err());
        assert!(validate_pattern("/bad segment").is_err());
        assert!(validate_pattern("/x/~[unclosed").is_err());
    }
}
