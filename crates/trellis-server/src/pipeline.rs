//! Endpoint assembly.
//!
//! At mount time an endpoint's handler, compiled validator, and
//! interceptor stack are bound into a single invocable [`EndpointSpec`].
//! The inner handler binds the input record, validates it, invokes the
//! user handler, and serializes the output; the interceptor chain wraps it
//! in the fixed order recover → circuit-breaker → rate-limiter → CORS →
//! user interceptors; the outermost error-handler adapter is the single
//! writer of error responses.

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use http_body_util::Full;
use trellis_bind::{bind_non_body, DecrypterRegistry, Record, Validator};
use trellis_codec::CodecRegistry;
use trellis_core::{Context, Problem};
use trellis_guard::{BoxFuture, Handler, Interceptor, Next, Outcome, Request, Response};

/// Writes an error response for a problem. The default implementation maps
/// the problem's status (500 when unset) and serializes it through the
/// serializer negotiated for the request.
pub type ErrorHandler = Arc<dyn Fn(&Context, &Problem) -> Response + Send + Sync>;

/// The default error handler over a codec registry.
#[must_use]
pub fn default_error_handler(codecs: Arc<CodecRegistry>) -> ErrorHandler {
    Arc::new(move |ctx: &Context, problem: &Problem| {
        let serializer = codecs.serializer(ctx.accept());
        let body = match serializer.encode_error(problem) {
            Ok(body) => body,
            Err(err) => {
                // No retry: log and end the response with what we have.
                tracing::error!(error = %err, "failed to serialize error body");
                Vec::new()
            }
        };
        http::Response::builder()
            .status(problem.status_code())
            .header(CONTENT_TYPE, ctx.accept().as_str())
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| {
                let mut resp = http::Response::new(Full::new(Bytes::new()));
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                resp
            })
    })
}

/// The user handler: owned context plus the bound input record.
pub type UserHandler<I, O> =
    Arc<dyn Fn(Context, I) -> BoxFuture<'static, Result<O, Problem>> + Send + Sync>;

/// The inner handler at the end of every endpoint chain.
pub(crate) struct EndpointHandler<I: Record, O: Record> {
    pub(crate) name: String,
    pub(crate) debug: bool,
    pub(crate) validator: Validator<I>,
    pub(crate) user: UserHandler<I, O>,
    pub(crate) codecs: Arc<CodecRegistry>,
    pub(crate) decrypters: Arc<DecrypterRegistry>,
}

impl<I: Record, O: Record> Handler for EndpointHandler<I, O> {
    fn call<'a>(&'a self, ctx: &'a mut Context, request: Request) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let body = request.into_body();
            let mut input = I::default();
            bind_non_body(&mut input, ctx, &self.decrypters)?;
            let deserializer = self.codecs.deserializer(ctx.content_type());
            deserializer
                .decode(body, ctx.content_params(), &mut input)
                .await
                .map_err(Problem::from)?;
            self.validator.check(&input)?;

            if self.debug {
                tracing::debug!(
                    endpoint = %self.name,
                    input = %serde_json::to_string(&input).unwrap_or_default(),
                    "endpoint input"
                );
            }

            let output: O = (self.user)(ctx.clone(), input).await?;

            if O::EMPTY_OUTPUT {
                let mut response = http::Response::new(Full::new(Bytes::new()));
                *response.status_mut() = StatusCode::NO_CONTENT;
                return Ok(response);
            }

            if self.debug {
                tracing::debug!(
                    endpoint = %self.name,
                    output = %serde_json::to_string(&output).unwrap_or_default(),
                    "endpoint output"
                );
            }

            let serializer = self.codecs.serializer(ctx.accept());
            let body = serializer.encode(&output).map_err(Problem::from)?;
            let response = http::Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, ctx.accept().as_str())
                .body(Full::new(Bytes::from(body)))
                .map_err(|e| Problem::internal(e.to_string()))?;
            Ok(response)
        })
    }
}

/// A fully assembled endpoint: metadata plus the invocable chain.
pub struct EndpointSpec {
    /// The endpoint's name, unique per server.
    pub name: String,
    /// The routing pattern.
    pub pattern: String,
    /// The bound methods.
    pub methods: Vec<Method>,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) error_handler: ErrorHandler,
}

impl EndpointSpec {
    /// Runs the full chain for one request and writes the response,
    /// merging any headers interceptors accumulated on the context.
    pub async fn invoke(&self, mut ctx: Context, request: Request) -> Response {
        let chain = Next::chain(&self.interceptors, self.handler.as_ref());
        let outcome = chain.run(&mut ctx, request).await;
        let mut response = match outcome {
            Ok(response) => response,
            Err(problem) => (self.error_handler)(&ctx, &problem),
        };
        for (name, value) in ctx.response_headers() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}

impl std::fmt::Debug for EndpointSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointSpec")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
