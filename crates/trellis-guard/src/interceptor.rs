//! The interceptor trait and chain.
//!
//! An interceptor transforms a handler into a handler. Interceptors compose
//! inside-out: the first in the list is outermost. The built-in order,
//! outermost first, is recover, circuit-breaker, rate-limiter, CORS, then
//! user-declared interceptors; the breaker must sit outside the limiter so
//! 429 rejections never pollute its statistics.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use trellis_core::Context;

use crate::types::{Outcome, Request};

/// A boxed future, as returned by interceptors and handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The innermost unit of work a chain terminates in.
pub trait Handler: Send + Sync + 'static {
    /// Handles the request.
    fn call<'a>(&'a self, ctx: &'a mut Context, request: Request) -> BoxFuture<'a, Outcome>;
}

/// A handler-to-handler transform.
pub trait Interceptor: Send + Sync + 'static {
    /// The interceptor's name, for logs.
    fn name(&self) -> &'static str;

    /// Wraps the downstream chain. Implementations either call
    /// `next.run(ctx, request)` exactly once or short-circuit with their
    /// own outcome.
    fn around<'a>(
        &'a self,
        ctx: &'a mut Context,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome>;
}

/// The remaining chain after the current interceptor.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        interceptor: &'a dyn Interceptor,
        next: Box<Next<'a>>,
    },
    Terminal(&'a dyn Handler),
}

impl<'a> Next<'a> {
    /// Builds a chain over the given interceptors, terminating in
    /// `handler`. The first interceptor in the slice is outermost.
    pub fn chain(interceptors: &'a [Arc<dyn Interceptor>], handler: &'a dyn Handler) -> Self {
        let mut next = Next {
            inner: NextInner::Terminal(handler),
        };
        for interceptor in interceptors.iter().rev() {
            next = Next {
                inner: NextInner::Chain {
                    interceptor: interceptor.as_ref(),
                    next: Box::new(next),
                },
            };
        }
        next
    }

    /// Runs the rest of the chain. Consumes `self`, so it can only be
    /// invoked once.
    pub async fn run(self, ctx: &mut Context, request: Request) -> Outcome {
        match self.inner {
            NextInner::Chain { interceptor, next } => {
                interceptor.around(ctx, request, *next).await
            }
            NextInner::Terminal(handler) => handler.call(ctx, request).await,
        }
    }
}
