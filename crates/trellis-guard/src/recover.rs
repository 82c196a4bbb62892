//! Panic recovery.
//!
//! The outermost interceptor: a panic anywhere in the chain or the handler
//! is caught and surfaced as a 500 problem for the error-handler adapter,
//! so no other interceptor needs panic safety.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use trellis_core::{Context, Problem};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::types::{Outcome, Request};

/// The recover interceptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverInterceptor;

impl RecoverInterceptor {
    /// Creates the interceptor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for RecoverInterceptor {
    fn name(&self) -> &'static str {
        "recover"
    }

    fn around<'a>(
        &'a self,
        ctx: &'a mut Context,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let detail = panic_message(&panic);
                    tracing::error!(panic = %detail, "handler panicked");
                    Err(Problem::internal("internal server error"))
                }
            }
        })
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
