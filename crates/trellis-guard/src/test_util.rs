//! Shared handlers and fixtures for the crate's tests.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body_util::Full;
use trellis_core::{Context, Problem};

use crate::interceptor::{BoxFuture, Handler};
use crate::types::{Outcome, Request};

pub fn test_ctx() -> Context {
    Context::new(Method::GET, Uri::from_static("/t"), HeaderMap::new(), None)
}

pub fn request() -> Request {
    http::Request::builder()
        .uri("/t")
        .body(Bytes::new())
        .unwrap()
}

/// Always answers 200 with a fixed body.
#[derive(Default)]
pub struct OkHandler;

impl Handler for OkHandler {
    fn call<'a>(&'a self, _ctx: &'a mut Context, _request: Request) -> BoxFuture<'a, Outcome> {
        Box::pin(async {
            Ok(http::Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from_static(b"ok")))
                .unwrap())
        })
    }
}

/// Always fails with the configured problem.
pub struct FailHandler {
    problem: Problem,
}

impl FailHandler {
    pub fn new(problem: Problem) -> Self {
        Self { problem }
    }

    pub fn internal() -> Self {
        Self::new(Problem::internal("unreachable"))
    }

    pub fn bad_request() -> Self {
        Self::new(Problem::bad_request("client fault"))
    }
}

impl Handler for FailHandler {
    fn call<'a>(&'a self, _ctx: &'a mut Context, _request: Request) -> BoxFuture<'a, Outcome> {
        let problem = self.problem.clone();
        Box::pin(async move { Err(problem) })
    }
}

/// Panics when invoked.
pub struct PanicHandler;

impl Handler for PanicHandler {
    fn call<'a>(&'a self, _ctx: &'a mut Context, _request: Request) -> BoxFuture<'a, Outcome> {
        Box::pin(async { panic!("boom") })
    }
}
