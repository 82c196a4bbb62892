//! The cleartext listener.
//!
//! Binds a TCP socket and serves each connection with hyper's automatic
//! HTTP/1.1 + HTTP/2 connection handling (h2c included), collecting each
//! request body before handing it to the dispatcher. On shutdown the
//! listener stops accepting and waits for in-flight connections up to the
//! server's shutdown timeout; stragglers are cut.
//!
//! TLS (and HTTP/3 over QUIC) plug in at this seam: the dispatcher only
//! needs a stream of requests, so any transport that produces them can
//! replace this module's accept loop.

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;

use crate::error::ServeError;
use crate::server::BoundServer;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Serves a bound server over cleartext until the signal fires, then
/// drains.
pub(crate) async fn serve_cleartext(
    server: BoundServer,
    shutdown: ShutdownSignal,
) -> Result<(), ServeError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], server.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!(server = %server.name, %addr, "listening");

    let tracker = ConnectionTracker::new();
    loop {
        tokio::select! {
            () = shutdown.recv() => break,
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed");
                        continue;
                    }
                };
                let token = tracker.acquire();
                let dispatcher = server.dispatcher.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |request: hyper::Request<hyper::body::Incoming>| {
                        let dispatcher = dispatcher.clone();
                        async move {
                            let (parts, body) = request.into_parts();
                            let body = match body.collect().await {
                                Ok(collected) => collected.to_bytes(),
                                Err(err) => {
                                    tracing::debug!(error = %err, "failed to read request body");
                                    Bytes::new()
                                }
                            };
                            let request = http::Request::from_parts(parts, body);
                            let response = dispatcher.dispatch(request, Some(remote)).await;
                            Ok::<_, Infallible>(response)
                        }
                    });
                    let result = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                    if let Err(err) = result {
                        tracing::debug!(error = %err, "connection error");
                    }
                    drop(token);
                });
            }
        }
    }

    // Stop accepting, then drain in-flight connections up to the timeout.
    drop(listener);
    tracing::info!(server = %server.name, active = tracker.active(), "draining");
    tokio::select! {
        () = tracker.wait_idle() => {
            tracing::info!(server = %server.name, "drained");
        }
        () = tokio::time::sleep(server.shutdown_timeout) => {
            tracing::warn!(
                server = %server.name,
                remaining = tracker.active(),
                "shutdown timeout elapsed; cutting remaining connections"
            );
        }
    }
    Ok(())
}
