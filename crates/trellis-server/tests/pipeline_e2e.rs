//! End-to-end tests: dispatcher, chain, and listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use trellis_bind::NoContent;
use trellis_config::{BreakerSettings, CorsSettings, LimiterSettings, TrellisConfig};
use trellis_core::Problem;
use trellis_macros::Record;
use trellis_server::{App, BuiltApp, Endpoint, Server, ShutdownSignal};

#[derive(Debug, Default, Serialize, Deserialize, Record)]
struct GetUserInput {
    #[record(path = "id")]
    id: i64,
}

#[derive(Debug, Default, Serialize, Deserialize, Record)]
struct User {
    id: i64,
    name: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Record)]
struct LoginInput {
    #[record(validate = "required;email")]
    email: String,
    #[record(validate = "required")]
    pw: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Record)]
struct Empty {}

fn request(method: Method, uri: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

fn request_with(
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> http::Request<Bytes> {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Bytes::from(body.to_string())).unwrap()
}

async fn body_text(response: http::Response<http_body_util::Full<Bytes>>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn user_app() -> BuiltApp {
    App::new("test")
        .server(Server::new("api").port(8080))
        .mount(
            Endpoint::new(
                "getUser",
                "/users/{id}",
                [Method::GET],
                |_ctx, input: GetUserInput| async move {
                    Ok(User {
                        id: input.id,
                        name: "ada".into(),
                    })
                },
            ),
            "api",
        )
        .mount(
            Endpoint::new(
                "login",
                "/login",
                [Method::POST],
                |_ctx, _input: LoginInput| async move {
                    Ok(User {
                        id: 1,
                        name: "ok".into(),
                    })
                },
            ),
            "api",
        )
        .build()
        .expect("app builds")
}

#[tokio::test]
async fn typed_get_binds_path_param_and_serializes_json() {
    let app = user_app();
    let dispatcher = &app.server("api").unwrap().dispatcher;

    let response = dispatcher
        .dispatch(request(Method::GET, "/users/42"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let body = body_text(response).await;
    let user: User = serde_json::from_str(&body).unwrap();
    assert_eq!(user.id, 42);
    assert_eq!(user.name, "ada");
}

#[tokio::test]
async fn validation_failure_is_400_naming_the_field() {
    let app = user_app();
    let dispatcher = &app.server("api").unwrap().dispatcher;

    let response = dispatcher
        .dispatch(
            request_with(
                Method::POST,
                "/login",
                &[("content-type", "application/json")],
                r#"{"email":"a@b.co","pw":""}"#,
            ),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response).await;
    let problem: Problem = serde_json::from_str(&body).unwrap();
    assert_eq!(problem.code, "INVALID_PW");
}

#[tokio::test]
async fn non_numeric_path_param_is_400() {
    let app = user_app();
    let dispatcher = &app.server("api").unwrap().dispatcher;

    let response = dispatcher
        .dispatch(request(Method::GET, "/users/abc"), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response).await;
    assert!(body.contains("INVALID_ID"));
}

#[tokio::test]
async fn unknown_path_and_unmatched_method_are_404() {
    let app = user_app();
    let dispatcher = &app.server("api").unwrap().dispatcher;

    let response = dispatcher
        .dispatch(request(Method::GET, "/nope"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_text(response).await;
    assert!(body.contains("NOT_FOUND"));

    // Method not allowed is 404 by design.
    let response = dispatcher
        .dispatch(request(Method::DELETE, "/users/42"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn named_section_beats_match_all() {
    let app = App::new("files")
        .server(Server::new("api"))
        .mount(
            Endpoint::new("anyFile", "/files/*", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(User {
                    id: 0,
                    name: "wildcard".into(),
                })
            }),
            "api",
        )
        .mount(
            Endpoint::new("byId", "/files/{id}", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(User {
                    id: 0,
                    name: "named".into(),
                })
            }),
            "api",
        )
        .build()
        .unwrap();

    let response = app
        .server("api")
        .unwrap()
        .dispatcher
        .dispatch(request(Method::GET, "/files/x"), None)
        .await;
    let body = body_text(response).await;
    assert!(body.contains("named"));
}

#[tokio::test]
async fn empty_output_renders_204() {
    let app = App::new("empty")
        .server(Server::new("api"))
        .mount(
            Endpoint::new("drop", "/drop", [Method::POST], |_ctx, _in: Empty| async move {
                Ok(NoContent)
            }),
            "api",
        )
        .build()
        .unwrap();

    let response = app
        .server("api")
        .unwrap()
        .dispatcher
        .dispatch(request(Method::POST, "/drop"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn breaker_opens_recovers_and_closes() {
    let mut config = TrellisConfig::default();
    config.app.breakers.insert(
        "flaky".to_string(),
        BreakerSettings {
            max_requests: 1,
            interval_ms: 60_000,
            timeout_ms: 50,
            max_consecutive_failures: 1,
            failure_ratio: 1.0,
        },
    );

    let healthy = Arc::new(AtomicBool::new(false));
    let handler_healthy = healthy.clone();
    let app = App::new("breaker")
        .with_config(config)
        .server(Server::new("api"))
        .mount(
            Endpoint::new("flaky", "/flaky", [Method::GET], move |_ctx, _in: Empty| {
                let healthy = handler_healthy.clone();
                async move {
                    if healthy.load(Ordering::SeqCst) {
                        Ok(User {
                            id: 1,
                            name: "up".into(),
                        })
                    } else {
                        Err(Problem::internal("downstream exploded"))
                    }
                }
            }),
            "api",
        )
        .build()
        .unwrap();
    let dispatcher = &app.server("api").unwrap().dispatcher;

    // First request fails with the handler's own 500 and trips the breaker.
    let response = dispatcher.dispatch(request(Method::GET, "/flaky"), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("INTERNAL"));

    // Second request is shed by the open breaker.
    let response = dispatcher.dispatch(request(Method::GET, "/flaky"), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("CIRCUIT_BROKEN"));

    // After the open timeout a healthy probe closes it again.
    tokio::time::sleep(Duration::from_millis(60)).await;
    healthy.store(true, Ordering::SeqCst);
    let response = dispatcher.dispatch(request(Method::GET, "/flaky"), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Closed again: traffic flows.
    let response = dispatcher.dispatch(request(Method::GET, "/flaky"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn per_client_limiter_isolates_ips() {
    let mut config = TrellisConfig::default();
    config.app.limiters.insert(
        "ping".to_string(),
        LimiterSettings {
            token_rate: -1.0, // unbounded server bucket
            token_bucket_size: 0,
            client_identifier_type: "IP".to_string(),
            client_token_rate: Some(1.0),
            client_token_bucket_size: 1,
        },
    );

    let app = App::new("limited")
        .with_config(config)
        .server(Server::new("api"))
        .mount(
            Endpoint::new("ping", "/ping", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(User {
                    id: 0,
                    name: "pong".into(),
                })
            }),
            "api",
        )
        .build()
        .unwrap();
    let dispatcher = &app.server("api").unwrap().dispatcher;

    let from = |ip: &str| {
        request_with(Method::GET, "/ping", &[("x-forwarded-for", ip)], "")
    };

    let response = dispatcher.dispatch(from("198.51.100.1"), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Same IP immediately again: bucket drained.
    let response = dispatcher.dispatch(from("198.51.100.1"), None).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_text(response).await;
    assert!(body.contains("RATE_LIMITED"));

    // A different IP has its own bucket.
    let response = dispatcher.dispatch(from("198.51.100.2"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn server_limiter_accept_accept_429() {
    let mut config = TrellisConfig::default();
    config.app.limiters.insert(
        "ping".to_string(),
        LimiterSettings {
            token_rate: 2.0,
            token_bucket_size: 2,
            client_identifier_type: String::new(),
            client_token_rate: None,
            client_token_bucket_size: 0,
        },
    );

    let app = App::new("limited")
        .with_config(config)
        .server(Server::new("api"))
        .mount(
            Endpoint::new("ping", "/ping", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(User {
                    id: 0,
                    name: "pong".into(),
                })
            }),
            "api",
        )
        .build()
        .unwrap();
    let dispatcher = &app.server("api").unwrap().dispatcher;

    let statuses = [
        dispatcher.dispatch(request(Method::GET, "/ping"), None).await.status(),
        dispatcher.dispatch(request(Method::GET, "/ping"), None).await.status(),
        dispatcher.dispatch(request(Method::GET, "/ping"), None).await.status(),
    ];
    assert_eq!(
        statuses,
        [
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );
}

#[tokio::test]
async fn cors_headers_ride_success_and_error_responses() {
    let mut config = TrellisConfig::default();
    config.app.cors = Some(CorsSettings {
        allow_origins: vec!["https://app.example.com".to_string()],
        allow_methods: vec!["GET".to_string(), "POST".to_string()],
        allow_headers: vec!["content-type".to_string()],
        allow_credentials: true,
        max_age: Some(600),
    });

    let app = App::new("cors")
        .with_config(config)
        .server(Server::new("api"))
        .mount(
            Endpoint::new("ok", "/ok", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(User {
                    id: 0,
                    name: "y".into(),
                })
            }),
            "api",
        )
        .mount(
            Endpoint::new("boom", "/boom", [Method::GET], |_ctx, _in: Empty| async move {
                Err::<User, _>(Problem::internal("nope"))
            }),
            "api",
        )
        .build()
        .unwrap();
    let dispatcher = &app.server("api").unwrap().dispatcher;

    let origin = [("origin", "https://app.example.com")];
    let response = dispatcher
        .dispatch(request_with(Method::GET, "/ok", &origin, ""), None)
        .await;
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://app.example.com"
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .unwrap(),
        "true"
    );

    // Error responses carry the headers too; the single writer merges them.
    let response = dispatcher
        .dispatch(request_with(Method::GET, "/boom", &origin, ""), None)
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://app.example.com"
    );
}

#[tokio::test]
async fn handler_panic_is_recovered_to_500() {
    fn explode() -> Result<User, Problem> {
        panic!("handler exploded")
    }

    let app = App::new("panicky")
        .server(Server::new("api"))
        .mount(
            Endpoint::new("panic", "/panic", [Method::GET], |_ctx, _in: Empty| async move {
                explode()
            }),
            "api",
        )
        .build()
        .unwrap();

    let response = app
        .server("api")
        .unwrap()
        .dispatcher
        .dispatch(request(Method::GET, "/panic"), None)
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("INTERNAL"));
}

#[test]
fn duplicate_routes_and_servers_aggregate_build_errors() {
    let result = App::new("broken")
        .server(Server::new("api"))
        .server(Server::new("api"))
        .mount(
            Endpoint::new("a", "/same", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(NoContent)
            }),
            "api",
        )
        .mount(
            Endpoint::new("b", "/same", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(NoContent)
            }),
            "api",
        )
        .mount(
            Endpoint::new("c", "/x", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(NoContent)
            }),
            "ghost",
        )
        .build();

    let errors = result.err().expect("build must fail").errors;
    assert!(errors.len() >= 3, "got: {errors:?}");
}

#[test]
fn tls_server_defaults_to_443() {
    let app = App::new("tls")
        .server(Server::new("secure").tls("/etc/cert.pem", "/etc/key.pem"))
        .mount(
            Endpoint::new("ok", "/ok", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(NoContent)
            }),
            "secure",
        )
        .build()
        .unwrap();
    let server = app.server("secure").unwrap();
    assert_eq!(server.port, 443);
    assert!(server.tls);
}

#[tokio::test]
async fn serves_and_shuts_down_over_a_real_socket() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Find a free port, then hand it to the server.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let app = App::new("sock")
        .server(
            Server::new("api")
                .port(port)
                .shutdown_timeout(Duration::from_millis(500)),
        )
        .mount(
            Endpoint::new("ping", "/ping", [Method::GET], |_ctx, _in: Empty| async move {
                Ok(User {
                    id: 7,
                    name: "pong".into(),
                })
            }),
            "api",
        )
        .build()
        .unwrap();

    let shutdown = ShutdownSignal::new();
    let serve_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { app.run_until(shutdown).await })
    };

    // Wait for the listener to come up.
    let mut stream = None;
    for _ in 0..50 {
        match tokio::net::TcpStream::connect(("127.0.0.1", port)).await {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    let mut stream = stream.expect("listener came up");

    stream
        .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("HTTP/1.1 200"), "got: {text}");
    assert!(text.contains("pong"));

    // Trigger shutdown; the serve task drains and returns.
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), serve_task)
        .await
        .expect("serve task finishes")
        .expect("no join error")
        .expect("no serve error");

    // The listener is gone: new connections are refused.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(
        tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .is_err(),
        "listener must stop accepting after shutdown"
    );
}
