//! # Integration Tests for Hash Web Server
//!
//! Runs a real server on an ephemeral port and talks to it over HTTP/1.
//!
//! ## Test Categories
//!
//! - **Configuration**: defaults, environment loading, validation
//! - **Submit/Fetch**: key assignment, digest values, visibility over HTTP
//! - **Statistics**: the `/stats` document
//! - **Error Handling**: unknown keys, malformed keys, unsupported methods
//! - **Lifecycle**: `/shutdown` and concurrent clients

use hash_web::{
    error::HashWebError, server::config::LogLevel, HashWebServer, ServerConfig, VisibilityPolicy,
};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const ANGRY_MONKEY_DIGEST: &str =
    "ZEHhWB65gUlzdVwtDQArEyx+KVLzp/aTaRaPlBzYRIFj6vjFdqEb0Q5B8zVKCZ0vKbZPZklJz0Fd7su2A+gf7Q==";

/// Helper function to create test server configuration
fn create_test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: LogLevel::from(tracing::Level::DEBUG),
        max_payload_size: 64 * 1024,
        request_timeout_ms: 5000,
        worker_threads: Some(2),
        enable_metrics: true,
        enable_health_check: true,
        ..ServerConfig::default()
    }
}

/// A server running on a background task
struct TestServer {
    addr: SocketAddr,
    shutdown: hash_web::ShutdownHandle,
    task: JoinHandle<hash_web::Result<()>>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let bound = HashWebServer::new(config)
            .bind()
            .await
            .expect("Failed to bind test server");
        let addr = bound.local_addr();
        let shutdown = bound.shutdown_handle();
        let task = tokio::spawn(bound.serve());

        Self {
            addr,
            shutdown,
            task,
        }
    }

    async fn stop(self) {
        self.shutdown.trigger();
        let result = timeout(Duration::from_secs(5), self.task)
            .await
            .expect("Server should stop in time")
            .expect("Server task should not panic");
        assert!(result.is_ok());
    }
}

/// Send one request on a fresh connection, returning status and body text
async fn send(
    addr: SocketAddr,
    method: Method,
    path: &str,
    form: Option<&str>,
) -> (StatusCode, String) {
    let stream = TcpStream::connect(addr)
        .await
        .expect("Failed to connect to test server");
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .expect("HTTP handshake failed");
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(hyper::header::HOST, addr.to_string());
    if form.is_some() {
        builder = builder.header(
            hyper::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        );
    }
    let request = builder
        .body(Full::new(Bytes::from(form.unwrap_or_default().to_owned())))
        .unwrap();

    let response = timeout(Duration::from_secs(5), sender.send_request(request))
        .await
        .expect("Request timed out")
        .expect("Request failed");
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status, String::from_utf8(body.to_vec()).unwrap())
}

/// Test server configuration defaults
#[test]
fn test_server_config_defaults() {
    let config = ServerConfig::default();

    assert_eq!(config.bind_addr.port(), hash_web::DEFAULT_PORT);
    assert_eq!(config.max_payload_size, hash_web::MAX_PAYLOAD_SIZE);
    assert_eq!(config.request_timeout_ms, hash_web::REQUEST_TIMEOUT_MS);
    assert_eq!(config.visibility_policy, VisibilityPolicy::SecondOfMinute);
    assert_eq!(config.visibility_delay_secs, 5);
    assert!(config.enable_health_check);
    assert!(!config.enable_metrics);
    assert!(config.validate().is_ok());
}

/// Test server configuration from environment variables
#[test]
fn test_config_from_environment() {
    std::env::set_var("HASH_WEB_BIND_ADDR", "0.0.0.0:9000");
    std::env::set_var("LOG_LEVEL", "debug");
    std::env::set_var("MAX_PAYLOAD_SIZE", "2048");
    std::env::set_var("VISIBILITY_POLICY", "elapsed");
    std::env::set_var("VISIBILITY_DELAY_SECS", "3");
    std::env::set_var("ENABLE_METRICS", "true");
    std::env::set_var("ENABLE_HEALTH_CHECK", "false");

    let config = ServerConfig::from_env();

    std::env::remove_var("HASH_WEB_BIND_ADDR");
    std::env::remove_var("LOG_LEVEL");
    std::env::remove_var("MAX_PAYLOAD_SIZE");
    std::env::remove_var("VISIBILITY_POLICY");
    std::env::remove_var("VISIBILITY_DELAY_SECS");
    std::env::remove_var("ENABLE_METRICS");
    std::env::remove_var("ENABLE_HEALTH_CHECK");

    let config = config.expect("Should parse environment config");
    assert_eq!(config.bind_addr.port(), 9000);
    assert_eq!(config.log_level, LogLevel::from(tracing::Level::DEBUG));
    assert_eq!(config.max_payload_size, 2048);
    assert_eq!(config.visibility_policy, VisibilityPolicy::Elapsed);
    assert_eq!(config.visibility_delay_secs, 3);
    assert!(config.enable_metrics);
    assert!(!config.enable_health_check);
}

/// Keys start at 1 and the digest of a known password is served back
#[tokio::test]
async fn test_submit_and_fetch_workflow() {
    let server = TestServer::start(create_test_config()).await;

    let (status, key) = send(server.addr, Method::POST, "/hash", Some("password=angryMonkey")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(key, "1");

    let (status, key) = send(server.addr, Method::POST, "/hash", Some("password=other")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(key, "2");

    let (status, digest) = send(server.addr, Method::GET, "/hash/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(digest, ANGRY_MONKEY_DIGEST);

    // Fetch also answers POST on the keyed path
    let (status, digest) = send(server.addr, Method::POST, "/hash/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(digest, ANGRY_MONKEY_DIGEST);

    server.stop().await;
}

/// The root path accepts submissions too
#[tokio::test]
async fn test_submit_on_root_path() {
    let server = TestServer::start(create_test_config()).await;

    let (status, key) = send(server.addr, Method::POST, "/", Some("password=angryMonkey")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(key, "1");

    server.stop().await;
}

/// Unknown keys yield 404 with an empty body
#[tokio::test]
async fn test_fetch_unknown_key() {
    let server = TestServer::start(create_test_config()).await;

    let (status, body) = send(server.addr, Method::GET, "/hash/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());

    server.stop().await;
}

/// Keys that are not unsigned integers are rejected
#[tokio::test]
async fn test_fetch_malformed_key() {
    let server = TestServer::start(create_test_config()).await;

    let (status, body) = send(server.addr, Method::GET, "/hash/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["status"], 400);

    server.stop().await;
}

/// With the elapsed policy a fresh digest is withheld until the delay passes
#[tokio::test]
async fn test_elapsed_visibility_over_http() {
    let mut config = create_test_config();
    config.visibility_policy = VisibilityPolicy::Elapsed;
    config.visibility_delay_secs = 3600;
    let server = TestServer::start(config).await;

    let (status, key) = send(server.addr, Method::POST, "/hash", Some("password=angryMonkey")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(server.addr, Method::GET, &format!("/hash/{key}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());

    server.stop().await;
}

/// With a zero delay the elapsed policy shows digests immediately
#[tokio::test]
async fn test_elapsed_visibility_zero_delay() {
    let mut config = create_test_config();
    config.visibility_policy = VisibilityPolicy::Elapsed;
    config.visibility_delay_secs = 0;
    let server = TestServer::start(config).await;

    send(server.addr, Method::POST, "/hash", Some("password=angryMonkey")).await;
    let (status, digest) = send(server.addr, Method::GET, "/hash/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(digest, ANGRY_MONKEY_DIGEST);

    server.stop().await;
}

/// Statistics start at zero and count every submission
#[tokio::test]
async fn test_stats_endpoint() {
    let server = TestServer::start(create_test_config()).await;

    let (status, body) = send(server.addr, Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"RequestCounts":0,"Average":0}"#);

    for password in ["a", "b", "c"] {
        send(
            server.addr,
            Method::POST,
            "/hash",
            Some(&format!("password={password}")),
        )
        .await;
    }

    let (status, body) = send(server.addr, Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["RequestCounts"], 3);
    assert!(stats["Average"].is_u64());

    server.stop().await;
}

/// Fetches do not count as submissions
#[tokio::test]
async fn test_fetch_does_not_change_stats() {
    let server = TestServer::start(create_test_config()).await;

    send(server.addr, Method::POST, "/hash", Some("password=x")).await;
    send(server.addr, Method::GET, "/hash/1", None).await;
    send(server.addr, Method::GET, "/hash/99", None).await;

    let (_, body) = send(server.addr, Method::GET, "/stats", None).await;
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["RequestCounts"], 1);

    server.stop().await;
}

/// Methods other than GET and POST are rejected
#[tokio::test]
async fn test_unsupported_methods() {
    let server = TestServer::start(create_test_config()).await;

    for method in [Method::PUT, Method::DELETE, Method::PATCH] {
        let (status, body) = send(server.addr, method, "/hash", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(body.contains("Only GET and POST methods are supported"));
    }

    server.stop().await;
}

/// Unknown paths are not found
#[tokio::test]
async fn test_unknown_route() {
    let server = TestServer::start(create_test_config()).await;

    let (status, _) = send(server.addr, Method::GET, "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Submission requires POST
    let (status, _) = send(server.addr, Method::GET, "/hash", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.stop().await;
}

/// Operational endpoints follow their configuration switches
#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let server = TestServer::start(create_test_config()).await;

    let (status, body) = send(server.addr, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "healthy");

    let (status, body) = send(server.addr, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("hash_web_submissions_total 0"));

    server.stop().await;

    let mut config = create_test_config();
    config.enable_health_check = false;
    config.enable_metrics = false;
    let server = TestServer::start(config).await;

    let (status, _) = send(server.addr, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(server.addr, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.stop().await;
}

/// Concurrent submitters receive distinct, contiguous keys
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions() {
    let server = TestServer::start(create_test_config()).await;
    let addr = server.addr;

    let mut handles = Vec::new();
    for i in 0..20 {
        handles.push(tokio::spawn(async move {
            let (status, key) = send(
                addr,
                Method::POST,
                "/hash",
                Some(&format!("password=client{i}")),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            key.parse::<u64>().unwrap()
        }));
    }

    let mut keys = Vec::new();
    for handle in handles {
        keys.push(handle.await.expect("Task should complete successfully"));
    }
    keys.sort_unstable();
    assert_eq!(keys, (1..=20).collect::<Vec<u64>>());

    let (_, body) = send(addr, Method::GET, "/stats", None).await;
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["RequestCounts"], 20);

    server.stop().await;
}

/// `/shutdown` acknowledges and the server stops accepting connections
#[tokio::test]
async fn test_shutdown_endpoint() {
    let server = TestServer::start(create_test_config()).await;

    let (status, body) = send(server.addr, Method::GET, "/shutdown", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let result = timeout(Duration::from_secs(5), server.task)
        .await
        .expect("Server should stop after /shutdown")
        .expect("Server task should not panic");
    assert!(result.is_ok());

    assert!(TcpStream::connect(server.addr).await.is_err());
}

/// Binding an address that is already in use fails with a server error
#[tokio::test]
async fn test_bind_conflict() {
    let server = TestServer::start(create_test_config()).await;

    let mut config = create_test_config();
    config.bind_addr = server.addr;
    let err = HashWebServer::new(config).bind().await.unwrap_err();
    assert!(matches!(err, HashWebError::ServerError { .. }));
    assert!(err.is_critical());

    server.stop().await;
}
