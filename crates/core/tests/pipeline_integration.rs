//! Integration tests for the request pipeline
//!
//! Each test wires the real pipeline, coordinator and cache engine to the
//! mocks in `support` and drives it through `execute`.

mod support;

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use serde_json::json;
use support::{creds, wait_until, Harness, MockAuthBackend, MockTransport};
use tether_core::PipelineSettings;
use tether_domain::{
    ApiResponse, CachePolicy, ErrorKind, RequestDescriptor, SessionEvent, TransportFailure,
};

const ME: &str = "https://api.example.com/me";

/// Validates the full refresh-and-retry scenario.
///
/// Assertions:
/// - The protected call succeeds after one refresh.
/// - The refresh presented `rt1` and the retry carried `at2`.
/// - Stored credentials are exactly `{at2, rt2}`.
#[tokio::test]
async fn expired_token_is_refreshed_and_request_retried() {
    let harness = Harness::new(
        MockTransport::accepting_token("at2", r#"{"id":7}"#),
        MockAuthBackend::new().refresh_returns(Ok(creds("at2", "rt2"))),
    );
    harness.sign_in("at1", "rt1");

    let response = harness.pipeline.execute(RequestDescriptor::get(ME)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({"id": 7}));
    assert_eq!(harness.backend.refresh_tokens(), vec!["rt1".to_string()]);

    let requests = harness.transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].header("authorization"), Some("Bearer at1"));
    assert_eq!(requests[0].header("x-tether-retry"), None);
    assert_eq!(requests[1].header("authorization"), Some("Bearer at2"));
    assert_eq!(requests[1].header("x-tether-retry"), Some("1"));

    assert_eq!(harness.credentials.snapshot(), Some(creds("at2", "rt2")));
}

/// Validates single-flight refresh under concurrent 401s.
///
/// Assertions:
/// - Exactly one `refresh` call for N concurrent requests.
/// - Every request succeeds and retries with the same token.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rejections_share_one_refresh() {
    const N: usize = 12;

    let harness = Arc::new(Harness::new(
        MockTransport::accepting_token("at2", "ok"),
        MockAuthBackend::new().refresh_returns(Ok(creds("at2", "rt2"))).gated(),
    ));
    harness.sign_in("at1", "rt1");

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let harness = harness.clone();
            tokio::spawn(async move {
                let url = format!("{ME}?n={i}");
                harness.pipeline.execute(RequestDescriptor::get(url)).await
            })
        })
        .collect();

    wait_until(|| harness.coordinator().pending_waiters() == N).await;
    assert!(harness.coordinator().is_refreshing());
    harness.backend.release(1);

    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.body, b"ok");
    }

    assert_eq!(harness.backend.refresh_calls(), 1);
    let retries: Vec<_> = harness
        .transport
        .requests()
        .into_iter()
        .filter(|r| r.header("x-tether-retry").is_some())
        .collect();
    assert_eq!(retries.len(), N);
    assert!(retries.iter().all(|r| r.header("authorization") == Some("Bearer at2")));
    assert!(!harness.coordinator().is_refreshing());
}

/// Validates that a second 401 after refresh is surfaced, not retried again.
#[tokio::test]
async fn retry_is_attempted_only_once() {
    let harness = Harness::new(
        MockTransport::always(401, r#"{"error":"invalid_token"}"#),
        MockAuthBackend::new().refresh_returns(Ok(creds("at2", "rt2"))),
    );
    harness.sign_in("at1", "rt1");

    let err = harness.pipeline.execute(RequestDescriptor::get(ME)).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.http_status, Some(401));
    assert_eq!(err.message, "invalid_token");
    assert_eq!(harness.backend.refresh_calls(), 1);
    assert_eq!(harness.transport.calls(), 2);
}

/// Validates that 403 is a permission failure and never triggers refresh.
#[tokio::test]
async fn forbidden_does_not_refresh() {
    let harness = Harness::new(MockTransport::always(403, "Forbidden"), MockAuthBackend::new());
    harness.sign_in("at1", "rt1");

    let err = harness.pipeline.execute(RequestDescriptor::get(ME)).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.http_status, Some(403));
    assert_eq!(harness.backend.refresh_calls(), 0);
    assert_eq!(harness.transport.calls(), 1);
}

/// Validates that failed refresh and re-authentication end the session.
///
/// Assertions:
/// - The request fails with `Auth`.
/// - Credentials are cleared and one `Invalidated` event is broadcast.
#[tokio::test]
async fn failed_recovery_invalidates_session() {
    let harness = Harness::new(
        MockTransport::always(401, ""),
        MockAuthBackend::new().refresh_returns(Err(tether_domain::AppError::auth("revoked"))),
    );
    harness.sign_in("at1", "rt1");
    let mut events = harness.coordinator().subscribe();

    let err = harness.pipeline.execute(RequestDescriptor::get(ME)).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(harness.credentials.snapshot(), None);
    assert!(matches!(events.try_recv(), Ok(SessionEvent::Invalidated { .. })));
    assert!(events.try_recv().is_err());
    assert_eq!(harness.transport.calls(), 1);
}

/// Validates that requests without a policy fail fast while offline.
#[tokio::test]
async fn offline_without_cache_policy_fails_fast() {
    let harness = Harness::new(MockTransport::always(200, "{}"), MockAuthBackend::new());
    harness.connectivity.set_online(false);

    let err = harness.pipeline.execute(RequestDescriptor::get(ME)).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(err.message, "No internet connection");
    assert_eq!(harness.transport.calls(), 0);
}

/// Validates offline cache substitution without touching the transport.
///
/// Assertions:
/// - Offline cache miss is a `Network` error with no transport call.
/// - After one online fetch, offline calls are served from cache.
#[tokio::test]
async fn offline_requests_with_policy_use_cache() {
    let harness = Harness::new(MockTransport::always(200, r#"{"items":[1]}"#), MockAuthBackend::new());
    let descriptor = || {
        RequestDescriptor::get("https://api.example.com/items")
            .with_cache_policy(CachePolicy::network_first(Some(Duration::from_secs(60))))
    };

    harness.connectivity.set_online(false);
    let err = harness.pipeline.execute(descriptor()).await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(harness.transport.calls(), 0);

    harness.connectivity.set_online(true);
    let fresh = harness.pipeline.execute(descriptor()).await.unwrap();
    assert!(!fresh.from_cache);

    harness.connectivity.set_online(false);
    let cached = harness.pipeline.execute(descriptor()).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.body, fresh.body);
    assert_eq!(harness.transport.calls(), 1);
}

/// Validates that parameter order does not split cache entries.
#[tokio::test]
async fn logically_identical_requests_share_cache_entry() {
    let harness = Harness::new(MockTransport::always(200, "[]"), MockAuthBackend::new());
    let policy = CachePolicy::cache_first(None);

    let first = RequestDescriptor::get("https://api.example.com/search")
        .with_params(json!({"q": "rust", "page": 1}))
        .with_cache_policy(policy);
    let second = RequestDescriptor::get("https://api.example.com/search")
        .with_params(json!({"page": 1, "q": "rust"}))
        .with_cache_policy(policy);

    assert!(!harness.pipeline.execute(first).await.unwrap().from_cache);
    assert!(harness.pipeline.execute(second).await.unwrap().from_cache);
    assert_eq!(harness.transport.calls(), 1);
    assert_eq!(
        harness.transport.last_request().unwrap().url,
        "https://api.example.com/search?page=1&q=rust"
    );
}

/// Validates that error responses are classified and never cached.
#[tokio::test]
async fn server_errors_are_classified_and_not_cached() {
    let harness = Harness::new(
        MockTransport::sequence(vec![
            Ok(ApiResponse::new(503, r#"{"message":"maintenance"}"#)),
            Ok(ApiResponse::new(200, "up")),
        ]),
        MockAuthBackend::new(),
    );
    let descriptor = || {
        RequestDescriptor::get("https://api.example.com/status")
            .with_cache_policy(CachePolicy::cache_first(None))
    };

    let err = harness.pipeline.execute(descriptor()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.message, "maintenance");
    assert_eq!(err.details, Some(json!({"message": "maintenance"})));
    assert!(harness.kv.is_empty());

    assert_eq!(harness.pipeline.execute(descriptor()).await.unwrap().body, b"up");
}

/// Validates transport failures map to `Network`.
#[tokio::test]
async fn transport_timeout_is_network_error() {
    let harness = Harness::new(
        MockTransport::new(|_, _| Err(TransportFailure::Timeout)),
        MockAuthBackend::new(),
    );

    let err = harness
        .pipeline
        .execute(RequestDescriptor::get(ME).with_timeout(Duration::from_millis(5)))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(harness.transport.last_request().unwrap().timeout, Duration::from_millis(5));
}

/// Validates compression hints and optional gzip encoding of large bodies.
///
/// Assertions:
/// - Small bodies carry no hint.
/// - Large bodies carry `accept-encoding`.
/// - With encoding enabled, the body is gzip and decodes to the JSON.
#[tokio::test]
async fn large_bodies_receive_compression_hints() {
    let settings = PipelineSettings {
        compression_threshold_bytes: 64,
        compress_request_bodies: true,
        ..PipelineSettings::default()
    };
    let harness =
        Harness::with_settings(MockTransport::always(201, ""), MockAuthBackend::new(), settings);
    let url = "https://api.example.com/upload";

    harness
        .pipeline
        .execute(RequestDescriptor::post(url).with_body(json!({"small": true})))
        .await
        .unwrap();
    let small = harness.transport.last_request().unwrap();
    assert_eq!(small.header("content-type"), Some("application/json"));
    assert_eq!(small.header("accept-encoding"), None);
    assert_eq!(small.header("content-encoding"), None);

    let large_body = json!({"blob": "x".repeat(500)});
    harness
        .pipeline
        .execute(RequestDescriptor::post(url).with_body(large_body.clone()))
        .await
        .unwrap();
    let large = harness.transport.last_request().unwrap();
    assert_eq!(large.header("accept-encoding"), Some("gzip, deflate"));
    assert_eq!(large.header("content-encoding"), Some("gzip"));

    let mut decoded = String::new();
    GzDecoder::new(large.body.unwrap().as_slice()).read_to_string(&mut decoded).unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&decoded).unwrap(), large_body);
}

/// Validates that third-party calls never carry credentials or refresh.
#[tokio::test]
async fn unauthenticated_requests_skip_credentials() {
    let harness = Harness::new(MockTransport::always(401, "nope"), MockAuthBackend::new());
    harness.sign_in("at1", "rt1");

    let err = harness
        .pipeline
        .execute(RequestDescriptor::get("https://weather.example.org/today").unauthenticated())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(harness.transport.last_request().unwrap().header("authorization"), None);
    assert_eq!(harness.backend.refresh_calls(), 0);
}

/// Validates that anonymous requests are sent when nobody is signed in.
///
/// Assertions:
/// - No `authorization` header is attached.
/// - A 401 surfaces the server's rejection without starting a refresh.
#[tokio::test]
async fn signed_out_requests_are_sent_anonymously() {
    let harness = Harness::new(MockTransport::always(401, "Login required"), MockAuthBackend::new());

    let err = harness.pipeline.execute(RequestDescriptor::get(ME)).await.unwrap_err();

    assert_eq!(err.http_status, Some(401));
    assert_eq!(err.message, "Login required");
    assert_eq!(harness.transport.calls(), 1);
    assert_eq!(harness.backend.refresh_calls(), 0);
    assert!(!harness.coordinator().is_refreshing());
}
