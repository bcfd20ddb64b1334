//! HTTP 429 handling: retries, exhaustion and the outer retry tier

use std::time::{Duration, Instant};

use carelink_http::backoff::retry_rate_limited;
use carelink_http::{ApiError, RequestOptions};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_retry_after_is_honored_then_succeeds() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .mount(&server)
        .await;

    let started = Instant::now();
    let body: Value = client
        .get("/patients", RequestOptions::new())
        .await
        .expect("second attempt succeeds");
    let elapsed = started.elapsed();

    assert_eq!(body[0]["id"], 1);
    assert_eq!(common::request_count(&server).await, 2);
    assert!(elapsed >= Duration::from_secs(2), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3500), "waited {elapsed:?}");
}

#[tokio::test]
async fn test_exhausted_retries_report_rate_limited() {
    let (server, client, _provider) = common::setup().await;
    let client = client.with_backoff(common::fast_backoff());

    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = client
        .get::<Value>("/patients", RequestOptions::new())
        .await
        .unwrap_err();

    let api = err.as_api().expect("expected an API error");
    assert_eq!(
        *api,
        ApiError::RateLimited {
            retry_after_seconds: Some(7)
        }
    );
    assert_eq!(api.code(), "RATE_LIMITED");
    assert_eq!(api.status_code(), Some(429));
    assert_eq!(api.details(), Some(json!({ "retryAfterSeconds": 7 })));
    // One initial attempt plus three retries
    assert_eq!(common::request_count(&server).await, 4);
}

#[tokio::test]
async fn test_exhaustion_without_hint() {
    let (server, client, _provider) = common::setup().await;
    let client = client.with_backoff(common::fast_backoff()).with_max_retries(1);

    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client
        .get::<Value>("/patients", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.as_api(),
        Some(&ApiError::RateLimited {
            retry_after_seconds: None
        })
    );
    assert_eq!(common::request_count(&server).await, 2);
}

#[tokio::test]
async fn test_skip_rate_limit_retry_surfaces_first_429() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let started = Instant::now();
    let err = client
        .get::<Value>("/patients", RequestOptions::new().skip_rate_limit_retry())
        .await
        .unwrap_err();

    assert_eq!(err.as_api().and_then(|e| e.retry_after_seconds()), Some(30));
    assert_eq!(common::request_count(&server).await, 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_non_429_errors_are_not_retried() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .mount(&server)
        .await;

    let err = client
        .get::<Value>("/patients", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "HTTP_500");
    assert_eq!(common::request_count(&server).await, 1);
}

#[tokio::test]
async fn test_outer_tier_retries_after_exhaustion() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let body: Value = retry_rate_limited(1, || {
        client.get::<Value>("/patients", RequestOptions::new().skip_rate_limit_retry())
    })
    .await
    .expect("outer tier recovers");

    assert_eq!(body, json!([]));
    assert_eq!(common::request_count(&server).await, 2);
}
