//! Per-request deadlines

use std::time::Duration;

use carelink_http::{ApiClient, ApiError, RequestOptions};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_slow_request_times_out_without_affecting_others() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "late": true }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let slow = client.get::<Value>(
        "/slow",
        RequestOptions::new().timeout(Duration::from_millis(200)),
    );
    let fast = client.get::<Value>("/fast", RequestOptions::new());
    let (slow, fast) = tokio::join!(slow, fast);

    let err = slow.unwrap_err();
    assert_eq!(
        err.as_api(),
        Some(&ApiError::Timeout {
            timeout: Duration::from_millis(200)
        })
    );
    assert_eq!(err.code(), "TIMEOUT");
    assert_eq!(err.as_api().and_then(|e| e.status_code()), Some(408));

    assert_eq!(fast.expect("fast request succeeds")["ok"], true);
}

#[tokio::test]
async fn test_configured_default_timeout_applies() {
    let server = wiremock::MockServer::start().await;
    let mut config = common::config_for(&server);
    config.api.timeout_ms = 150;
    let client = ApiClient::new(&config);

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client
        .get::<Value>("/slow", RequestOptions::new().anonymous())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
}
