//! Credential sharing across concurrent requests

use futures_util::future::join_all;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use carelink_http::RequestOptions;

use crate::common::{self, TEST_TOKEN};

#[tokio::test]
async fn test_concurrent_requests_share_one_acquisition() {
    let (server, client, provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(5)
        .mount(&server)
        .await;

    let calls = (0..5).map(|_| client.get::<Value>("/patients", RequestOptions::new()));
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_cached_credential_is_reused() {
    let (server, client, provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(&server)
        .await;

    for _ in 0..3 {
        let _: Value = client.get("/patients/1", RequestOptions::new()).await.unwrap();
    }

    assert_eq!(provider.calls(), 1);
    let manager = client.credentials().expect("provider attached");
    assert!(manager.current_credential().is_some());
    assert!(manager.has_pending_renewal());

    client.shutdown();
    assert!(!manager.has_pending_renewal());
}
