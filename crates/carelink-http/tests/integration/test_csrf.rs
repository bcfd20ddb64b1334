//! Anti-forgery token handling on state-changing requests

use std::sync::Arc;

use carelink_core::config::{ClientConfigBuilder, DeploymentMode};
use carelink_core::ports::{ICsrfTokenSource, StaticCsrfToken};
use carelink_http::{ApiClient, ApiError, ClientError, RequestOptions};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_production_post_without_token_is_refused() {
    // Never contacted: the request must fail before any network I/O
    let config = ClientConfigBuilder::new()
        .base_url("https://api.carelink.invalid")
        .deployment(DeploymentMode::Production)
        .build();
    let client = ApiClient::new(&config);

    let err = client
        .post::<Value, _>("/appointments", &json!({}), RequestOptions::new().anonymous())
        .await
        .unwrap_err();

    assert_eq!(err, ClientError::Api(ApiError::CsrfTokenMissing));
    assert_eq!(err.code(), "CSRF_TOKEN_MISSING");
    assert_eq!(err.as_api().and_then(|e| e.status_code()), Some(403));
}

#[tokio::test]
async fn test_development_post_without_token_proceeds() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let created: Value = client
        .post("/appointments", &json!({}), RequestOptions::new())
        .await
        .expect("development requests proceed without a token");
    assert_eq!(created["id"], 1);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("x-csrf-token").is_none());
}

#[tokio::test]
async fn test_token_attached_only_to_state_changing_methods() {
    let (server, client, _provider) = common::setup().await;
    let client = client.with_csrf_source(Arc::new(StaticCsrfToken::new("csrf-123")));

    Mock::given(method("PUT"))
        .and(path("/patients/42"))
        .and(header("x-csrf-token", "csrf-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 42 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patients/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 42 })))
        .expect(1)
        .mount(&server)
        .await;

    let _: Value = client
        .put("/patients/42", &json!({ "name": "Ana" }), RequestOptions::new())
        .await
        .unwrap();
    let _: Value = client.get("/patients/42", RequestOptions::new()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let get = requests
        .iter()
        .find(|r| r.method.as_str() == "GET")
        .expect("GET was sent");
    assert!(get.headers.get("x-csrf-token").is_none());
}

#[tokio::test]
async fn test_response_token_is_used_by_next_request() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-CSRF-Token", "issued-by-server")
                .set_body_json(json!({ "user": "ana" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/appointments/7"))
        .and(header("x-csrf-token", "issued-by-server"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let _: Value = client.get("/session", RequestOptions::new()).await.unwrap();
    assert_eq!(
        client.csrf_store().csrf_token().as_deref(),
        Some("issued-by-server")
    );

    let _: Value = client
        .delete("/appointments/7", RequestOptions::new())
        .await
        .unwrap();
}
