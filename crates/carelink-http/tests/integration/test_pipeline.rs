//! End-to-end request pipeline behavior: URL building, headers, body
//! decoding and error mapping.

use carelink_core::config::{ClientConfigBuilder, DeploymentMode};
use carelink_http::{ApiClient, ApiError, ClientError, RequestOptions};
use serde::Deserialize;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, TestProvider, TEST_TOKEN};

#[derive(Debug, Deserialize, PartialEq)]
struct Patient {
    id: u32,
    name: String,
}

#[tokio::test]
async fn test_get_patient_with_bearer_token() {
    let (server, client, provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients/42"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "name": "Ana"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let patient: Patient = client
        .get("/patients/42", RequestOptions::new())
        .await
        .expect("request failed");

    assert_eq!(
        patient,
        Patient {
            id: 42,
            name: "Ana".to_string()
        }
    );
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_query_parameters_are_encoded() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients"))
        .and(query_param("name", "Ana María"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let result: Vec<Patient> = client
        .get(
            "/patients",
            RequestOptions::new()
                .query("name", "Ana María")
                .query("page", 2)
                .query_opt::<u32>("ward", None),
        )
        .await
        .expect("request failed");

    assert!(result.is_empty());
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/appointments"))
        .and(body_json(json!({ "patientId": 42, "slot": "09:30" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&server)
        .await;

    let created: Value = client
        .post(
            "/appointments",
            &json!({ "patientId": 42, "slot": "09:30" }),
            RequestOptions::new(),
        )
        .await
        .expect("request failed");

    assert_eq!(created["id"], 7);
}

#[tokio::test]
async fn test_error_body_is_mapped() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients/999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Patient not found",
            "code": "PATIENT_NOT_FOUND",
            "details": { "id": 999 }
        })))
        .mount(&server)
        .await;

    let err = client
        .get::<Value>("/patients/999", RequestOptions::new())
        .await
        .unwrap_err();

    let api = err.as_api().expect("expected an API error");
    assert_eq!(api.code(), "HTTP_404");
    assert_eq!(api.status_code(), Some(404));
    assert_eq!(api.message(), "Patient not found");
    assert_eq!(api.details(), Some(json!({ "id": 999 })));
    match api {
        ApiError::Http { server_code, .. } => {
            assert_eq!(server_code.as_deref(), Some("PATIENT_NOT_FOUND"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_without_json_body_uses_status_text() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client
        .get::<Value>("/broken", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "HTTP_503");
    assert_eq!(err.as_api().map(|e| e.message()).as_deref(), Some("Service Unavailable"));
    assert!(err.as_api().is_some_and(|e| e.is_server_error()));
}

#[tokio::test]
async fn test_text_and_empty_bodies() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/appointments/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let text: String = client.get("/ping", RequestOptions::new()).await.unwrap();
    assert_eq!(text, "pong");

    let nothing: Value = client
        .delete("/appointments/7", RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(nothing, Value::Null);
}

#[tokio::test]
async fn test_success_with_unexpected_shape_is_unknown() {
    let (server, client, _provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/patients/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = client
        .get::<Patient>("/patients/1", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNKNOWN");
}

#[tokio::test]
async fn test_anonymous_request_has_no_authorization() {
    let (server, client, provider) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/public/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let _: Value = client
        .get("/public/info", RequestOptions::new().anonymous())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_failed_credential_falls_back_to_anonymous() {
    let server = wiremock::MockServer::start().await;
    let client = ApiClient::new(&common::config_for(&server))
        .with_identity_provider(TestProvider::signed_out());

    Mock::given(method("GET"))
        .and(path("/public/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let body: Value = client
        .get("/public/info", RequestOptions::new())
        .await
        .expect("anonymous fallback should proceed");
    assert_eq!(body["ok"], true);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_required_credential_failure_stops_request() {
    let server = wiremock::MockServer::start().await;
    let client = ApiClient::new(&common::config_for(&server))
        .with_identity_provider(TestProvider::signed_out());

    let err = client
        .get::<Value>("/patients/42", RequestOptions::new().require_credential())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "UNKNOWN");
    assert_eq!(common::request_count(&server).await, 0);
}

#[tokio::test]
async fn test_insecure_production_base_url_is_config_error() {
    let server = wiremock::MockServer::start().await;
    let config = ClientConfigBuilder::new()
        .base_url(server.uri())
        .deployment(DeploymentMode::Production)
        .build();
    let client = ApiClient::new(&config);

    let err = client
        .get::<Value>("/patients/42", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Config(_)));
    assert_eq!(common::request_count(&server).await, 0);
}

#[tokio::test]
async fn test_missing_base_url_in_development_uses_local_default() {
    let config = ClientConfigBuilder::new()
        .deployment(DeploymentMode::Development)
        .build();
    let client = ApiClient::new(&config);

    assert_eq!(
        client.base_url().unwrap().as_str(),
        "http://localhost:5000/"
    );
}
