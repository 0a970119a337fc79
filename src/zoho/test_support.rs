//! Shared fixtures for tests that talk to a mocked Zoho deployment

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{Config, ServerConfig, ZohoConfig};

/// Config whose accounts and API URLs both point at `server_uri`
pub(crate) fn test_config(server_uri: &str) -> Config {
    Config {
        zoho: ZohoConfig {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            refresh_token: "test_refresh_token".to_string(),
            organization_id: "test_org_id".to_string(),
            api_base_url: Some(format!("{}/api/v2", server_uri)),
            accounts_url: server_uri.to_string(),
            ..ZohoConfig::default()
        },
        server: ServerConfig {
            cache_ttl_seconds: 300,
            request_timeout_seconds: 5,
            retry_attempts: 3,
        },
        ..Config::default()
    }
}

pub(crate) async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test_token",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

pub(crate) fn record_json() -> Value {
    json!({
        "ID": "123",
        "Created_Time": "2024-01-01T00:00:00Z",
        "Modified_Time": "2024-01-01T00:00:00Z",
        "test_field": "test_value"
    })
}

/// Mock deployment with one form, one report and one record
pub(crate) async fn mock_deployment() -> MockServer {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/forms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "forms": [
                {"link_name": "test_form", "display_name": "Test Form", "access_type": "all"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms/test_form/fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fields": [
                {"api_name": "test_field", "display_name": "Test Field", "type": "text", "required": true}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reports": [
                {"link_name": "All_Tests", "display_name": "All Tests", "form_link_name": "test_form"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms/test_form/records"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"records": [record_json()]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/reports/All_Tests/records"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"records": [record_json()]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms/test_form/records/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"record": record_json()})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/forms/test_form/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"record": record_json()})))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/forms/test_form/records/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"record": {
            "Created_Time": "2024-01-01T00:00:00Z",
            "Modified_Time": "2024-02-01T00:00:00Z"
        }})))
        .mount(&server)
        .await;

    server
}
