use super::*;
use crate::zoho::test_support::{mount_token_endpoint, test_config};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&test_config(&server.uri()))
        .expect("client builds")
        .with_retry_delay(Duration::ZERO)
}

#[test]
fn url_segments_are_encoded() {
    let config = test_config("http://localhost:9999");
    let client = ApiClient::new(&config).expect("client builds");

    let url = client
        .url_for(&["forms", "my form", "records", "1/2"])
        .expect("url builds");
    assert_eq!(
        url.as_str(),
        "http://localhost:9999/api/v2/forms/my%20form/records/1%2F2"
    );
}

#[test]
fn missing_credentials_fail_fast() {
    let mut config = test_config("http://localhost:9999");
    config.zoho.refresh_token = String::new();
    assert!(ApiClient::new(&config).is_err());
}

#[tokio::test]
async fn get_sends_auth_and_query() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms/orders/records"))
        .and(header("Authorization", "Zoho-oauthtoken test_token"))
        .and(query_param("criteria", "Status == \"Open\""))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"records\": []}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client
        .get(
            &["forms", "orders", "records"],
            &[
                ("criteria", "Status == \"Open\"".to_string()),
                ("limit", "5".to_string()),
            ],
        )
        .expect("request succeeds");
    assert_eq!(body, "{\"records\": []}");
}

#[tokio::test]
async fn post_and_patch_send_json() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/forms/orders/records"))
        .and(body_json(json!({"data": {"Name": "x"}})))
        .respond_with(ResponseTemplate::new(200).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/forms/orders/records/7"))
        .and(body_json(json!({"data": {"Name": "y"}})))
        .respond_with(ResponseTemplate::new(200).set_body_string("updated"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let created = client
        .post_json(
            &["forms", "orders", "records"],
            &json!({"data": {"Name": "x"}}),
        )
        .expect("post succeeds");
    assert_eq!(created, "created");

    let updated = client
        .patch_json(
            &["forms", "orders", "records", "7"],
            &json!({"data": {"Name": "y"}}),
        )
        .expect("patch succeeds");
    assert_eq!(updated, "updated");
}

#[tokio::test]
async fn content_type_only_accompanies_bodies() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"forms\": []}"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/forms/orders/records"))
        .respond_with(ResponseTemplate::new(200).set_body_string("created"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.get(&["forms"], &[]).expect("get succeeds");
    client
        .post_json(&["forms", "orders", "records"], &json!({"data": {}}))
        .expect("post succeeds");

    let requests = server.received_requests().await.expect("recording enabled");
    let content_types = |verb: &str| {
        requests
            .iter()
            .filter(|request| {
                request.method.as_str() == verb && request.url.path() != "/oauth/v2/token"
            })
            .map(|request| {
                request
                    .headers
                    .get_all("content-type")
                    .iter()
                    .map(|value| value.to_str().unwrap_or_default().to_string())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(content_types("GET"), vec![Vec::<String>::new()]);
    assert_eq!(content_types("POST"), vec![vec!["application/json".to_string()]]);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get(&["forms"], &[]).expect_err("all attempts fail");
    assert!(matches!(err, ZohoError::Api { status: 503, .. }));
}

#[tokio::test]
async fn recovers_after_transient_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.get(&["forms"], &[]).expect("second attempt"), "ok");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get(&["forms"], &[]).expect_err("bad request");
    assert!(matches!(err, ZohoError::Api { status: 400, .. }));
}

#[tokio::test]
async fn not_found_maps_to_not_found() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms/missing/records/1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .get(&["forms", "missing", "records", "1"], &[])
        .expect_err("missing record");
    assert!(matches!(err, ZohoError::NotFound(_)));
}

#[tokio::test]
async fn unauthorized_refreshes_token_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "test_token", "expires_in": 3600})),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/reports"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"reports\": []}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.get(&["reports"], &[]).expect("replayed request");
    assert_eq!(body, "{\"reports\": []}");
}
