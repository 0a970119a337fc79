use super::*;
use crate::zoho::test_support::{mock_deployment, mount_token_endpoint, test_config};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn data(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

fn service_for(server: &MockServer) -> ZohoCreatorService {
    ZohoCreatorService::new(&test_config(&server.uri())).expect("service builds")
}

#[tokio::test]
async fn list_forms() {
    let server = mock_deployment().await;
    let service = service_for(&server);

    let forms = service.list_forms(true).expect("forms load");
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].link_name, "test_form");
    assert_eq!(forms[0].display_name, "Test Form");
    assert_eq!(forms[0].access_type, "all");
    assert_eq!(forms[0].fields.len(), 1);
    assert_eq!(forms[0].fields[0].api_name, "test_field");
    assert!(forms[0].fields[0].required);
}

#[tokio::test]
async fn list_forms_uses_cache() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"forms": []})))
        .expect(2)
        .mount(&server)
        .await;

    let service = service_for(&server);
    assert!(service.list_forms(false).expect("first load").is_empty());
    assert!(service.list_forms(false).expect("cached").is_empty());
    assert!(service.list_forms(true).expect("forced").is_empty());
}

#[tokio::test]
async fn get_form_from_cache() {
    let server = mock_deployment().await;
    let service = service_for(&server);

    let form = service.get_form("test_form").expect("lookup works");
    assert_eq!(form.map(|f| f.display_name), Some("Test Form".to_string()));
    assert!(service.get_form("other_form").expect("lookup works").is_none());
}

#[tokio::test]
async fn list_reports() {
    let server = mock_deployment().await;
    let service = service_for(&server);

    let reports = service.list_reports().expect("reports load");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].link_name, "All_Tests");
    assert_eq!(reports[0].form_link_name.as_deref(), Some("test_form"));
}

#[tokio::test]
async fn get_records() {
    let server = mock_deployment().await;
    let service = service_for(&server);

    let records = service
        .get_records("test_form", None, None)
        .expect("records load");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "123");
    assert_eq!(records[0].form_link_name, "test_form");
    assert_eq!(records[0].data["test_field"], "test_value");
}

#[tokio::test]
async fn get_records_passes_filters() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/forms/test_form/records"))
        .and(query_param("criteria", "test_field == \"x\""))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let records = service
        .get_records("test_form", Some("test_field == \"x\""), Some(10))
        .expect("records load");
    assert!(records.is_empty());
}

#[tokio::test]
async fn get_report_records() {
    let server = mock_deployment().await;
    let service = service_for(&server);

    let records = service
        .get_report_records("All_Tests", None, Some(0))
        .expect("records load");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].form_link_name, "All_Tests");
}

#[tokio::test]
async fn get_record() {
    let server = mock_deployment().await;
    let service = service_for(&server);

    let record = service.get_record("test_form", "123").expect("record loads");
    assert_eq!(record.id, "123");
    assert_eq!(record.data["test_field"], "test_value");
}

#[tokio::test]
async fn create_record() {
    let server = mock_deployment().await;
    let service = service_for(&server);

    let record = service
        .create_record("test_form", data(json!({"test_field": "new_value"})))
        .expect("record created");
    assert_eq!(record.id, "123");
    assert_eq!(record.form_link_name, "test_form");
    assert_eq!(record.data["test_field"], "new_value");
}

#[tokio::test]
async fn update_record() {
    let server = mock_deployment().await;
    let service = service_for(&server);

    let record = service
        .update_record(
            "test_form",
            "123",
            data(json!({"test_field": "updated_value"})),
        )
        .expect("record updated");
    assert_eq!(record.id, "123");
    assert_eq!(record.form_link_name, "test_form");
    assert_eq!(record.data["test_field"], "updated_value");
    assert!(record.modified_time > record.created_time);
}

#[tokio::test]
async fn malformed_response_is_parse_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service.list_reports().expect_err("not JSON");
    assert!(matches!(err, ZohoError::Parse(_)));
}

#[tokio::test]
async fn check_connection() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let service = service_for(&server);
    assert!(service.check_connection().is_ok());
}
