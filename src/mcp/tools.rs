//! MCP Tools Implementation
//!
//! Tool definitions and handlers for reading and writing Zoho Creator data.

use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, ToolHandler};
use crate::zoho::ZohoCreatorService;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

type Arguments = HashMap<String, Value>;

fn required_str<'a>(args: &'a Arguments, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("Missing required parameter: {}", name))
}

fn required_object(args: &Arguments, name: &str) -> Result<Map<String, Value>> {
    match args.get(name) {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(anyhow!("Parameter {} must be an object", name)),
        None => Err(anyhow!("Missing required parameter: {}", name)),
    }
}

/// Record IDs are accepted as strings or bare numbers
fn required_id(args: &Arguments, name: &str) -> Result<String> {
    match args.get(name) {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(anyhow!("Missing required parameter: {}", name)),
    }
}

fn json_result(value: &Value) -> Result<CallToolResult> {
    Ok(CallToolResult::text(serde_json::to_string_pretty(value)?))
}

fn failure(action: &str, err: &dyn std::fmt::Display) -> CallToolResult {
    error!("Error {}: {}", action, err);
    CallToolResult::error(format!("Error {}: {}", action, err))
}

/// list-forms tool handler
pub struct ListFormsHandler {
    service: Arc<ZohoCreatorService>,
}

impl ListFormsHandler {
    #[inline]
    pub fn new(service: Arc<ZohoCreatorService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "list-forms".to_string(),
            description: Some("List all forms in the Zoho Creator application".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "force_refresh": {
                        "type": "boolean",
                        "description": "Bypass the form cache (default: false)"
                    }
                },
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListFormsHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let force_refresh = args
            .get("force_refresh")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        debug!("Listing forms (force_refresh={})", force_refresh);
        match self.service.list_forms(force_refresh) {
            Ok(forms) => json_result(&json!({ "forms": forms })),
            Err(e) => Ok(failure("listing forms", &e)),
        }
    }
}

/// list-reports tool handler
pub struct ListReportsHandler {
    service: Arc<ZohoCreatorService>,
}

impl ListReportsHandler {
    #[inline]
    pub fn new(service: Arc<ZohoCreatorService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "list-reports".to_string(),
            description: Some("List all reports in the Zoho Creator application".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListReportsHandler {
    #[inline]
    async fn handle(&self, _params: CallToolParams) -> Result<CallToolResult> {
        debug!("Listing reports");
        match self.service.list_reports() {
            Ok(reports) => json_result(&json!({ "reports": reports })),
            Err(e) => Ok(failure("listing reports", &e)),
        }
    }
}

/// get-records tool handler
pub struct GetRecordsHandler {
    service: Arc<ZohoCreatorService>,
}

impl GetRecordsHandler {
    #[inline]
    pub fn new(service: Arc<ZohoCreatorService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "get-records".to_string(),
            description: Some("Get records from a form".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "form_name": {
                        "type": "string",
                        "description": "Link name of the form"
                    },
                    "criteria": {
                        "type": "string",
                        "description": "Optional: Zoho criteria expression (e.g., 'Status == \"Open\"')"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Optional: Maximum number of records"
                    }
                },
                "required": ["form_name"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for GetRecordsHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let form_name = match required_str(&args, "form_name") {
            Ok(form_name) => form_name,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };
        let criteria = args.get("criteria").and_then(Value::as_str);
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|limit| u32::try_from(limit).unwrap_or(u32::MAX));

        debug!(
            "Getting records: form='{}', criteria={:?}, limit={:?}",
            form_name, criteria, limit
        );
        match self.service.get_records(form_name, criteria, limit) {
            Ok(records) => json_result(&json!({
                "count": records.len(),
                "records": records,
            })),
            Err(e) => Ok(failure("getting records", &e)),
        }
    }
}

/// get-record tool handler
pub struct GetRecordHandler {
    service: Arc<ZohoCreatorService>,
}

impl GetRecordHandler {
    #[inline]
    pub fn new(service: Arc<ZohoCreatorService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "get-record".to_string(),
            description: Some("Get a single record by ID".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "form_name": {
                        "type": "string",
                        "description": "Link name of the form"
                    },
                    "record_id": {
                        "type": "string",
                        "description": "ID of the record"
                    }
                },
                "required": ["form_name", "record_id"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for GetRecordHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let parsed = required_str(&args, "form_name")
            .and_then(|form_name| Ok((form_name, required_id(&args, "record_id")?)));
        let (form_name, record_id) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };

        debug!("Getting record {} from {}", record_id, form_name);
        match self.service.get_record(form_name, &record_id) {
            Ok(record) => json_result(&json!(record)),
            Err(e) => Ok(failure("getting record", &e)),
        }
    }
}

/// create-record tool handler
pub struct CreateRecordHandler {
    service: Arc<ZohoCreatorService>,
}

impl CreateRecordHandler {
    #[inline]
    pub fn new(service: Arc<ZohoCreatorService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "create-record".to_string(),
            description: Some("Create a new record in a form".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "form_name": {
                        "type": "string",
                        "description": "Link name of the form"
                    },
                    "data": {
                        "type": "object",
                        "description": "Field values keyed by field API name"
                    }
                },
                "required": ["form_name", "data"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for CreateRecordHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let parsed = required_str(&args, "form_name")
            .and_then(|form_name| Ok((form_name, required_object(&args, "data")?)));
        let (form_name, data) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };

        debug!("Creating record in {}", form_name);
        match self.service.create_record(form_name, data) {
            Ok(record) => json_result(&json!({
                "message": "Record created successfully",
                "record_id": record.id,
                "created_time": record.created_time.to_rfc3339(),
            })),
            Err(e) => Ok(failure("creating record", &e)),
        }
    }
}

/// update-record tool handler
pub struct UpdateRecordHandler {
    service: Arc<ZohoCreatorService>,
}

impl UpdateRecordHandler {
    #[inline]
    pub fn new(service: Arc<ZohoCreatorService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "update-record".to_string(),
            description: Some("Update an existing record".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "form_name": {
                        "type": "string",
                        "description": "Link name of the form"
                    },
                    "record_id": {
                        "type": "string",
                        "description": "ID of the record"
                    },
                    "data": {
                        "type": "object",
                        "description": "Field values to change, keyed by field API name"
                    }
                },
                "required": ["form_name", "record_id", "data"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for UpdateRecordHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let parsed = required_str(&args, "form_name").and_then(|form_name| {
            Ok((
                form_name,
                required_id(&args, "record_id")?,
                required_object(&args, "data")?,
            ))
        });
        let (form_name, record_id, data) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };

        debug!("Updating record {} in {}", record_id, form_name);
        match self.service.update_record(form_name, &record_id, data) {
            Ok(record) => json_result(&json!({
                "message": "Record updated successfully",
                "record_id": record.id,
                "modified_time": record.modified_time.to_rfc3339(),
            })),
            Err(e) => Ok(failure("updating record", &e)),
        }
    }
}

/// Register every Zoho Creator tool on `server`
#[inline]
pub async fn register_zoho_tools(server: &McpServer, service: &Arc<ZohoCreatorService>) {
    server
        .register_tool(
            ListFormsHandler::tool_definition(),
            ListFormsHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            ListReportsHandler::tool_definition(),
            ListReportsHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            GetRecordsHandler::tool_definition(),
            GetRecordsHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            GetRecordHandler::tool_definition(),
            GetRecordHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            CreateRecordHandler::tool_definition(),
            CreateRecordHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            UpdateRecordHandler::tool_definition(),
            UpdateRecordHandler::new(Arc::clone(service)),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zoho::test_support::{mock_deployment, test_config};
    use wiremock::MockServer;

    async fn service() -> (MockServer, Arc<ZohoCreatorService>) {
        let server = mock_deployment().await;
        let service =
            ZohoCreatorService::new(&test_config(&server.uri())).expect("service builds");
        (server, Arc::new(service))
    }

    fn call(name: &str, arguments: Value) -> CallToolParams {
        CallToolParams {
            name: name.to_string(),
            arguments: serde_json::from_value(arguments).expect("arguments object"),
        }
    }

    fn text(result: &CallToolResult) -> &str {
        let ToolContent::Text { text } = &result.content[0];
        text
    }

    fn body(result: &CallToolResult) -> Value {
        serde_json::from_str(text(result)).expect("tool output is JSON")
    }

    #[test]
    fn tool_definitions() {
        let definitions = [
            ListFormsHandler::tool_definition(),
            ListReportsHandler::tool_definition(),
            GetRecordsHandler::tool_definition(),
            GetRecordHandler::tool_definition(),
            CreateRecordHandler::tool_definition(),
            UpdateRecordHandler::tool_definition(),
        ];

        for tool in &definitions {
            assert_eq!(tool.input_schema["type"], "object");
            assert!(tool.description.is_some());
        }
        assert_eq!(
            definitions[5].input_schema["required"],
            json!(["form_name", "record_id", "data"])
        );
    }

    #[tokio::test]
    async fn register_all_tools() {
        let (_server, service) = service().await;
        let mcp = McpServer::new("test".to_string(), "0.0.0".to_string());

        register_zoho_tools(&mcp, &service).await;

        assert_eq!(
            mcp.tool_names().await,
            [
                "create-record",
                "get-record",
                "get-records",
                "list-forms",
                "list-reports",
                "update-record"
            ]
        );
    }

    #[tokio::test]
    async fn list_forms_and_reports() {
        let (_server, service) = service().await;

        let result = ListFormsHandler::new(Arc::clone(&service))
            .handle(call("list-forms", json!({"force_refresh": true})))
            .await
            .expect("handler runs");
        assert_eq!(result.is_error, Some(false));
        assert_eq!(body(&result)["forms"][0]["link_name"], "test_form");

        let result = ListReportsHandler::new(service)
            .handle(call("list-reports", json!({})))
            .await
            .expect("handler runs");
        assert_eq!(body(&result)["reports"][0]["link_name"], "All_Tests");
    }

    #[tokio::test]
    async fn get_records_and_record() {
        let (_server, service) = service().await;

        let result = GetRecordsHandler::new(Arc::clone(&service))
            .handle(call("get-records", json!({"form_name": "test_form", "limit": 10})))
            .await
            .expect("handler runs");
        let records = body(&result);
        assert_eq!(records["count"], 1);
        assert_eq!(records["records"][0]["data"]["test_field"], "test_value");

        let result = GetRecordHandler::new(service)
            .handle(call("get-record", json!({"form_name": "test_form", "record_id": 123})))
            .await
            .expect("handler runs");
        assert_eq!(body(&result)["id"], "123");
    }

    #[tokio::test]
    async fn create_and_update_record() {
        let (_server, service) = service().await;

        let result = CreateRecordHandler::new(Arc::clone(&service))
            .handle(call(
                "create-record",
                json!({"form_name": "test_form", "data": {"test_field": "new"}}),
            ))
            .await
            .expect("handler runs");
        let created = body(&result);
        assert_eq!(created["message"], "Record created successfully");
        assert_eq!(created["record_id"], "123");
        assert!(created["created_time"].as_str().is_some_and(|t| t.starts_with("2024-01-01")));

        let result = UpdateRecordHandler::new(service)
            .handle(call(
                "update-record",
                json!({"form_name": "test_form", "record_id": "123", "data": {"test_field": "x"}}),
            ))
            .await
            .expect("handler runs");
        let updated = body(&result);
        assert_eq!(updated["message"], "Record updated successfully");
        assert_eq!(updated["record_id"], "123");
        assert!(updated["modified_time"].as_str().is_some_and(|t| t.starts_with("2024-02-01")));
    }

    #[tokio::test]
    async fn missing_arguments_are_tool_errors() {
        let (_server, service) = service().await;

        let result = GetRecordsHandler::new(Arc::clone(&service))
            .handle(call("get-records", json!({})))
            .await
            .expect("handler runs");
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).contains("form_name"));

        let result = UpdateRecordHandler::new(Arc::clone(&service))
            .handle(call(
                "update-record",
                json!({"form_name": "test_form", "record_id": "123"}),
            ))
            .await
            .expect("handler runs");
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).contains("data"));

        let result = CreateRecordHandler::new(service)
            .handle(call(
                "create-record",
                json!({"form_name": "test_form", "data": "not an object"}),
            ))
            .await
            .expect("handler runs");
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn api_failures_are_tool_errors() {
        let (_server, service) = service().await;

        let result = GetRecordHandler::new(service)
            .handle(call(
                "get-record",
                json!({"form_name": "test_form", "record_id": "999"}),
            ))
            .await
            .expect("handler runs");
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).starts_with("Error getting record"));
    }
}
