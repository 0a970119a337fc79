//! MCP Message Validation
//!
//! Structural checks on raw JSON-RPC messages before they are dispatched,
//! plus protocol version negotiation.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use serde_json::Value;
use tracing::debug;

/// Validator for incoming MCP messages
#[derive(Debug, Clone)]
pub struct McpValidator {
    supported_versions: Vec<String>,
}

impl McpValidator {
    #[inline]
    pub fn new() -> Self {
        Self {
            supported_versions: SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Validate the JSON-RPC envelope and parse it into a message
    #[inline]
    pub fn validate_raw_message(&self, raw: &Value) -> McpResult<JsonRpcMessage> {
        Self::validate_envelope(raw)?;

        let message: JsonRpcMessage =
            serde_json::from_value(raw.clone()).map_err(|e| McpError::InvalidRequest {
                message: format!("Malformed JSON-RPC message: {}", e),
            })?;

        debug!("Validated incoming message");
        Ok(message)
    }

    fn validate_envelope(raw: &Value) -> McpResult<()> {
        let object = raw.as_object().ok_or_else(|| invalid("Message must be a JSON object"))?;

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(invalid("jsonrpc must be \"2.0\""));
        }

        if let Some(method) = object.get("method") {
            if !method.is_string() {
                return Err(invalid("method must be a string"));
            }
        }

        match object.get("id") {
            None | Some(Value::String(_)) => {}
            Some(Value::Number(n)) if n.is_i64() => {}
            Some(Value::Null) if object.contains_key("error") => {}
            Some(_) => return Err(invalid("id must be a string or an integer")),
        }

        if let Some(error) = object.get("error") {
            let has_code = error.get("code").is_some_and(Value::is_i64);
            let has_message = error.get("message").is_some_and(Value::is_string);
            if !has_code || !has_message {
                return Err(invalid("error must carry an integer code and a string message"));
            }
        }

        let has_method = object.contains_key("method");
        let has_result = object.contains_key("result") || object.contains_key("error");
        if has_method == has_result {
            return Err(invalid(
                "Message must be a request, notification or response",
            ));
        }

        if has_result && !object.contains_key("id") {
            return Err(invalid("Responses must carry an id"));
        }

        Ok(())
    }

    #[inline]
    pub fn is_protocol_version_supported(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }

    #[inline]
    pub fn supported_protocol_versions(&self) -> &[String] {
        &self.supported_versions
    }

    /// Parse initialize parameters and reject unknown protocol versions
    #[inline]
    pub fn validate_initialize_params(&self, params: Option<Value>) -> McpResult<InitializeParams> {
        let params = params.ok_or_else(|| McpError::InvalidParameters {
            message: "Initialize request missing parameters".to_string(),
        })?;

        let params: InitializeParams =
            serde_json::from_value(params).map_err(|e| McpError::InvalidParameters {
                message: format!("Invalid initialize parameters: {}", e),
            })?;

        if !self.is_protocol_version_supported(&params.protocol_version) {
            return Err(McpError::UnsupportedProtocolVersion {
                version: params.protocol_version,
                supported: self.supported_versions.clone(),
            });
        }

        Ok(params)
    }
}

impl Default for McpValidator {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(message: &str) -> McpError {
    McpError::InvalidRequest {
        message: message.to_string(),
    }
}
