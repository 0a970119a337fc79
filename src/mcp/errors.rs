//! Failures the protocol layer reports back to the client.
//!
//! Every [`McpError`] maps onto one JSON-RPC error code; anything else that
//! escapes a handler is reported as an internal error.

use crate::mcp::protocol::*;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unsupported protocol version: {version}. Supported: {}", supported.join(", "))]
    UnsupportedProtocolVersion {
        version: String,
        supported: Vec<String>,
    },

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    /// The resource exists but Zoho could not be read
    #[error("Resource '{uri}' access failed: {message}")]
    ResourceAccessFailed { uri: String, message: String },

    #[error("Server not initialized. Send initialize request first.")]
    ServerNotInitialized,

    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("{message}")]
    InternalError { message: String },

    #[error("{message}")]
    ParseError { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("{message}")]
    InvalidParameters { message: String },
}

impl McpError {
    #[inline]
    pub fn code(&self) -> i32 {
        match self {
            Self::UnsupportedProtocolVersion { .. } => mcp_error_codes::INVALID_PROTOCOL_VERSION,
            Self::ToolNotFound { .. } => mcp_error_codes::TOOL_NOT_FOUND,
            Self::ResourceNotFound { .. } => mcp_error_codes::RESOURCE_NOT_FOUND,
            Self::ResourceAccessFailed { .. } | Self::InternalError { .. } => {
                error_codes::INTERNAL_ERROR
            }
            Self::ServerNotInitialized | Self::InvalidRequest { .. } => {
                error_codes::INVALID_REQUEST
            }
            Self::ParseError { .. } => error_codes::PARSE_ERROR,
            Self::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            Self::InvalidParameters { .. } => error_codes::INVALID_PARAMS,
        }
    }

    /// True when the server, not the client, is at fault
    #[inline]
    pub fn is_server_fault(&self) -> bool {
        self.code() == error_codes::INTERNAL_ERROR
    }

    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        JsonRpcError::new(self.code(), self.to_string(), None)
    }

    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(self.to_jsonrpc_error(), id))
    }
}

/// Turns handler failures into error responses
pub struct ErrorHandler;

impl ErrorHandler {
    #[inline]
    pub fn handle_error(error: &anyhow::Error, id: Option<RequestId>) -> JsonRpcMessage {
        if let Some(mcp_error) = error.downcast_ref::<McpError>() {
            if mcp_error.is_server_fault() {
                error!("Request failed: {}", mcp_error);
            } else {
                warn!("Rejected request: {}", mcp_error);
            }
            return mcp_error.to_error_response(id);
        }

        error!("Unexpected error: {:#}", error);
        McpError::InternalError {
            message: format!("{:#}", error),
        }
        .to_error_response(id)
    }
}

pub type McpResult<T> = Result<T, McpError>;

impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::ParseError {
            message: error.to_string(),
        }
    }
}
