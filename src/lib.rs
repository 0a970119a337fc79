use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZohoError>;

#[derive(Error, Debug)]
pub enum ZohoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Zoho API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for ZohoError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

impl From<config::ConfigError> for ZohoError {
    #[inline]
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod mcp;
pub mod zoho;

/// Name reported to MCP clients and used for the console entry point
pub const SERVER_NAME: &str = "scaflog-zoho-mcp-server";

/// Crate version reported to MCP clients
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
