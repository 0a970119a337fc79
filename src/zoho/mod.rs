//! Zoho Creator API access
//!
//! OAuth token handling, the blocking HTTP client and the
//! [`ZohoCreatorService`] that the MCP handlers call into.

pub mod auth;
pub mod client;
pub mod models;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::ZohoAuth;
pub use client::ApiClient;
pub use models::{FormCache, ZohoField, ZohoForm, ZohoRecord, ZohoReport};
pub use service::ZohoCreatorService;
