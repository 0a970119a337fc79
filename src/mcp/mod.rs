//! Model Context Protocol front end.
//!
//! The generic server lives in [`server`]; [`tools`] and [`resources`] plug
//! the Zoho Creator service into it.


pub mod errors;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;
pub mod validation;

pub use errors::{ErrorHandler, McpError, McpResult};
pub use resources::{ResourceUri, ZohoResources};
pub use server::{ConnectionState, McpServer, ResourceProvider, ToolHandler};
pub use tools::register_zoho_tools;
pub use validation::McpValidator;
