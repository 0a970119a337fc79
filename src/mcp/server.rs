//! Line-delimited JSON-RPC server loop.
//!
//! Reads one message per line, tracks the initialization handshake and routes
//! requests to registered tools or the resource provider.

use crate::ZohoError;
use crate::mcp::errors::{ErrorHandler, McpError};
use crate::mcp::protocol::*;
use crate::mcp::validation::McpValidator;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// MCP Server state and configuration
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Registered tools
    pub tools: Arc<RwLock<HashMap<String, Tool>>>,
    /// Tool handlers
    pub tool_handlers: Arc<RwLock<HashMap<String, Box<dyn ToolHandler>>>>,
    /// Source of the resources exposed to clients
    pub resource_provider: Arc<RwLock<Option<Box<dyn ResourceProvider>>>>,
    /// Connection state
    pub connection_state: Arc<RwLock<ConnectionState>>,
    /// Message validator
    pub validator: Arc<McpValidator>,
    instructions: Option<String>,
    started_at: Instant,
}

/// Connection state tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Server health status for monitoring
#[derive(Debug, Clone)]
pub struct ServerHealthStatus {
    pub connection_state: ConnectionState,
    pub tools_registered: usize,
    pub has_resource_provider: bool,
    pub uptime: Duration,
}

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

/// Resource provider trait; resources are listed dynamically rather than registered
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list(&self) -> Result<Vec<Resource>>;

    fn templates(&self) -> Vec<ResourceTemplate>;

    async fn read(&self, uri: &str) -> Result<ResourceContents>;
}

/// Message handler for processing incoming messages
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl McpServer {
    /// Create a new MCP server
    #[inline]
    pub fn new(name: String, version: String) -> Self {
        let server_info = Implementation { name, version };

        let capabilities = ServerCapabilities {
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        Self {
            server_info,
            capabilities,
            tools: Arc::new(RwLock::new(HashMap::new())),
            tool_handlers: Arc::new(RwLock::new(HashMap::new())),
            resource_provider: Arc::new(RwLock::new(None)),
            connection_state: Arc::new(RwLock::new(ConnectionState::Uninitialized)),
            validator: Arc::new(McpValidator::new()),
            instructions: None,
            started_at: Instant::now(),
        }
    }

    /// Instructions returned to the client on initialize
    #[inline]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool with the server
    #[inline]
    pub async fn register_tool<H>(&self, tool: Tool, handler: H)
    where
        H: ToolHandler + 'static,
    {
        let tool_name = tool.name.clone();

        {
            let mut tools = self.tools.write().await;
            tools.insert(tool_name.clone(), tool);
        }

        {
            let mut handlers = self.tool_handlers.write().await;
            handlers.insert(tool_name.clone(), Box::new(handler));
        }

        debug!("Registered tool: {}", tool_name);
    }

    /// Install the resource provider, replacing any previous one
    #[inline]
    pub async fn set_resource_provider<P>(&self, provider: P)
    where
        P: ResourceProvider + 'static,
    {
        *self.resource_provider.write().await = Some(Box::new(provider));
        debug!("Registered resource provider");
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");

        let stdin = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        self.serve(stdin, &mut stdout).await
    }

    /// Process newline-delimited JSON-RPC messages until EOF
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    // First parse as raw JSON
                    let raw_value: Value = match serde_json::from_str(line) {
                        Ok(value) => value,
                        Err(e) => {
                            error!("Failed to parse JSON: {}", e);
                            let error_response =
                                JsonRpcErrorResponse::new(JsonRpcError::parse_error(), None);
                            self.send_message(
                                writer,
                                &JsonRpcMessage::ErrorResponse(error_response),
                            )
                            .await?;
                            continue;
                        }
                    };

                    // Validate and parse as MCP message
                    match self.validator.validate_raw_message(&raw_value) {
                        Ok(message) => {
                            let handler = MessageHandler::new(Arc::clone(&self));
                            if let Err(e) = handler.process_message(message, writer).await {
                                error!("Error processing message: {}", e);
                            }
                        }
                        Err(e) => {
                            error!("Message validation failed: {}", e);
                            let id = raw_value
                                .get("id")
                                .and_then(|id| serde_json::from_value(id.clone()).ok());
                            self.send_message(writer, &e.to_error_response(id)).await?;
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading from input: {}", e);
                    break;
                }
            }
        }

        // Update connection state
        {
            let mut state = self.connection_state.write().await;
            *state = ConnectionState::Closed;
        }

        info!("MCP server stopped");
        Ok(())
    }

    /// Send a message to the client
    async fn send_message<W>(&self, writer: &mut W, message: &JsonRpcMessage) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let json = serde_json::to_string(message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Get current connection state
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        self.connection_state.read().await.clone()
    }

    #[inline]
    pub async fn health_status(&self) -> ServerHealthStatus {
        ServerHealthStatus {
            connection_state: self.connection_state().await,
            tools_registered: self.tools.read().await.len(),
            has_resource_provider: self.resource_provider.read().await.is_some(),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Registered tool names in alphabetical order
    #[inline]
    pub async fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Clone for McpServer {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            server_info: self.server_info.clone(),
            capabilities: self.capabilities.clone(),
            tools: Arc::clone(&self.tools),
            tool_handlers: Arc::clone(&self.tool_handlers),
            resource_provider: Arc::clone(&self.resource_provider),
            connection_state: Arc::clone(&self.connection_state),
            validator: Arc::clone(&self.validator),
            instructions: self.instructions.clone(),
            started_at: self.started_at,
        }
    }
}

impl MessageHandler {
    /// Create a new message handler
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Process an incoming message
    #[inline]
    pub async fn process_message<W>(&self, message: JsonRpcMessage, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match message {
            JsonRpcMessage::Request(request) => self.handle_request(request, writer).await,
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                Ok(())
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                Ok(())
            }
        }
    }

    /// Handle a JSON-RPC request
    async fn handle_request<W>(&self, request: JsonRpcRequest, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        debug!("Handling request: {}", request.method);

        let response = self.dispatch(&request.method, request.params).await;

        let message = match response {
            Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::new(result, request.id)),
            Err(e) => {
                error!("Error handling request {}: {:#}", request.method, e);
                ErrorHandler::handle_error(&e, Some(request.id))
            }
        };

        self.server.send_message(writer, &message).await
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value> {
        match method {
            "initialize" => return self.handle_initialize(params).await,
            "ping" => return Ok(serde_json::json!({})),
            _ => {}
        }

        if self.server.connection_state().await == ConnectionState::Uninitialized {
            return Err(McpError::ServerNotInitialized.into());
        }

        match method {
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(params).await,
            "resources/list" => self.handle_list_resources().await,
            "resources/templates/list" => self.handle_list_resource_templates().await,
            "resources/read" => self.handle_read_resource(params).await,
            _ => Err(McpError::MethodNotFound {
                method: method.to_string(),
            }
            .into()),
        }
    }

    /// Handle a JSON-RPC notification
    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => self.handle_initialized().await,
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    /// Handle initialize request
    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params = self.server.validator.validate_initialize_params(params)?;

        // Update connection state
        {
            let mut state = self.server.connection_state.write().await;
            *state = ConnectionState::Initializing;
        }

        let result = InitializeResult {
            protocol_version: params.protocol_version.clone(),
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!(
            "Client initialized: {} {} (protocol {})",
            params.client_info.name, params.client_info.version, params.protocol_version
        );
        Ok(serde_json::to_value(result)?)
    }

    /// Handle initialized notification
    async fn handle_initialized(&self) {
        // Update connection state to ready
        {
            let mut state = self.server.connection_state.write().await;
            *state = ConnectionState::Ready;
        }

        info!("Server ready to handle requests");
    }

    /// Handle list tools request
    #[inline]
    pub async fn handle_list_tools(&self) -> Result<Value> {
        let tools = self.server.tools.read().await;
        let mut tools_vec: Vec<Tool> = tools.values().cloned().collect();
        tools_vec.sort_by(|a, b| a.name.cmp(&b.name));

        let result = ListToolsResult { tools: tools_vec };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request
    #[inline]
    pub async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = parse_params(params, "Tool call")?;

        let handlers = self.server.tool_handlers.read().await;
        let handler = handlers
            .get(&params.name)
            .ok_or_else(|| McpError::ToolNotFound {
                name: params.name.clone(),
            })?;

        debug!("Calling tool: {}", params.name);
        let result = handler.handle(params).await?;
        Ok(serde_json::to_value(result)?)
    }

    /// Handle list resources request
    async fn handle_list_resources(&self) -> Result<Value> {
        let provider = self.server.resource_provider.read().await;
        let resources = match provider.as_ref() {
            Some(provider) => provider.list().await?,
            None => Vec::new(),
        };

        let result = ListResourcesResult { resources };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle list resource templates request
    async fn handle_list_resource_templates(&self) -> Result<Value> {
        let provider = self.server.resource_provider.read().await;
        let resource_templates = provider
            .as_ref()
            .map(|provider| provider.templates())
            .unwrap_or_default();

        let result = ListResourceTemplatesResult { resource_templates };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle read resource request
    async fn handle_read_resource(&self, params: Option<Value>) -> Result<Value> {
        let params: ReadResourceParams = parse_params(params, "Read resource")?;

        let provider = self.server.resource_provider.read().await;
        let provider = provider.as_ref().ok_or_else(|| McpError::ResourceNotFound {
            uri: params.uri.clone(),
        })?;

        let contents = match provider.read(&params.uri).await {
            Ok(contents) => contents,
            Err(e) if e.downcast_ref::<McpError>().is_some() => return Err(e),
            Err(e) if matches!(e.downcast_ref::<ZohoError>(), Some(ZohoError::NotFound(_))) => {
                return Err(McpError::ResourceNotFound { uri: params.uri }.into());
            }
            Err(e) => {
                return Err(McpError::ResourceAccessFailed {
                    uri: params.uri,
                    message: format!("{:#}", e),
                }
                .into());
            }
        };

        let result = ReadResourceResult {
            contents: vec![contents],
        };
        Ok(serde_json::to_value(result)?)
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>, what: &str) -> Result<T> {
    let params = params.ok_or_else(|| McpError::InvalidParameters {
        message: format!("{} request missing parameters", what),
    })?;

    serde_json::from_value(params).map_err(|e| {
        McpError::InvalidParameters {
            message: format!("Invalid {} parameters: {}", what.to_lowercase(), e),
        }
        .into()
    })
}
