//! MCP Protocol Method Handlers for JSON-RPC 2.0
//!
//! Implements handlers for MCP methods:
//! - initialize: Handshake and capability negotiation
//! - ping: Liveness check
//! - tools/list: Built-in tools plus the default environment's API operations
//! - tools/call: Execute a built-in tool or an API operation

use super::protocol::*;
use super::tools::{self as builtin, ListOperationsParams};
use crate::config::Config;
use crate::openapi::{self, OpenApiDocument, OpenApiError, OperationTool, SpecClient};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

/// Dispatches JSON-RPC requests to MCP method handlers
pub struct McpHandler {
    config: Arc<Config>,
    spec_client: SpecClient,
}

impl McpHandler {
    pub fn new(config: Arc<Config>) -> Result<Self, OpenApiError> {
        let spec_client =
            SpecClient::new(config.tls, config.request_timeout, config.spec_cache_ttl)?;
        Ok(Self {
            config,
            spec_client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle one request; notifications produce no response.
    ///
    /// `authorization` is the caller's Authorization header, forwarded to
    /// upstream API calls.
    pub async fn handle(
        &self,
        req: &JsonRpcRequest,
        authorization: Option<&str>,
    ) -> Option<JsonRpcResponse> {
        if let Err(message) = req.validate() {
            warn!(error = %message, "Invalid JSON-RPC request");
            return Some(JsonRpcResponse::error(
                JsonRpcError::invalid_request(message),
                req.id.clone(),
            ));
        }

        if req.is_notification() {
            info!(method = %req.method, "Received notification");
            return None;
        }

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => JsonRpcResponse::success(json!({}), req.id.clone()),
            "tools/list" => self.handle_tools_list(req).await,
            "tools/call" => self.handle_tools_call(req, authorization).await,
            method => {
                warn!(method = %method, "Unknown method requested");
                JsonRpcResponse::error(JsonRpcError::method_not_found(method), req.id.clone())
            }
        };

        Some(response)
    }

    fn handle_initialize(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let params: InitializeParams = req
            .params
            .clone()
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        info!(
            client = %params.client_info.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
            "Handling initialize request"
        );

        let registry = &self.config.registry;
        let result = InitializeResult {
            protocol_version: params
                .protocol_version
                .unwrap_or_else(|| PROTOCOL_VERSION.to_string()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: Implementation {
                name: self.config.server.name.clone(),
                version: Some(self.config.server.version.clone()),
            },
            instructions: Some(format!(
                "Exposes OpenAPI operations as tools. Environments: {} (default: {}). Pass an `environment` argument to target another environment.",
                registry.environments().join(", "),
                registry.default_environment()
            )),
        };

        to_response(&result, req.id.clone())
    }

    async fn handle_tools_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let default = self.config.registry.default_environment().to_string();
        let mut tools = builtin::builtin_tools(&self.config.registry);

        match self.operation_tools(&default).await {
            Ok(operations) => {
                tools.extend(operations.iter().map(Tool::from));
            }
            Err(e) => {
                warn!(environment = %default, error = %e, "Listing built-in tools only");
            }
        }

        info!(count = tools.len(), "Handling tools/list request");
        to_response(&ToolsListResult { tools }, req.id.clone())
    }

    async fn handle_tools_call(
        &self,
        req: &JsonRpcRequest,
        authorization: Option<&str>,
    ) -> JsonRpcResponse {
        let params = match req.params.as_ref() {
            Some(params) => params,
            None => {
                warn!("tools/call missing params field");
                return JsonRpcResponse::error(
                    JsonRpcError::invalid_params("params field is required for tools/call"),
                    req.id.clone(),
                );
            }
        };

        let call = match serde_json::from_value::<ToolCallParams>(params.clone()) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to parse tool call params: {}", e);
                return JsonRpcResponse::error(
                    JsonRpcError::invalid_params(format!("Invalid tool call params: {}", e)),
                    req.id.clone(),
                );
            }
        };

        let arguments = match call.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return JsonRpcResponse::error(
                    JsonRpcError::invalid_params("arguments must be an object"),
                    req.id.clone(),
                );
            }
        };

        info!(tool_name = %call.name, "Executing tool");

        let outcome = match call.name.as_str() {
            builtin::LIST_ENVIRONMENTS => {
                let response = builtin::list_environments(&self.config.registry);
                Ok(json_text(&response))
            }
            builtin::LIST_OPERATIONS => self.call_list_operations(arguments).await,
            name => self.call_operation(name, &arguments, authorization).await,
        };

        match outcome {
            Ok(result) => to_response(&result, req.id.clone()),
            Err(e) => {
                let error = match &e {
                    OpenApiError::UnknownEnvironment(_)
                    | OpenApiError::UnknownOperation { .. }
                    | OpenApiError::MissingArgument(_)
                    | OpenApiError::InvalidArgument(_) => {
                        warn!(tool_name = %call.name, error = %e, "Rejected tool call");
                        JsonRpcError::invalid_params(e.to_string())
                    }
                    _ => {
                        error!(tool_name = %call.name, error = %e, "Tool call failed");
                        JsonRpcError::internal_error(e.to_string())
                    }
                };
                JsonRpcResponse::error(error, req.id.clone())
            }
        }
    }

    async fn call_list_operations(
        &self,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, OpenApiError> {
        let params: ListOperationsParams = serde_json::from_value(Value::Object(arguments))
            .map_err(|e| OpenApiError::InvalidArgument(e.to_string()))?;
        let environment = self.target_environment(params.environment.as_deref())?;
        let tools = self.operation_tools(&environment).await?;

        Ok(json_text(&builtin::list_operations(&environment, &tools)))
    }

    async fn call_operation(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        authorization: Option<&str>,
    ) -> Result<ToolCallResult, OpenApiError> {
        let requested = match arguments.get(openapi::ENVIRONMENT_ARGUMENT) {
            None | Some(Value::Null) => None,
            Some(Value::String(env)) => Some(env.as_str()),
            Some(_) => {
                return Err(OpenApiError::InvalidArgument(
                    "environment must be a string".to_string(),
                ))
            }
        };
        let environment = self.target_environment(requested)?;
        let spec_url = self.spec_url(&environment)?;

        let mut document = self.spec_client.fetch(&spec_url).await?;
        let mut tools = self.tools_for(&document);

        // The cached document may predate the operation the client saw
        if !tools.iter().any(|t| t.name == name) {
            info!(tool_name = %name, environment = %environment, "Operation not in cached spec, refetching");
            self.spec_client.invalidate(&spec_url);
            document = self.spec_client.fetch(&spec_url).await?;
            tools = self.tools_for(&document);
        }

        let tool = tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| OpenApiError::UnknownOperation {
                environment: environment.clone(),
                name: name.to_string(),
            })?;

        let base_url = document.base_url(&Url::parse(&spec_url)?)?;
        let request = openapi::prepare_request(tool, &base_url, arguments)?;
        let response =
            openapi::execute(self.spec_client.http_client(), request, authorization).await?;

        info!(
            tool_name = %name,
            environment = %environment,
            status = response.status,
            "Operation completed"
        );

        let text = response.to_text();
        Ok(if response.is_success() {
            ToolCallResult::text(text)
        } else {
            ToolCallResult::error_text(text)
        })
    }

    async fn operation_tools(&self, environment: &str) -> Result<Vec<OperationTool>, OpenApiError> {
        let spec_url = self.spec_url(environment)?;
        let document = self.spec_client.fetch(&spec_url).await?;
        Ok(self.tools_for(&document))
    }

    fn tools_for(&self, document: &OpenApiDocument) -> Vec<OperationTool> {
        openapi::build_tools(
            document,
            self.config.registry.environments(),
            builtin::BUILTIN_NAMES,
        )
    }

    fn target_environment(&self, requested: Option<&str>) -> Result<String, OpenApiError> {
        let registry = &self.config.registry;
        let name = requested
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| registry.default_environment());

        if registry.contains(name) {
            Ok(name.to_string())
        } else {
            Err(OpenApiError::UnknownEnvironment(name.to_string()))
        }
    }

    fn spec_url(&self, environment: &str) -> Result<String, OpenApiError> {
        self.config
            .registry
            .get(environment)
            .map(|c| c.spec_url.clone())
            .ok_or_else(|| OpenApiError::UnknownEnvironment(environment.to_string()))
    }
}

fn json_text<T: serde::Serialize>(value: &T) -> ToolCallResult {
    ToolCallResult::text(serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string()))
}

fn to_response<T: serde::Serialize>(result: &T, id: Option<Value>) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(value, id),
        Err(e) => JsonRpcResponse::error(JsonRpcError::internal_error(e.to_string()), id),
    }
}
