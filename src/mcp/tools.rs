use super::protocol::Tool;
use crate::config::EnvironmentRegistry;
use crate::openapi::OperationTool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const LIST_ENVIRONMENTS: &str = "list_environments";
pub const LIST_OPERATIONS: &str = "list_operations";

/// Names API operations may not take
pub const BUILTIN_NAMES: &[&str] = &[LIST_ENVIRONMENTS, LIST_OPERATIONS];

/// Parameters for list_environments
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListEnvironmentsParams {}

/// Parameters for list_operations
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListOperationsParams {
    /// Environment whose API operations to list; defaults to the default environment
    #[serde(default)]
    pub environment: Option<String>,
}

/// One configured environment in the list_environments response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub name: String,
    pub spec_url: String,
    pub is_default: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvironmentsResponse {
    pub environments: Vec<EnvironmentInfo>,
    pub default_environment: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl From<&OperationTool> for OperationInfo {
    fn from(tool: &OperationTool) -> Self {
        OperationInfo {
            name: tool.name.clone(),
            method: tool.method.to_string(),
            path: tool.path.clone(),
            summary: tool.summary.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListOperationsResponse {
    pub environment: String,
    pub operations: Vec<OperationInfo>,
    pub count: usize,
}

/// Tools that exist regardless of any spec document
pub fn builtin_tools(registry: &EnvironmentRegistry) -> Vec<Tool> {
    let mut list_operations_schema = schema_of::<ListOperationsParams>();
    if let Some(property) = list_operations_schema
        .pointer_mut("/properties/environment")
        .and_then(Value::as_object_mut)
    {
        property.insert("enum".to_string(), json!(registry.environments()));
    }

    vec![
        Tool {
            name: LIST_ENVIRONMENTS.to_string(),
            description: "List the configured API environments, their OpenAPI spec URLs and the default environment".to_string(),
            input_schema: schema_of::<ListEnvironmentsParams>(),
        },
        Tool {
            name: LIST_OPERATIONS.to_string(),
            description: "List the API operations available as tools in an environment".to_string(),
            input_schema: list_operations_schema,
        },
    ]
}

pub fn list_environments(registry: &EnvironmentRegistry) -> ListEnvironmentsResponse {
    let environments = registry
        .environments()
        .iter()
        .filter_map(|name| {
            registry.get(name).map(|config| EnvironmentInfo {
                name: name.clone(),
                spec_url: config.spec_url.clone(),
                is_default: name == registry.default_environment(),
            })
        })
        .collect();

    ListEnvironmentsResponse {
        environments,
        default_environment: registry.default_environment().to_string(),
    }
}

pub fn list_operations(environment: &str, tools: &[OperationTool]) -> ListOperationsResponse {
    let operations: Vec<OperationInfo> = tools.iter().map(OperationInfo::from).collect();
    ListOperationsResponse {
        environment: environment.to_string(),
        count: operations.len(),
        operations,
    }
}

/// MCP tool definition for an API operation
impl From<&OperationTool> for Tool {
    fn from(tool: &OperationTool) -> Self {
        Tool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
        }
    }
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({ "type": "object" }))
}
