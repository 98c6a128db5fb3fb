//! Translation of OpenAPI operations into MCP tool definitions

use super::types::{HttpMethod, OpenApiDocument, Operation, Parameter, ParameterLocation, PathItem};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Longest tool name most MCP clients accept
const MAX_TOOL_NAME_LEN: usize = 64;

/// Argument that selects the target environment
pub const ENVIRONMENT_ARGUMENT: &str = "environment";

/// Argument carrying the request body
pub const BODY_ARGUMENT: &str = "body";

/// An API parameter and the tool argument it is read from.
///
/// `argument` differs from `parameter.name` when the name clashes with a
/// reserved argument or with another parameter (`environment` becomes
/// `environment_2`).
#[derive(Debug, Clone)]
pub struct ToolParameter {
    pub argument: String,
    pub parameter: Parameter,
}

/// One invocable API operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationTool {
    pub name: String,
    pub description: String,
    pub method: HttpMethod,
    /// Path template, e.g. `/pets/{petId}`
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip)]
    pub parameters: Vec<ToolParameter>,
    #[serde(skip)]
    pub has_body: bool,
    #[serde(skip)]
    pub body_required: bool,
    #[serde(skip)]
    pub input_schema: Value,
}

impl OperationTool {
    /// Argument name of the path parameter `name`
    pub fn path_argument<'a>(&'a self, name: &'a str) -> &'a str {
        self.parameters
            .iter()
            .find(|p| p.parameter.location == ParameterLocation::Path && p.parameter.name == name)
            .map(|p| p.argument.as_str())
            .unwrap_or(name)
    }
}

/// Every operation in `doc`, in path order then method order.
///
/// `environments` feeds the enum of the optional `environment` argument.
/// Operations whose name would equal one of `reserved` get a numeric suffix.
pub fn build_tools(
    doc: &OpenApiDocument,
    environments: &[String],
    reserved: &[&str],
) -> Vec<OperationTool> {
    let mut used: HashSet<String> = reserved.iter().map(|n| n.to_string()).collect();
    let mut tools = Vec::new();

    for (path, item) in &doc.paths {
        for (method, operation) in item.operations() {
            let name = unique_name(tool_name(operation, method, path), &mut used);
            tools.push(build_tool(doc, name, method, path, item, operation, environments));
        }
    }

    tools
}

fn build_tool(
    doc: &OpenApiDocument,
    name: String,
    method: HttpMethod,
    path: &str,
    item: &PathItem,
    operation: &Operation,
    environments: &[String],
) -> OperationTool {
    let request_body = operation
        .request_body
        .as_ref()
        .and_then(|b| doc.resolve_request_body(b));

    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut arguments: HashSet<String> = [ENVIRONMENT_ARGUMENT, BODY_ARGUMENT]
        .iter()
        .map(|n| n.to_string())
        .collect();

    let mut parameters = Vec::new();
    for param in merged_parameters(doc, item, operation) {
        let argument = unique_name(param.name.clone(), &mut arguments);

        let mut schema = doc.resolve(&param.value_schema());
        if let Value::Object(map) = &mut schema {
            let description = match (&param.description, argument != param.name) {
                (Some(d), true) => Some(format!("{} (API parameter '{}')", d, param.name)),
                (None, true) => Some(format!("API parameter '{}'", param.name)),
                (Some(d), false) => Some(d.clone()),
                (None, false) => None,
            };
            if let Some(description) = description {
                map.entry("description")
                    .or_insert_with(|| Value::String(description));
            }
        }
        properties.insert(argument.clone(), schema);
        if param.required || param.location == ParameterLocation::Path {
            required.push(Value::String(argument.clone()));
        }

        parameters.push(ToolParameter {
            argument,
            parameter: param,
        });
    }

    // Swagger 2.0 carries the body as a parameter
    let body_parameter = operation
        .parameters
        .iter()
        .chain(item.parameters.iter())
        .filter_map(|p| doc.resolve_parameter(p))
        .find(|p| p.location == ParameterLocation::Body);

    let (body_schema, body_required) = match (&request_body, &body_parameter) {
        (Some(body), _) => (body.schema().map(|s| doc.resolve(s)), body.required),
        (None, Some(param)) => (Some(doc.resolve(&param.value_schema())), param.required),
        (None, None) => (None, false),
    };
    let has_body = body_schema.is_some();

    if let Some(schema) = body_schema {
        properties.insert(BODY_ARGUMENT.to_string(), schema);
        if body_required {
            required.push(Value::String(BODY_ARGUMENT.to_string()));
        }
    }

    if !environments.is_empty() {
        properties.insert(
            ENVIRONMENT_ARGUMENT.to_string(),
            json!({
                "type": "string",
                "enum": environments,
                "description": "Target environment (defaults to the server's default environment)"
            }),
        );
    }

    let input_schema = json!({
        "type": "object",
        "properties": properties,
        "required": required,
    });

    OperationTool {
        name,
        description: describe(operation, method, path),
        method,
        path: path.to_string(),
        summary: operation.summary.clone(),
        parameters,
        has_body,
        body_required: has_body && body_required,
        input_schema,
    }
}

/// Path-item parameters overridden by operation parameters with the same name and location
fn merged_parameters(doc: &OpenApiDocument, item: &PathItem, operation: &Operation) -> Vec<Parameter> {
    let mut merged: Vec<Parameter> = Vec::new();
    let resolved = item
        .parameters
        .iter()
        .chain(operation.parameters.iter())
        .filter_map(|p| doc.resolve_parameter(p));

    for param in resolved {
        if matches!(
            param.location,
            ParameterLocation::Body | ParameterLocation::FormData | ParameterLocation::Cookie
        ) {
            continue;
        }
        match merged
            .iter_mut()
            .find(|p| p.name == param.name && p.location == param.location)
        {
            Some(existing) => *existing = param,
            None => merged.push(param),
        }
    }

    merged
}

fn describe(operation: &Operation, method: HttpMethod, path: &str) -> String {
    let endpoint = format!("{} {}", method, path);
    let text = operation
        .summary
        .as_deref()
        .or(operation.description.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let mut description = match text {
        Some(t) => format!("{} ({})", t, endpoint),
        None => endpoint,
    };
    if operation.deprecated {
        description.push_str(" [deprecated]");
    }
    description
}

fn tool_name(operation: &Operation, method: HttpMethod, path: &str) -> String {
    let raw = match operation.operation_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("{}_{}", method.as_str().to_lowercase(), path),
    };
    sanitize(&raw)
}

fn sanitize(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && name.ends_with('_') {
            continue;
        }
        name.push(c);
    }

    let mut name = name.trim_matches('_').to_string();
    name.truncate(MAX_TOOL_NAME_LEN);
    if name.is_empty() {
        name.push_str("operation");
    }
    name
}

fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }

    let mut n = 2;
    loop {
        let suffix = format!("_{}", n);
        let mut candidate = base.clone();
        candidate.truncate(MAX_TOOL_NAME_LEN - suffix.len());
        candidate.push_str(&suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
