//! Turns a tool invocation into an upstream HTTP call

use super::client::OpenApiError;
use super::tools::{OperationTool, BODY_ARGUMENT};
use super::types::{HttpMethod, ParameterLocation};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

/// Fully resolved request, ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Upstream response as returned to the MCP client
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `HTTP <status>` followed by the body, pretty-printed when it is JSON
    pub fn to_text(&self) -> String {
        let body = serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok())
            .unwrap_or_else(|| self.body.clone());

        if body.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            format!("HTTP {}\n\n{}", self.status, body)
        }
    }
}

/// Build the upstream request for `tool` from the caller's arguments.
///
/// Each parameter is read from its tool argument (which may carry a suffix
/// when the API name collides) and sent under its API name.
pub fn prepare_request(
    tool: &OperationTool,
    base_url: &Url,
    arguments: &Map<String, Value>,
) -> Result<PreparedRequest, OpenApiError> {
    let mut url = base_url.clone();

    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            OpenApiError::InvalidArgument(format!("base URL {} cannot carry a path", base_url))
        })?;
        segments.pop_if_empty();
        for segment in tool.path.split('/').filter(|s| !s.is_empty()) {
            segments.push(&fill_segment(tool, segment, arguments)?);
        }
    }

    let mut headers = Vec::new();
    let mut query: Vec<(String, String)> = Vec::new();

    for tool_param in &tool.parameters {
        let param = &tool_param.parameter;
        let value = arguments.get(&tool_param.argument).filter(|v| !v.is_null());
        match (param.location, value) {
            (ParameterLocation::Path, _) => {}
            (ParameterLocation::Query, Some(Value::Array(items))) => {
                query.extend(items.iter().map(|item| (param.name.clone(), render(item))));
            }
            (ParameterLocation::Query, Some(value)) => {
                query.push((param.name.clone(), render(value)));
            }
            (ParameterLocation::Header, Some(value)) => {
                headers.push((param.name.clone(), render(value)));
            }
            (_, None) if param.required => {
                return Err(OpenApiError::MissingArgument(tool_param.argument.clone()));
            }
            _ => {}
        }
    }

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    let body = if tool.has_body {
        arguments.get(BODY_ARGUMENT).filter(|v| !v.is_null()).cloned()
    } else {
        None
    };
    if tool.body_required && body.is_none() {
        return Err(OpenApiError::MissingArgument(BODY_ARGUMENT.to_string()));
    }

    Ok(PreparedRequest {
        method: tool.method,
        url,
        headers,
        body,
    })
}

/// Send a prepared request, forwarding the caller's Authorization header
pub async fn execute(
    http_client: &reqwest::Client,
    request: PreparedRequest,
    authorization: Option<&str>,
) -> Result<ApiResponse, OpenApiError> {
    info!(method = %request.method, url = %request.url, "Calling upstream API");

    let mut builder = http_client.request(request.method.into(), request.url);

    for (name, value) in &request.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| OpenApiError::InvalidArgument(format!("header {}: {}", name, e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| OpenApiError::InvalidArgument(format!("header {}: {}", name, e)))?;
        builder = builder.header(header_name, header_value);
    }

    if let Some(authorization) = authorization {
        builder = builder.header(AUTHORIZATION, authorization);
    }

    if let Some(body) = &request.body {
        builder = builder.json(body);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;

    debug!(status = status, bytes = body.len(), "Upstream API responded");

    Ok(ApiResponse { status, body })
}

/// Replace every `{name}` in one path segment with its argument
fn fill_segment(
    tool: &OperationTool,
    segment: &str,
    arguments: &Map<String, Value>,
) -> Result<String, OpenApiError> {
    let mut filled = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let argument = tool.path_argument(&rest[start + 1..start + len]);
        let value = arguments
            .get(argument)
            .filter(|v| !v.is_null())
            .ok_or_else(|| OpenApiError::MissingArgument(argument.to_string()))?;

        filled.push_str(&rest[..start]);
        filled.push_str(&render(value));
        rest = &rest[start + len + 1..];
    }

    filled.push_str(rest);
    Ok(filled)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
