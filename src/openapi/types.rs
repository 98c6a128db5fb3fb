use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// Nesting limit when inlining `$ref`s; deeper references are left as-is
const MAX_REF_DEPTH: usize = 16;

/// OpenAPI 3.x / Swagger 2.0 document, reduced to what tool translation needs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenApiDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swagger: Option<String>,
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Swagger 2.0 host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Swagger 2.0 base path
    #[serde(default, rename = "basePath", skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,

    /// Whole document, kept for `$ref` lookups
    #[serde(skip)]
    raw: Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Server {
    pub url: String,
    #[serde(default)]
    pub variables: BTreeMap<String, ServerVariable>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerVariable {
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathItem {
    #[serde(default)]
    pub parameters: Vec<ParameterOrRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
}

impl PathItem {
    /// Operations in a fixed method order
    pub fn operations(&self) -> Vec<(HttpMethod, &Operation)> {
        [
            (HttpMethod::Get, &self.get),
            (HttpMethod::Put, &self.put),
            (HttpMethod::Post, &self.post),
            (HttpMethod::Delete, &self.delete),
            (HttpMethod::Patch, &self.patch),
            (HttpMethod::Head, &self.head),
            (HttpMethod::Options, &self.options),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterOrRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyOrRef>,
    #[serde(default)]
    pub deprecated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    /// Swagger 2.0 body parameter
    Body,
    /// Swagger 2.0 form parameter
    FormData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Swagger 2.0 inline type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
}

impl Parameter {
    /// JSON schema of the parameter value, including Swagger 2.0 inline types
    pub fn value_schema(&self) -> Value {
        if let Some(schema) = &self.schema {
            return schema.clone();
        }
        match &self.param_type {
            Some(t) => serde_json::json!({ "type": t }),
            None => serde_json::json!({ "type": "string" }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParameterOrRef {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Inline(Parameter),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestBody {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

impl RequestBody {
    /// Schema of the JSON body, or of the first declared media type
    pub fn schema(&self) -> Option<&Value> {
        self.content
            .get("application/json")
            .or_else(|| self.content.values().next())
            .and_then(|media| media.schema.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestBodyOrRef {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Inline(RequestBody),
}

impl OpenApiDocument {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut doc: OpenApiDocument = serde_json::from_value(value.clone())?;
        doc.raw = value;
        Ok(doc)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Look up a local JSON reference such as `#/components/schemas/Pet`
    pub fn lookup(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.raw.pointer(pointer)
    }

    /// Copy of `value` with local `$ref`s inlined
    pub fn resolve(&self, value: &Value) -> Value {
        self.resolve_at(value, 0)
    }

    fn resolve_at(&self, value: &Value, depth: usize) -> Value {
        if depth > MAX_REF_DEPTH {
            return value.clone();
        }

        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    if let Some(target) = self.lookup(reference) {
                        return self.resolve_at(target, depth + 1);
                    }
                }
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), self.resolve_at(v, depth + 1)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_at(v, depth + 1))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn resolve_parameter(&self, param: &ParameterOrRef) -> Option<Parameter> {
        match param {
            ParameterOrRef::Inline(p) => Some(p.clone()),
            ParameterOrRef::Ref { reference } => self
                .lookup(reference)
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
        }
    }

    pub fn resolve_request_body(&self, body: &RequestBodyOrRef) -> Option<RequestBody> {
        match body {
            RequestBodyOrRef::Inline(b) => Some(b.clone()),
            RequestBodyOrRef::Ref { reference } => self
                .lookup(reference)
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
        }
    }

    /// Root URL that operation paths are appended to.
    ///
    /// OpenAPI 3 `servers[0]` (relative URLs resolve against the spec URL),
    /// then Swagger 2 `host` + `basePath`, then the spec URL's origin.
    pub fn base_url(&self, spec_url: &Url) -> Result<Url, url::ParseError> {
        if let Some(server) = self.servers.first() {
            let mut raw = server.url.clone();
            for (name, variable) in &server.variables {
                raw = raw.replace(&format!("{{{}}}", name), &variable.default);
            }
            return spec_url.join(&raw);
        }

        if let Some(host) = &self.host {
            let scheme = self
                .schemes
                .first()
                .map(String::as_str)
                .unwrap_or_else(|| spec_url.scheme());
            let base_path = self.base_path.as_deref().unwrap_or("");
            return Url::parse(&format!("{}://{}{}", scheme, host, base_path));
        }

        spec_url.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> OpenApiDocument {
        OpenApiDocument::from_value(json!({
            "openapi": "3.0.3",
            "info": { "title": "Petstore", "version": "1.0.0" },
            "servers": [{ "url": "https://{region}.example.com/v1", "variables": { "region": { "default": "eu" } } }],
            "paths": {
                "/pets/{petId}": {
                    "parameters": [{ "$ref": "#/components/parameters/PetId" }],
                    "get": { "operationId": "getPet", "summary": "Get a pet" },
                    "delete": { "operationId": "deletePet" }
                }
            },
            "components": {
                "parameters": {
                    "PetId": { "name": "petId", "in": "path", "required": true, "schema": { "type": "integer" } }
                },
                "schemas": {
                    "Pet": { "type": "object", "properties": { "tag": { "$ref": "#/components/schemas/Tag" } } },
                    "Tag": { "type": "string" },
                    "Node": { "type": "object", "properties": { "next": { "$ref": "#/components/schemas/Node" } } }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_operations_in_method_order() {
        let doc = petstore();
        let item = &doc.paths["/pets/{petId}"];
        let methods: Vec<HttpMethod> = item.operations().iter().map(|(m, _)| *m).collect();
        assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Delete]);
    }

    #[test]
    fn test_resolve_parameter_ref() {
        let doc = petstore();
        let param = doc
            .resolve_parameter(&doc.paths["/pets/{petId}"].parameters[0])
            .unwrap();
        assert_eq!(param.name, "petId");
        assert_eq!(param.location, ParameterLocation::Path);
        assert!(param.required);
    }

    #[test]
    fn test_resolve_nested_schema_refs() {
        let doc = petstore();
        let resolved = doc.resolve(&json!({ "$ref": "#/components/schemas/Pet" }));
        assert_eq!(resolved["properties"]["tag"], json!({ "type": "string" }));
    }

    #[test]
    fn test_resolve_cyclic_schema_terminates() {
        let doc = petstore();
        let resolved = doc.resolve(&json!({ "$ref": "#/components/schemas/Node" }));
        assert_eq!(resolved["type"], "object");
    }

    #[test]
    fn test_base_url_substitutes_server_variables() {
        let doc = petstore();
        let spec_url = Url::parse("https://docs.example.com/openapi.json").unwrap();
        assert_eq!(
            doc.base_url(&spec_url).unwrap().as_str(),
            "https://eu.example.com/v1"
        );
    }

    #[test]
    fn test_base_url_relative_server() {
        let doc = OpenApiDocument::from_value(json!({
            "openapi": "3.1.0",
            "servers": [{ "url": "/api" }],
            "paths": {}
        }))
        .unwrap();
        let spec_url = Url::parse("https://dev.example.com/openapi/v1.json").unwrap();
        assert_eq!(
            doc.base_url(&spec_url).unwrap().as_str(),
            "https://dev.example.com/api"
        );
    }

    #[test]
    fn test_base_url_swagger2() {
        let doc = OpenApiDocument::from_value(json!({
            "swagger": "2.0",
            "host": "legacy.example.com",
            "basePath": "/v2",
            "schemes": ["http"],
            "paths": {}
        }))
        .unwrap();
        let spec_url = Url::parse("https://docs.example.com/swagger.json").unwrap();
        assert_eq!(
            doc.base_url(&spec_url).unwrap().as_str(),
            "http://legacy.example.com/v2"
        );
    }

    #[test]
    fn test_base_url_falls_back_to_spec_origin() {
        let doc = OpenApiDocument::from_value(json!({ "openapi": "3.0.0", "paths": {} })).unwrap();
        let spec_url = Url::parse("https://qa.example.com/docs/openapi.json").unwrap();
        assert_eq!(
            doc.base_url(&spec_url).unwrap().as_str(),
            "https://qa.example.com/"
        );
    }
}
