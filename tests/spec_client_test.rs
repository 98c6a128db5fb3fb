use openapi_mcp_server::config::TlsOptions;
use openapi_mcp_server::openapi::{self, OpenApiError, SpecClient};
use serde_json::{json, Map, Value};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn spec_client(ttl: Duration) -> SpecClient {
    SpecClient::new(
        TlsOptions {
            accept_invalid_certs: false,
        },
        Duration::from_secs(5),
        ttl,
    )
    .unwrap()
}

fn petstore_spec(server_url: &str) -> Value {
    json!({
        "openapi": "3.0.3",
        "info": { "title": "Petstore", "version": "1.0.0" },
        "servers": [{ "url": server_url }],
        "paths": {
            "/pets": {
                "get": {
                    "operationId": "listPets",
                    "parameters": [{ "name": "limit", "in": "query", "schema": { "type": "integer" } }]
                },
                "post": {
                    "operationId": "createPet",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "type": "object" } } }
                    }
                }
            },
            "/pets/{petId}": {
                "get": {
                    "operationId": "showPetById",
                    "parameters": [{ "name": "petId", "in": "path", "required": true, "schema": { "type": "string" } }]
                }
            }
        }
    })
}

fn arguments(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Test a spec document is fetched once and then served from cache
#[tokio::test]
async fn test_fetch_spec_is_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(petstore_spec("/api")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = spec_client(Duration::from_secs(60));
    let spec_url = format!("{}/openapi.json", mock_server.uri());

    let first = client.fetch(&spec_url).await.unwrap();
    let second = client.fetch(&spec_url).await.unwrap();

    assert_eq!(first.info.title, "Petstore");
    assert_eq!(second.paths.len(), 2);
}

/// Test a zero TTL refetches every time
#[tokio::test]
async fn test_zero_ttl_disables_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(petstore_spec("/api")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = spec_client(Duration::ZERO);
    let spec_url = format!("{}/openapi.json", mock_server.uri());

    client.fetch(&spec_url).await.unwrap();
    client.fetch(&spec_url).await.unwrap();
}

/// Test invalidation forces a refetch
#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(petstore_spec("/api")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = spec_client(Duration::from_secs(60));
    let spec_url = format!("{}/openapi.json", mock_server.uri());

    client.fetch(&spec_url).await.unwrap();
    client.invalidate(&spec_url);
    client.fetch(&spec_url).await.unwrap();
}

/// Test a non-2xx spec response is reported with its status
#[tokio::test]
async fn test_fetch_spec_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = spec_client(Duration::from_secs(60));
    let result = client
        .fetch(&format!("{}/missing.json", mock_server.uri()))
        .await;

    match result {
        Err(OpenApiError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("Expected Status error, got {:?}", other.map(|_| ())),
    }
}

/// Test a body that is not an OpenAPI document is rejected
#[tokio::test]
async fn test_fetch_spec_invalid_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/openapi.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("openapi: 3.0.0"))
        .mount(&mock_server)
        .await;

    let client = spec_client(Duration::from_secs(60));
    let result = client
        .fetch(&format!("{}/openapi.yaml", mock_server.uri()))
        .await;

    assert!(matches!(result, Err(OpenApiError::Parse(_))));
}

/// Test an operation is executed against the resolved server URL
#[tokio::test]
async fn test_execute_operation_against_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/pets/42"))
        .and(header("authorization", "Bearer caller-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 42, "name": "Rex" })))
        .mount(&mock_server)
        .await;

    let spec_url = Url::parse(&format!("{}/docs/openapi.json", mock_server.uri())).unwrap();
    let document = openapi::OpenApiDocument::from_value(petstore_spec("/api")).unwrap();
    let tools = openapi::build_tools(&document, &[], &[]);
    let tool = tools.iter().find(|t| t.name == "showPetById").unwrap();

    let base_url = document.base_url(&spec_url).unwrap();
    let request = openapi::prepare_request(tool, &base_url, &arguments(json!({ "petId": "42" }))).unwrap();

    let client = spec_client(Duration::from_secs(60));
    let response = openapi::execute(client.http_client(), request, Some("Bearer caller-token"))
        .await
        .unwrap();

    assert!(response.is_success());
    assert!(response.to_text().contains("\"name\": \"Rex\""));
}

/// Test query parameters and JSON bodies reach the upstream API
#[tokio::test]
async fn test_execute_with_query_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/pets"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/pets"))
        .and(body_json(json!({ "name": "Rex" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .mount(&mock_server)
        .await;

    let spec_url = Url::parse(&format!("{}/openapi.json", mock_server.uri())).unwrap();
    let document = openapi::OpenApiDocument::from_value(petstore_spec("/api")).unwrap();
    let tools = openapi::build_tools(&document, &[], &[]);
    let base_url = document.base_url(&spec_url).unwrap();
    let client = spec_client(Duration::from_secs(60));

    let list = tools.iter().find(|t| t.name == "listPets").unwrap();
    let request = openapi::prepare_request(list, &base_url, &arguments(json!({ "limit": 5 }))).unwrap();
    let response = openapi::execute(client.http_client(), request, None).await.unwrap();
    assert_eq!(response.status, 200);

    let create = tools.iter().find(|t| t.name == "createPet").unwrap();
    let request = openapi::prepare_request(
        create,
        &base_url,
        &arguments(json!({ "body": { "name": "Rex" } })),
    )
    .unwrap();
    let response = openapi::execute(client.http_client(), request, None).await.unwrap();
    assert_eq!(response.status, 201);
}

/// Test upstream errors come back as responses, not failures
#[tokio::test]
async fn test_execute_upstream_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/pets/0"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Pet not found"))
        .mount(&mock_server)
        .await;

    let spec_url = Url::parse(&format!("{}/openapi.json", mock_server.uri())).unwrap();
    let document = openapi::OpenApiDocument::from_value(petstore_spec("/api")).unwrap();
    let tools = openapi::build_tools(&document, &[], &[]);
    let tool = tools.iter().find(|t| t.name == "showPetById").unwrap();
    let base_url = document.base_url(&spec_url).unwrap();
    let request = openapi::prepare_request(tool, &base_url, &arguments(json!({ "petId": 0 }))).unwrap();

    let client = spec_client(Duration::from_secs(60));
    let response = openapi::execute(client.http_client(), request, None).await.unwrap();

    assert!(!response.is_success());
    assert_eq!(response.to_text(), "HTTP 404\n\nPet not found");
}
