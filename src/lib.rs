pub mod config;
pub mod http_server;
pub mod mcp;
pub mod openapi;

pub use config::{Config, ConfigError, EnvironmentConfig, EnvironmentRegistry, ServerConfig};
pub use http_server::{create_app, run_server};
pub use mcp::McpHandler;
pub use openapi::{OpenApiError, SpecClient};
