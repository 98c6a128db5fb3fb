pub mod client;
pub mod executor;
pub mod tools;
pub mod types;

pub use client::{OpenApiError, SpecClient};
pub use executor::{execute, prepare_request, ApiResponse, PreparedRequest};
pub use tools::{build_tools, OperationTool, ToolParameter, BODY_ARGUMENT, ENVIRONMENT_ARGUMENT};
pub use types::{HttpMethod, OpenApiDocument};
