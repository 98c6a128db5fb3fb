pub mod handlers;
pub mod protocol;
pub mod tools;

pub use handlers::McpHandler;
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCallResult};
