pub mod http;
pub mod protocol;
pub mod server;
pub mod stdio;
pub mod tools;

pub use protocol::{JsonRpcRequest, JsonRpcResponse};
pub use server::McpServer;
