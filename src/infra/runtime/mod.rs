pub mod limits;
pub mod mcp_transport;
pub mod token;
