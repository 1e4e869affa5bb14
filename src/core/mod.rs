//! Core types & traits: transport-agnostic contracts shared by every servlet.

pub mod args;
pub mod content;
pub mod error;
pub mod mcp;
pub mod tool;

pub use args::Args;
pub use content::{CallResult, Content};
pub use error::ServletError;
pub use tool::{Servlet, ToolDescription};
