//! Tool system: executor contract, registry, closure tools.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use registry::{ToolExecutor, ToolRegistry};
pub use tool::{FnTool, Tool, ToolContext};
pub use types::{ToolDefinition, ToolParameters};
