pub mod builtin;
pub mod registry;
pub mod types;

pub use registry::{Tool, ToolRegistry};
pub use types::{PropertySchema, ToolDefinition, ToolInputSchema, ToolResult};

use crate::config::Config;
use std::sync::Arc;

/// Registry with every builtin tool
pub fn create_default_registry(config: Arc<Config>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(builtin::PaidAgentTool::x_searcher(config.clone())));
    registry.register(Arc::new(builtin::PaidAgentTool::find_people(config)));
    registry
}
