mod api;

pub use api::{ContentPart, FunctionCall, InputItem, RawFunctionCall, Reply, Role, ToolResult};
