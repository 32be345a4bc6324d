pub mod sticky_notes;

pub use sticky_notes::{register_sticky_note_tools, NoteBoard};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// A callable exposed to tool-server clients.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn input_schema(&self) -> Value;
    /// Run the tool. `Err` means the arguments could not be decoded;
    /// domain failures come back as an unsuccessful `ToolResponse`.
    async fn run(&self, arguments: Value) -> Result<ToolResponse>;
}

/// Uniform tool result: `{success, message | error, data?}` plus any
/// non-fatal warnings from report rendering or the browser preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_warning: Option<String>,
}

impl ToolResponse {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: Some(data),
            report_warning: None,
            preview_warning: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.to_string()),
            data: None,
            report_warning: None,
            preview_warning: None,
        }
    }
}

/// Decode a tool's arguments object; `null` counts as `{}`.
pub fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).context("Invalid tool arguments")
}

/// Named tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        log::debug!("Registered tool: {}", tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Tool descriptors in the shape `tools/list` returns.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "inputSchema": t.input_schema(),
                })
            })
            .collect()
    }
}
