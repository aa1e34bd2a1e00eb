//! Tools the agent can call.
//!
//! The agent never touches the index directly: everything it can do is a
//! [`Tool`] in a [`ToolRegistry`]. The same registry backs the HTTP API
//! (`GET /tools/list`, `POST /tools/{name}`) and the function-calling loop
//! of [`crate::openai`].
//!
//! ```text
//! ┌──────────────────────────────┐
//! │         ToolRegistry         │
//! │  ┌────────────────────────┐  │
//! │  │ search (SearchDocsTool)│  │
//! │  └───────────┬────────────┘  │
//! └──────────────┼───────────────┘
//!                ▼
//!        SearchSlot → Index
//! ```
//!
//! # Usage
//!
//! ```rust
//! use faq_harness::traits::ToolRegistry;
//! use faq_harness_core::search::SearchSlot;
//!
//! let slot = SearchSlot::new();
//! let tools = ToolRegistry::with_builtins(slot);
//! assert!(tools.find("search").is_some());
//! ```

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use faq_harness_core::error::CoreError;
use faq_harness_core::search::SearchSlot;
use serde::Serialize;
use serde_json::Value;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A capability agents can discover and call.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use faq_harness::traits::Tool;
///
/// pub struct EchoTool;
///
/// #[async_trait]
/// impl Tool for EchoTool {
///     fn name(&self) -> &str { "echo" }
///     fn description(&self) -> &str { "Return the input unchanged" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({
///             "type": "object",
///             "properties": { "text": { "type": "string" } },
///             "required": ["text"]
///         })
///     }
///
///     async fn execute(&self, params: Value) -> Result<Value> {
///         Ok(params)
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier used as the route path and the function name.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool with parameters already checked by [`validate_params`].
    async fn execute(&self, params: Value) -> Result<Value>;
}

/// Serializable tool description for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Why a tool call did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("no tool registered with name: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    /// The search index has not been installed yet.
    #[error("search index is not ready yet")]
    Unavailable,

    #[error("{0:#}")]
    Failed(anyhow::Error),
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tools
// ═══════════════════════════════════════════════════════════════════════

/// Full-text search over the FAQ documents.
pub struct SearchDocsTool {
    slot: SearchSlot,
}

impl SearchDocsTool {
    pub fn new(slot: SearchSlot) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl Tool for SearchDocsTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the FAQ documentation and return the most relevant entries"
    }

    /// `filters` is only offered once the index is installed and has
    /// keyword fields to filter on.
    fn parameters_schema(&self) -> Value {
        let mut schema = serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" }
            },
            "required": ["query"]
        });

        let keyword_fields = self
            .slot
            .get()
            .map(|tool| tool.index().options().keyword_fields.clone())
            .unwrap_or_default();
        if !keyword_fields.is_empty() {
            schema["properties"]["filters"] = serde_json::json!({
                "type": "object",
                "description": format!(
                    "Exact-match filters, field to value. Fields: {}",
                    keyword_fields.join(", ")
                ),
                "additionalProperties": { "type": "string" }
            });
        }
        schema
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        let filters: HashMap<String, String> = match params.get("filters") {
            Some(filters) => serde_json::from_value(filters.clone())?,
            None => HashMap::new(),
        };
        let results = self.slot.search_filtered(query, &filters)?;
        Ok(serde_json::json!({ "results": results }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Ordered set of tools, looked up by name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry with the built-in `search` tool bound to `slot`.
    pub fn with_builtins(slot: SearchSlot) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchDocsTool::new(slot)));
        registry
    }

    /// Register a tool. A tool with the same name replaces the old one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Look up, validate and execute in one step.
    pub async fn call(&self, name: &str, params: Value) -> Result<Value, ToolError> {
        let tool = self
            .find(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let params = validate_params(&tool.parameters_schema(), params)?;

        tool.execute(params).await.map_err(|err| {
            match err.downcast_ref::<CoreError>() {
                Some(CoreError::SearchUnavailable) => ToolError::Unavailable,
                Some(CoreError::InvalidParameter(reason)) => {
                    ToolError::InvalidParams(reason.clone())
                }
                _ => ToolError::Failed(err),
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `params` against a tool's parameter schema and return them.
///
/// Every `required` key must be present and a present property must match
/// its declared `type`: `"string"` takes strings only, and `"object"` takes
/// an object whose values are all strings when `additionalProperties` says
/// so. Null counts as no parameters.
pub fn validate_params(schema: &Value, params: Value) -> Result<Value, ToolError> {
    let params = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        Value::Object(_) => params,
        _ => {
            return Err(ToolError::InvalidParams(
                "parameters must be a JSON object".to_string(),
            ))
        }
    };

    let required = schema["required"].as_array().into_iter().flatten();
    for key in required.filter_map(Value::as_str) {
        if params.get(key).is_none() {
            return Err(ToolError::InvalidParams(format!("'{}' is required", key)));
        }
    }

    let properties = schema["properties"].as_object().into_iter().flatten();
    for (key, property) in properties {
        let Some(value) = params.get(key) else {
            continue;
        };
        if !matches_type(property, value) {
            let expected = property["type"].as_str().unwrap_or("valid");
            return Err(ToolError::InvalidParams(format!(
                "'{}' must be of type {}",
                key, expected
            )));
        }
    }

    Ok(params)
}

fn matches_type(property: &Value, value: &Value) -> bool {
    match property["type"].as_str() {
        Some("string") => value.is_string(),
        Some("object") => match value.as_object() {
            Some(map) if property["additionalProperties"]["type"] == "string" => {
                map.values().all(Value::is_string)
            }
            Some(_) => true,
            None => false,
        },
        _ => true,
    }
}
