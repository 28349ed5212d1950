//! Tool registry and the built-in tools.
//!
//! A [`ToolRegistry`] owns the set of named tools one protocol engine
//! exposes. Registration happens once at engine construction; afterwards the
//! registry is read-only. Executors are plain functions taking an explicit
//! [`ToolContext`] so they stay unit-testable without a running server.

pub mod clock;
pub mod random;
pub mod schema;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use self::schema::InputShape;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Registry misuse. Duplicates are a startup configuration bug; unknown
/// names surface when a client calls a tool that was never registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    /// No tool with this name is registered.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

// ---------------------------------------------------------------------------
// Execution types
// ---------------------------------------------------------------------------

/// Per-invocation execution context handed to every executor.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext {
    /// Invocation instant; injectable for deterministic tests.
    pub now: DateTime<Utc>,
}

impl ToolContext {
    /// Context stamped with the current instant.
    pub fn new() -> Self {
        Self { now: Utc::now() }
    }

    /// Context pinned to a fixed instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new()
    }
}

/// One item of tool result content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text content.
    Text { text: String },
}

/// Result payload of a tool invocation, in MCP content form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Content items, in order.
    pub content: Vec<ToolContent>,
    /// Present and true when the tool itself failed.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolOutput {
    /// Successful output carrying one text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Failed output carrying one text item and the error marker.
    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: Some(true),
        }
    }
}

/// Boxed future returned by every executor.
pub type ToolFuture = BoxFuture<'static, anyhow::Result<ToolOutput>>;

/// Executor function: validated arguments in, content out.
pub type ToolExecutor = Arc<dyn Fn(ToolContext, Value) -> ToolFuture + Send + Sync>;

// ---------------------------------------------------------------------------
// Tool and metadata
// ---------------------------------------------------------------------------

/// Display metadata attached to a registered tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMetadata {
    /// Short human-readable title.
    pub title: String,
    /// One-line description shown by discovery.
    pub description: String,
}

impl ToolMetadata {
    /// Create metadata from title and description.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A registered tool: name, metadata, declared input shape, executor.
#[derive(Clone)]
pub struct Tool {
    name: String,
    metadata: ToolMetadata,
    input_shape: InputShape,
    executor: ToolExecutor,
}

impl Tool {
    /// Unique tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable title.
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    /// Declared argument shape.
    pub fn input_shape(&self) -> &InputShape {
        &self.input_shape
    }

    /// Executor function.
    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("input_shape", &self.input_shape)
            .finish()
    }
}

/// Discovery view of one tool, serialized for `tools/list` and the docs
/// endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Unique tool name.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// One-line description.
    pub description: String,
    /// JSON Schema of the argument object.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name-keyed set of tools. Listing order is stable (name-sorted).
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Tool>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under a unique name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] when the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        metadata: ToolMetadata,
        input_shape: InputShape,
        executor: ToolExecutor,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.tools.insert(
            name.clone(),
            Tool {
                name,
                metadata,
                input_shape,
                executor,
            },
        );
        Ok(())
    }

    /// Resolve a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownTool`] when absent.
    pub fn resolve(&self, name: &str) -> Result<&Tool, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Discovery metadata for every registered tool, name-sorted.
    pub fn list_all(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|tool| ToolInfo {
                name: tool.name.clone(),
                title: tool.metadata.title.clone(),
                description: tool.metadata.description.clone(),
                input_schema: tool.input_shape.to_json_schema(),
            })
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Build a registry holding the two built-in tools.
pub fn builtin_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    clock::register(&mut registry)?;
    random::register(&mut registry)?;
    Ok(registry)
}
