pub mod hotel;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// One entry of the tool catalog presented to the model on every turn.
/// Declarations are fixed at startup and never change for the process
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON-Schema-shaped parameter object.
    pub parameters: Value,
}

impl ToolDeclaration {
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// The outcome of one tool invocation. Exactly one of `data`/`error` is
/// populated; failures are data, never propagated errors, so the
/// conversation loop can always hand the model a result object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub name: String,
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn ok(name: &str, data: Value) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(name: &str, error: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// A concrete server-side function behind a catalog entry. Handlers validate
/// their own arguments and may query or mutate the hotel store; mutations
/// must be atomic from the caller's perspective.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn run(&self, args: &Value) -> Result<Value>;
}

/// The fixed catalog of callable tools. Pure data; behavior lives in the
/// executor.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    declarations: Vec<ToolDeclaration>,
}

impl ToolRegistry {
    pub fn new(declarations: Vec<ToolDeclaration>) -> Self {
        Self { declarations }
    }

    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declarations.iter().any(|d| d.name == name)
    }
}

/// Maps tool names to handlers. Registry/handler mismatch is a startup
/// configuration error surfaced by `verify`, never a runtime one.
pub struct ToolExecutor {
    registry: ToolRegistry,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, handler: Arc<dyn ToolHandler>) {
        info!("Registering tool handler: {}", name);
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Checks that every declared tool has a handler and every handler a
    /// declaration. Called once at boot.
    pub fn verify(&self) -> Result<()> {
        for decl in self.registry.declarations() {
            if !self.handlers.contains_key(&decl.name) {
                return Err(anyhow!("Tool declared but not implemented: {}", decl.name));
            }
        }
        for name in self.handlers.keys() {
            if !self.registry.contains(name) {
                return Err(anyhow!("Tool implemented but not declared: {}", name));
            }
        }
        Ok(())
    }

    /// Runs one tool call. Unknown tools, bad arguments, and handler errors
    /// all come back as `success: false` results.
    pub async fn execute(&self, name: &str, args: &Value) -> ToolCallResult {
        let handler = match self.handlers.get(name) {
            Some(h) if self.registry.contains(name) => Arc::clone(h),
            _ => {
                warn!("Model requested unknown tool: {}", name);
                return ToolCallResult::failed(name, format!("Unknown tool: {}", name));
            }
        };

        match handler.run(args).await {
            Ok(data) => ToolCallResult::ok(name, data),
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                ToolCallResult::failed(name, e)
            }
        }
    }
}

/// Required string field out of a JSON argument object.
pub(crate) fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str> {
    args.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("Missing required argument: {}", field))
}

pub(crate) fn optional_str<'a>(args: &'a Value, field: &str) -> Option<&'a str> {
    args.get(field).and_then(Value::as_str)
}
