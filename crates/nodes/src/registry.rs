//! `NodeRegistry`: maps a node's `type` tag to its handler.
//!
//! The registry is an ordinary value: build it once at startup, wrap it in an
//! `Arc` and hand it to the engine. Adding a node kind means registering a
//! handler here; the engine itself never changes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::builtin::{FunctionNode, HttpNode, SetNode};
use crate::traits::{ExecutableNode, ExecutionContext, NodeMeta};
use crate::NodeError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for the built-in node kinds.
#[derive(Debug, Clone)]
pub struct NodesConfig {
    /// Upper bound on a single outbound request made by the `http` node.
    pub http_timeout: Duration,
    /// Whether the `function` node kind is registered at all.
    pub enable_function: bool,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(15),
            enable_function: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// Wraps a synchronous closure so it can be registered as a node handler.
pub struct FnNode<F>(F);

impl<F> FnNode<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ExecutableNode for FnNode<F>
where
    F: Fn(&Value, &[Value], &ExecutionContext, &NodeMeta) -> Result<Value, NodeError> + Send + Sync,
{
    async fn execute(
        &self,
        params: &Value,
        inputs: &[Value],
        ctx: &ExecutionContext,
        meta: &NodeMeta,
    ) -> Result<Value, NodeError> {
        (self.0)(params, inputs, ctx, meta)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps `type` strings to shared `ExecutableNode` implementations.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    handlers: HashMap<String, Arc<dyn ExecutableNode>>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `set`, `http` and, when enabled, `function`.
    pub fn with_builtins(config: &NodesConfig) -> Self {
        let mut registry = Self::new();
        registry.register("set", Arc::new(SetNode));
        registry.register("http", Arc::new(HttpNode::new(config.http_timeout)));
        if config.enable_function {
            registry.register("function", Arc::new(FunctionNode));
        }
        registry
    }

    /// Register `handler` under `node_type`, returning the handler it replaced.
    pub fn register(
        &mut self,
        node_type: impl Into<String>,
        handler: Arc<dyn ExecutableNode>,
    ) -> Option<Arc<dyn ExecutableNode>> {
        let node_type = node_type.into();
        tracing::debug!("registering handler for node type '{}'", node_type);
        self.handlers.insert(node_type, handler)
    }

    /// Register a synchronous closure as a handler.
    pub fn register_fn<F>(&mut self, node_type: impl Into<String>, f: F) -> Option<Arc<dyn ExecutableNode>>
    where
        F: Fn(&Value, &[Value], &ExecutionContext, &NodeMeta) -> Result<Value, NodeError>
            + Send
            + Sync
            + 'static,
    {
        self.register(node_type, Arc::new(FnNode::new(f)))
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn ExecutableNode>> {
        self.handlers.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Registered type tags, sorted.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn meta() -> NodeMeta {
        NodeMeta {
            workflow_id: None,
            node_id: "n".into(),
            run_id: Uuid::new_v4(),
            trigger: Value::Null,
        }
    }

    #[test]
    fn builtins_exclude_function_by_default() {
        let registry = NodeRegistry::with_builtins(&NodesConfig::default());
        assert_eq!(registry.node_types(), vec!["http", "set"]);
        assert!(!registry.contains("function"));
    }

    #[test]
    fn function_is_opt_in() {
        let config = NodesConfig {
            enable_function: true,
            ..NodesConfig::default()
        };
        let registry = NodeRegistry::with_builtins(&config);
        assert_eq!(registry.node_types(), vec!["function", "http", "set"]);
    }

    #[test]
    fn register_replaces_existing_handler() {
        let mut registry = NodeRegistry::new();
        assert!(registry.register_fn("echo", |_, _, _, _| Ok(json!(1))).is_none());
        assert!(registry.register_fn("echo", |_, _, _, _| Ok(json!(2))).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn closure_handlers_receive_their_arguments() {
        let mut registry = NodeRegistry::new();
        registry.register_fn("count", |params, inputs, _ctx, meta| {
            Ok(json!({
                "inputs": inputs.len(),
                "label": params["label"],
                "node": meta.node_id,
            }))
        });

        let handler = registry.get("count").expect("registered");
        let out = handler
            .execute(&json!({ "label": "x" }), &[json!(1), json!(2)], &ExecutionContext::new(), &meta())
            .await
            .unwrap();
        assert_eq!(out, json!({ "inputs": 2, "label": "x", "node": "n" }));
    }
}
