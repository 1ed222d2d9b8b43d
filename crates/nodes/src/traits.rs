//! The `ExecutableNode` trait: the contract every node handler must fulfil.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::NodeError;

/// Outputs produced so far in a run, keyed by node id.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency. Entries are
/// kept in the order nodes completed and are never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    outputs: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of `node_id`, if it has run.
    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    /// Record a node's output. Returns `false` (and keeps the existing
    /// value) if the node already has an entry.
    pub fn record(&mut self, node_id: impl Into<String>, output: Value) -> bool {
        let node_id = node_id.into();
        if self.outputs.contains_key(&node_id) {
            return false;
        }
        self.outputs.insert(node_id, output);
        true
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.outputs.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Node ids in completion order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    /// The context as a JSON mapping.
    pub fn to_value(&self) -> Value {
        Value::Object(self.outputs.clone())
    }
}

/// Per-invocation metadata handed to every node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Identifier supplied by whoever triggered the run (logging only).
    pub workflow_id: Option<String>,
    /// ID of the node being executed.
    pub node_id: String,
    /// ID of the current run.
    pub run_id: Uuid,
    /// Payload the run was triggered with.
    pub trigger: Value,
}

impl NodeMeta {
    pub fn to_value(&self) -> Value {
        json!({
            "workflow_id": self.workflow_id,
            "node_id": self.node_id,
            "run_id": self.run_id.to_string(),
            "trigger": self.trigger,
        })
    }
}

/// The core node trait.
///
/// All built-in nodes and externally registered node kinds implement this.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Execute the node.
    ///
    /// `params` is the node's own `data`; `inputs` holds the outputs of its
    /// upstream nodes in edge declaration order; `ctx` is everything the run
    /// has produced so far.
    async fn execute(
        &self,
        params: &Value,
        inputs: &[Value],
        ctx: &ExecutionContext,
        meta: &NodeMeta,
    ) -> Result<Value, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_append_only() {
        let mut ctx = ExecutionContext::new();
        assert!(ctx.record("a", json!(1)));
        assert!(!ctx.record("a", json!(2)));
        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn serialises_in_completion_order() {
        let mut ctx = ExecutionContext::new();
        ctx.record("zeta", json!({ "n": 1 }));
        ctx.record("alpha", json!(null));
        let text = serde_json::to_string(&ctx).unwrap();
        assert_eq!(text, r#"{"zeta":{"n":1},"alpha":null}"#);
        assert_eq!(ctx.node_ids().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }
}
