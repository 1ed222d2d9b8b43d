//! `MockNode`: a test double for `ExecutableNode`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::{
    traits::{ExecutionContext, NodeMeta},
    ExecutableNode, NodeError,
};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Return the inputs it received, as an array.
    EchoInputs,
    /// Fail with a `Validation` error.
    FailValidation(String),
    /// Fail with an `Execution` error.
    FailExecution(String),
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub node_id: String,
    pub params: Value,
    pub inputs: Vec<Value>,
    /// Node ids present in the context at call time.
    pub context_keys: Vec<String>,
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// Every call seen by this node, in order.
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockNode {
    fn with(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that always succeeds with the given value.
    pub fn returning(value: Value) -> Self {
        Self::with(MockBehaviour::ReturnValue(value))
    }

    /// A mock that returns its inputs.
    pub fn echo() -> Self {
        Self::with(MockBehaviour::EchoInputs)
    }

    /// A mock that always fails validation.
    pub fn failing_validation(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::FailValidation(msg.into()))
    }

    /// A mock that always fails during execution.
    pub fn failing_execution(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::FailExecution(msg.into()))
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    async fn execute(
        &self,
        params: &Value,
        inputs: &[Value],
        ctx: &ExecutionContext,
        meta: &NodeMeta,
    ) -> Result<Value, NodeError> {
        self.calls.lock().unwrap().push(MockCall {
            node_id: meta.node_id.clone(),
            params: params.clone(),
            inputs: inputs.to_vec(),
            context_keys: ctx.node_ids().map(str::to_owned).collect(),
        });

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::EchoInputs => Ok(Value::Array(inputs.to_vec())),
            MockBehaviour::FailValidation(msg) => Err(NodeError::validation(msg.clone())),
            MockBehaviour::FailExecution(msg) => Err(NodeError::execution(msg.clone())),
        }
    }
}
