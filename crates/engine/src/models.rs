//! Core domain models for the workflow engine.
//!
//! `WorkflowDefinition` mirrors the `{ nodes, edges }` JSON a workflow editor
//! saves; unknown fields (positions, edge ids, styling) are ignored on
//! deserialisation. `RunResult` is what a run hands back to its caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use nodes::ExecutionContext;

use crate::error::ErrorKind;

// ---------------------------------------------------------------------------
// NodeDefinition
// ---------------------------------------------------------------------------

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// A single step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Selects the registered handler.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Parameters passed to the handler at execution time.
    #[serde(default = "empty_object")]
    pub data: Value,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge: `target` consumes the output of `source`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// The graph a run executes. Treated as immutable input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowDefinition {
    pub fn new(nodes: Vec<NodeDefinition>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// Run log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Ok,
    Error,
}

/// One entry per attempted node, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub node: String,
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Cause chain of the failure, one cause per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

impl ExecutionLogEntry {
    pub fn ok(node: impl Into<String>, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        Self {
            node: node.into(),
            status: LogStatus::Ok,
            error: None,
            kind: None,
            trace: None,
            started_at,
            duration_ms: millis(elapsed),
        }
    }

    pub fn failed(
        node: impl Into<String>,
        kind: ErrorKind,
        error: String,
        trace: String,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            node: node.into(),
            status: LogStatus::Error,
            error: Some(error),
            kind: Some(kind),
            trace: Some(trace),
            started_at,
            duration_ms: millis(elapsed),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == LogStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Outcome of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub logs: Vec<ExecutionLogEntry>,
    /// Outputs of every node that completed, in completion order.
    pub context: ExecutionContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Output of `node_id`, if it completed.
    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.context.get(node_id)
    }
}
