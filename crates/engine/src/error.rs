//! Engine-level error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use nodes::NodeError;

/// Errors produced by the workflow engine (scheduling + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Scheduling errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// Topological sort could not order these nodes.
    #[error("workflow graph contains a cycle among: {}", remaining.join(", "))]
    CycleDetected { remaining: Vec<String> },

    // ------ Execution errors ------

    /// No handler is registered for the node's type.
    #[error("no handler for node type '{node_type}' (node '{node_id}')")]
    NoHandler { node_id: String, node_type: String },

    /// The node's handler returned an error; the run is aborted.
    #[error("node '{node_id}' failed: {source}")]
    NodeFailed {
        node_id: String,
        #[source]
        source: NodeError,
    },
}

/// Coarse category of a failure, as recorded in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Scheduling,
    NoHandler,
    Validation,
    HandlerExecution,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduling => write!(f, "scheduling"),
            Self::NoHandler => write!(f, "no_handler"),
            Self::Validation => write!(f, "validation"),
            Self::HandlerExecution => write!(f, "handler_execution"),
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateNodeId(_) | Self::UnknownNodeReference { .. } | Self::CycleDetected { .. } => {
                ErrorKind::Scheduling
            }
            Self::NoHandler { .. } => ErrorKind::NoHandler,
            Self::NodeFailed { source, .. } if source.is_validation() => ErrorKind::Validation,
            Self::NodeFailed { .. } => ErrorKind::HandlerExecution,
        }
    }

    /// `true` for errors raised before any node runs.
    pub fn is_scheduling(&self) -> bool {
        self.kind() == ErrorKind::Scheduling
    }

    /// The error followed by each underlying cause, one per line.
    pub fn trace(&self) -> String {
        std::iter::successors(Some(self as &dyn std::error::Error), |e| e.source())
            .enumerate()
            .map(|(depth, e)| format!("{depth}: {e}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
