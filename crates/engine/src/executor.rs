//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Validates the DAG and produces a topological ordering.
//! 2. Iterates through nodes in order, dispatching each via `ExecutableNode`.
//! 3. Hands every node the outputs of its upstream nodes plus the full context.
//! 4. Stops at the first failure and reports what ran in a `RunResult`.
//!
//! A run never returns `Err`: every failure is folded into the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use nodes::{ExecutionContext, NodeMeta, NodeRegistry};

use crate::dag::{execution_order, incoming_sources};
use crate::models::{ExecutionLogEntry, NodeDefinition, RunResult, RunStatus, WorkflowDefinition};
use crate::EngineError;

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator that runs workflow definitions against a registry.
///
/// The executor holds no per-run state, so one instance can serve any number
/// of concurrent runs.
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Run `definition` once with a fresh run id.
    ///
    /// `trigger` is made available to handlers through [`NodeMeta`];
    /// `workflow_id` is only used for logging and metadata.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        trigger: Value,
        workflow_id: Option<&str>,
    ) -> RunResult {
        self.run_with_id(Uuid::new_v4(), definition, trigger, workflow_id)
            .await
    }

    /// Like [`run`](Self::run), with a caller-assigned run id.
    #[instrument(
        name = "workflow_run",
        skip(self, definition, trigger, workflow_id),
        fields(workflow_id = workflow_id.unwrap_or("-"))
    )]
    pub async fn run_with_id(
        &self,
        run_id: Uuid,
        definition: &WorkflowDefinition,
        trigger: Value,
        workflow_id: Option<&str>,
    ) -> RunResult {
        // ------------------------------------------------------------------
        // Validate and topologically sort the DAG.
        // ------------------------------------------------------------------
        let order = match execution_order(&definition.nodes, &definition.edges) {
            Ok(order) => order,
            Err(err) => {
                warn!("workflow rejected before execution: {err}");
                return RunResult {
                    run_id,
                    status: RunStatus::Error,
                    logs: Vec::new(),
                    context: ExecutionContext::new(),
                    error: Some(err.to_string()),
                };
            }
        };
        info!("executing {} nodes in order: {:?}", order.len(), order);

        let node_map: HashMap<&str, &NodeDefinition> = definition
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n))
            .collect();
        let incoming = incoming_sources(definition);

        let mut context = ExecutionContext::new();
        let mut logs = Vec::with_capacity(order.len());

        // ------------------------------------------------------------------
        // Execute nodes sequentially.
        // ------------------------------------------------------------------
        for node_id in &order {
            let node = node_map[node_id.as_str()];

            // Every upstream node has already completed, so each lookup hits.
            let inputs: Vec<Value> = incoming
                .get(node_id.as_str())
                .map(|sources| {
                    sources
                        .iter()
                        .map(|src| context.get(src).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .unwrap_or_default();

            let meta = NodeMeta {
                workflow_id: workflow_id.map(str::to_owned),
                node_id: node_id.clone(),
                run_id,
                trigger: trigger.clone(),
            };

            debug!("node '{}' ({}) starting with {} input(s)", node_id, node.node_type, inputs.len());
            let started_at = Utc::now();
            let clock = Instant::now();

            match self.execute_node(node, &inputs, &context, &meta).await {
                Ok(output) => {
                    info!("node '{}' ({}) succeeded", node_id, node.node_type);
                    context.record(node_id.clone(), output);
                    logs.push(ExecutionLogEntry::ok(node_id.clone(), started_at, clock.elapsed()));
                }

                Err(err) => {
                    error!("node '{}' ({}) failed: {}", node_id, node.node_type, err);
                    let trace = format!(
                        "node '{}' (type '{}')\n{}",
                        node_id,
                        node.node_type,
                        err.trace()
                    );
                    logs.push(ExecutionLogEntry::failed(
                        node_id.clone(),
                        err.kind(),
                        err.to_string(),
                        trace,
                        started_at,
                        clock.elapsed(),
                    ));
                    return RunResult {
                        run_id,
                        status: RunStatus::Error,
                        logs,
                        context,
                        error: Some(err.to_string()),
                    };
                }
            }
        }

        info!("run {} succeeded ({} nodes)", run_id, context.len());

        RunResult {
            run_id,
            status: RunStatus::Success,
            logs,
            context,
            error: None,
        }
    }

    // -----------------------------------------------------------------------
    // Internal: resolve the handler and execute a single node.
    // -----------------------------------------------------------------------

    async fn execute_node(
        &self,
        node: &NodeDefinition,
        inputs: &[Value],
        ctx: &ExecutionContext,
        meta: &NodeMeta,
    ) -> Result<Value, EngineError> {
        let handler = self
            .registry
            .get(&node.node_type)
            .ok_or_else(|| EngineError::NoHandler {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            })?;

        handler
            .execute(&node.data, inputs, ctx, meta)
            .await
            .map_err(|source| EngineError::NodeFailed {
                node_id: node.id.clone(),
                source,
            })
    }
}
