//! `function`: evaluates an expression over the node's inputs.
//!
//! The expression language is the closed one in [`crate::expr`]; there is no
//! path from a workflow definition to host code. Registration is still opt-in
//! (see [`crate::NodesConfig::enable_function`]).

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::expr::{Expression, Scope};
use crate::traits::{ExecutableNode, ExecutionContext, NodeMeta};
use crate::NodeError;

/// Evaluates `params.expr` with `inputs`, `context` and `meta` in scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionNode;

#[async_trait]
impl ExecutableNode for FunctionNode {
    async fn execute(
        &self,
        params: &Value,
        inputs: &[Value],
        ctx: &ExecutionContext,
        meta: &NodeMeta,
    ) -> Result<Value, NodeError> {
        let source = match params.get("expr") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.as_str(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(NodeError::validation("function node missing 'expr'"))
            }
            Some(_) => return Err(NodeError::validation("function node 'expr' must be a string")),
        };

        let expression = Expression::parse(source)
            .map_err(|e| NodeError::validation(format!("invalid expression: {e}")))?;

        let scope = Scope {
            inputs: Value::Array(inputs.to_vec()),
            context: ctx.to_value(),
            meta: meta.to_value(),
        };
        debug!("node '{}' evaluating expression ({} chars)", meta.node_id, source.len());

        expression
            .evaluate(&scope)
            .map_err(|e| NodeError::execution_with("expression evaluation failed", e))
    }
}
