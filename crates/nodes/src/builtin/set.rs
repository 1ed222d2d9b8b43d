//! `set`: emits a fixed value.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::traits::{ExecutableNode, ExecutionContext, NodeMeta};
use crate::NodeError;

/// Returns its `values` parameter unchanged; inputs are ignored.
///
/// A node without `values` produces an empty object.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetNode;

#[async_trait]
impl ExecutableNode for SetNode {
    async fn execute(
        &self,
        params: &Value,
        _inputs: &[Value],
        _ctx: &ExecutionContext,
        _meta: &NodeMeta,
    ) -> Result<Value, NodeError> {
        Ok(params
            .get("values")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}
