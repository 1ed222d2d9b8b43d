//! `engine` crate: workflow definitions, DAG scheduling, and the executor
//! that turns a definition into a `RunResult`.

pub mod dag;
pub mod error;
pub mod executor;
pub mod models;

pub use dag::{incoming_sources, validate_dag};
pub use error::{EngineError, ErrorKind};
pub use executor::WorkflowExecutor;
pub use models::{
    Edge, ExecutionLogEntry, LogStatus, NodeDefinition, RunResult, RunStatus, WorkflowDefinition,
};
