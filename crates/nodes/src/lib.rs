//! `nodes` crate: the `ExecutableNode` trait, the handler registry and the
//! built-in node kinds.
//!
//! Every node (built-in or registered by an embedding application) implements
//! [`ExecutableNode`]. The engine crate looks handlers up in a
//! [`NodeRegistry`] and dispatches execution through the trait object.

pub mod builtin;
pub mod error;
pub mod expr;
pub mod mock;
pub mod placeholder;
pub mod registry;
pub mod traits;

pub use error::NodeError;
pub use registry::{NodeRegistry, NodesConfig};
pub use traits::{ExecutableNode, ExecutionContext, NodeMeta};
