//! Built-in node kinds.

pub mod function;
pub mod http;
pub mod set;

pub use function::FunctionNode;
pub use http::HttpNode;
pub use set::SetNode;
