//! Node-level error type.

use thiserror::Error;

/// Boxed error carried as the cause of an execution failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by a node's `execute` method.
///
/// The engine never retries either variant; the variant only decides how the
/// failure is categorised in the run log:
/// - `Validation`: a required parameter is missing or malformed.
/// - `Execution`:  anything that went wrong while doing the node's work.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node's parameters are unusable; no side effects were attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// The node started its work and failed.
    #[error("{message}")]
    Execution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl NodeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Execution failure caused by an underlying error (transport, parse, ...).
    pub fn execution_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// `true` for [`NodeError::Validation`].
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
