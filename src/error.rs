use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy for the bill engine.
///
/// The split mirrors how callers are expected to react: validation,
/// not-found, state-conflict and authorization errors indicate a caller or
/// workflow bug and are never retried; processor errors are retryable up to
/// the policy limit; extraction failures degrade the pipeline to a manual
/// draft instead of aborting it.
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A decision targeted a step that is not the approval's unique
    /// awaiting step.
    #[error("no pending step at position {step}")]
    NoPendingStep { step: u32 },

    #[error("actor {actor} is not authorized for role {role}")]
    NotAuthorized { actor: String, role: String },

    /// The document yielded no usable data. Non-fatal inside ingestion:
    /// the bill is still created as a draft for manual completion.
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("payment processor error: {message}")]
    Processor { message: String, retryable: bool },

    #[error("storage error: {0}")]
    Storage(String),

    #[cfg(feature = "storage-rocksdb")]
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::StateConflict(message.into())
    }

    pub fn not_authorized(actor: impl Into<String>, role: impl Into<String>) -> Self {
        Self::NotAuthorized {
            actor: actor.into(),
            role: role.into(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    pub fn processor(message: impl Into<String>, retryable: bool) -> Self {
        Self::Processor {
            message: message.into(),
            retryable,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn internal(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Box::new(error))
    }

    /// Stable error kind carried across the public operation surface.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::StateConflict(_) => "state_conflict",
            Self::NoPendingStep { .. } => "no_pending_step",
            Self::NotAuthorized { .. } => "not_authorized",
            Self::Extraction(_) => "extraction_failure",
            Self::Processor { .. } => "processor_error",
            Self::Storage(_) => "storage",
            #[cfg(feature = "storage-rocksdb")]
            Self::Database(_) => "database",
            Self::Csv(_) => "csv",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Processor { retryable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(EngineError::validation("bad").kind(), "validation");
        assert_eq!(EngineError::not_found("bill", "b-1").kind(), "not_found");
        assert_eq!(
            EngineError::NoPendingStep { step: 2 }.kind(),
            "no_pending_step"
        );
    }

    #[test]
    fn test_retryable_flag() {
        assert!(EngineError::processor("timeout", true).is_retryable());
        assert!(!EngineError::processor("declined", false).is_retryable());
        assert!(!EngineError::state_conflict("finalized").is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = EngineError::not_authorized("jane", "finance");
        assert_eq!(
            err.to_string(),
            "actor jane is not authorized for role finance"
        );

        let err = EngineError::not_found("approval", "a-9");
        assert_eq!(err.to_string(), "approval not found: a-9");
    }
}
