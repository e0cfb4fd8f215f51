//! Error types for the mailbox and routing core

use thiserror::Error;

use crate::address::Address;

/// Errors from actor, mailbox and routing operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("Address not found: {0}")]
    AddressNotFound(Address),

    #[error("Address already in use: {0}")]
    AddressInUse(Address),

    #[error("Actor stopped: {0}")]
    ActorStopped(Address),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing '{key}' in {action} envelope from {sender}")]
    MissingMetadata {
        action: String,
        key: String,
        sender: Address,
    },

    #[error("Undeliverable to {failed:?}: {reason}")]
    Undeliverable { failed: Vec<Address>, reason: String },

    #[error("Behavior '{0}' panicked")]
    BehaviorPanicked(String),
}

/// Result of core operations
pub type MeshResult<T> = Result<T, MeshError>;

impl MeshError {
    /// Build a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True for errors raised when constructing or starting components
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MeshError::AddressNotFound("ghost@localhost".into());
        assert_eq!(err.to_string(), "Address not found: ghost@localhost");

        let err = MeshError::MissingMetadata {
            action: "publish".to_string(),
            key: "topic".to_string(),
            sender: "p@localhost".into(),
        };
        assert!(err.to_string().contains("'topic'"));
        assert!(err.to_string().contains("p@localhost"));
    }

    #[test]
    fn test_is_configuration() {
        assert!(MeshError::config("no workers").is_configuration());
        assert!(!MeshError::ActorStopped("a".into()).is_configuration());
    }
}
