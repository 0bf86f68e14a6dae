//! Error types for dircache-core
//!
//! Remote failures, load-cycle failures and cache misuse share one
//! thiserror hierarchy so callers can match on what went wrong.

use crate::loader::LoadStage;
use dircache_types::{ObjectId, TypeId};
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a remote session implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Core error type for dircache operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // Remote Errors
    // ===================
    #[error("Remote call {operation} failed: {source}")]
    Remote {
        operation: String,
        #[source]
        source: RemoteError,
    },

    #[error("Operation timed out after {timeout_secs}s: {operation}")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    // ===================
    // Loader Errors
    // ===================
    #[error("Load cycle {generation} failed before {stage}: {message}")]
    LoadFailed {
        generation: u64,
        stage: LoadStage,
        message: String,
    },

    #[error("Loader has been shut down")]
    LoaderShutdown,

    #[error("Unknown object type: {type_id}")]
    UnknownType { type_id: TypeId },

    // ===================
    // Cache Errors
    // ===================
    #[error("No listing cached for type {type_id}")]
    NotCached { type_id: TypeId },

    #[error("Listing already contains non-editable handles")]
    AlreadyAugmented,

    #[error("Object {object_id} does not belong to type {type_id}")]
    WrongType { object_id: ObjectId, type_id: TypeId },

    // ===================
    // Snapshot Errors
    // ===================
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse JSON in {path}: {message}")]
    JsonParse {
        path: PathBuf,
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CoreError {
    /// Wrap a session failure with the name of the call that produced it
    pub fn remote(operation: impl Into<String>, source: RemoteError) -> Self {
        CoreError::Remote {
            operation: operation.into(),
            source,
        }
    }

    /// True for failures caused by the server or the connection to it
    pub fn is_remote(&self) -> bool {
        matches!(self, CoreError::Remote { .. } | CoreError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_message_includes_operation() {
        let err = CoreError::remote("type_list", RemoteError::new("connection refused"));
        assert_eq!(
            err.to_string(),
            "Remote call type_list failed: connection refused"
        );
        assert!(err.is_remote());
    }

    #[test]
    fn test_load_failed_names_stage() {
        let err = CoreError::LoadFailed {
            generation: 2,
            stage: LoadStage::TypeList,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Load cycle 2 failed before type list: boom");
        assert!(!err.is_remote());
    }
}
