//! Server error types.

use thiserror::Error;
use uamock_core::{DispatchError, InitializationError, NodeIdError, RegistryError};

use crate::ServerState;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Address-space construction failed; the server never reached Running.
    #[error("initialization failed: {0}")]
    Initialization(#[from] InitializationError),

    /// Operation requires the Running state.
    #[error("server is not running (state: {0})")]
    NotRunning(ServerState),

    /// Lifecycle transition requested from the wrong state.
    #[error("invalid lifecycle transition: expected {expected}, server is {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: ServerState,
        /// Current state.
        actual: ServerState,
    },

    /// Registry operation failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Method dispatch failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Malformed node id.
    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] NodeIdError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if the server cannot continue (or never started).
    ///
    /// Per-request errors are never fatal; they become client faults.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Initialization(_) | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use uamock_core::NodeId;

    use super::*;

    #[test]
    fn only_startup_errors_are_fatal() {
        let init = ServerError::Initialization(InitializationError::NamespaceTableFull(
            "urn:x".to_string(),
        ));
        assert!(init.is_fatal());
        assert!(ServerError::Config("bad".to_string()).is_fatal());

        let request = ServerError::Registry(RegistryError::NotFound(NodeId::string(2, "Gone")));
        assert!(!request.is_fatal());
        assert!(!ServerError::NotRunning(ServerState::Stopped).is_fatal());
    }
}
