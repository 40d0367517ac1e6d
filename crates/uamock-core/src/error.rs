//! Core error types.

use thiserror::Error;

use crate::{NodeId, ValueType, dispatcher::ArgumentFault, registry::NodeKind};

/// Errors from [`NodeRegistry`](crate::NodeRegistry) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// A sibling with the same browse name already exists.
    #[error("duplicate name {name:?} under {parent}")]
    DuplicateName {
        /// Parent that already has a child with this name.
        parent: NodeId,
        /// The conflicting browse name.
        name: String,
    },

    /// The derived node id is already used elsewhere in the hierarchy.
    #[error("node id already in use: {0}")]
    NodeIdInUse(NodeId),

    /// Initial value presence does not match the node kind.
    #[error("invalid {kind} node: {reason}")]
    InvalidKind {
        /// Kind of the node being created.
        kind: NodeKind,
        /// What was wrong.
        reason: &'static str,
    },

    /// The parent node does not exist.
    #[error("parent not found: {0}")]
    ParentNotFound(NodeId),

    /// The parent's kind cannot own a child of this kind.
    #[error("{child_kind} cannot be a child of {parent_kind} {parent}")]
    InvalidParent {
        /// The rejected parent.
        parent: NodeId,
        /// Kind of the rejected parent.
        parent_kind: NodeKind,
        /// Kind of the child being created.
        child_kind: NodeKind,
    },

    /// The node does not exist (or no longer exists).
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// Values can only be read from variables.
    #[error("node is not readable: {0}")]
    NotReadable(NodeId),

    /// The node's writable flag is false, or it is not a variable.
    #[error("node is not writable: {0}")]
    NotWritable(NodeId),

    /// Written value's variant differs from the variable's fixed type.
    #[error("type mismatch on {node}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Target variable.
        node: NodeId,
        /// The variable's fixed type.
        expected: ValueType,
        /// Type of the rejected value.
        actual: ValueType,
    },

    /// The root folder cannot be removed.
    #[error("the root node cannot be removed")]
    RootImmutable,
}

/// Failure reported by a method handler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    /// A registry operation inside the handler failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The handler rejected the call.
    #[error("{0}")]
    Failed(String),
}

/// Errors from [`MethodDispatcher`](crate::MethodDispatcher) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// No binding matches the requested method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Arguments do not match the declared input types.
    #[error("argument mismatch calling {method}: {fault}")]
    ArgumentMismatch {
        /// Method that was called.
        method: NodeId,
        /// What did not match.
        fault: ArgumentFault,
    },

    /// The handler returned results that do not match its declared outputs.
    #[error("handler for {method} broke its contract: declared {expected:?}, returned {actual:?}")]
    ContractViolation {
        /// Method whose handler misbehaved.
        method: NodeId,
        /// Declared output types.
        expected: Vec<ValueType>,
        /// Types actually returned.
        actual: Vec<ValueType>,
    },

    /// The handler failed.
    #[error("method {method} failed: {source}")]
    HandlerFailed {
        /// Method that failed.
        method: NodeId,
        /// Failure reported by the handler.
        source: HandlerError,
    },

    /// Registering the method node failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl DispatchError {
    /// Returns true if the error points at a bug in the server rather than
    /// at a bad request.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::ContractViolation { .. } | Self::Registry(_) => true,
            Self::HandlerFailed { source, .. } => matches!(source, HandlerError::Registry(_)),
            Self::MethodNotFound(_) | Self::ArgumentMismatch { .. } => false,
        }
    }
}

/// Errors raised while building the address space. Always fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InitializationError {
    /// Node creation failed.
    #[error("address space construction failed: {0}")]
    Registry(#[from] RegistryError),

    /// Method binding failed.
    #[error("method binding failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// No namespace index left for this URI.
    #[error("namespace table is full, cannot register {0}")]
    NamespaceTableFull(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_requests_are_not_internal() {
        let err = DispatchError::MethodNotFound("Nope".to_string());
        assert!(!err.is_internal());

        let err = DispatchError::HandlerFailed {
            method: NodeId::string(2, "AddNumbers"),
            source: HandlerError::Failed("overflow".to_string()),
        };
        assert!(!err.is_internal());
    }

    #[test]
    fn contract_violation_is_internal() {
        let err = DispatchError::ContractViolation {
            method: NodeId::string(2, "AddNumbers"),
            expected: vec![ValueType::Int32],
            actual: vec![],
        };
        assert!(err.is_internal());
    }

    #[test]
    fn error_display() {
        let err = RegistryError::TypeMismatch {
            node: NodeId::string(2, "Counter"),
            expected: ValueType::Int32,
            actual: ValueType::String,
        };
        assert_eq!(err.to_string(), "type mismatch on ns=2;s=Counter: expected Int32, got String");
    }
}
