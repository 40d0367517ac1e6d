//! Client-visible faults.
//!
//! Every per-request error is reported to the remote client as a [`Fault`]
//! carrying the OPC UA status code a real server would return. The transport
//! adapter only ever sees faults; nothing here can take the server down.

use std::fmt;

use thiserror::Error;
use uamock_core::{ArgumentFault, DispatchError, HandlerError, NodeIdError, RegistryError};

use crate::ServerError;

/// OPC UA status codes used by the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The node id refers to a node that does not exist.
    BadNodeIdUnknown,
    /// The node id syntax is invalid.
    BadNodeIdInvalid,
    /// The node cannot be read (not a variable).
    BadNotReadable,
    /// The node cannot be written.
    BadNotWritable,
    /// The value's type does not match the variable's type.
    BadTypeMismatch,
    /// The method id does not refer to a callable method.
    BadMethodInvalid,
    /// Fewer arguments than the method declares.
    BadArgumentsMissing,
    /// More arguments than the method declares.
    BadTooManyArguments,
    /// An argument was rejected.
    BadInvalidArgument,
    /// Internal consistency failure in the server.
    BadInternalError,
    /// The server is not running.
    BadServerHalted,
    /// Failure with no more specific code.
    BadUnexpectedError,
}

impl StatusCode {
    /// Numeric status code as defined by OPC UA Part 4.
    pub fn code(self) -> u32 {
        match self {
            Self::BadUnexpectedError => 0x8001_0000,
            Self::BadInternalError => 0x8002_0000,
            Self::BadServerHalted => 0x800E_0000,
            Self::BadNodeIdInvalid => 0x8033_0000,
            Self::BadNodeIdUnknown => 0x8034_0000,
            Self::BadNotReadable => 0x803A_0000,
            Self::BadNotWritable => 0x803B_0000,
            Self::BadTypeMismatch => 0x8074_0000,
            Self::BadMethodInvalid => 0x8075_0000,
            Self::BadArgumentsMissing => 0x8076_0000,
            Self::BadInvalidArgument => 0x80AB_0000,
            Self::BadTooManyArguments => 0x80E5_0000,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A per-request failure as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status} (0x{code:08X}): {message}", code = .status.code())]
pub struct Fault {
    /// Status code.
    pub status: StatusCode,
    /// Diagnostic text.
    pub message: String,
}

impl Fault {
    /// Create a fault.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl From<&RegistryError> for StatusCode {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) | RegistryError::ParentNotFound(_) => Self::BadNodeIdUnknown,
            RegistryError::NotReadable(_) => Self::BadNotReadable,
            RegistryError::NotWritable(_) => Self::BadNotWritable,
            RegistryError::TypeMismatch { .. } => Self::BadTypeMismatch,
            RegistryError::InvalidKind { .. } => Self::BadInvalidArgument,
            RegistryError::DuplicateName { .. }
            | RegistryError::NodeIdInUse(_)
            | RegistryError::InvalidParent { .. }
            | RegistryError::RootImmutable => Self::BadUnexpectedError,
        }
    }
}

impl From<&DispatchError> for StatusCode {
    fn from(err: &DispatchError) -> Self {
        match err {
            DispatchError::MethodNotFound(_) => Self::BadMethodInvalid,
            DispatchError::ArgumentMismatch { fault, .. } => match fault {
                ArgumentFault::Missing { .. } => Self::BadArgumentsMissing,
                ArgumentFault::TooMany { .. } => Self::BadTooManyArguments,
                ArgumentFault::WrongType { .. } => Self::BadInvalidArgument,
            },
            DispatchError::HandlerFailed { source: HandlerError::Failed(_), .. } => {
                Self::BadUnexpectedError
            },
            DispatchError::ContractViolation { .. }
            | DispatchError::HandlerFailed { source: HandlerError::Registry(_), .. }
            | DispatchError::Registry(_) => Self::BadInternalError,
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::Registry(e) => e.into(),
            ServerError::Dispatch(e) => e.into(),
            ServerError::InvalidNodeId(_) => Self::BadNodeIdInvalid,
            ServerError::NotRunning(_) | ServerError::InvalidState { .. } => Self::BadServerHalted,
            ServerError::Initialization(_) | ServerError::Config(_) | ServerError::Internal(_) => {
                Self::BadInternalError
            },
        }
    }
}

impl From<RegistryError> for Fault {
    fn from(err: RegistryError) -> Self {
        Self::new((&err).into(), err.to_string())
    }
}

impl From<DispatchError> for Fault {
    fn from(err: DispatchError) -> Self {
        Self::new((&err).into(), err.to_string())
    }
}

impl From<NodeIdError> for Fault {
    fn from(err: NodeIdError) -> Self {
        Self::new(StatusCode::BadNodeIdInvalid, err.to_string())
    }
}

impl From<ServerError> for Fault {
    fn from(err: ServerError) -> Self {
        Self::new((&err).into(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use uamock_core::{NodeId, ValueType};

    use super::*;

    #[test]
    fn registry_errors_map_to_node_codes() {
        let node = NodeId::string(2, "Counter");

        let fault = Fault::from(RegistryError::NotWritable(node.clone()));
        assert_eq!(fault.status, StatusCode::BadNotWritable);

        let fault = Fault::from(RegistryError::TypeMismatch {
            node,
            expected: ValueType::Int32,
            actual: ValueType::String,
        });
        assert_eq!(fault.status, StatusCode::BadTypeMismatch);
    }

    #[test]
    fn argument_faults_map_to_argument_codes() {
        let method = NodeId::string(2, "AddNumbers");
        let missing = DispatchError::ArgumentMismatch {
            method: method.clone(),
            fault: ArgumentFault::Missing { expected: 2, actual: 0 },
        };
        assert_eq!(Fault::from(missing).status, StatusCode::BadArgumentsMissing);

        let too_many = DispatchError::ArgumentMismatch {
            method,
            fault: ArgumentFault::TooMany { expected: 2, actual: 3 },
        };
        assert_eq!(Fault::from(too_many).status, StatusCode::BadTooManyArguments);
    }

    #[test]
    fn wrapped_server_errors_keep_inner_code() {
        let err = ServerError::Registry(RegistryError::NotFound(NodeId::string(2, "Gone")));
        assert_eq!(Fault::from(err).status, StatusCode::BadNodeIdUnknown);
    }

    #[test]
    fn fault_display_includes_numeric_code() {
        let fault = Fault::new(StatusCode::BadServerHalted, "server is stopped");
        assert_eq!(fault.to_string(), "BadServerHalted (0x800E0000): server is stopped");
    }
}
