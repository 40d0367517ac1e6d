//! uamock core.
//!
//! The in-memory object model of the mock OPC UA server: node ids, typed
//! values, the node registry, the deterministic value rules, and the
//! remote-method dispatch table. Nothing in this crate owns a runtime; the
//! server crate drives it.
//!
//! ## Architecture
//!
//! ```text
//! uamock-core
//!   ├─ NodeId / Value          (addressing and typed values)
//!   ├─ NamespaceTable          (namespace URI -> index)
//!   ├─ NodeRegistry            (hierarchy + current values, internally locked)
//!   ├─ Rule                    (pure f(tick) -> Value)
//!   ├─ MethodDispatcher        (qualified id -> typed handler binding)
//!   ├─ handlers                (Reboot, AddNumbers, ResetCounter)
//!   └─ AddressSpaceBuilder     (canonical Full / Minimal layouts)
//! ```
//!
//! Time is only reached through the [`env::Environment`] trait, so the same
//! code runs against the system clock in production and a virtual clock in
//! simulation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address_space;
pub mod dispatcher;
pub mod env;
mod error;
pub mod handlers;
mod namespace;
mod node_id;
pub mod registry;
pub mod rules;
mod value;

pub use address_space::{AddressSpace, AddressSpaceBuilder, Profile, SimulatedVariable};
pub use dispatcher::{
    ArgumentFault, FnHandler, MethodBinding, MethodContext, MethodDispatcher, MethodHandler,
    MethodSignature, handler_fn,
};
pub use error::{DispatchError, HandlerError, InitializationError, RegistryError};
pub use namespace::NamespaceTable;
pub use node_id::{Identifier, NodeId, NodeIdError};
pub use registry::{NodeInfo, NodeKind, NodeRegistry, NodeSummary, QualifiedName, WalkEntry};
pub use rules::{Rule, Tick};
pub use value::{Value, ValueType};
