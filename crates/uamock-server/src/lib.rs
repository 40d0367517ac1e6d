//! uamock production server.
//!
//! Drives the core address space at runtime:
//! - Tokio for the simulator task and method calls
//! - Local wall-clock time for the clock-derived variables
//!
//! ## Architecture
//!
//! ```text
//! uamock-server
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ ServerConfig       (endpoints, cadence, timeouts)
//!   ├─ Server             (lifecycle state machine)
//!   ├─ ValueSimulator     (periodic tick + variable rewrite)
//!   ├─ ServerHandle       (adapter boundary: browse/read/write/call)
//!   └─ Fault              (client-visible status codes)
//! ```
//!
//! The wire protocol is not implemented here. A transport adapter holds a
//! [`ServerHandle`] and maps its results and [`Fault`]s onto the protocol.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod fault;
mod handle;
mod lifecycle;
pub mod simulator;
mod system_env;

pub use config::{DEFAULT_ADVERTISED_ENDPOINT, DEFAULT_BIND_ENDPOINT, ENDPOINT_SCHEME, ServerConfig};
pub use error::ServerError;
pub use fault::{Fault, StatusCode};
pub use handle::ServerHandle;
pub use lifecycle::{Server, ServerState, ShutdownReport};
pub use simulator::{CycleReport, SimulatorConfig, TickReader, ValueSimulator};
pub use system_env::SystemEnv;
