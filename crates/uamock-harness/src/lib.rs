//! Deterministic simulation harness for uamock server testing.
//!
//! Turmoil drives a virtual clock for the whole server: the simulator
//! cadence, the Reboot delay, and the wall-clock-derived variables all
//! advance in simulated time. Given the same scenario, every run observes
//! the same values at the same instants.
//!
//! # Example
//!
//! ```rust,ignore
//! use uamock_harness::scenario::Scenario;
//!
//! let world = Scenario::new()
//!     .with_duration(Duration::from_secs(10))
//!     .call_at(Duration::from_secs(3), "Reboot", Vec::new())
//!     .run()?;
//!
//! assert_eq!(world.report().final_tick, Tick(5));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_env;

pub use scenario::{CallOutcome, Observation, Scenario, ScenarioError, ScheduledCall, World};
pub use sim_env::{SIM_EPOCH, SimEnv};
