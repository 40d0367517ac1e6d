//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the simulator and method handlers from
//! the system clock. This enables:
//!
//! - Deterministic Simulation: the harness supplies a virtual clock, so
//!   timestamps and reboot delays replay identically.
//!
//! - Production Runtime: the server uses `chrono::Local` and tokio timers
//!   without any change to the value rules or handlers.
//!
//! # Invariants
//!
//! - Monotonicity: `wall_clock()` must never go backwards within one run
//! - Isolation: Implementations must not share global state

use std::time::Duration;

use chrono::NaiveDateTime;

/// Abstract environment providing wall-clock time and async sleeping.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current local wall-clock time.
    ///
    /// Used for the Timestamp and DynamicString variables, so simulation
    /// implementations must derive it from virtual time.
    fn wall_clock(&self) -> NaiveDateTime;

    /// Sleeps for the specified duration.
    ///
    /// Used by the simulator cadence and by slow method handlers (Reboot).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
