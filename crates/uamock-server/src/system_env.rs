//! Production Environment implementation using the system clock.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait backed by the local wall clock and tokio timers.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use uamock_core::env::Environment;

/// Production environment using the system clock.
///
/// This implementation:
/// - Uses `chrono::Local::now()` for wall-clock time
/// - Uses `tokio::time::sleep()` for async sleeping
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn wall_clock(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
