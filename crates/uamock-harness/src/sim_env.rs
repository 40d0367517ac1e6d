//! Virtual-time environment.
//!
//! Wall-clock time is a fixed epoch plus the virtual time elapsed since the
//! environment was created. Inside turmoil (or a paused tokio runtime) that
//! elapsed time is fully controlled by the simulation.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tokio::time::Instant;
use uamock_core::env::Environment;

/// Calendar start of every simulation: 2024-01-15 10:30:00.
pub const SIM_EPOCH: (i32, u32, u32, u32, u32, u32) = (2024, 1, 15, 10, 30, 0);

/// Simulation environment backed by tokio's (virtual) clock.
///
/// Must be created inside the simulated runtime so that `origin` is read
/// from the virtual clock.
#[derive(Debug, Clone, Copy)]
pub struct SimEnv {
    origin: Instant,
    epoch: NaiveDateTime,
}

impl SimEnv {
    /// Environment starting at [`SIM_EPOCH`].
    pub fn new() -> Self {
        let (year, month, day, hour, min, sec) = SIM_EPOCH;
        let epoch = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, min, sec))
            .unwrap_or_default();
        Self::with_epoch(epoch)
    }

    /// Environment starting at an arbitrary wall-clock instant.
    pub fn with_epoch(epoch: NaiveDateTime) -> Self {
        Self { origin: Instant::now(), epoch }
    }

    /// Virtual time since creation.
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn wall_clock(&self) -> NaiveDateTime {
        TimeDelta::from_std(self.elapsed())
            .ok()
            .and_then(|delta| self.epoch.checked_add_signed(delta))
            .unwrap_or(self.epoch)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn wall_clock_starts_at_epoch() {
        let env = SimEnv::new();
        assert_eq!(env.wall_clock().to_string(), "2024-01-15 10:30:00");
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_follows_virtual_time() {
        let env = SimEnv::new();

        env.sleep(Duration::from_millis(2500)).await;

        assert!(env.elapsed() >= Duration::from_millis(2500));
        assert_eq!(env.wall_clock().format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-15 10:30:02");
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_the_origin() {
        let env = SimEnv::new();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let clone = env;

        assert_eq!(env.wall_clock(), clone.wall_clock());
    }
}
