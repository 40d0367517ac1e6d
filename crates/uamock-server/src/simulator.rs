//! Value Simulator
//!
//! The periodic task that advances the simulation tick and rewrites every
//! simulated variable from its rule.
//!
//! ## Cycle
//!
//! 1. Advance the tick
//! 2. Evaluate each rule for the new tick and the cycle's wall-clock instant
//! 3. Write every value (server-side, ignoring the writable flag)
//! 4. Publish the tick to readers
//! 5. Sleep the update interval, or the error backoff if any write failed
//!
//! The stop flag is only checked between cycles, and a cycle runs without
//! yielding, so a stopped simulator never leaves a cycle half applied.
//! A failed write is logged and skipped; the remaining variables of the same
//! cycle are still updated.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::watch;
use uamock_core::{NodeId, NodeRegistry, RegistryError, SimulatedVariable, Tick, env::Environment};

use crate::ServerConfig;

/// Cadence settings of the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Time between cycles.
    pub update_interval: Duration,
    /// Wait after a cycle with at least one failed write.
    pub error_backoff: Duration,
    /// Log a progress line every this many cycles (0 disables).
    pub log_every_cycles: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for SimulatorConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            update_interval: config.update_interval,
            error_backoff: config.error_backoff,
            log_every_cycles: config.log_every_cycles,
        }
    }
}

/// Outcome of one simulation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Tick the cycle computed values for.
    pub tick: Tick,
    /// Variables written successfully.
    pub written: usize,
    /// Variables that could not be written.
    pub failures: Vec<(NodeId, RegistryError)>,
}

impl CycleReport {
    /// Returns true if every variable was written.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read-only view of the simulator's tick.
#[derive(Debug, Clone)]
pub struct TickReader {
    tick: Arc<AtomicU64>,
}

impl TickReader {
    /// Last completed tick (0 before the first cycle).
    pub fn current(&self) -> Tick {
        Tick(self.tick.load(Ordering::Acquire))
    }
}

/// Periodic writer of the simulated variables.
pub struct ValueSimulator<E> {
    env: E,
    registry: Arc<NodeRegistry>,
    variables: Vec<SimulatedVariable>,
    config: SimulatorConfig,
    tick: Tick,
    published: Arc<AtomicU64>,
}

impl<E: Environment> ValueSimulator<E> {
    /// Create a simulator at tick 0.
    pub fn new(
        env: E,
        registry: Arc<NodeRegistry>,
        variables: Vec<SimulatedVariable>,
        config: SimulatorConfig,
    ) -> Self {
        Self {
            env,
            registry,
            variables,
            config,
            tick: Tick::default(),
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle for observing the tick from other tasks.
    pub fn tick_reader(&self) -> TickReader {
        TickReader { tick: Arc::clone(&self.published) }
    }

    /// Current tick.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Run one cycle.
    pub fn step(&mut self) -> CycleReport {
        self.tick = self.tick.next();
        let now = self.env.wall_clock();

        let mut written = 0;
        let mut failures = Vec::new();
        for variable in &self.variables {
            let value = variable.rule.evaluate(self.tick, now);
            match self.registry.update_value(&variable.node, value) {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::error!("Error updating {} at tick {}: {}", variable.node, self.tick, e);
                    failures.push((variable.node.clone(), e));
                },
            }
        }

        self.published.store(self.tick.value(), Ordering::Release);
        CycleReport { tick: self.tick, written, failures }
    }

    /// Cycle until `stop` turns true (or its sender is dropped).
    ///
    /// Returns the last completed tick.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Tick {
        tracing::info!(
            "Value simulator started: {} variables, interval {:?}",
            self.variables.len(),
            self.config.update_interval
        );

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            let report = self.step();
            let log_every = self.config.log_every_cycles;
            if log_every > 0 && report.tick.value() % log_every == 0 {
                tracing::info!("Updated variables (cycle #{})", report.tick);
            } else {
                tracing::debug!("Cycle #{}: {} variables written", report.tick, report.written);
            }

            let pause = if report.is_clean() {
                self.config.update_interval
            } else {
                tracing::warn!(
                    "{} variable updates failed, backing off {:?}",
                    report.failures.len(),
                    self.config.error_backoff
                );
                self.config.error_backoff
            };

            tokio::select! {
                () = self.env.sleep(pause) => {},
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                },
            }
        }

        tracing::info!("Value simulator stopped at tick {}", self.tick);
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use uamock_core::{Rule, Value};

    use super::*;

    #[derive(Clone)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn wall_clock(&self) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
        }

        fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }
    }

    fn counter_only() -> (Arc<NodeRegistry>, NodeId, ValueSimulator<FixedEnv>) {
        let registry = Arc::new(NodeRegistry::new());
        let root = registry.root().clone();
        let node = registry.add_variable(&root, 2, "Counter", 0).unwrap();
        let variables = vec![SimulatedVariable { node: node.clone(), rule: Rule::Counter }];
        let simulator = ValueSimulator::new(
            FixedEnv,
            Arc::clone(&registry),
            variables,
            SimulatorConfig::default(),
        );
        (registry, node, simulator)
    }

    #[test]
    fn first_cycle_writes_tick_one() {
        let (registry, node, mut simulator) = counter_only();
        let reader = simulator.tick_reader();
        assert_eq!(reader.current(), Tick(0));

        let report = simulator.step();

        assert_eq!(report.tick, Tick(1));
        assert_eq!(report.written, 1);
        assert_eq!(reader.current(), Tick(1));
        assert_eq!(registry.read_value(&node).unwrap(), Value::Int32(1));
    }

    #[test]
    fn default_config_matches_server_defaults() {
        let config = SimulatorConfig::default();
        assert_eq!(config.update_interval, Duration::from_secs(2));
        assert_eq!(config.error_backoff, Duration::from_secs(1));
        assert_eq!(config.log_every_cycles, 10);
    }
}
