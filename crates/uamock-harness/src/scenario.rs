//! Scenario runner.
//!
//! A [`Scenario`] starts one server inside a turmoil simulation, samples
//! every variable half-way between simulator cycles, fires scheduled method
//! calls, and shuts the server down when the observation window closes.
//! Everything the run observed is collected into a [`World`] that an oracle
//! can check.
//!
//! ```text
//! t = 0         start, cycle 1
//! t = I/2       observation 0
//! t = I         cycle 2
//! t = 3I/2      observation 1
//! ...
//! t = duration  shutdown
//! ```

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use thiserror::Error;
use tokio::time::Instant;
use uamock_core::{NodeKind, Profile, Tick, Value};
use uamock_server::{Fault, Server, ServerConfig, ServerHandle, ShutdownReport};

use crate::sim_env::SimEnv;

/// Oracle invoked with the observed world after the simulation completes.
pub type Oracle = Box<dyn FnOnce(&World) -> Result<(), String>>;

/// Scenario failure.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Turmoil reported an error (including a server start failure).
    #[error("simulation failed: {0}")]
    Simulation(String),

    /// The simulation ended without recording a world.
    #[error("simulation ended without an observation")]
    Incomplete,

    /// The oracle rejected the observed world.
    #[error("oracle failed: {0}")]
    Oracle(String),
}

/// Method call fired at a fixed offset from server start.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCall {
    /// Offset from server start.
    pub at: Duration,
    /// Method browse name or node id string.
    pub method: String,
    /// Input arguments.
    pub args: Vec<Value>,
}

/// Result of a [`ScheduledCall`].
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// Method as scheduled.
    pub method: String,
    /// Offset at which the call was issued.
    pub issued_at: Duration,
    /// Offset at which the call returned.
    pub completed_at: Duration,
    /// Outputs, or the fault a client would see.
    pub result: Result<Vec<Value>, Fault>,
}

/// One sample of every variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Offset from server start.
    pub at: Duration,
    /// Simulator tick at the time of the sample.
    pub tick: Tick,
    /// Variable browse names and values, in address-space walk order.
    pub values: Vec<(String, Value)>,
}

impl Observation {
    /// Value of the variable with this browse name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Everything a scenario run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    observations: Vec<Observation>,
    calls: Vec<CallOutcome>,
    report: ShutdownReport,
    final_tree: String,
}

impl World {
    /// Samples in time order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Outcomes in schedule order.
    pub fn calls(&self) -> &[CallOutcome] {
        &self.calls
    }

    /// Shutdown report.
    pub fn report(&self) -> &ShutdownReport {
        &self.report
    }

    /// Address-space tree rendered after shutdown.
    pub fn final_tree(&self) -> &str {
        &self.final_tree
    }

    /// Last sample, if any were taken.
    pub fn last_observation(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

/// Builder for a single-server simulation.
pub struct Scenario {
    config: ServerConfig,
    duration: Duration,
    seed: u64,
    calls: Vec<ScheduledCall>,
    oracle: Option<Oracle>,
}

impl Scenario {
    /// Scenario with the default server config and a 10 second window.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            duration: Duration::from_secs(10),
            seed: 0,
            calls: Vec::new(),
            oracle: None,
        }
    }

    /// Replace the server config.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Select the address-space profile.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.config.profile = profile;
        self
    }

    /// Length of the observation window.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Turmoil RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fire `method` at offset `at` from server start.
    pub fn call_at(mut self, at: Duration, method: impl Into<String>, args: Vec<Value>) -> Self {
        self.calls.push(ScheduledCall { at, method: method.into(), args });
        self
    }

    /// Check the observed world after the run.
    pub fn oracle(mut self, oracle: Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Run the simulation, then the oracle.
    ///
    /// # Errors
    ///
    /// - `Simulation` if the server fails to start or turmoil errors
    /// - `Incomplete` if the run recorded nothing
    /// - `Oracle` if the oracle rejects the world
    pub fn run(self) -> Result<World, ScenarioError> {
        let Self { config, duration, seed, calls, oracle } = self;

        let last_call = calls.iter().map(|c| c.at).max().unwrap_or_default();
        let budget = duration.max(last_call)
            + config.shutdown_timeout
            + config.reboot_delay
            + Duration::from_secs(10);

        tracing::info!("Scenario seed {}, window {:?}, {} calls", seed, duration, calls.len());

        let mut sim = turmoil::Builder::new().simulation_duration(budget).rng_seed(seed).build();

        let slot: Arc<Mutex<Option<World>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);

        sim.client("observer", async move {
            let world = observe(config, duration, calls).await?;
            *sink.lock().map_err(|_| "world slot poisoned")? = Some(world);
            Ok(())
        });

        sim.run().map_err(|e| ScenarioError::Simulation(e.to_string()))?;

        let world = slot.lock().map_err(|_| ScenarioError::Incomplete)?.take();
        let world = world.ok_or(ScenarioError::Incomplete)?;

        if let Some(oracle) = oracle {
            oracle(&world).map_err(ScenarioError::Oracle)?;
        }

        Ok(world)
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

async fn observe(
    config: ServerConfig,
    duration: Duration,
    calls: Vec<ScheduledCall>,
) -> Result<World, Box<dyn std::error::Error>> {
    let interval = config.update_interval;
    let server = Server::new(SimEnv::new(), config);
    let handle = server.start().await?;
    let start = Instant::now();

    let pending: Vec<_> = calls
        .into_iter()
        .map(|call| tokio::spawn(fire(handle.clone(), start, call)))
        .collect();

    let mut observations = Vec::new();
    let mut offset = interval / 2;
    while offset < duration {
        tokio::time::sleep_until(start + offset).await;
        observations.push(sample(&handle, offset)?);
        offset += interval;
    }

    tokio::time::sleep_until(start + duration).await;
    let report = server.shutdown().await.ok_or("server was not running at shutdown")?;

    let mut outcomes = Vec::with_capacity(pending.len());
    for task in pending {
        outcomes.push(task.await?);
    }

    Ok(World { observations, calls: outcomes, report, final_tree: handle.render_tree() })
}

async fn fire(handle: ServerHandle, start: Instant, call: ScheduledCall) -> CallOutcome {
    tokio::time::sleep_until(start + call.at).await;
    let issued_at = start.elapsed();
    let result = handle.call(&call.method, call.args).await.map_err(Fault::from);

    CallOutcome { method: call.method, issued_at, completed_at: start.elapsed(), result }
}

fn sample(handle: &ServerHandle, at: Duration) -> Result<Observation, Fault> {
    let tick = handle.tick();
    let root = handle.root().to_string();
    let mut values = Vec::new();

    for entry in handle.walk(&root, usize::MAX)? {
        if entry.node.kind == NodeKind::Variable {
            let value = handle.read(&entry.node.id.to_string())?;
            values.push((entry.node.browse_name, value));
        }
    }

    Ok(Observation { at, tick, values })
}
