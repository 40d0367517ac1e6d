//! Server Lifecycle Controller
//!
//! ```text
//! Stopped -> Initializing -> Running -> ShuttingDown -> Stopped
//!               |
//!               +-- build failure --> Stopped
//! ```
//!
//! - Initializing builds the address space; any failure is fatal and the
//!   server returns to Stopped without ever reaching Running.
//! - Running owns the simulator task and hands out [`ServerHandle`]s.
//! - ShuttingDown raises the simulator's stop flag, waits for it and for
//!   in-flight method calls within one bounded deadline, then returns to
//!   Stopped. A simulator that misses the deadline is aborted with a warning.
//!
//! State is published on a `watch` channel; stop requests outside Running are
//! no-ops.

use std::{fmt, future::Future};

use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::{Instant, timeout_at},
};
use uamock_core::{AddressSpaceBuilder, NodeKind, Tick, env::Environment};

use crate::{
    ServerConfig, ServerError, ServerHandle,
    simulator::{SimulatorConfig, ValueSimulator},
};

/// Lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ServerState {
    /// Not started, or fully stopped.
    #[default]
    Stopped,
    /// Building the address space.
    Initializing,
    /// Serving requests; the simulator is active.
    Running,
    /// Stopping the simulator and draining calls.
    ShuttingDown,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happened during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Last tick the simulator completed.
    pub final_tick: Tick,
    /// The simulator missed the deadline and was aborted.
    pub simulator_aborted: bool,
    /// Every in-flight method call finished before the deadline.
    pub drained: bool,
}

struct Running {
    handle: ServerHandle,
    stop: watch::Sender<bool>,
    simulator: JoinHandle<Tick>,
}

/// The mock server.
pub struct Server<E> {
    env: E,
    config: ServerConfig,
    state: watch::Sender<ServerState>,
    running: Mutex<Option<Running>>,
}

impl<E: Environment> Server<E> {
    /// Create a stopped server.
    pub fn new(env: E, config: ServerConfig) -> Self {
        let (state, _) = watch::channel(ServerState::Stopped);
        Self { env, config, state, running: Mutex::new(None) }
    }

    /// Configuration the server was created with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Handle of the running server.
    ///
    /// # Errors
    ///
    /// `NotRunning` outside the Running state.
    pub async fn handle(&self) -> Result<ServerHandle, ServerError> {
        let running = self.running.lock().await;
        match running.as_ref() {
            Some(r) if self.state() == ServerState::Running => Ok(r.handle.clone()),
            _ => Err(ServerError::NotRunning(self.state())),
        }
    }

    fn transition(&self, to: ServerState) {
        let from = self.state.send_replace(to);
        tracing::info!("Server state: {} -> {}", from, to);
    }

    /// Build the address space, start the simulator and enter Running.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the server is Stopped
    /// - `Config` if the configuration is invalid
    /// - `Initialization` if the address space cannot be built (the server
    ///   is left Stopped)
    pub async fn start(&self) -> Result<ServerHandle, ServerError> {
        let mut running = self.running.lock().await;

        let current = self.state();
        if current != ServerState::Stopped {
            return Err(ServerError::InvalidState {
                expected: ServerState::Stopped,
                actual: current,
            });
        }
        self.config.validate()?;

        self.transition(ServerState::Initializing);
        let built = AddressSpaceBuilder::new(self.env.clone())
            .server_name(self.config.server_name.clone())
            .namespace_uri(self.config.namespace_uri.clone())
            .profile(self.config.profile)
            .reboot_delay(self.config.reboot_delay)
            .extra_variables(self.config.extra_variables.clone())
            .build();
        let space = match built {
            Ok(space) => space,
            Err(e) => {
                tracing::error!("Failed to initialize server: {}", e);
                self.transition(ServerState::Stopped);
                return Err(e.into());
            },
        };

        let simulator = ValueSimulator::new(
            self.env.clone(),
            std::sync::Arc::clone(&space.registry),
            space.simulated.clone(),
            SimulatorConfig::from(&self.config),
        );
        let handle = ServerHandle::new(
            space,
            self.state.subscribe(),
            simulator.tick_reader(),
            self.config.advertised_endpoint.clone(),
        );

        let (stop, stop_rx) = watch::channel(false);
        self.transition(ServerState::Running);
        let task = tokio::spawn(simulator.run(stop_rx));

        self.log_banner(&handle);
        *running = Some(Running { handle: handle.clone(), stop, simulator: task });
        Ok(handle)
    }

    fn log_banner(&self, handle: &ServerHandle) {
        tracing::info!("{} running", self.config.server_name);
        tracing::info!("Binding to {}", self.config.bind_endpoint);
        tracing::info!("Endpoint: {}", handle.endpoint());
        tracing::info!("Namespace index: {} ({})", handle.namespace_index(), self.config.namespace_uri);

        if let Ok(entries) = handle.walk(&handle.root().to_string(), usize::MAX) {
            for entry in entries.iter().filter(|e| e.node.kind == NodeKind::Variable) {
                if let Some(value_type) = entry.node.value_type {
                    tracing::info!("  {} ({})", entry.node.id, value_type);
                }
            }
        }
        for binding in handle.methods() {
            tracing::info!("  {} {}", binding.browse_name(), binding.signature());
        }
    }

    /// Stop the simulator, drain method calls and return to Stopped.
    ///
    /// Returns `None` when the server was not running (already stopped or
    /// already shutting down).
    pub async fn shutdown(&self) -> Option<ShutdownReport> {
        if self.state() != ServerState::Running {
            tracing::debug!("Shutdown requested while {}, ignoring", self.state());
            return None;
        }

        let mut running = self.running.lock().await;
        let Running { handle, stop, mut simulator } = running.take()?;

        handle.retire();
        self.transition(ServerState::ShuttingDown);
        let deadline = Instant::now() + self.config.shutdown_timeout;

        // The simulator may already have exited; nothing to signal then.
        let _ = stop.send(true);

        let (final_tick, simulator_aborted) = match timeout_at(deadline, &mut simulator).await {
            Ok(Ok(tick)) => (tick, false),
            Ok(Err(e)) => {
                tracing::error!("Simulator task failed: {}", e);
                (handle.tick(), false)
            },
            Err(_) => {
                tracing::warn!(
                    "Simulator did not stop within {:?}, aborting",
                    self.config.shutdown_timeout
                );
                simulator.abort();
                (handle.tick(), true)
            },
        };

        let drained = timeout_at(deadline, handle.in_flight().wait_idle()).await.is_ok();
        if !drained {
            tracing::warn!(
                "{} method calls still in flight after {:?}",
                handle.in_flight().count(),
                self.config.shutdown_timeout
            );
        }

        self.transition(ServerState::Stopped);
        tracing::info!("Server stopped at tick {}", final_tick);
        Some(ShutdownReport { final_tick, simulator_aborted, drained })
    }

    /// Start, serve until `signal` resolves, then shut down.
    ///
    /// # Errors
    ///
    /// Any error from [`start`](Self::start).
    pub async fn run_until<F>(&self, signal: F) -> Result<Option<ShutdownReport>, ServerError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        signal.await;
        tracing::info!("Stop signal received");
        Ok(self.shutdown().await)
    }
}

impl<E> fmt::Debug for Server<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("state", &*self.state.borrow())
            .field("endpoint", &self.config.advertised_endpoint)
            .finish_non_exhaustive()
    }
}
