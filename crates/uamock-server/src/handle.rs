//! Adapter boundary.
//!
//! [`ServerHandle`] is what a transport adapter holds: browse, read, write
//! and call by textual node id, each gated on the Running state. Errors are
//! [`ServerError`]s; the adapter turns them into [`Fault`](crate::Fault)s for
//! the client.

use std::{
    pin::pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use tokio::sync::{Notify, watch};
use uamock_core::{
    AddressSpace, MethodBinding, NamespaceTable, NodeId, NodeInfo, NodeSummary, Tick, Value,
    WalkEntry,
};

use crate::{ServerError, ServerState, simulator::TickReader};

/// Counts method calls in progress so shutdown can wait for them.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn leave(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolves once no call is in progress.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let mut notified = pin!(self.idle.notified());
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Marks one call in flight until dropped.
struct InFlightGuard {
    shared: Arc<Shared>,
}

impl InFlightGuard {
    fn enter(shared: &Arc<Shared>) -> Self {
        shared.in_flight.count.fetch_add(1, Ordering::AcqRel);
        Self { shared: Arc::clone(shared) }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.leave();
    }
}

pub(crate) struct Shared {
    pub(crate) space: AddressSpace,
    pub(crate) state: watch::Receiver<ServerState>,
    pub(crate) ticks: TickReader,
    pub(crate) endpoint: String,
    pub(crate) in_flight: InFlight,
    retired: AtomicBool,
}

/// Cloneable access to a started server's address space.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl ServerHandle {
    pub(crate) fn new(
        space: AddressSpace,
        state: watch::Receiver<ServerState>,
        ticks: TickReader,
        endpoint: String,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                space,
                state,
                ticks,
                endpoint,
                in_flight: InFlight::default(),
                retired: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn in_flight(&self) -> &InFlight {
        &self.shared.in_flight
    }

    /// Endpoint advertised to clients.
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Detach this handle from the server. A restarted server hands out new
    /// handles; old ones keep reporting Stopped.
    pub(crate) fn retire(&self) {
        self.shared.retired.store(true, Ordering::Release);
    }

    /// Current lifecycle state, as seen by this handle.
    pub fn state(&self) -> ServerState {
        let state = *self.shared.state.borrow();
        if state == ServerState::Running && self.shared.retired.load(Ordering::Acquire) {
            return ServerState::Stopped;
        }
        state
    }

    /// Last completed simulation tick.
    pub fn tick(&self) -> Tick {
        self.shared.ticks.current()
    }

    /// Namespace table.
    pub fn namespaces(&self) -> &NamespaceTable {
        &self.shared.space.namespaces
    }

    /// Index of the application namespace.
    pub fn namespace_index(&self) -> u16 {
        self.shared.space.namespace_index
    }

    /// Id of the root `Objects` folder.
    pub fn root(&self) -> &NodeId {
        self.shared.space.registry.root()
    }

    /// Object owning the canonical methods.
    pub fn server_object(&self) -> &NodeId {
        &self.shared.space.server_object
    }

    /// All method bindings, sorted by id.
    pub fn methods(&self) -> Vec<Arc<MethodBinding>> {
        self.shared.space.dispatcher.bindings()
    }

    /// Text rendering of the address space.
    pub fn render_tree(&self) -> String {
        self.shared.space.registry.render_tree()
    }

    fn ensure_running(&self) -> Result<(), ServerError> {
        match self.state() {
            ServerState::Running => Ok(()),
            state => Err(ServerError::NotRunning(state)),
        }
    }

    fn resolve(&self, node: &str) -> Result<NodeId, ServerError> {
        self.ensure_running()?;
        Ok(node.parse()?)
    }

    /// Direct children of `node`.
    pub fn browse(&self, node: &str) -> Result<Vec<NodeSummary>, ServerError> {
        let id = self.resolve(node)?;
        Ok(self.shared.space.registry.browse(&id)?)
    }

    /// Depth-first listing below `node`, at most `max_depth` levels deep.
    pub fn walk(&self, node: &str, max_depth: usize) -> Result<Vec<WalkEntry>, ServerError> {
        let id = self.resolve(node)?;
        Ok(self.shared.space.registry.walk(&id, max_depth)?)
    }

    /// All attributes of `node`.
    pub fn node_info(&self, node: &str) -> Result<NodeInfo, ServerError> {
        let id = self.resolve(node)?;
        Ok(self.shared.space.registry.node_info(&id)?)
    }

    /// Read a variable.
    pub fn read(&self, node: &str) -> Result<Value, ServerError> {
        let id = self.resolve(node)?;
        Ok(self.shared.space.registry.read_value(&id)?)
    }

    /// Client write (honours the writable flag).
    pub fn write(&self, node: &str, value: Value) -> Result<(), ServerError> {
        let id = self.resolve(node)?;
        self.shared.space.registry.write_value(&id, value)?;
        tracing::debug!("Client wrote {}", id);
        Ok(())
    }

    /// Flip a variable's writable flag.
    pub fn set_writable(&self, node: &str, writable: bool) -> Result<(), ServerError> {
        let id = self.resolve(node)?;
        Ok(self.shared.space.registry.set_writable(&id, writable)?)
    }

    /// Call a method by qualified id or browse name.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Vec<Value>, ServerError> {
        let guard = InFlightGuard::enter(&self.shared);
        self.ensure_running()?;

        let binding = self.shared.space.dispatcher.resolve(method)?;
        self.dispatch(guard, binding.method().clone(), None, args).await
    }

    /// Call `method` on `object`, checking the method belongs to it.
    pub async fn call_on(
        &self,
        object: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ServerError> {
        let guard = InFlightGuard::enter(&self.shared);
        let object = self.resolve(object)?;
        let method = self.resolve(method)?;
        self.dispatch(guard, method, Some(object), args).await
    }

    /// Run the call on its own task so a panicking handler becomes a fault
    /// instead of unwinding into the adapter. The guard moves into the task:
    /// the call stays in flight until the handler finishes, even if the
    /// caller drops this future.
    async fn dispatch(
        &self,
        guard: InFlightGuard,
        method: NodeId,
        object: Option<NodeId>,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ServerError> {
        let dispatcher = Arc::clone(&self.shared.space.dispatcher);
        let label = method.to_string();

        let task = tokio::spawn(async move {
            let _guard = guard;
            match object {
                Some(object) => dispatcher.call_on(&object, &method, args).await,
                None => dispatcher.call(&method, args).await,
            }
        });

        match task.await {
            Ok(result) => Ok(result?),
            Err(e) => {
                tracing::error!("Method {} aborted: {}", label, e);
                Err(ServerError::Internal(format!("method {label} aborted: {e}")))
            },
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("endpoint", &self.shared.endpoint)
            .field("state", &self.state())
            .field("tick", &self.tick())
            .finish_non_exhaustive()
    }
}
