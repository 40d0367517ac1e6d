//! Canonical address-space layouts.
//!
//! ```text
//! Full                                   Minimal
//! Objects (i=85)                         Objects (i=85)
//!   TestVariables                          ServerObject
//!     Counter, Temperature, Pressure,        Reboot, AddNumbers
//!     Status, Timestamp, Boolean,            Counter
//!     DynamicString
//!   ServerObject
//!     Reboot, AddNumbers, ResetCounter
//! ```
//!
//! Every node lives in the registered application namespace (index 2 with
//! the default table), so ids read `ns=2;s=<BrowseName>`.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use crate::{
    InitializationError, MethodDispatcher, NamespaceTable, NodeId, NodeRegistry, Rule, Value,
    env::Environment,
    handlers::{AddNumbers, DEFAULT_REBOOT_DELAY, Reboot, ResetCounter},
    registry::QualifiedName,
    rules,
};

/// Default application namespace URI.
pub const DEFAULT_NAMESPACE_URI: &str = "http://test-opcua-server.local";

/// Default server name.
pub const DEFAULT_SERVER_NAME: &str = "OPC-UA Test Server for opcua-walker";

/// Browse name of the folder holding the simulated variables.
pub const TEST_VARIABLES_FOLDER: &str = "TestVariables";

/// Browse name of the object owning the methods.
pub const SERVER_OBJECT: &str = "ServerObject";

/// Which layout to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Profile {
    /// Seven simulated variables plus Reboot, AddNumbers, ResetCounter.
    #[default]
    Full,
    /// One static Counter plus Reboot and AddNumbers; nothing simulated.
    Minimal,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Minimal => "minimal",
        })
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "minimal" => Ok(Self::Minimal),
            other => Err(format!("unknown profile {other:?} (expected full or minimal)")),
        }
    }
}

/// A variable the simulator drives, with its update rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedVariable {
    /// Variable node id.
    pub node: NodeId,
    /// Update rule.
    pub rule: Rule,
}

/// A fully built address space.
#[derive(Debug)]
pub struct AddressSpace {
    /// Node hierarchy and values.
    pub registry: Arc<NodeRegistry>,
    /// Method bindings over `registry`.
    pub dispatcher: Arc<MethodDispatcher>,
    /// Namespace URIs.
    pub namespaces: NamespaceTable,
    /// Index of the application namespace.
    pub namespace_index: u16,
    /// Object owning the methods.
    pub server_object: NodeId,
    /// Variables driven by the simulator, in update order.
    pub simulated: Vec<SimulatedVariable>,
}

/// Builds an [`AddressSpace`] for a [`Profile`].
pub struct AddressSpaceBuilder<E> {
    env: E,
    server_name: String,
    namespace_uri: String,
    profile: Profile,
    reboot_delay: Duration,
    extra_variables: Vec<(String, Value)>,
}

impl<E: Environment> AddressSpaceBuilder<E> {
    /// Builder with the default name, namespace and the `Full` profile.
    pub fn new(env: E) -> Self {
        Self {
            env,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            namespace_uri: DEFAULT_NAMESPACE_URI.to_string(),
            profile: Profile::Full,
            reboot_delay: DEFAULT_REBOOT_DELAY,
            extra_variables: Vec::new(),
        }
    }

    /// Set the server name (used for the server namespace URI).
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Set the application namespace URI.
    #[must_use]
    pub fn namespace_uri(mut self, uri: impl Into<String>) -> Self {
        self.namespace_uri = uri.into();
        self
    }

    /// Choose the layout.
    #[must_use]
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Restart latency simulated by Reboot.
    #[must_use]
    pub fn reboot_delay(mut self, delay: Duration) -> Self {
        self.reboot_delay = delay;
        self
    }

    /// Additional static, writable variables placed next to the canonical
    /// ones. A name clash fails the build.
    #[must_use]
    pub fn extra_variables(mut self, variables: Vec<(String, Value)>) -> Self {
        self.extra_variables = variables;
        self
    }

    /// Build the registry, bind the methods and list the simulated
    /// variables.
    ///
    /// # Errors
    ///
    /// `InitializationError` if any node or method cannot be created.
    pub fn build(self) -> Result<AddressSpace, InitializationError> {
        let server_uri = format!("urn:uamock:{}", self.server_name.replace(' ', "-"));
        let mut namespaces = NamespaceTable::new(server_uri);
        let ns = namespaces.register(&self.namespace_uri)?;

        let registry = Arc::new(NodeRegistry::new());
        let mut dispatcher = MethodDispatcher::new(Arc::clone(&registry));
        let root = registry.root().clone();

        let (server_object, simulated) = match self.profile {
            Profile::Full => {
                let folder = registry.add_folder(&root, ns, TEST_VARIABLES_FOLDER)?;
                let now = self.env.wall_clock();

                let initial: [(&str, Value, Rule); 7] = [
                    ("Counter", Value::Int32(0), Rule::Counter),
                    ("Temperature", Value::Float64(23.5), Rule::Temperature),
                    ("Pressure", Value::Float64(1013.25), Rule::Pressure),
                    ("Status", Value::from("Running"), Rule::Status),
                    ("Timestamp", Value::String(rules::iso_timestamp(now)), Rule::Timestamp),
                    ("Boolean", Value::Boolean(true), Rule::Boolean),
                    ("DynamicString", Value::from("Hello OPC-UA Walker!"), Rule::DynamicString),
                ];

                let mut simulated = Vec::with_capacity(initial.len());
                for (name, value, rule) in initial {
                    let node = registry.add_variable(&folder, ns, name, value)?;
                    registry.set_writable(&node, true)?;
                    simulated.push(SimulatedVariable { node, rule });
                }
                self.add_extras(&registry, &folder, ns)?;

                let counter = NodeId::string(ns, "Counter");
                let status = NodeId::string(ns, "Status");

                let object = registry.add_object(&root, ns, SERVER_OBJECT)?;
                dispatcher.bind(
                    &object,
                    QualifiedName::new(ns, "Reboot"),
                    Reboot::<E>::signature(),
                    Reboot::new(self.env.clone(), Some(status), self.reboot_delay),
                )?;
                dispatcher.bind(
                    &object,
                    QualifiedName::new(ns, "AddNumbers"),
                    AddNumbers::signature(),
                    AddNumbers,
                )?;
                dispatcher.bind(
                    &object,
                    QualifiedName::new(ns, "ResetCounter"),
                    ResetCounter::signature(),
                    ResetCounter::new(counter),
                )?;

                (object, simulated)
            },
            Profile::Minimal => {
                let object = registry.add_object(&root, ns, SERVER_OBJECT)?;
                dispatcher.bind(
                    &object,
                    QualifiedName::new(ns, "Reboot"),
                    Reboot::<E>::signature(),
                    Reboot::new(self.env.clone(), None, self.reboot_delay),
                )?;
                dispatcher.bind(
                    &object,
                    QualifiedName::new(ns, "AddNumbers"),
                    AddNumbers::signature(),
                    AddNumbers,
                )?;

                let counter = registry.add_variable(&object, ns, "Counter", 0)?;
                registry.set_writable(&counter, true)?;
                self.add_extras(&registry, &object, ns)?;

                (object, Vec::new())
            },
        };

        tracing::info!(
            "Address space built: profile={}, namespace={} ({}), {} nodes",
            self.profile,
            ns,
            self.namespace_uri,
            registry.len()
        );

        Ok(AddressSpace {
            registry,
            dispatcher: Arc::new(dispatcher),
            namespaces,
            namespace_index: ns,
            server_object,
            simulated,
        })
    }

    fn add_extras(
        &self,
        registry: &NodeRegistry,
        parent: &NodeId,
        ns: u16,
    ) -> Result<(), InitializationError> {
        for (name, value) in &self.extra_variables {
            let node = registry.add_variable(parent, ns, name, value.clone())?;
            registry.set_writable(&node, true)?;
        }
        Ok(())
    }
}
