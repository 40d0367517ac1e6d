//! Server configuration.

use std::time::Duration;

use uamock_core::{
    Profile, Value,
    address_space::{DEFAULT_NAMESPACE_URI, DEFAULT_SERVER_NAME},
    handlers::DEFAULT_REBOOT_DELAY,
};

use crate::ServerError;

/// Endpoint scheme every configured endpoint must use.
pub const ENDPOINT_SCHEME: &str = "opc.tcp://";

/// Default binding endpoint.
pub const DEFAULT_BIND_ENDPOINT: &str = "opc.tcp://0.0.0.0:4840/opcua/";

/// Default endpoint advertised to clients.
pub const DEFAULT_ADVERTISED_ENDPOINT: &str = "opc.tcp://localhost:4840/opcua/";

/// Static configuration supplied when the server initializes.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Endpoint the transport binds to.
    pub bind_endpoint: String,
    /// Endpoint advertised to clients.
    pub advertised_endpoint: String,
    /// Human-readable server name.
    pub server_name: String,
    /// Application namespace URI (registered at index 2).
    pub namespace_uri: String,
    /// Address-space layout.
    pub profile: Profile,
    /// Time between simulator cycles.
    pub update_interval: Duration,
    /// Wait after a cycle in which a variable failed to update.
    pub error_backoff: Duration,
    /// Upper bound on shutdown (simulator stop plus in-flight calls).
    pub shutdown_timeout: Duration,
    /// Log a progress line every this many cycles (0 disables).
    pub log_every_cycles: u64,
    /// Restart latency simulated by Reboot.
    pub reboot_delay: Duration,
    /// Static, writable variables added next to the canonical ones.
    pub extra_variables: Vec<(String, Value)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_endpoint: DEFAULT_BIND_ENDPOINT.to_string(),
            advertised_endpoint: DEFAULT_ADVERTISED_ENDPOINT.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            namespace_uri: DEFAULT_NAMESPACE_URI.to_string(),
            profile: Profile::Full,
            update_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
            log_every_cycles: 10,
            reboot_delay: DEFAULT_REBOOT_DELAY,
            extra_variables: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Check the configuration before initialization.
    ///
    /// # Errors
    ///
    /// `ServerError::Config` for a zero update interval or shutdown timeout,
    /// or an endpoint outside the `opc.tcp://` scheme.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.update_interval.is_zero() {
            return Err(ServerError::Config("update interval must be non-zero".to_string()));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ServerError::Config("shutdown timeout must be non-zero".to_string()));
        }
        for (label, endpoint) in
            [("bind", &self.bind_endpoint), ("advertised", &self.advertised_endpoint)]
        {
            if !endpoint.starts_with(ENDPOINT_SCHEME) {
                return Err(ServerError::Config(format!(
                    "{label} endpoint {endpoint:?} must start with {ENDPOINT_SCHEME}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_endpoint, "opc.tcp://0.0.0.0:4840/opcua/");
        assert_eq!(config.update_interval, Duration::from_secs(2));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = ServerConfig { update_interval: Duration::ZERO, ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn zero_shutdown_timeout_is_rejected() {
        let config = ServerConfig { shutdown_timeout: Duration::ZERO, ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn non_opc_endpoint_is_rejected() {
        let config = ServerConfig {
            advertised_endpoint: "http://localhost:4840".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }
}
