//! Namespace table.

use crate::error::InitializationError;

/// URI of the OPC UA base namespace (index 0).
pub const OPC_UA_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

/// Ordered namespace URIs; a URI's position is its namespace index.
///
/// Index 0 is the OPC UA base namespace and index 1 the server's own URI,
/// so the first registered application namespace gets index 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTable {
    uris: Vec<String>,
}

impl NamespaceTable {
    /// Create a table holding the base namespace and the server URI.
    pub fn new(server_uri: impl Into<String>) -> Self {
        Self { uris: vec![OPC_UA_NAMESPACE_URI.to_string(), server_uri.into()] }
    }

    /// Register a namespace URI and return its index.
    ///
    /// Registering a URI that is already present returns the existing index.
    pub fn register(&mut self, uri: &str) -> Result<u16, InitializationError> {
        if let Some(index) = self.index_of(uri) {
            return Ok(index);
        }
        let index = u16::try_from(self.uris.len())
            .map_err(|_| InitializationError::NamespaceTableFull(uri.to_string()))?;
        self.uris.push(uri.to_string());
        Ok(index)
    }

    /// Index of a registered URI.
    pub fn index_of(&self, uri: &str) -> Option<u16> {
        self.uris.iter().position(|u| u == uri).and_then(|i| u16::try_from(i).ok())
    }

    /// URI registered at `index`.
    pub fn uri(&self, index: u16) -> Option<&str> {
        self.uris.get(usize::from(index)).map(String::as_str)
    }

    /// Number of registered namespaces, including the two built-in ones.
    pub fn len(&self) -> usize {
        self.uris.len()
    }

    /// Always false: the base namespaces are present from construction.
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_application_namespace_is_two() {
        let mut table = NamespaceTable::new("urn:uamock:test");
        assert_eq!(table.register("http://test-opcua-server.local").unwrap(), 2);
        assert_eq!(table.uri(0), Some(OPC_UA_NAMESPACE_URI));
        assert_eq!(table.uri(1), Some("urn:uamock:test"));
    }

    #[test]
    fn registering_twice_returns_same_index() {
        let mut table = NamespaceTable::new("urn:uamock:test");
        let first = table.register("http://a.local").unwrap();
        let second = table.register("http://a.local").unwrap();
        assert_eq!(first, second);
        assert_eq!(table.len(), 3);
    }
}
