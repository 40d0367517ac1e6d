//! Namespace-qualified node identifiers.
//!
//! Text form follows the OPC UA convention: `ns=<index>;s=<text>` for string
//! identifiers and `ns=<index>;i=<number>` for numeric ones. Namespace 0 is
//! implicit, so the standard Objects folder prints as `i=85`.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Numeric identifier of the standard `Objects` folder in namespace 0.
pub const OBJECTS_FOLDER_ID: u32 = 85;

/// The identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    /// `i=<number>`
    Numeric(u32),
    /// `s=<text>`
    String(String),
}

/// Namespace index plus identifier, unique within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    namespace: u16,
    identifier: Identifier,
}

/// Errors from parsing the text form of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    /// `ns=` prefix without the `;` separating it from the identifier.
    #[error("missing identifier after namespace in {0:?}")]
    MissingIdentifier(String),

    /// Namespace index is not a `u16`.
    #[error("invalid namespace index: {0:?}")]
    InvalidNamespace(String),

    /// `i=` followed by something that is not a `u32`.
    #[error("invalid numeric identifier: {0:?}")]
    InvalidNumeric(String),

    /// `s=` with nothing after it.
    #[error("empty string identifier")]
    EmptyIdentifier,

    /// Identifier kind other than `s=` or `i=`.
    #[error("unsupported identifier: {0:?}")]
    UnsupportedIdentifier(String),
}

impl NodeId {
    /// String identifier in the given namespace.
    pub fn string(namespace: u16, text: impl Into<String>) -> Self {
        Self { namespace, identifier: Identifier::String(text.into()) }
    }

    /// Numeric identifier in the given namespace.
    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self { namespace, identifier: Identifier::Numeric(value) }
    }

    /// The standard `Objects` folder (`i=85`), root of every registry.
    pub fn objects_folder() -> Self {
        Self::numeric(0, OBJECTS_FOLDER_ID)
    }

    /// Namespace index.
    pub fn namespace(&self) -> u16 {
        self.namespace
    }

    /// Identifier part.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(value) => write!(f, "i={value}"),
            Identifier::String(text) => write!(f, "s={text}"),
        }
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail
                    .split_once(';')
                    .ok_or_else(|| NodeIdError::MissingIdentifier(s.to_string()))?;
                let ns =
                    ns.parse::<u16>().map_err(|_| NodeIdError::InvalidNamespace(ns.to_string()))?;
                (ns, rest)
            },
            None => (0, s),
        };

        let identifier = if let Some(text) = rest.strip_prefix("s=") {
            if text.is_empty() {
                return Err(NodeIdError::EmptyIdentifier);
            }
            Identifier::String(text.to_string())
        } else if let Some(number) = rest.strip_prefix("i=") {
            let value =
                number.parse::<u32>().map_err(|_| NodeIdError::InvalidNumeric(number.to_string()))?;
            Identifier::Numeric(value)
        } else {
            return Err(NodeIdError::UnsupportedIdentifier(rest.to_string()));
        };

        Ok(Self { namespace, identifier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_id_formats_with_namespace() {
        assert_eq!(NodeId::string(2, "Counter").to_string(), "ns=2;s=Counter");
    }

    #[test]
    fn namespace_zero_is_implicit() {
        assert_eq!(NodeId::objects_folder().to_string(), "i=85");
    }

    #[test]
    fn parses_qualified_string_id() {
        let id: NodeId = "ns=2;s=Temperature".parse().unwrap();
        assert_eq!(id, NodeId::string(2, "Temperature"));
    }

    #[test]
    fn parses_bare_numeric_id() {
        let id: NodeId = "i=85".parse().unwrap();
        assert_eq!(id, NodeId::objects_folder());
    }

    #[test]
    fn string_identifier_may_contain_separator() {
        let id: NodeId = "ns=3;s=a;b".parse().unwrap();
        assert_eq!(id, NodeId::string(3, "a;b"));
        assert_eq!(id.to_string(), "ns=3;s=a;b");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(
            "ns=2".parse::<NodeId>(),
            Err(NodeIdError::MissingIdentifier("ns=2".to_string()))
        );
        assert_eq!(
            "ns=x;s=Counter".parse::<NodeId>(),
            Err(NodeIdError::InvalidNamespace("x".to_string()))
        );
        assert_eq!("ns=2;i=abc".parse::<NodeId>(), Err(NodeIdError::InvalidNumeric("abc".to_string())));
        assert_eq!("ns=2;s=".parse::<NodeId>(), Err(NodeIdError::EmptyIdentifier));
        assert_eq!("Counter".parse::<NodeId>(), Err(NodeIdError::UnsupportedIdentifier("Counter".to_string())));
    }
}
