//! Node Registry
//!
//! Owns the address-space hierarchy and every variable's current value. It is
//! the single source of truth shared by the simulator, the method handlers
//! and the transport adapter.
//!
//! ## Design
//!
//! - One registry-wide `RwLock`: reads run in parallel, writes serialize in
//!   completion order (last writer wins).
//! - Values are replaced whole under the write lock, so a reader never sees a
//!   partial update.
//! - No guard escapes a method: callers (including slow method handlers)
//!   never hold the lock across an await point.
//! - A variable's value type is fixed by its initial value; writes of another
//!   variant are rejected.

use std::{
    collections::HashMap,
    fmt::{self, Write as _},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{NodeId, RegistryError, Value, ValueType};

/// Browse name of the root folder.
pub const ROOT_BROWSE_NAME: &str = "Objects";

/// Node class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Organizes other nodes.
    Folder,
    /// Owns variables and methods.
    Object,
    /// Holds a typed value.
    Variable,
    /// Remotely invocable; bound in the dispatcher.
    Method,
}

impl NodeKind {
    fn can_own(self, child: Self) -> bool {
        match (self, child) {
            (Self::Folder | Self::Object, Self::Folder | Self::Object | Self::Variable)
            | (Self::Object, Self::Method) => true,
            _ => false,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Folder => "Folder",
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
        };
        f.write_str(name)
    }
}

/// Namespace index plus browse name. Determines the node id `ns=<i>;s=<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// Namespace index.
    pub namespace: u16,
    /// Browse name, unique among siblings of the same namespace.
    pub name: String,
}

impl QualifiedName {
    /// Create a qualified name.
    pub fn new(namespace: u16, name: impl Into<String>) -> Self {
        Self { namespace, name: name.into() }
    }

    /// Node id derived from this name.
    pub fn node_id(&self) -> NodeId {
        NodeId::string(self.namespace, self.name.clone())
    }
}

/// Browse result for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    /// Node id.
    pub id: NodeId,
    /// Browse name.
    pub browse_name: String,
    /// Node class.
    pub kind: NodeKind,
    /// Fixed value type, for variables.
    pub value_type: Option<ValueType>,
    /// Writable flag (always false for non-variables).
    pub writable: bool,
}

/// Depth-annotated entry of a [`NodeRegistry::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Distance from the walk's start node (start node is 0).
    pub depth: usize,
    /// The node.
    pub node: NodeSummary,
}

/// Snapshot of every attribute of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    /// Browse attributes.
    pub summary: NodeSummary,
    /// Owning node; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Current value, for variables.
    pub value: Option<Value>,
    /// Number of direct children.
    pub child_count: usize,
}

#[derive(Debug)]
struct VariableSlot {
    value: Value,
    writable: bool,
}

#[derive(Debug)]
struct NodeEntry {
    browse_name: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    /// Creation order.
    children: Vec<NodeId>,
    variable: Option<VariableSlot>,
}

impl NodeEntry {
    fn summary(&self, id: &NodeId) -> NodeSummary {
        NodeSummary {
            id: id.clone(),
            browse_name: self.browse_name.clone(),
            kind: self.kind,
            value_type: self.variable.as_ref().map(|v| v.value.value_type()),
            writable: self.variable.as_ref().is_some_and(|v| v.writable),
        }
    }
}

/// The address space: node hierarchy plus current values.
pub struct NodeRegistry {
    root: NodeId,
    nodes: RwLock<HashMap<NodeId, NodeEntry>>,
}

impl NodeRegistry {
    /// Create a registry holding only the root `Objects` folder (`i=85`).
    pub fn new() -> Self {
        let root = NodeId::objects_folder();
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            NodeEntry {
                browse_name: ROOT_BROWSE_NAME.to_string(),
                kind: NodeKind::Folder,
                parent: None,
                children: Vec::new(),
                variable: None,
            },
        );
        Self { root, nodes: RwLock::new(nodes) }
    }

    /// Id of the root folder.
    pub fn root(&self) -> &NodeId {
        &self.root
    }

    fn read_nodes(&self) -> RwLockReadGuard<'_, HashMap<NodeId, NodeEntry>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_nodes(&self) -> RwLockWriteGuard<'_, HashMap<NodeId, NodeEntry>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a node under `parent`.
    ///
    /// Variables require an initial value, which fixes their value type;
    /// every other kind must be created without one. New variables start
    /// read-only.
    ///
    /// # Errors
    ///
    /// - `ParentNotFound` / `InvalidParent` if the parent is missing or
    ///   cannot own this kind
    /// - `InvalidKind` if initial value presence does not match `kind`
    /// - `DuplicateName` if a sibling already has this qualified name
    /// - `NodeIdInUse` if the derived id exists elsewhere
    pub fn create_node(
        &self,
        parent: &NodeId,
        kind: NodeKind,
        name: QualifiedName,
        initial_value: Option<Value>,
    ) -> Result<NodeId, RegistryError> {
        let variable = match (kind, initial_value) {
            (NodeKind::Variable, Some(value)) => Some(VariableSlot { value, writable: false }),
            (NodeKind::Variable, None) => {
                return Err(RegistryError::InvalidKind {
                    kind,
                    reason: "variables require an initial value",
                });
            },
            (_, Some(_)) => {
                return Err(RegistryError::InvalidKind {
                    kind,
                    reason: "only variables carry a value",
                });
            },
            (_, None) => None,
        };

        let mut nodes = self.write_nodes();

        let parent_entry =
            nodes.get(parent).ok_or_else(|| RegistryError::ParentNotFound(parent.clone()))?;
        if !parent_entry.kind.can_own(kind) {
            return Err(RegistryError::InvalidParent {
                parent: parent.clone(),
                parent_kind: parent_entry.kind,
                child_kind: kind,
            });
        }
        let duplicate = parent_entry
            .children
            .iter()
            .filter(|child| child.namespace() == name.namespace)
            .filter_map(|child| nodes.get(child))
            .any(|child| child.browse_name == name.name);
        if duplicate {
            return Err(RegistryError::DuplicateName { parent: parent.clone(), name: name.name });
        }

        let id = name.node_id();
        if nodes.contains_key(&id) {
            return Err(RegistryError::NodeIdInUse(id));
        }

        nodes.insert(
            id.clone(),
            NodeEntry {
                browse_name: name.name,
                kind,
                parent: Some(parent.clone()),
                children: Vec::new(),
                variable,
            },
        );
        if let Some(parent_entry) = nodes.get_mut(parent) {
            parent_entry.children.push(id.clone());
        }

        tracing::debug!("Created {} node {}", kind, id);
        Ok(id)
    }

    /// Create a folder.
    pub fn add_folder(
        &self,
        parent: &NodeId,
        namespace: u16,
        name: &str,
    ) -> Result<NodeId, RegistryError> {
        self.create_node(parent, NodeKind::Folder, QualifiedName::new(namespace, name), None)
    }

    /// Create an object.
    pub fn add_object(
        &self,
        parent: &NodeId,
        namespace: u16,
        name: &str,
    ) -> Result<NodeId, RegistryError> {
        self.create_node(parent, NodeKind::Object, QualifiedName::new(namespace, name), None)
    }

    /// Create a variable with its initial value.
    pub fn add_variable(
        &self,
        parent: &NodeId,
        namespace: u16,
        name: &str,
        initial_value: impl Into<Value>,
    ) -> Result<NodeId, RegistryError> {
        self.create_node(
            parent,
            NodeKind::Variable,
            QualifiedName::new(namespace, name),
            Some(initial_value.into()),
        )
    }

    /// Read a variable's current value.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node does not exist, `NotReadable` if it is not a
    /// variable.
    pub fn read_value(&self, node: &NodeId) -> Result<Value, RegistryError> {
        let nodes = self.read_nodes();
        let entry = nodes.get(node).ok_or_else(|| RegistryError::NotFound(node.clone()))?;
        entry
            .variable
            .as_ref()
            .map(|slot| slot.value.clone())
            .ok_or_else(|| RegistryError::NotReadable(node.clone()))
    }

    /// Client write: honours the writable flag.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotWritable` (flag false or not a variable), or
    /// `TypeMismatch` if the variant differs from the fixed type. The stored
    /// value is unchanged on error.
    pub fn write_value(&self, node: &NodeId, value: Value) -> Result<(), RegistryError> {
        self.store(node, value, true)
    }

    /// Server-side write used by the simulator and method handlers.
    ///
    /// Ignores the writable flag (which governs remote clients only) but
    /// still enforces the fixed value type.
    pub fn update_value(&self, node: &NodeId, value: Value) -> Result<(), RegistryError> {
        self.store(node, value, false)
    }

    fn store(&self, node: &NodeId, value: Value, check_writable: bool) -> Result<(), RegistryError> {
        let mut nodes = self.write_nodes();
        let entry = nodes.get_mut(node).ok_or_else(|| RegistryError::NotFound(node.clone()))?;
        let slot =
            entry.variable.as_mut().ok_or_else(|| RegistryError::NotWritable(node.clone()))?;

        if check_writable && !slot.writable {
            return Err(RegistryError::NotWritable(node.clone()));
        }

        let expected = slot.value.value_type();
        let actual = value.value_type();
        if expected != actual {
            return Err(RegistryError::TypeMismatch { node: node.clone(), expected, actual });
        }

        slot.value = value;
        Ok(())
    }

    /// Flip a variable's writable flag. The value is untouched.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidKind` if the node is not a variable.
    pub fn set_writable(&self, node: &NodeId, writable: bool) -> Result<(), RegistryError> {
        let mut nodes = self.write_nodes();
        let entry = nodes.get_mut(node).ok_or_else(|| RegistryError::NotFound(node.clone()))?;
        let kind = entry.kind;
        let slot = entry.variable.as_mut().ok_or(RegistryError::InvalidKind {
            kind,
            reason: "only variables have a writable flag",
        })?;
        slot.writable = writable;
        Ok(())
    }

    /// Remove a node and its whole subtree.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `RootImmutable` for the root folder.
    pub fn remove_node(&self, node: &NodeId) -> Result<usize, RegistryError> {
        if *node == self.root {
            return Err(RegistryError::RootImmutable);
        }

        let mut nodes = self.write_nodes();
        let entry = nodes.get(node).ok_or_else(|| RegistryError::NotFound(node.clone()))?;
        let parent = entry.parent.clone();

        let mut pending = vec![node.clone()];
        let mut removed = 0;
        while let Some(id) = pending.pop() {
            if let Some(entry) = nodes.remove(&id) {
                pending.extend(entry.children);
                removed += 1;
            }
        }

        if let Some(parent_entry) = parent.as_ref().and_then(|p| nodes.get_mut(p)) {
            parent_entry.children.retain(|child| child != node);
        }

        tracing::debug!("Removed {} ({} nodes)", node, removed);
        Ok(removed)
    }

    /// Check whether a node exists.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.read_nodes().contains_key(node)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.read_nodes().len()
    }

    /// Always false: the root exists from construction.
    pub fn is_empty(&self) -> bool {
        self.read_nodes().is_empty()
    }

    /// Node class of `node`.
    pub fn kind(&self, node: &NodeId) -> Result<NodeKind, RegistryError> {
        self.read_nodes().get(node).map(|e| e.kind).ok_or_else(|| RegistryError::NotFound(node.clone()))
    }

    /// Parent of `node` (`None` for the root).
    pub fn parent_of(&self, node: &NodeId) -> Result<Option<NodeId>, RegistryError> {
        self.read_nodes()
            .get(node)
            .map(|e| e.parent.clone())
            .ok_or_else(|| RegistryError::NotFound(node.clone()))
    }

    /// All attributes of one node.
    pub fn node_info(&self, node: &NodeId) -> Result<NodeInfo, RegistryError> {
        let nodes = self.read_nodes();
        let entry = nodes.get(node).ok_or_else(|| RegistryError::NotFound(node.clone()))?;
        Ok(NodeInfo {
            summary: entry.summary(node),
            parent: entry.parent.clone(),
            value: entry.variable.as_ref().map(|slot| slot.value.clone()),
            child_count: entry.children.len(),
        })
    }

    /// Direct children of `node`, in creation order.
    pub fn browse(&self, node: &NodeId) -> Result<Vec<NodeSummary>, RegistryError> {
        let nodes = self.read_nodes();
        let entry = nodes.get(node).ok_or_else(|| RegistryError::NotFound(node.clone()))?;
        Ok(entry
            .children
            .iter()
            .filter_map(|child| nodes.get(child).map(|e| e.summary(child)))
            .collect())
    }

    /// Depth-first listing of `start` and its descendants down to
    /// `max_depth` levels below it.
    pub fn walk(&self, start: &NodeId, max_depth: usize) -> Result<Vec<WalkEntry>, RegistryError> {
        let nodes = self.read_nodes();
        let entry = nodes.get(start).ok_or_else(|| RegistryError::NotFound(start.clone()))?;

        let mut out = vec![WalkEntry { depth: 0, node: entry.summary(start) }];
        let mut stack: Vec<(usize, &NodeId)> =
            entry.children.iter().rev().map(|c| (1, c)).collect();

        while let Some((depth, id)) = stack.pop() {
            let Some(entry) = nodes.get(id) else { continue };
            out.push(WalkEntry { depth, node: entry.summary(id) });
            if depth < max_depth {
                stack.extend(entry.children.iter().rev().map(|c| (depth + 1, c)));
            }
        }

        Ok(out)
    }

    /// Ids of every node with the given browse name, sorted.
    pub fn find_by_browse_name(&self, name: &str) -> Vec<NodeId> {
        let mut found: Vec<NodeId> = self
            .read_nodes()
            .iter()
            .filter(|(_, entry)| entry.browse_name == name)
            .map(|(id, _)| id.clone())
            .collect();
        found.sort();
        found
    }

    /// Indented text rendering of the whole hierarchy with current values.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let Ok(entries) = self.walk(&self.root, usize::MAX) else {
            return out;
        };
        for entry in entries {
            let node = &entry.node;
            let indent = "  ".repeat(entry.depth);
            let _ = write!(out, "{indent}{} [{}] {}", node.browse_name, node.kind, node.id);
            if let Some(value_type) = node.value_type {
                let access = if node.writable { "rw" } else { "ro" };
                let value = self.read_value(&node.id).map(|v| v.to_string()).unwrap_or_default();
                let _ = write!(out, " : {value_type} {access} = {value}");
            }
            out.push('\n');
        }
        out
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry").field("root", &self.root).field("node_count", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_has_only_root() {
        let registry = NodeRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.root(), &NodeId::objects_folder());
        assert!(registry.browse(registry.root()).unwrap().is_empty());
    }

    #[test]
    fn variables_start_read_only() {
        let registry = NodeRegistry::new();
        let root = registry.root().clone();
        let id = registry.add_variable(&root, 2, "Counter", 0).unwrap();
        assert!(!registry.node_info(&id).unwrap().summary.writable);
    }

    #[test]
    fn method_requires_object_parent() {
        let registry = NodeRegistry::new();
        let root = registry.root().clone();
        let result =
            registry.create_node(&root, NodeKind::Method, QualifiedName::new(2, "Reboot"), None);
        assert!(matches!(result, Err(RegistryError::InvalidParent { .. })));
    }

    #[test]
    fn variables_cannot_own_children() {
        let registry = NodeRegistry::new();
        let root = registry.root().clone();
        let var = registry.add_variable(&root, 2, "Counter", 0).unwrap();
        let result = registry.add_folder(&var, 2, "Inner");
        assert!(matches!(result, Err(RegistryError::InvalidParent { .. })));
    }

    #[test]
    fn walk_respects_depth() {
        let registry = NodeRegistry::new();
        let root = registry.root().clone();
        let a = registry.add_folder(&root, 2, "A").unwrap();
        let b = registry.add_folder(&a, 2, "B").unwrap();
        registry.add_variable(&b, 2, "C", true).unwrap();

        let shallow = registry.walk(&root, 1).unwrap();
        assert_eq!(shallow.len(), 2);

        let deep = registry.walk(&root, usize::MAX).unwrap();
        let depths: Vec<usize> = deep.iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 3]);
    }
}
