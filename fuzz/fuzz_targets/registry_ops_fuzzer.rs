//! Fuzz target for [`NodeRegistry`] operation sequences
//!
//! # Strategy
//!
//! - Small name pool so duplicate siblings and id collisions are common
//! - Parents and targets picked from nodes created so far (plus stale ids)
//! - Writes with every value type against every node kind
//!
//! # Invariants
//!
//! - NEVER panic on any operation sequence
//! - Every stored node is reachable from the root
//! - A variable's value type never changes
//! - A rejected write leaves the stored value untouched
//! - An accepted write reads back exactly
//! - Removing a node removes its whole subtree
//! - The root can never be removed

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use uamock_core::{NodeId, NodeKind, NodeRegistry, QualifiedName, Value};

const NAMES: [&str; 6] = ["A", "B", "C", "Counter", "Status", "Objects"];

#[derive(Debug, Clone, Arbitrary)]
enum FuzzValue {
    Int(i32),
    Float(i16),
    Text(u8),
    Flag(bool),
}

impl FuzzValue {
    fn into_value(self) -> Value {
        match self {
            Self::Int(v) => Value::Int32(v),
            Self::Float(v) => Value::Float64(f64::from(v) / 4.0),
            Self::Text(v) => Value::String(format!("text-{v}")),
            Self::Flag(v) => Value::Boolean(v),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum RegistryOp {
    Create { parent: u8, kind: u8, name: u8, value: Option<FuzzValue> },
    Write { target: u8, value: FuzzValue },
    Update { target: u8, value: FuzzValue },
    SetWritable { target: u8, writable: bool },
    Remove { target: u8 },
    Browse { target: u8 },
}

fn pick(known: &[NodeId], index: u8) -> NodeId {
    known[usize::from(index) % known.len()].clone()
}

fn kind_of(raw: u8) -> NodeKind {
    match raw % 4 {
        0 => NodeKind::Folder,
        1 => NodeKind::Object,
        2 => NodeKind::Variable,
        _ => NodeKind::Method,
    }
}

fn check_write(
    registry: &NodeRegistry,
    target: &NodeId,
    value: Value,
    result: Result<(), uamock_core::RegistryError>,
) {
    let before_type = registry.node_info(target).ok().and_then(|info| info.summary.value_type);
    match result {
        Ok(()) => {
            assert_eq!(registry.read_value(target).ok(), Some(value));
        },
        Err(_) => {
            if let Some(value_type) = before_type {
                let stored = registry.read_value(target).ok();
                assert_eq!(stored.map(|v| v.value_type()), Some(value_type));
            }
        },
    }
}

fuzz_target!(|ops: Vec<RegistryOp>| {
    let registry = NodeRegistry::new();
    let root = registry.root().clone();
    let mut known = vec![root.clone(), NodeId::string(2, "Stale")];

    for op in ops {
        match op {
            RegistryOp::Create { parent, kind, name, value } => {
                let parent = pick(&known, parent);
                let name = NAMES[usize::from(name) % NAMES.len()];
                let kind = kind_of(kind);
                let result = registry.create_node(
                    &parent,
                    kind,
                    QualifiedName::new(2, name),
                    value.map(FuzzValue::into_value),
                );
                if let Ok(id) = result {
                    assert_eq!(registry.kind(&id).ok(), Some(kind));
                    assert_eq!(registry.parent_of(&id).ok().flatten(), Some(parent));
                    known.push(id);
                }
            },
            RegistryOp::Write { target, value } => {
                let target = pick(&known, target);
                let before = registry.read_value(&target).ok();
                let value = value.into_value();
                let result = registry.write_value(&target, value.clone());
                if result.is_err() {
                    assert_eq!(registry.read_value(&target).ok(), before);
                }
                check_write(&registry, &target, value, result);
            },
            RegistryOp::Update { target, value } => {
                let target = pick(&known, target);
                let value = value.into_value();
                let result = registry.update_value(&target, value.clone());
                check_write(&registry, &target, value, result);
            },
            RegistryOp::SetWritable { target, writable } => {
                let target = pick(&known, target);
                if registry.set_writable(&target, writable).is_ok() {
                    let info = registry.node_info(&target).ok();
                    assert_eq!(info.map(|i| i.summary.writable), Some(writable));
                }
            },
            RegistryOp::Remove { target } => {
                let target = pick(&known, target);
                let subtree = registry.walk(&target, usize::MAX).unwrap_or_default();
                match registry.remove_node(&target) {
                    Ok(removed) => {
                        assert_eq!(removed, subtree.len());
                        for entry in subtree {
                            assert!(!registry.contains(&entry.node.id));
                        }
                    },
                    Err(_) => assert!(target == root || !registry.contains(&target)),
                }
            },
            RegistryOp::Browse { target } => {
                let target = pick(&known, target);
                if let Ok(children) = registry.browse(&target) {
                    for child in children {
                        assert_eq!(registry.parent_of(&child.id).ok().flatten(), Some(target.clone()));
                    }
                }
            },
        }

        // Every stored node is reachable from the root
        let reachable = registry.walk(&root, usize::MAX).map(|w| w.len()).unwrap_or_default();
        assert_eq!(reachable, registry.len());
        assert!(registry.contains(&root));
    }
});
