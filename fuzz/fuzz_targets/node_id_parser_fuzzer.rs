//! Fuzz target for [`NodeId`] parsing
//!
//! Node id strings arrive straight from clients at the adapter boundary.
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary input
//! - Any accepted id renders to a string that parses back to the same id
//! - Namespace 0 is never rendered with an explicit `ns=` prefix

#![no_main]

use libfuzzer_sys::fuzz_target;
use uamock_core::NodeId;

fuzz_target!(|data: &str| {
    let Ok(id) = data.parse::<NodeId>() else {
        return;
    };

    let rendered = id.to_string();
    let reparsed: NodeId = rendered.parse().unwrap_or_else(|e| {
        panic!("{data:?} parsed but its rendering {rendered:?} did not: {e}")
    });
    assert_eq!(reparsed, id);

    if id.namespace() == 0 {
        assert!(!rendered.starts_with("ns="), "explicit ns=0 in {rendered:?}");
    }
});
