//! Small accessors over `kdl` nodes.
//!
//! Sections look like:
//!
//! ```kdl
//! cache {
//!     backend "redis"
//!     url "redis://127.0.0.1:6379"
//! }
//! ```
//!
//! i.e. each setting is a child node with a single argument.

use kdl::KdlNode;

/// First string argument of the child node `name`, if present.
pub(crate) fn get_string_entry(node: &KdlNode, name: &str) -> Option<String> {
    node.children()
        .and_then(|children| children.get(name))
        .and_then(|child| child.entries().first())
        .and_then(|entry| entry.value().as_string())
        .map(|s| s.to_string())
}

/// First integer argument of the child node `name`, if present.
pub(crate) fn get_int_entry(node: &KdlNode, name: &str) -> Option<i128> {
    node.children()
        .and_then(|children| children.get(name))
        .and_then(|child| child.entries().first())
        .and_then(|entry| entry.value().as_integer())
}

/// First boolean argument of the child node `name`, if present.
pub(crate) fn get_bool_entry(node: &KdlNode, name: &str) -> Option<bool> {
    node.children()
        .and_then(|children| children.get(name))
        .and_then(|child| child.entries().first())
        .and_then(|entry| entry.value().as_bool())
}

/// Non-negative integer entry narrowed to u64, with the section/field named
/// in the error.
pub(crate) fn get_u64_entry(node: &KdlNode, name: &str) -> anyhow::Result<Option<u64>> {
    match get_int_entry(node, name) {
        None => Ok(None),
        Some(v) if v >= 0 && v <= i128::from(u64::MAX) => Ok(Some(v as u64)),
        Some(v) => Err(anyhow::anyhow!(
            "'{name}' must be a non-negative integer, got {v}"
        )),
    }
}
