//! Shared utilities.
//!
//! Content hashing for graph nodes, slash-path helpers and shell quoting used
//! when laying out build graphs and rendered package metadata.

pub mod hash;
pub mod path;
pub mod shell;
