//! Build graph description.
//!
//! Fragments are composed while resolving a request, then flattened into a
//! [`Definition`] for the execution engine.

pub mod definition;
pub mod fragment;

pub use definition::{Definition, DefinitionOp};
pub use fragment::{
  CacheMount, Constraints, CopySpec, Exec, ExecState, FileAttrs, Fragment, InputRef, Mount, Op, Output, merge_at_path,
};
