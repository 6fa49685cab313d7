//! pkgraph-lib: compiles declarative package specs into build graphs.
//!
//! This crate only *describes* work. Nothing here fetches, builds or executes;
//! every result is a [`graph::Definition`] handed to an external engine.
//!
//! - `spec`: the typed package spec, its validation and build-arg substitution
//! - `graph`: immutable graph fragments and their flattened definitions
//! - `source`: turns named sources into graph fragments
//! - `deps`: deterministic dependency merging
//! - `package`: rpm spec and debian control rendering
//! - `router`: hierarchical target dispatch and introspection
//! - `frontend`: the routes, gateway collaborator and per-platform fan-out

pub mod consts;
pub mod deps;
pub mod error;
pub mod frontend;
pub mod graph;
pub mod package;
pub mod platform;
pub mod router;
pub mod source;
pub mod spec;
pub mod util;

pub use error::{Error, Result};
