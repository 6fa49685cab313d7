//! Flattened build graph handed to the execution engine.
//!
//! A [`Definition`] lists every node reachable from a root fragment exactly
//! once, dependencies before dependents, each keyed by its digest.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use super::fragment::{Fragment, InputRef, Node, Op};
use crate::error::{Error, Result};
use crate::util::hash::{Hashable, ObjectHash};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionOp {
  pub digest: ObjectHash,
  pub op: Op,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub inputs: Vec<InputRef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub progress_group: Option<String>,
}

/// A complete, topologically ordered build graph.
///
/// # Example
///
/// ```json
/// {
///   "ops": [
///     { "digest": "a1b2...", "op": { "type": "git", "remote": "...", "reference": "v1", "keep_git_dir": false } },
///     { "digest": "c3d4...", "op": { "type": "mkdir", ... }, "inputs": [{ "digest": "a1b2..." }] }
///   ],
///   "root": { "digest": "c3d4..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
  pub ops: Vec<DefinitionOp>,
  pub root: InputRef,
}

impl Hashable for Definition {}

struct Builder {
  graph: DiGraph<ObjectHash, ()>,
  index: HashMap<ObjectHash, NodeIndex>,
  ops: HashMap<ObjectHash, DefinitionOp>,
}

impl Builder {
  fn visit(&mut self, node: &Node) -> Result<NodeIndex> {
    let digest = node.digest()?;
    if let Some(&idx) = self.index.get(&digest) {
      return Ok(idx);
    }

    let mut inputs = Vec::with_capacity(node.inputs.len());
    let mut deps = Vec::with_capacity(node.inputs.len());
    for input in &node.inputs {
      deps.push(self.visit(&input.node)?);
      inputs.push(input.input_ref()?);
    }

    let idx = self.graph.add_node(digest.clone());
    for dep in deps {
      // Edge from dependency to dependent
      self.graph.update_edge(dep, idx, ());
    }
    self.index.insert(digest.clone(), idx);
    self.ops.insert(
      digest.clone(),
      DefinitionOp {
        digest,
        op: node.op.clone(),
        inputs,
        progress_group: node.progress_group.clone(),
      },
    );
    Ok(idx)
  }
}

impl Definition {
  /// Flatten everything reachable from `root`.
  ///
  /// # Errors
  ///
  /// Returns `CycleDetected` if the graph is not acyclic, and `Serialize`
  /// if a node cannot be hashed.
  pub fn from_fragment(root: &Fragment) -> Result<Self> {
    let mut builder = Builder {
      graph: DiGraph::new(),
      index: HashMap::new(),
      ops: HashMap::new(),
    };
    builder.visit(&root.node)?;

    let order = toposort(&builder.graph, None).map_err(|_| Error::CycleDetected)?;
    let ops = order
      .into_iter()
      .filter_map(|idx| builder.ops.remove(&builder.graph[idx]))
      .collect();

    Ok(Self {
      ops,
      root: root.input_ref()?,
    })
  }

  pub fn get(&self, digest: &ObjectHash) -> Option<&DefinitionOp> {
    self.ops.iter().find(|op| &op.digest == digest)
  }

  /// The node the root reference points at.
  pub fn root_op(&self) -> Option<&DefinitionOp> {
    self.get(&self.root.digest)
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}
