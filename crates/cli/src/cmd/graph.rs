//! Implementation of the `pkgraph graph` command.
//!
//! Resolves a target without an engine and prints the definition for every
//! requested platform. Text output lists one operation per line in
//! dependency order.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pkgraph_lib::frontend;
use pkgraph_lib::graph::Op;
use tokio_util::sync::CancellationToken;

use super::{BuildArgs, read_spec};
use crate::gateway::OfflineGateway;
use crate::output::{print_info, print_json, print_row, truncate_hash};

pub fn cmd_graph(path: &Path, target: &str, build: &BuildArgs, json: bool) -> Result<()> {
  let bytes = read_spec(path)?;
  let result = frontend::handle(&bytes, &build.opts(target), Arc::new(OfflineGateway), CancellationToken::new())
    .and_then(|response| response.into_build(target))
    .with_context(|| format!("Failed to build graph for target {target:?}"))?;

  if json {
    return print_json(&result);
  }
  for output in &result.outputs {
    let definition = &output.definition;
    print_info(&format!("{}: {} operation(s)", output.platform, definition.len()));
    for op in &definition.ops {
      let group = op.progress_group.as_deref().unwrap_or_default();
      print_row(" ", truncate_hash(&op.digest.0), 12, &format!("{:<9} {group}", op_kind(&op.op)));
    }
  }
  Ok(())
}

fn op_kind(op: &Op) -> &'static str {
  match op {
    Op::Scratch => "scratch",
    Op::Image { .. } => "image",
    Op::Git { .. } => "git",
    Op::Http { .. } => "http",
    Op::Local { .. } => "local",
    Op::Mkfile { .. } => "mkfile",
    Op::Mkdir { .. } => "mkdir",
    Op::Copy(_) => "copy",
    Op::Exec(_) => "exec",
    Op::Merge => "merge",
    Op::Frontend { .. } => "frontend",
  }
}
