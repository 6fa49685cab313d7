//! Implementation of the `pkgraph targets` command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pkgraph_lib::frontend::{self, SUBREQUEST_OPT};
use pkgraph_lib::router::Subrequest;
use tokio_util::sync::CancellationToken;

use super::{BuildArgs, read_spec};
use crate::gateway::OfflineGateway;
use crate::output::{print_json, print_row, symbols};

pub fn cmd_targets(path: &Path, target: &str, build: &BuildArgs, json: bool) -> Result<()> {
  let bytes = read_spec(path)?;
  let mut opts = build.opts(target);
  opts.insert(SUBREQUEST_OPT.to_string(), Subrequest::LIST_TARGETS.to_string());

  let list = frontend::handle(&bytes, &opts, Arc::new(OfflineGateway), CancellationToken::new())
    .and_then(|response| response.into_targets(target))
    .with_context(|| format!("Failed to list targets of {}", path.display()))?;

  if json {
    return print_json(&list);
  }
  let width = list.targets.iter().map(|t| t.name.len()).max().unwrap_or(0);
  for info in &list.targets {
    let marker = if info.default { symbols::DEFAULT } else { " " };
    print_row(marker, &info.name, width, &info.description);
  }
  Ok(())
}
