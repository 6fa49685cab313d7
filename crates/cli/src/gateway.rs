//! Gateway used when no build engine is attached.
//!
//! Files can only be read from content the graph itself creates, and every
//! solve fails. That is enough to list targets and print graphs for specs
//! whose dockerfiles are inline.

use pkgraph_lib::frontend::{Capabilities, Gateway, SolveRequest};
use pkgraph_lib::graph::{Definition, Fragment, Op};
use pkgraph_lib::router::Response;
use pkgraph_lib::util::path;
use pkgraph_lib::{Error, Result};
use tracing::debug;

#[derive(Debug, Default)]
pub struct OfflineGateway;

impl Gateway for OfflineGateway {
  fn read_file(&self, fragment: &Fragment, file: &str) -> Result<Vec<u8>> {
    let wanted = path::clean(file.trim_start_matches('/'));
    let definition = Definition::from_fragment(fragment)?;
    let contents = definition.ops.iter().find_map(|op| match &op.op {
      Op::Mkfile { path: created, contents, .. } if path::clean(created.trim_start_matches('/')) == wanted => {
        Some(contents.clone())
      }
      _ => None,
    });
    match contents {
      Some(contents) => {
        debug!(path = %wanted, "read file from graph");
        Ok(contents.into_bytes())
      }
      None => Err(Error::Gateway(format!(
        "{file} is not created by the graph and no build engine is attached"
      ))),
    }
  }

  fn solve(&self, request: SolveRequest) -> Result<Response> {
    Err(Error::Gateway(format!(
      "cannot solve with frontend {} without a build engine",
      request.frontend
    )))
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      merge_op: true,
      diff_op: true,
    }
  }
}
