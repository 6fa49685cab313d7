//! Distro-independent debugging targets.

use tracing::debug;

use super::build::{for_each_platform, source_opts};
use super::distro::MARINER2;
use crate::error::Result;
use crate::graph::{Constraints, FileAttrs, Fragment};
use crate::router::{Request, Response, RouteMux, TargetInfo};
use crate::source;

/// File name of the resolved spec.
pub const RESOLVED_SPEC: &str = "spec.yml";

pub(super) fn router() -> RouteMux {
  let mut mux = RouteMux::new();
  mux.add(
    "resolve",
    handle_resolve,
    Some(TargetInfo::new(
      "resolve",
      "Outputs the resolved spec file with build args applied.",
    )),
  );
  mux.add(
    "sources",
    handle_sources,
    Some(TargetInfo::new("sources", "Outputs all sources from the spec file.")),
  );
  mux.add(
    "gomods",
    handle_gomods,
    Some(TargetInfo::new(
      "gomods",
      "Outputs the go module cache of every go module source.",
    )),
  );
  mux
}

fn handle_resolve(request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| {
    let yaml = spec.to_yaml()?;
    Ok(
      Fragment::scratch()
        .mkfile(RESOLVED_SPEC, yaml, FileAttrs::mode(0o640))
        .with_constraints(&Constraints::group(format!("Generate resolved spec file - {RESOLVED_SPEC}"))),
    )
  })
}

fn handle_sources(request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| {
    let opts = source_opts(&request, spec, &MARINER2);
    let resolved = source::resolve_all(spec, &opts)?;
    Ok(resolved.layout(opts.merge_supported))
  })
}

fn handle_gomods(request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| {
    let mut spec = spec.clone();
    spec.sources.retain(|_, src| src.requires_go());
    debug!(count = spec.sources.len(), "resolving go module sources");

    let opts = source_opts(&request, &spec, &MARINER2);
    let resolved = source::resolve_all(&spec, &opts)?;
    Ok(resolved.gomods.unwrap_or_else(Fragment::scratch))
  })
}
