//! Per-platform fan-out shared by every build handler.

use std::sync::Arc;

use tracing::debug;

use super::caps::supports_diff_merge;
use super::distro::{Distro, DistroWorker};
use super::forward::GatewayForwarder;
use crate::error::Result;
use crate::graph::{Definition, Fragment};
use crate::platform::{Platform, fill_platform_args};
use crate::router::{BuildResult, PlatformOutput, Request, Response};
use crate::source::SourceOpts;
use crate::spec::Spec;

/// Source resolution collaborators for `request`, with `distro` supplying
/// the source worker.
pub(super) fn source_opts(request: &Request, spec: &Spec, distro: &'static Distro) -> SourceOpts {
  SourceOpts {
    forwarder: Some(Arc::new(GatewayForwarder::new(Arc::clone(&request.gateway)))),
    worker: Some(DistroWorker::shared(distro, spec.requires_go())),
    cancel: request.cancel.clone(),
    merge_supported: supports_diff_merge(request),
  }
}

/// Run `build` once per target platform on the spec with that platform's
/// args substituted, and collect one definition per platform.
///
/// Stops at the first failure or once the request is cancelled.
pub(super) fn for_each_platform<F>(request: &Request, build: F) -> Result<Response>
where
  F: Fn(&Spec, &Platform) -> Result<Fragment>,
{
  let platforms = request.target_platforms();
  let mut outputs = Vec::with_capacity(platforms.len());
  for platform in platforms {
    request.check_cancelled()?;
    let args = fill_platform_args(&request.spec.args, &request.args, &platform, &request.build_platform);
    let spec = request.spec.substitute_args(&args)?;
    debug!(%platform, spec = %spec.name, "building for platform");

    let fragment = build(&spec, &platform)?;
    outputs.push(PlatformOutput {
      platform,
      definition: Definition::from_fragment(&fragment)?,
    });
  }
  Ok(Response::Build(BuildResult { outputs }))
}
