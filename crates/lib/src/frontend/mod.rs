//! The build frontend: the route tree served for a spec and the gateway it
//! talks to.
//!
//! [`handle`] is the entry point. It parses the spec and the request options,
//! registers a forwarding route for every spec target that names its own
//! frontend, and dispatches the request through [`root_router`]:
//!
//! ```text
//! debug/{resolve,sources,gomods}              always served locally
//! mariner2/rpm[/debug/{buildroot,sources,spec}]
//! mariner2/container/depsonly
//! jammy/deb[/debug/{buildroot,control,sources}]
//! jammy/container/depsonly
//! ```

mod build;
mod caps;
mod deb;
mod debug;
mod distro;
mod forward;
mod rpm;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::consts::DEBUG_ROUTE;
use crate::error::{Error, Result};
use crate::graph::{Definition, Fragment};
use crate::platform::Platform;
use crate::router::{Request, Response, RouteMux, Subrequest};
use crate::spec::Spec;

pub use caps::{CapabilityCache, supports_diff_merge};
pub use distro::{Distro, DistroWorker, JAMMY, MARINER2};
pub use forward::{DOCKERFILE_FRONTEND, GATEWAY_FRONTEND, GatewayForwarder, SpecFrontendHandler, detect_syntax};

/// Request option naming the target path.
pub const TARGET_OPT: &str = "target";
/// Request option naming a subrequest instead of a build.
pub const SUBREQUEST_OPT: &str = "requestid";
/// Request option selecting the spec `targets` entry on a forwarded request.
pub const TARGET_KEY_OPT: &str = "pkgraph.target";
/// Prefix of the request options carrying build args.
pub const BUILD_ARG_PREFIX: &str = "build-arg:";
/// Request option listing the target platforms, comma separated.
pub const PLATFORM_OPT: &str = "platform";

/// What the execution engine can do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
  pub merge_op: bool,
  pub diff_op: bool,
}

/// A build handed back to the engine for another frontend to answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolveRequest {
  pub frontend: String,
  pub opts: BTreeMap<String, String>,
  /// Named graphs the frontend reads from, e.g. `context` and `dockerfile`.
  pub inputs: BTreeMap<String, Definition>,
}

/// The engine side of a request.
///
/// Reading files and solving are the only two ways the frontend reaches
/// outside the process; both are synchronous from the caller's view.
pub trait Gateway: Send + Sync {
  /// Read `path` from the filesystem `fragment` describes.
  fn read_file(&self, fragment: &Fragment, path: &str) -> Result<Vec<u8>>;

  /// Run another frontend and return its answer.
  fn solve(&self, request: SolveRequest) -> Result<Response>;

  fn capabilities(&self) -> Capabilities;
}

/// The frontend options of one request, decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
  pub target: String,
  pub subrequest: Option<Subrequest>,
  pub target_key: String,
  pub args: BTreeMap<String, String>,
  pub platforms: Vec<Platform>,
}

impl RequestOptions {
  /// # Errors
  ///
  /// [`Error::UnsupportedSubrequest`] for an unknown `requestid` and
  /// [`Error::InvalidPlatform`] for an unparsable platform.
  pub fn from_opts(opts: &BTreeMap<String, String>) -> Result<Self> {
    let mut out = Self::default();
    for (key, value) in opts {
      if let Some(name) = key.strip_prefix(BUILD_ARG_PREFIX) {
        out.args.insert(name.to_string(), value.clone());
        continue;
      }
      match key.as_str() {
        TARGET_OPT => out.target = value.clone(),
        TARGET_KEY_OPT => out.target_key = value.clone(),
        SUBREQUEST_OPT if !value.is_empty() => out.subrequest = Some(value.parse()?),
        PLATFORM_OPT => {
          out.platforms = value
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse)
            .collect::<Result<_>>()?;
        }
        _ => debug!(option = %key, "ignoring unknown frontend option"),
      }
    }
    Ok(out)
  }

  pub fn into_request(self, spec: Arc<Spec>, gateway: Arc<dyn Gateway>) -> Request {
    let mut request = Request::new(spec, gateway)
      .with_target(self.target)
      .with_target_key(self.target_key)
      .with_args(self.args)
      .with_platforms(self.platforms);
    request.subrequest = self.subrequest;
    request
  }
}

/// The built-in routes.
pub fn root_router() -> RouteMux {
  let mut mux = RouteMux::new();
  mux.add(DEBUG_ROUTE, debug::router(), None);
  mux.always(DEBUG_ROUTE);

  for distro in [&MARINER2, &JAMMY] {
    let router = distro.router();
    let key = distro.key;
    mux.add(
      key,
      move |request: Request| {
        let request = if request.target_key.is_empty() {
          request.with_target_key(key)
        } else {
          request
        };
        router.handle(request)
      },
      None,
    );
  }
  mux
}

/// Dispatch `request` through `mux`, with the spec's own frontends
/// registered on a copy of it first.
///
/// # Errors
///
/// [`Error::ForwardAlwaysTarget`] when a spec target names a frontend for a
/// route that is always served locally. Otherwise whatever the handler
/// returns.
pub fn handle_with_forwards(mux: &RouteMux, request: Request) -> Result<Response> {
  let mut mux = mux.clone();
  for (key, target) in &request.spec.targets {
    let Some(frontend) = &target.frontend else {
      continue;
    };
    if mux.is_always(key) {
      return Err(Error::ForwardAlwaysTarget(key.clone()));
    }
    info!(route = %key, image = %frontend.image, "forwarding target to spec frontend");
    mux.forward(key, frontend.clone());
  }
  mux.handle(request)
}

/// Answer one frontend request for the spec in `spec_bytes`.
///
/// # Errors
///
/// Anything from parsing the spec and options to the handler itself.
pub fn handle(
  spec_bytes: &[u8],
  opts: &BTreeMap<String, String>,
  gateway: Arc<dyn Gateway>,
  cancel: CancellationToken,
) -> Result<Response> {
  let spec = Arc::new(Spec::load(spec_bytes)?);
  let request = RequestOptions::from_opts(opts)?
    .into_request(spec, gateway)
    .with_cancel(cancel);
  handle_with_forwards(&root_router(), request)
}

#[cfg(test)]
pub(crate) mod testutil {
  use std::sync::Mutex;

  use super::*;
  use crate::router::{BuildResult, TargetList};

  /// Reads nothing and records every solve.
  #[derive(Default)]
  pub struct NullGateway {
    pub caps: Capabilities,
    pub solved: Mutex<Vec<SolveRequest>>,
    pub files: BTreeMap<String, Vec<u8>>,
  }

  impl Gateway for NullGateway {
    fn read_file(&self, _fragment: &Fragment, path: &str) -> Result<Vec<u8>> {
      self
        .files
        .get(path)
        .cloned()
        .ok_or_else(|| Error::Gateway(format!("{path}: no such file")))
    }

    fn solve(&self, request: SolveRequest) -> Result<Response> {
      let answer = if request.opts.get(SUBREQUEST_OPT).map(String::as_str) == Some(Subrequest::LIST_TARGETS) {
        Response::Targets(TargetList::default())
      } else {
        Response::Build(BuildResult::default())
      };
      if let Ok(mut solved) = self.solved.lock() {
        solved.push(request);
      }
      Ok(answer)
    }

    fn capabilities(&self) -> Capabilities {
      self.caps
    }
  }

  pub fn spec() -> Spec {
    Spec {
      name: "hello".into(),
      version: "1.0".into(),
      ..Default::default()
    }
  }

  pub fn request() -> Request {
    Request::new(Arc::new(spec()), Arc::new(NullGateway::default()))
  }

  pub fn request_for(spec: Spec) -> Request {
    Request::new(Arc::new(spec), Arc::new(NullGateway::default()))
  }
}
