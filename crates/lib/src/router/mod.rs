//! Hierarchical target routing.
//!
//! A request names a `/`-separated target path, e.g. `mariner2/rpm/debug/spec`.
//! Each [`RouteMux`] consumes the part of the path it matched and passes the
//! remainder to the matched handler, which may itself be a router. Routers also
//! answer the `describe` and `list-targets` introspection subrequests, merging
//! the catalogues of nested routers into one list of absolute target names.

mod mux;
mod request;
mod response;

pub use mux::RouteMux;
pub use request::{Request, Subrequest};
pub use response::{BuildResult, PlatformOutput, Response, SubrequestInfo, TargetInfo, TargetList};

use crate::error::Result;

/// Handles a request whose target has been made relative to the route.
pub trait Handler: Send + Sync {
  fn handle(&self, request: Request) -> Result<Response>;
}

impl<F> Handler for F
where
  F: Fn(Request) -> Result<Response> + Send + Sync,
{
  fn handle(&self, request: Request) -> Result<Response> {
    self(request)
  }
}
