use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::request::{Request, Subrequest};
use super::response::{Response, SubrequestInfo, TargetInfo, TargetList};
use super::Handler;
use crate::error::{Error, Result};
use crate::frontend::SpecFrontendHandler;
use crate::spec::Frontend;
use crate::util::path;

#[derive(Clone)]
struct Route {
  handler: Arc<dyn Handler>,
  info: Option<TargetInfo>,
}

/// Dispatches requests on their `/`-separated target path.
///
/// Matching tries, in order: an exact key, the default route when the target
/// is empty, then the longest key `k` such that the target starts with
/// `k/`. The matched key is stripped from the target before the route's
/// handler runs, so routers nest to any depth.
#[derive(Clone, Default)]
pub struct RouteMux {
  routes: BTreeMap<String, Route>,
  default: Option<String>,
  always: BTreeSet<String>,
}

impl fmt::Debug for RouteMux {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RouteMux")
      .field("routes", &self.routes.keys().collect::<Vec<_>>())
      .field("default", &self.default)
      .field("always", &self.always)
      .finish()
  }
}

impl RouteMux {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `handler` under `key`, replacing any previous route.
  ///
  /// With `info`, `list-targets` reports it as-is instead of asking the
  /// handler; a default `info` makes this the route for an empty target.
  pub fn add(&mut self, key: impl Into<String>, handler: impl Handler + 'static, info: Option<TargetInfo>) {
    let key = key.into();
    if info.as_ref().is_some_and(|i| i.default) {
      self.default = Some(key.clone());
    }
    info!(route = %key, "added handler to router");
    self.routes.insert(
      key,
      Route {
        handler: Arc::new(handler),
        info,
      },
    );
  }

  /// Mark `key` as always served by this router, even when a spec declares
  /// its own frontend for it.
  ///
  /// # Panics
  ///
  /// If no route is registered under `key`.
  pub fn always(&mut self, key: &str) {
    assert!(
      self.routes.contains_key(key),
      "target must be registered with a handler before being marked as always available: {key}"
    );
    self.always.insert(key.to_string());
  }

  pub fn is_always(&self, key: &str) -> bool {
    self.always.contains(key)
  }

  /// Route everything under `key` to an external frontend.
  ///
  /// # Panics
  ///
  /// If `key` is marked [`always`](Self::always).
  pub fn forward(&mut self, key: &str, frontend: Frontend) {
    assert!(
      !self.is_always(key),
      "target {key:?} is always available and cannot be forwarded"
    );
    self.add(key, SpecFrontendHandler::new(key, frontend), None);
    info!(route = %key, "added custom frontend to router");
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.routes.keys().map(String::as_str)
  }

  /// The key a target resolves to. Fails with [`Error::HandlerNotFound`]
  /// listing every registered key.
  pub fn lookup(&self, target: &str) -> Result<&str> {
    self.lookup_route(target).map(|(key, _)| key)
  }

  fn lookup_route(&self, target: &str) -> Result<(&str, &Route)> {
    if let Some((key, route)) = self.routes.get_key_value(target) {
      return Ok((key.as_str(), route));
    }

    if target.is_empty()
      && let Some(key) = &self.default
      && let Some(route) = self.routes.get(key)
    {
      debug!(route = %key, "using default route");
      return Ok(("", route));
    }

    let prefix = self
      .routes
      .iter()
      .filter(|(key, _)| target.starts_with(&format!("{key}/")))
      .max_by_key(|(key, _)| key.len());
    if let Some((key, route)) = prefix {
      debug!(prefix = %key, requested = target, "using prefix match for target");
      return Ok((key.as_str(), route));
    }

    Err(Error::HandlerNotFound {
      target: target.to_string(),
      available: self.routes.keys().cloned().collect(),
    })
  }

  /// Answer subrequests, otherwise dispatch to the matching route.
  pub fn handle(&self, request: Request) -> Result<Response> {
    request.check_cancelled()?;
    debug!(path = %request.target, subrequest = ?request.subrequest, "handling request");

    match request.subrequest {
      Some(Subrequest::Describe) => return Ok(Response::Describe(SubrequestInfo::supported())),
      Some(Subrequest::ListTargets) => return self.list(&request).map(Response::Targets),
      None => {}
    }

    let (matched, route) = self.lookup_route(&request.target)?;
    let trimmed = request.trimmed(matched);
    route
      .handler
      .handle(trimmed)
      .map_err(|err| with_absolute_paths(matched, err))
  }

  /// Every target below this router, filtered by the request target.
  ///
  /// Routes with literal info report it directly. Others are asked with a
  /// `list-targets` request and their answers are prefixed with the matched
  /// key. Targets that fail to resolve are skipped.
  fn list(&self, request: &Request) -> Result<TargetList> {
    let mut check: Vec<&str> = self.always.iter().map(String::as_str).collect();
    if request.target.is_empty() {
      check.extend(self.keys().filter(|key| !self.is_always(key)));
    } else {
      check.push(&request.target);
    }
    check.sort_unstable();
    check.dedup();

    let mut list = TargetList::default();
    for target in check {
      let (matched, route) = match self.lookup_route(target) {
        Ok(found) => found,
        Err(err) => {
          warn!(check = target, error = %err, "error looking up target, skipping");
          continue;
        }
      };

      if let Some(info) = &route.info {
        list.targets.push(info.clone());
        continue;
      }

      debug!(check = target, matched, "no target info, asking handler");
      let nested = route
        .handler
        .handle(
          request
            .clone()
            .with_target(target)
            .trimmed(matched)
            .with_subrequest(Subrequest::ListTargets),
        )
        .map_err(|err| with_absolute_paths(matched, err))?
        .into_targets(matched)?;
      list.targets.extend(nested.targets.into_iter().map(|mut info| {
        info.name = path::join(&[matched, info.name.as_str()]);
        info
      }));
    }
    Ok(list)
  }
}

impl Handler for RouteMux {
  fn handle(&self, request: Request) -> Result<Response> {
    RouteMux::handle(self, request)
  }
}

/// Prefix the paths of a nested [`Error::HandlerNotFound`] with `matched`.
fn with_absolute_paths(matched: &str, err: Error) -> Error {
  match err {
    Error::HandlerNotFound { target, available } => Error::HandlerNotFound {
      target: path::join(&[matched, target.as_str()]),
      available: available
        .iter()
        .map(|key| path::join(&[matched, key.as_str()]))
        .collect(),
    },
    other => other,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use tracing_test::traced_test;

  use super::*;
  use crate::frontend::testutil::request;
  use crate::router::BuildResult;

  fn ok(_: Request) -> Result<Response> {
    Ok(Response::Build(BuildResult::default()))
  }

  /// Records the target each call saw.
  fn recorder(seen: &Arc<Mutex<Vec<String>>>) -> impl Handler + 'static {
    let seen = Arc::clone(seen);
    move |req: Request| {
      seen.lock().unwrap().push(req.target.clone());
      ok(req)
    }
  }

  mod lookup {
    use super::*;

    #[test]
    fn exact_match_wins_over_prefix() {
      let mut mux = RouteMux::new();
      mux.add("rpm", ok, None);
      mux.add("rpm/debug", ok, None);
      assert_eq!(mux.lookup("rpm/debug").unwrap(), "rpm/debug");
      assert_eq!(mux.lookup("rpm").unwrap(), "rpm");
    }

    #[test]
    fn longest_prefix_wins() {
      let mut mux = RouteMux::new();
      mux.add("rpm", ok, None);
      mux.add("rpm/debug", ok, None);
      assert_eq!(mux.lookup("rpm/debug/spec").unwrap(), "rpm/debug");
      assert_eq!(mux.lookup("rpm/other").unwrap(), "rpm");
    }

    #[test]
    fn prefix_must_end_at_separator() {
      let mut mux = RouteMux::new();
      mux.add("rpm", ok, None);
      assert!(matches!(mux.lookup("rpmx"), Err(Error::HandlerNotFound { .. })));
    }

    #[test]
    fn empty_target_uses_default() {
      let mut mux = RouteMux::new();
      mux.add("a", ok, None);
      mux.add("b", ok, Some(TargetInfo::new("b", "").as_default()));
      assert_eq!(mux.lookup("").unwrap(), "");
    }

    #[test]
    fn empty_target_without_default_lists_keys() {
      let mut mux = RouteMux::new();
      mux.add("b", ok, None);
      mux.add("a", ok, None);
      match mux.lookup("") {
        Err(Error::HandlerNotFound { target, available }) => {
          assert_eq!(target, "");
          assert_eq!(available, vec!["a", "b"]);
        }
        other => panic!("expected HandlerNotFound, got {other:?}"),
      }
    }
  }

  mod handle {
    use super::*;

    #[test]
    fn strips_matched_prefix() {
      let seen = Arc::new(Mutex::new(Vec::new()));
      let mut mux = RouteMux::new();
      mux.add("rpm", recorder(&seen), None);

      mux.handle(request().with_target("rpm/debug/spec")).unwrap();
      mux.handle(request().with_target("rpm")).unwrap();
      assert_eq!(*seen.lock().unwrap(), vec!["debug/spec", ""]);
    }

    #[test]
    fn nested_not_found_is_made_absolute() {
      let mut inner = RouteMux::new();
      inner.add("spec", ok, None);
      let mut outer = RouteMux::new();
      outer.add("rpm", inner, None);

      match outer.handle(request().with_target("rpm/nope")) {
        Err(Error::HandlerNotFound { target, available }) => {
          assert_eq!(target, "rpm/nope");
          assert_eq!(available, vec!["rpm/spec"]);
        }
        other => panic!("expected HandlerNotFound, got {other:?}"),
      }
    }

    #[test]
    fn describe_is_answered_locally() {
      let mux = RouteMux::new();
      let res = mux.handle(request().with_subrequest(Subrequest::Describe)).unwrap();
      match res {
        Response::Describe(subs) => {
          let names: Vec<_> = subs.iter().map(|s| s.name.as_str()).collect();
          assert_eq!(names, vec!["list-targets", "describe"]);
        }
        other => panic!("unexpected response {other:?}"),
      }
    }

    #[test]
    fn cancelled_request_is_rejected() {
      let mut mux = RouteMux::new();
      mux.add("rpm", ok, None);
      let req = request().with_target("rpm");
      req.cancel.cancel();
      assert!(matches!(mux.handle(req), Err(Error::Cancelled)));
    }

    #[test]
    #[should_panic(expected = "always available")]
    fn always_requires_registration() {
      RouteMux::new().always("debug");
    }

    #[test]
    #[should_panic(expected = "cannot be forwarded")]
    fn forwarding_always_route_panics() {
      let mut mux = RouteMux::new();
      mux.add("debug", ok, None);
      mux.always("debug");
      mux.forward(
        "debug",
        Frontend {
          image: "example.com/frontend".into(),
          cmdline: String::new(),
        },
      );
    }
  }

  mod list {
    use super::*;

    fn list(mux: &RouteMux, target: &str) -> Vec<String> {
      let res = mux
        .handle(request().with_target(target).with_subrequest(Subrequest::ListTargets))
        .unwrap();
      res
        .into_targets(target)
        .unwrap()
        .targets
        .into_iter()
        .map(|t| t.name)
        .collect()
    }

    fn debug_mux() -> RouteMux {
      let mut mux = RouteMux::new();
      mux.add("spec", ok, Some(TargetInfo::new("spec", "the spec")));
      mux.add("sources", ok, Some(TargetInfo::new("sources", "the sources")));
      mux
    }

    #[test]
    fn nested_names_are_prefixed() {
      let mut rpm = RouteMux::new();
      rpm.add("", ok, Some(TargetInfo::new("", "build").as_default()));
      rpm.add("debug", debug_mux(), None);
      let mut root = RouteMux::new();
      root.add("rpm", rpm, None);

      assert_eq!(list(&root, ""), vec!["rpm", "rpm/debug/sources", "rpm/debug/spec"]);
    }

    #[test]
    fn sibling_prefix_keys_list_separately() {
      let mut debug = RouteMux::new();
      debug.add("", ok, Some(TargetInfo::new("", "debug build").as_default()));
      let mut root = RouteMux::new();
      root.add("rpm", ok, Some(TargetInfo::new("rpm", "build")));
      root.add("rpm/debug", debug, None);

      assert_eq!(list(&root, ""), vec!["rpm", "rpm/debug"]);
    }

    #[test]
    fn filter_limits_to_subtree() {
      let mut root = RouteMux::new();
      root.add("rpm", debug_mux(), None);
      root.add("deb", debug_mux(), None);
      root.add("debug", ok, Some(TargetInfo::new("debug", "")));
      root.always("debug");

      assert_eq!(list(&root, "rpm"), vec!["debug", "rpm/sources", "rpm/spec"]);
    }

    #[test]
    #[traced_test]
    fn unresolvable_filter_is_skipped() {
      let mut root = RouteMux::new();
      root.add("rpm", ok, Some(TargetInfo::new("rpm", "")));

      assert!(list(&root, "nope").is_empty());
      assert!(logs_contain("error looking up target, skipping"));
    }
  }
}
