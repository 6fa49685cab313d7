//! Target dispatch through the public router and frontend entry point.

use std::collections::BTreeMap;
use std::sync::Arc;

use pkgraph_lib::frontend::{self, Gateway, GATEWAY_FRONTEND, SUBREQUEST_OPT, TARGET_KEY_OPT, TARGET_OPT};
use pkgraph_lib::router::{BuildResult, Request, Response, RouteMux, Subrequest, TargetInfo};
use pkgraph_lib::{Error, Result};
use tokio_util::sync::CancellationToken;

use super::common::{gateway, service_spec, RecordingGateway, SERVICE_SPEC};

fn echo(request: Request) -> Result<Response> {
  assert!(request.subrequest.is_none());
  Ok(Response::Build(BuildResult::default()))
}

fn package_mux() -> RouteMux {
  let mut debug = RouteMux::new();
  debug.add("spec", echo, Some(TargetInfo::new("spec", "The spec file")));

  let mut pkg = RouteMux::new();
  pkg.add("", echo, Some(TargetInfo::new("", "Builds a package.").as_default()));
  pkg.add("debug", debug, None);

  let mut root = RouteMux::new();
  root.add("pkg", pkg, None);
  root
}

fn request(target: &str) -> Request {
  Request::new(Arc::new(service_spec()), gateway()).with_target(target)
}

fn opts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

const FORWARDED_SPEC: &str = r#"
name: fwd
version: "1.0"
targets:
  fancy:
    frontend:
      image: example.com/fancy:latest
      cmdline: /fancy
"#;

#[test]
fn nested_routes_list_absolute_names() {
  let list = package_mux()
    .handle(request("").with_subrequest(Subrequest::ListTargets))
    .unwrap()
    .into_targets("")
    .unwrap();
  assert_eq!(list.names(), vec!["pkg", "pkg/debug/spec"]);
  assert!(list.targets[0].default);
}

#[test]
fn empty_remainder_uses_default_route() {
  assert!(package_mux().handle(request("pkg")).is_ok());
  assert!(package_mux().handle(request("pkg/debug/spec")).is_ok());
}

#[test]
fn unknown_target_lists_available_routes() {
  let err = package_mux().handle(request("pkg/nope")).unwrap_err();
  match err {
    Error::HandlerNotFound { target, available } => {
      assert_eq!(target, "pkg/nope");
      assert_eq!(available, vec!["pkg", "pkg/debug"]);
    }
    other => panic!("unexpected error {other:?}"),
  }
}

#[test]
fn builtin_targets_are_listed() {
  let response = frontend::handle(
    SERVICE_SPEC.as_bytes(),
    &opts(&[(SUBREQUEST_OPT, Subrequest::LIST_TARGETS)]),
    gateway(),
    CancellationToken::new(),
  )
  .unwrap();
  let list = response.into_targets("").unwrap();
  let names = list.names();
  for expected in [
    "debug/resolve",
    "jammy/deb",
    "jammy/deb/debug/control",
    "mariner2/container/depsonly",
    "mariner2/rpm",
    "mariner2/rpm/debug/spec",
  ] {
    assert!(names.contains(&expected), "missing {expected} in {names:?}");
  }
}

#[test]
fn describe_reports_supported_subrequests() {
  let response = frontend::handle(
    SERVICE_SPEC.as_bytes(),
    &opts(&[(SUBREQUEST_OPT, Subrequest::DESCRIBE)]),
    gateway(),
    CancellationToken::new(),
  )
  .unwrap();
  let Response::Describe(info) = response else {
    panic!("expected describe response");
  };
  assert!(info.iter().any(|i| i.name == Subrequest::LIST_TARGETS));
}

#[test]
fn spec_frontend_receives_remaining_target() {
  let recorder = gateway();
  let shared: Arc<dyn Gateway> = recorder.clone();
  frontend::handle(
    FORWARDED_SPEC.as_bytes(),
    &opts(&[(TARGET_OPT, "fancy/pkg")]),
    shared,
    CancellationToken::new(),
  )
  .unwrap();

  let solved = recorder.solved.lock().unwrap();
  assert_eq!(solved.len(), 1);
  assert_eq!(solved[0].frontend, GATEWAY_FRONTEND);
  assert_eq!(solved[0].opts[TARGET_OPT], "pkg");
  assert_eq!(solved[0].opts[TARGET_KEY_OPT], "fancy");
  assert_eq!(solved[0].opts["source"], "example.com/fancy:latest");
  assert!(solved[0].inputs.contains_key("dockerfile"));
}

#[test]
fn spec_frontend_targets_are_listed_under_their_key() {
  let recorder = Arc::new(RecordingGateway {
    listed: vec![TargetInfo::new("pkg", "Builds a fancy package.")],
    ..Default::default()
  });
  let response = frontend::handle(
    FORWARDED_SPEC.as_bytes(),
    &opts(&[(SUBREQUEST_OPT, Subrequest::LIST_TARGETS)]),
    recorder.clone(),
    CancellationToken::new(),
  )
  .unwrap();

  let list = response.into_targets("").unwrap();
  assert!(list.names().contains(&"fancy/pkg"));
  let solved = recorder.solved.lock().unwrap();
  assert_eq!(solved[0].opts[SUBREQUEST_OPT], Subrequest::LIST_TARGETS);
}

#[test]
fn cancelled_requests_are_not_dispatched() {
  let cancel = CancellationToken::new();
  cancel.cancel();
  let err = frontend::handle(
    SERVICE_SPEC.as_bytes(),
    &opts(&[(TARGET_OPT, "debug/resolve")]),
    gateway(),
    cancel,
  )
  .unwrap_err();
  assert!(matches!(err, Error::Cancelled));
}
