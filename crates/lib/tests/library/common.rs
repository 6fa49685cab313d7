//! Shared fixtures for the library integration tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use pkgraph_lib::frontend::{Capabilities, Gateway, SolveRequest, SUBREQUEST_OPT};
use pkgraph_lib::graph::{Constraints, Fragment};
use pkgraph_lib::router::{BuildResult, Response, Subrequest, TargetInfo, TargetList};
use pkgraph_lib::source::SourceWorker;
use pkgraph_lib::spec::Spec;
use pkgraph_lib::Result;

/// A spec exercising sources of every shape, systemd units and patches.
pub const SERVICE_SPEC: &str = r#"
name: svc
description: |
  A small service

  It listens on a socket.
version: "${VERSION}"
license: MIT
website: https://example.com/svc
args:
  VERSION: "1.2.3"
  COMMIT: null
sources:
  a:
    http:
      url: https://example.com/a
  b:
    git:
      url: https://example.com/b.git
      commit: "${COMMIT}"
  fix:
    inline:
      file:
        contents: "--- a/x\n+++ b/x\n"
patches:
  b:
    - source: fix
build:
  env:
    CGO_ENABLED: "0"
  steps:
    - command: make -C b
dependencies:
  build:
    golang: {}
  runtime:
    libc:
      version: [">= 2.31"]
artifacts:
  binaries:
    b/bin/svc: {}
  systemd:
    units:
      b/svc.service:
        enable: true
"#;

pub fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn service_spec() -> Spec {
  Spec::load(SERVICE_SPEC.as_bytes()).unwrap()
}

/// Records every solve, answers list requests with `listed`.
#[derive(Default)]
pub struct RecordingGateway {
  pub caps: Capabilities,
  pub listed: Vec<TargetInfo>,
  pub solved: Mutex<Vec<SolveRequest>>,
}

impl Gateway for RecordingGateway {
  fn read_file(&self, _fragment: &Fragment, _path: &str) -> Result<Vec<u8>> {
    Ok(b"FROM scratch\n".to_vec())
  }

  fn solve(&self, request: SolveRequest) -> Result<Response> {
    let list = request.opts.get(SUBREQUEST_OPT).map(String::as_str) == Some(Subrequest::LIST_TARGETS);
    self.solved.lock().unwrap().push(request);
    if list {
      Ok(Response::Targets(TargetList {
        targets: self.listed.clone(),
      }))
    } else {
      Ok(Response::Build(BuildResult::default()))
    }
  }

  fn capabilities(&self) -> Capabilities {
    self.caps
  }
}

pub fn gateway() -> Arc<RecordingGateway> {
  Arc::new(RecordingGateway::default())
}

pub struct ImageWorker;

impl SourceWorker for ImageWorker {
  fn worker(&self, constraints: &Constraints) -> Result<Fragment> {
    Ok(Fragment::image("worker:latest").with_constraints(constraints))
  }
}
