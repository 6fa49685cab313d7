//! Handing work to other frontends through the gateway.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{BUILD_ARG_PREFIX, Gateway, PLATFORM_OPT, SUBREQUEST_OPT, SolveRequest, TARGET_KEY_OPT, TARGET_OPT};
use crate::consts::DEFAULT_DOCKERFILE;
use crate::error::Result;
use crate::graph::{Constraints, Definition, FileAttrs, Fragment};
use crate::router::{Handler, Request, Response};
use crate::source::Forwarder;
use crate::spec::{Frontend, SourceBuild};

/// Built-in dockerfile frontend.
pub const DOCKERFILE_FRONTEND: &str = "dockerfile.v0";
/// Frontend that runs another frontend from an image given as `source`.
pub const GATEWAY_FRONTEND: &str = "gateway.v0";

const SOURCE_OPT: &str = "source";
const CMDLINE_OPT: &str = "cmdline";
const FILENAME_OPT: &str = "filename";

/// The image named by a leading `# syntax=<ref>` parser directive.
pub fn detect_syntax(dockerfile: &str) -> Option<&str> {
  for line in dockerfile.lines() {
    let Some(directive) = line.trim().strip_prefix('#') else {
      break;
    };
    let Some((key, value)) = directive.split_once('=') else {
      break;
    };
    if key.trim().eq_ignore_ascii_case("syntax") {
      return Some(value.trim()).filter(|v| !v.is_empty());
    }
  }
  None
}

/// Forwards dockerfile builds to the engine's dockerfile frontend, or to the
/// frontend image the dockerfile asks for.
pub struct GatewayForwarder {
  gateway: Arc<dyn Gateway>,
}

impl GatewayForwarder {
  pub fn new(gateway: Arc<dyn Gateway>) -> Self {
    Self { gateway }
  }
}

impl Forwarder for GatewayForwarder {
  fn forward(&self, context: &Fragment, dockerfile: &Fragment, build: &SourceBuild) -> Result<Fragment> {
    let contents = self.gateway.read_file(dockerfile, build.dockerfile_path())?;
    let contents = String::from_utf8_lossy(&contents);

    let mut opts = BTreeMap::new();
    if build.dockerfile_path() != DEFAULT_DOCKERFILE {
      opts.insert(FILENAME_OPT.to_string(), build.dockerfile_path().to_string());
    }
    if !build.target.is_empty() {
      opts.insert(TARGET_OPT.to_string(), build.target.clone());
    }
    for (key, value) in &build.args {
      opts.insert(format!("{BUILD_ARG_PREFIX}{key}"), value.clone());
    }

    let frontend = match detect_syntax(&contents) {
      Some(reference) => {
        debug!(syntax = reference, "dockerfile selects its own frontend");
        opts.insert(SOURCE_OPT.to_string(), reference.to_string());
        GATEWAY_FRONTEND
      }
      None => DOCKERFILE_FRONTEND,
    };

    Ok(Fragment::frontend(
      frontend,
      opts,
      vec![
        ("context".to_string(), context.clone()),
        ("dockerfile".to_string(), dockerfile.clone()),
      ],
    ))
  }
}

/// Sends a whole request to the frontend a spec target declares.
///
/// The spec travels as the `dockerfile` input; the target key tells the
/// remote frontend which `targets` entry applies.
#[derive(Debug, Clone)]
pub struct SpecFrontendHandler {
  key: String,
  frontend: Frontend,
}

impl SpecFrontendHandler {
  pub fn new(key: impl Into<String>, frontend: Frontend) -> Self {
    Self {
      key: key.into(),
      frontend,
    }
  }

  fn solve_request(&self, request: &Request) -> Result<SolveRequest> {
    let yaml = request.spec.to_yaml()?;
    let dockerfile = Fragment::scratch()
      .mkfile(DEFAULT_DOCKERFILE, yaml, FileAttrs::mode(0o600))
      .with_constraints(&Constraints::group("prepare spec to forward to frontend"));

    let mut opts = BTreeMap::from([
      (SOURCE_OPT.to_string(), self.frontend.image.clone()),
      (TARGET_OPT.to_string(), request.target.clone()),
      (TARGET_KEY_OPT.to_string(), self.key.clone()),
    ]);
    if !self.frontend.cmdline.is_empty() {
      opts.insert(CMDLINE_OPT.to_string(), self.frontend.cmdline.clone());
    }
    for (key, value) in &request.args {
      opts.insert(format!("{BUILD_ARG_PREFIX}{key}"), value.clone());
    }
    if !request.platforms.is_empty() {
      let platforms: Vec<String> = request.platforms.iter().map(ToString::to_string).collect();
      opts.insert(PLATFORM_OPT.to_string(), platforms.join(","));
    }
    if let Some(subrequest) = request.subrequest {
      opts.insert(SUBREQUEST_OPT.to_string(), subrequest.to_string());
    }

    Ok(SolveRequest {
      frontend: GATEWAY_FRONTEND.to_string(),
      opts,
      inputs: BTreeMap::from([("dockerfile".to_string(), Definition::from_fragment(&dockerfile)?)]),
    })
  }
}

impl Handler for SpecFrontendHandler {
  fn handle(&self, request: Request) -> Result<Response> {
    request.check_cancelled()?;
    debug!(route = %self.key, image = %self.frontend.image, path = %request.target, "forwarding request");
    let solve = self.solve_request(&request)?;
    request.gateway.solve(solve)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frontend::testutil::{NullGateway, spec};
  use crate::graph::Op;
  use crate::platform::Platform;
  use crate::router::Subrequest;
  use crate::spec::Spec;

  #[test]
  fn syntax_directive_is_detected() {
    assert_eq!(
      detect_syntax("# syntax=docker/dockerfile:1.6\nFROM scratch\n"),
      Some("docker/dockerfile:1.6")
    );
    assert_eq!(
      detect_syntax("# escape=`\n#syntax = example.com/fe\nFROM scratch\n"),
      Some("example.com/fe")
    );
    assert_eq!(detect_syntax("FROM scratch\n# syntax=late\n"), None);
    assert_eq!(detect_syntax("# a comment\n# syntax=ignored\n"), None);
  }

  fn forward(dockerfile: &str, build: &SourceBuild) -> Fragment {
    let gateway = NullGateway {
      files: BTreeMap::from([(build.dockerfile_path().to_string(), dockerfile.as_bytes().to_vec())]),
      ..Default::default()
    };
    GatewayForwarder::new(Arc::new(gateway))
      .forward(&Fragment::local("context", &[], &[]), &Fragment::scratch(), build)
      .unwrap()
  }

  #[test]
  fn plain_dockerfile_uses_builtin_frontend() {
    let build = SourceBuild {
      target: "bin".into(),
      args: BTreeMap::from([("GO_VERSION".to_string(), "1.22".to_string())]),
      ..Default::default()
    };
    let fragment = forward("FROM golang\n", &build);
    match fragment.op() {
      Op::Frontend { frontend, opts, inputs } => {
        assert_eq!(frontend, DOCKERFILE_FRONTEND);
        assert_eq!(opts["target"], "bin");
        assert_eq!(opts["build-arg:GO_VERSION"], "1.22");
        assert!(!opts.contains_key("filename"));
        assert_eq!(inputs, &vec!["context".to_string(), "dockerfile".to_string()]);
      }
      other => panic!("unexpected op {other:?}"),
    }
  }

  #[test]
  fn syntax_selects_gateway_frontend() {
    let build = SourceBuild {
      dockerfile_path: "build/Containerfile".into(),
      ..Default::default()
    };
    let fragment = forward("# syntax=example.com/frontend:v1\nFROM scratch\n", &build);
    match fragment.op() {
      Op::Frontend { frontend, opts, .. } => {
        assert_eq!(frontend, GATEWAY_FRONTEND);
        assert_eq!(opts["source"], "example.com/frontend:v1");
        assert_eq!(opts["filename"], "build/Containerfile");
      }
      other => panic!("unexpected op {other:?}"),
    }
  }

  #[test]
  fn unreadable_dockerfile_fails() {
    let forwarder = GatewayForwarder::new(Arc::new(NullGateway::default()));
    let err = forwarder
      .forward(&Fragment::scratch(), &Fragment::scratch(), &SourceBuild::default())
      .unwrap_err();
    assert!(matches!(err, crate::Error::Gateway(_)));
  }

  #[test]
  fn spec_request_carries_spec_and_target() {
    let handler = SpecFrontendHandler::new(
      "mariner2",
      Frontend {
        image: "example.com/frontend:latest".into(),
        cmdline: "/frontend".into(),
      },
    );
    let request = Request::new(Arc::new(spec()), Arc::new(NullGateway::default()))
      .with_target("rpm/debug")
      .with_args(BTreeMap::from([("VERSION".to_string(), "1.0".to_string())]))
      .with_platforms(vec!["linux/arm64".parse::<Platform>().unwrap()])
      .with_subrequest(Subrequest::ListTargets);

    let solve = handler.solve_request(&request).unwrap();
    assert_eq!(solve.frontend, GATEWAY_FRONTEND);
    assert_eq!(solve.opts["source"], "example.com/frontend:latest");
    assert_eq!(solve.opts["cmdline"], "/frontend");
    assert_eq!(solve.opts["target"], "rpm/debug");
    assert_eq!(solve.opts["pkgraph.target"], "mariner2");
    assert_eq!(solve.opts["build-arg:VERSION"], "1.0");
    assert_eq!(solve.opts["platform"], "linux/arm64");
    assert_eq!(solve.opts["requestid"], "list-targets");

    let root = solve.inputs["dockerfile"].root_op().unwrap();
    match &root.op {
      Op::Mkfile { path, contents, attrs } => {
        assert_eq!(path, "Dockerfile");
        assert_eq!(attrs.mode, 0o600);
        assert_eq!(Spec::parse(contents.as_bytes()).unwrap().name, "hello");
      }
      other => panic!("unexpected op {other:?}"),
    }
  }
}
