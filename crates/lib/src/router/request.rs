use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::frontend::Gateway;
use crate::platform::Platform;
use crate::spec::Spec;

/// Introspection modes answered instead of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subrequest {
  /// The subrequests this router supports.
  Describe,
  /// Every target reachable from this router.
  ListTargets,
}

impl Subrequest {
  pub const DESCRIBE: &'static str = "describe";
  pub const LIST_TARGETS: &'static str = "list-targets";

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Describe => Self::DESCRIBE,
      Self::ListTargets => Self::LIST_TARGETS,
    }
  }
}

impl FromStr for Subrequest {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      Self::DESCRIBE => Ok(Self::Describe),
      Self::LIST_TARGETS => Ok(Self::ListTargets),
      other => Err(Error::UnsupportedSubrequest(other.to_string())),
    }
  }
}

impl fmt::Display for Subrequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One inbound request as seen by a route handler.
///
/// `target` is relative to the router handling the request: every router
/// strips the prefix it matched before passing the request on.
#[derive(Clone)]
pub struct Request {
  pub target: String,
  pub subrequest: Option<Subrequest>,
  /// Selects the spec `targets` entry whose overrides apply.
  pub target_key: String,
  pub args: BTreeMap<String, String>,
  /// Platforms to build for. Empty means the build platform.
  pub platforms: Vec<Platform>,
  pub build_platform: Platform,
  pub spec: Arc<Spec>,
  pub gateway: Arc<dyn Gateway>,
  pub cancel: CancellationToken,
}

impl fmt::Debug for Request {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Request")
      .field("target", &self.target)
      .field("subrequest", &self.subrequest)
      .field("target_key", &self.target_key)
      .field("args", &self.args)
      .field("platforms", &self.platforms)
      .field("build_platform", &self.build_platform)
      .field("spec", &self.spec.name)
      .field("cancelled", &self.cancel.is_cancelled())
      .finish()
  }
}

impl Request {
  pub fn new(spec: Arc<Spec>, gateway: Arc<dyn Gateway>) -> Self {
    Self {
      target: String::new(),
      subrequest: None,
      target_key: String::new(),
      args: BTreeMap::new(),
      platforms: Vec::new(),
      build_platform: Platform::current().unwrap_or_default(),
      spec,
      gateway,
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_target(mut self, target: impl Into<String>) -> Self {
    self.target = target.into();
    self
  }

  pub fn with_subrequest(mut self, subrequest: Subrequest) -> Self {
    self.subrequest = Some(subrequest);
    self
  }

  pub fn with_target_key(mut self, key: impl Into<String>) -> Self {
    self.target_key = key.into();
    self
  }

  pub fn with_args(mut self, args: BTreeMap<String, String>) -> Self {
    self.args = args;
    self
  }

  pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
    self.platforms = platforms;
    self
  }

  pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn check_cancelled(&self) -> Result<()> {
    if self.cancel.is_cancelled() {
      Err(Error::Cancelled)
    } else {
      Ok(())
    }
  }

  /// The platforms a build fans out to.
  pub fn target_platforms(&self) -> Vec<Platform> {
    if self.platforms.is_empty() {
      vec![self.build_platform.clone()]
    } else {
      self.platforms.clone()
    }
  }

  /// The same request with `prefix` and its trailing `/` removed from the
  /// target.
  pub fn trimmed(&self, prefix: &str) -> Self {
    let rest = self.target.strip_prefix(prefix).unwrap_or(&self.target);
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    Self {
      target: rest.to_string(),
      ..self.clone()
    }
  }
}
