use serde::{Deserialize, Serialize};

use super::request::Subrequest;
use crate::error::{Error, Result};
use crate::graph::Definition;
use crate::platform::Platform;

fn is_false(value: &bool) -> bool {
  !*value
}

/// A target as reported by `list-targets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// Served when the request names no target.
  #[serde(default, skip_serializing_if = "is_false")]
  pub default: bool,
}

impl TargetInfo {
  pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      default: false,
    }
  }

  pub fn as_default(mut self) -> Self {
    self.default = true;
    self
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetList {
  pub targets: Vec<TargetInfo>,
}

impl TargetList {
  pub fn names(&self) -> Vec<&str> {
    self.targets.iter().map(|t| t.name.as_str()).collect()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubrequestInfo {
  pub name: String,
  pub version: String,
  pub description: String,
}

impl SubrequestInfo {
  /// Every subrequest a router answers.
  pub fn supported() -> Vec<Self> {
    vec![
      Self {
        name: Subrequest::LIST_TARGETS.to_string(),
        version: "1.0.0".to_string(),
        description: "List all targets current build supports".to_string(),
      },
      Self {
        name: Subrequest::DESCRIBE.to_string(),
        version: "1.0.0".to_string(),
        description: "List available subrequest types".to_string(),
      },
    ]
  }
}

/// The graph for one target platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOutput {
  pub platform: Platform,
  pub definition: Definition,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
  pub outputs: Vec<PlatformOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum Response {
  Build(BuildResult),
  Targets(TargetList),
  Describe(Vec<SubrequestInfo>),
}

impl Response {
  pub fn into_targets(self, target: &str) -> Result<TargetList> {
    match self {
      Self::Targets(list) => Ok(list),
      _ => Err(Error::UnexpectedResponse {
        target: target.to_string(),
        expected: "target list",
      }),
    }
  }

  pub fn into_build(self, target: &str) -> Result<BuildResult> {
    match self {
      Self::Build(result) => Ok(result),
      _ => Err(Error::UnexpectedResponse {
        target: target.to_string(),
        expected: "build result",
      }),
    }
  }
}
