//! Source definitions.
//!
//! On the wire a source is a mapping with exactly one origin key (`image`,
//! `git`, `http`, `context`, `build`, `gomod` or `inline`) plus optional
//! filters. [`Source::origin`] turns that into the [`Origin`] sum type, which
//! the resolver matches exhaustively.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::BuildStep;
use crate::consts::DEFAULT_DOCKERFILE;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
  #[serde(default, rename = "image", skip_serializing_if = "Option::is_none")]
  pub docker_image: Option<SourceDockerImage>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub git: Option<SourceGit>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub http: Option<SourceHttp>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<SourceContext>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<SourceBuild>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gomod: Option<SourceGoModule>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inline: Option<SourceInline>,

  /// Subdirectory of the resolved content to keep.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub path: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub includes: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub excludes: Vec<String>,
}

/// A borrowed view of the single origin a [`Source`] has.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Origin<'a> {
  DockerImage(&'a SourceDockerImage),
  Git(&'a SourceGit),
  Http(&'a SourceHttp),
  Context(&'a SourceContext),
  Build(&'a SourceBuild),
  GoModule(&'a SourceGoModule),
  Inline(&'a SourceInline),
}

impl Origin<'_> {
  pub fn kind(&self) -> &'static str {
    match self {
      Origin::DockerImage(_) => "image",
      Origin::Git(_) => "git",
      Origin::Http(_) => "http",
      Origin::Context(_) => "context",
      Origin::Build(_) => "build",
      Origin::GoModule(_) => "gomod",
      Origin::Inline(_) => "inline",
    }
  }
}

impl Source {
  fn origins(&self) -> Vec<Origin<'_>> {
    let mut found = Vec::new();
    if let Some(s) = &self.docker_image {
      found.push(Origin::DockerImage(s));
    }
    if let Some(s) = &self.git {
      found.push(Origin::Git(s));
    }
    if let Some(s) = &self.http {
      found.push(Origin::Http(s));
    }
    if let Some(s) = &self.context {
      found.push(Origin::Context(s));
    }
    if let Some(s) = &self.build {
      found.push(Origin::Build(s));
    }
    if let Some(s) = &self.gomod {
      found.push(Origin::GoModule(s));
    }
    if let Some(s) = &self.inline {
      found.push(Origin::Inline(s));
    }
    found
  }

  /// The single populated origin.
  ///
  /// # Errors
  ///
  /// Returns a description of the problem when no origin or more than one is set.
  pub fn origin(&self) -> Result<Origin<'_>, String> {
    let mut origins = self.origins();
    match origins.len() {
      1 => Ok(origins.remove(0)),
      0 => Err("no source type set".to_string()),
      _ => Err(format!(
        "multiple source types set: {}",
        origins.iter().map(Origin::kind).collect::<Vec<_>>().join(", ")
      )),
    }
  }

  /// Whether the resolved content is a directory rather than a single file.
  ///
  /// Sources without a valid origin report `false`; validation catches them.
  pub fn is_dir(&self) -> bool {
    match self.origin() {
      Ok(Origin::Http(_)) => false,
      Ok(Origin::Inline(inline)) => inline.dir.is_some(),
      Ok(_) => true,
      Err(_) => false,
    }
  }

  pub fn has_filters(&self) -> bool {
    !self.path.is_empty() || !self.includes.is_empty() || !self.excludes.is_empty()
  }

  pub fn requires_go(&self) -> bool {
    self.gomod.is_some()
  }

  /// A short human-readable reference to where the content comes from.
  pub fn describe(&self) -> String {
    match self.origin() {
      Ok(Origin::DockerImage(image)) => format!("docker-image://{}", image.reference),
      Ok(Origin::Git(git)) => format!("{}#{}", git.url, git.commit),
      Ok(Origin::Http(http)) => http.url.clone(),
      Ok(Origin::Context(ctx)) => format!("context://{}", ctx.name()),
      Ok(Origin::Build(build)) => match &build.source {
        Some(inner) => format!("build from {}", inner.describe()),
        None => "build from inline dockerfile".to_string(),
      },
      Ok(Origin::GoModule(gomod)) => format!("go modules of {}", gomod.from.describe()),
      Ok(Origin::Inline(inline)) if inline.dir.is_some() => "inline directory".to_string(),
      Ok(Origin::Inline(_)) => "inline file".to_string(),
      Err(_) => "unknown".to_string(),
    }
  }

  /// Comment lines describing the source, origin first, then any filters.
  pub fn doc(&self) -> Vec<String> {
    let mut lines = match self.origin() {
      Ok(Origin::DockerImage(image)) => {
        let mut lines = vec!["Generated from a docker image:".to_string(), format!("  Image: {}", image.reference)];
        if let Some(cmd) = &image.cmd {
          for step in &cmd.steps {
            let mut command = step.command.lines();
            if let Some(first) = command.next() {
              lines.push(format!("  Command: {first}"));
            }
            lines.extend(command.map(|line| format!("    {line}")));
          }
        }
        lines
      }
      Ok(Origin::Git(git)) => vec![
        "Generated from a git repository:".to_string(),
        format!("  Remote: {}", git.url),
        format!("  Ref: {}", git.commit),
      ],
      Ok(Origin::Http(http)) => vec!["Generated from a http(s) source:".to_string(), format!("  URL: {}", http.url)],
      Ok(Origin::Context(ctx)) => vec![
        "Generated from a local docker build context:".to_string(),
        format!("  Context: {}", ctx.name()),
      ],
      Ok(Origin::Build(build)) => vec![
        "Generated from a docker build:".to_string(),
        format!("  Dockerfile path: {}", build.dockerfile_path()),
        format!("  Source: {}", self.describe()),
      ],
      Ok(Origin::GoModule(gomod)) => vec![
        "Generated from go module dependencies of:".to_string(),
        format!("  {}", gomod.from.describe()),
      ],
      Ok(Origin::Inline(_)) => vec!["Generated from inline content".to_string()],
      Err(_) => Vec::new(),
    };

    if !self.path.is_empty() {
      lines.push(format!("  Subpath: {}", self.path));
    }
    if !self.includes.is_empty() {
      lines.push(format!("  Includes: {}", self.includes.join(", ")));
    }
    if !self.excludes.is_empty() {
      lines.push(format!("  Excludes: {}", self.excludes.join(", ")));
    }
    lines
  }
}

/// Content from a container image, optionally modified by running commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDockerImage {
  #[serde(rename = "ref")]
  pub reference: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cmd: Option<Command>,
}

/// Commands run on top of an image source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Command {
  /// Working directory. Defaults to `/`.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub dir: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub steps: Vec<BuildStep>,
  /// Other sources mounted into every step.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub mounts: Vec<SourceMount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceMount {
  pub dest: String,
  pub spec: Source,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceGit {
  pub url: String,
  /// Commit, tag or branch to check out.
  pub commit: String,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub keep_git_dir: bool,
}

/// A single file fetched over http(s), named after the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceHttp {
  pub url: String,
  /// Expected digest (`sha256:...`) of the downloaded file.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub digest: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub permissions: Option<u32>,
}

/// A local build context supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceContext {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,
}

impl SourceContext {
  pub fn name(&self) -> &str {
    if self.name.is_empty() { "context" } else { &self.name }
  }
}

/// Output of a dockerfile build, delegated to an external frontend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceBuild {
  /// Build context. Defaults to an empty context.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<Box<Source>>,
  /// Dockerfile path inside the context.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub dockerfile_path: String,
  /// Source holding the dockerfile. Defaults to the context.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dockerfile: Option<Box<Source>>,
  /// Build stage to target.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub target: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub args: BTreeMap<String, String>,
}

impl SourceBuild {
  pub fn dockerfile_path(&self) -> &str {
    if self.dockerfile_path.is_empty() {
      DEFAULT_DOCKERFILE
    } else {
      &self.dockerfile_path
    }
  }
}

/// Go module dependencies of another source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceGoModule {
  pub from: Box<Source>,
}

/// Literal content embedded in the spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceInline {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file: Option<SourceInlineFile>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dir: Option<SourceInlineDir>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceInlineFile {
  #[serde(default)]
  pub contents: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub permissions: Option<u32>,
  #[serde(default)]
  pub uid: u32,
  #[serde(default)]
  pub gid: u32,
}

impl SourceInlineFile {
  pub fn permissions(&self) -> u32 {
    self.permissions.unwrap_or(0o644)
  }
}

/// A directory of inline files, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceInlineDir {
  #[serde(default)]
  pub files: BTreeMap<String, SourceInlineFile>,
}
