//! Package metadata rendering.
//!
//! Turns a spec into the text package tools consume: an rpm `.spec` file or
//! a debian `control` file, plus the shared `build.sh` script. Rendering is
//! line-oriented, driven by sorted maps, and all-or-nothing: a render either
//! returns the complete text or an error.

mod deb;
mod install;
mod rpm;
mod script;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::spec::Spec;
use crate::spec::validate::validate_artifacts;

pub use script::build_script;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageFormat {
  RpmSpec,
  DebControl,
}

impl PackageFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::RpmSpec => "rpm-spec",
      Self::DebControl => "deb-control",
    }
  }
}

impl FromStr for PackageFormat {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "rpm" | "rpm-spec" => Ok(Self::RpmSpec),
      "deb" | "deb-control" => Ok(Self::DebControl),
      other => Err(Error::invalid("format", format!("unknown package format {other:?}"))),
    }
  }
}

impl fmt::Display for PackageFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Render package metadata for `target_key` in `format`.
///
/// Target overrides for dependencies and artifacts are honored. Rendering an
/// unchanged spec always produces byte-identical text.
///
/// # Errors
///
/// Returns [`Error::InvalidSpec`] when a field the output needs is missing
/// or the output would not be 7-bit clean.
pub fn render(spec: &Spec, target_key: &str, format: PackageFormat) -> Result<String> {
  check_renderable(spec, target_key)?;
  let text = match format {
    PackageFormat::RpmSpec => rpm::render(spec, target_key),
    PackageFormat::DebControl => deb::render(spec, target_key),
  }
  .map_err(|_| Error::invalid(format.as_str(), "failed to format output"))?;
  ensure_ascii(format, &text)?;
  Ok(text)
}

/// Every file of the `debian/` directory for `target_key`, keyed by path
/// relative to it: `control`, `rules`, `changelog` and the scripts `rules`
/// calls.
///
/// # Errors
///
/// Same as [`render`].
pub fn debian_files(spec: &Spec, target_key: &str) -> Result<BTreeMap<String, String>> {
  let format = PackageFormat::DebControl;
  check_renderable(spec, target_key)?;
  let files = deb::files(spec, target_key).map_err(|_| Error::invalid(format.as_str(), "failed to format output"))?;
  for text in files.values() {
    ensure_ascii(format, text)?;
  }
  Ok(files)
}

fn check_renderable(spec: &Spec, target_key: &str) -> Result<()> {
  let mut violations = Vec::new();
  if spec.name.trim().is_empty() {
    violations.push(Error::invalid("name", "must not be empty"));
  }
  if spec.version.trim().is_empty() {
    violations.push(Error::invalid("version", "must not be empty"));
  }
  validate_artifacts("artifacts", spec.artifacts_for(target_key), &mut violations);

  if violations.is_empty() {
    Ok(())
  } else {
    Err(Error::InvalidSpec { violations })
  }
}

fn ensure_ascii(format: PackageFormat, text: &str) -> Result<()> {
  match text.lines().position(|line| !line.is_ascii()) {
    None => Ok(()),
    Some(idx) => Err(Error::InvalidSpec {
      violations: vec![Error::invalid(
        format!("{format} line {}", idx + 1),
        "contains non-ASCII characters",
      )],
    }),
  }
}
