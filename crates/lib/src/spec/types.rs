//! Typed representation of a package spec.
//!
//! Every mapping in the spec is a [`BTreeMap`] so iteration, serialization and
//! therefore everything rendered from a spec follows lexicographic key order.
//!
//! # Example
//!
//! ```yaml
//! name: hello
//! version: "1.0.0"
//! revision: "1"
//! license: MIT
//! description: A friendly greeter
//! sources:
//!   src:
//!     git:
//!       url: https://github.com/example/hello.git
//!       commit: v1.0.0
//! build:
//!   steps:
//!     - command: make -C src
//! artifacts:
//!   binaries:
//!     src/hello: {}
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::source::Source;
use crate::util::path;

fn is_false(value: &bool) -> bool {
  !*value
}

/// The root of a package spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Spec {
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub website: String,
  pub version: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub revision: String,
  #[serde(default)]
  pub license: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub vendor: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub packager: String,
  /// Package contains no architecture-specific content.
  #[serde(default, skip_serializing_if = "is_false")]
  pub noarch: bool,

  /// Build args that may be referenced as `${NAME}` in string fields.
  /// A `null` value declares the arg without a default.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub args: BTreeMap<String, Option<String>>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub sources: BTreeMap<String, Source>,
  /// Patches to apply, keyed by the name of the source being patched.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub patches: BTreeMap<String, Vec<PatchSpec>>,
  #[serde(default)]
  pub build: ArtifactBuild,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<PackageDependencies>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub conflicts: BTreeMap<String, PackageConstraints>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub provides: BTreeMap<String, PackageConstraints>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub replaces: BTreeMap<String, PackageConstraints>,

  #[serde(default)]
  pub artifacts: Artifacts,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub targets: BTreeMap<String, Target>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub changelog: Vec<ChangelogEntry>,
}

impl Spec {
  /// Dependencies for `target_key`: the target override if it sets any,
  /// otherwise the top-level dependencies.
  pub fn package_deps(&self, target_key: &str) -> Option<&PackageDependencies> {
    self
      .targets
      .get(target_key)
      .and_then(|t| t.dependencies.as_ref())
      .or(self.dependencies.as_ref())
  }

  /// Artifacts for `target_key`: the target override if it sets any,
  /// otherwise the top-level artifacts.
  pub fn artifacts_for(&self, target_key: &str) -> &Artifacts {
    self
      .targets
      .get(target_key)
      .and_then(|t| t.artifacts.as_ref())
      .unwrap_or(&self.artifacts)
  }

  pub fn build_deps(&self, target_key: &str) -> Vec<String> {
    self
      .package_deps(target_key)
      .map(|deps| deps.build.keys().cloned().collect())
      .unwrap_or_default()
  }

  pub fn runtime_deps(&self, target_key: &str) -> Vec<String> {
    self
      .package_deps(target_key)
      .map(|deps| deps.runtime.keys().cloned().collect())
      .unwrap_or_default()
  }

  /// Whether any source needs the go toolchain to resolve.
  pub fn requires_go(&self) -> bool {
    self.sources.values().any(Source::requires_go)
  }
}

/// Version and architecture constraints on one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConstraints {
  /// Version constraints such as `>= 1.0`.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub version: Vec<String>,
  /// Architectures the dependency applies to. Empty means all.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub arch: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDependencies {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub build: BTreeMap<String, PackageConstraints>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub runtime: BTreeMap<String, PackageConstraints>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub recommends: BTreeMap<String, PackageConstraints>,
}

/// A patch file applied to a source during preparation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSpec {
  /// Name of the source holding the patch.
  pub source: String,
  /// Path of the patch inside that source, when the source is a directory.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub path: String,
  /// Leading path components to strip (`patch -p`). Defaults to 1.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub strip: Option<u32>,
}

impl PatchSpec {
  pub fn strip(&self) -> u32 {
    self.strip.unwrap_or(1)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactBuild {
  /// Environment exported to every step.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub steps: Vec<BuildStep>,
}

/// One build command and the environment only it can see.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildStep {
  pub command: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
}

/// Per-target overrides, keyed by target key (`mariner2`, `jammy`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<PackageDependencies>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artifacts: Option<Artifacts>,
  /// Hand every request for this target to an external frontend.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub frontend: Option<Frontend>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Frontend {
  pub image: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub cmdline: String,
}

/// Where each artifact class goes once installed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Artifacts {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub binaries: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub manpages: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub libs: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub libexec: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub headers: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub docs: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub licenses: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub config_files: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub data_dirs: BTreeMap<String, ArtifactConfig>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub directories: Option<CreateArtifactDirectories>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub systemd: Option<SystemdConfiguration>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub links: Vec<ArtifactSymlinkConfig>,
}

impl Artifacts {
  pub fn units(&self) -> impl Iterator<Item = (&String, &SystemdUnitConfig)> {
    self.systemd.iter().flat_map(|s| s.units.iter())
  }

  pub fn dropins(&self) -> impl Iterator<Item = (&String, &SystemdDropinConfig)> {
    self.systemd.iter().flat_map(|s| s.dropins.iter())
  }

  pub fn has_units(&self) -> bool {
    self.units().next().is_some()
  }

  pub fn has_enabled_units(&self) -> bool {
    self.units().any(|(_, unit)| unit.enable)
  }
}

/// Placement of one artifact under its class's install root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactConfig {
  /// Directory under the install root.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub subpath: String,
  /// Installed file name. May contain `*` to install the matches of a glob
  /// into the target directory. Defaults to the source file name.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,
}

impl ArtifactConfig {
  pub fn resolve_name(&self, source_path: &str) -> String {
    if self.name.is_empty() {
      path::base(source_path)
    } else {
      self.name.clone()
    }
  }

  /// Whether the resolved name is a glob, so the copy targets a directory.
  pub fn is_glob(&self, source_path: &str) -> bool {
    self.resolve_name(source_path).contains('*')
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateArtifactDirectories {
  /// Directories under the config root (`/etc`).
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub config: BTreeMap<String, ArtifactDirConfig>,
  /// Directories under the state root (`/var/lib`).
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub state: BTreeMap<String, ArtifactDirConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactDirConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<u32>,
}

impl ArtifactDirConfig {
  pub fn mode(&self) -> u32 {
    self.mode.unwrap_or(0o755)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemdConfiguration {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub units: BTreeMap<String, SystemdUnitConfig>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub dropins: BTreeMap<String, SystemdDropinConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemdUnitConfig {
  /// Installed unit name. Defaults to the source file name.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,
  /// Enable the unit on first install.
  #[serde(default, skip_serializing_if = "is_false")]
  pub enable: bool,
}

impl SystemdUnitConfig {
  pub fn artifact(&self) -> ArtifactConfig {
    ArtifactConfig {
      subpath: String::new(),
      name: self.name.clone(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemdDropinConfig {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,
  /// The unit this drop-in extends, e.g. `foo.service`.
  #[serde(default)]
  pub unit: String,
}

impl SystemdDropinConfig {
  /// Drop-ins live in `<unit>.d/` under the unit dir.
  pub fn artifact(&self) -> ArtifactConfig {
    ArtifactConfig {
      subpath: format!("{}.d", self.unit),
      name: self.name.clone(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSymlinkConfig {
  pub source: String,
  pub dest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangelogEntry {
  pub date: NaiveDate,
  pub author: String,
  #[serde(default)]
  pub changes: Vec<String>,
}
