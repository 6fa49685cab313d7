//! Spec validation.
//!
//! Validation never stops at the first problem. Every violation is collected
//! and returned together in [`Error::InvalidSpec`].

use std::collections::BTreeMap;

use super::source::{Origin, Source};
use super::types::{Artifacts, PackageConstraints, Spec};
use crate::consts::{BUILD_SCRIPT, GOMODS_ARCHIVE_STEM};
use crate::error::{Error, Result};
use crate::util::path;

const VERSION_OPERATORS: [&str; 7] = ["<<", "<=", ">=", ">>", "=", "<", ">"];

impl Spec {
  /// Check the whole spec, reporting every violation found.
  ///
  /// # Errors
  ///
  /// Returns [`Error::InvalidSpec`] holding one error per violation. Source
  /// problems are reported as [`Error::InvalidSource`], everything else as
  /// [`Error::Invalid`].
  pub fn validate(&self) -> Result<()> {
    let mut violations = Vec::new();

    if self.name.trim().is_empty() {
      violations.push(Error::invalid("name", "must not be empty"));
    } else if !is_package_name(&self.name) {
      violations.push(Error::invalid("name", format!("{:?} is not a valid package name", self.name)));
    }
    if self.version.trim().is_empty() {
      violations.push(Error::invalid("version", "must not be empty"));
    }

    for (name, source) in &self.sources {
      if !path::is_path_segment(name) {
        violations.push(Error::invalid_source(name, "source name must be a valid path segment"));
      } else if is_reserved_source_name(name) {
        violations.push(Error::invalid_source(name, "source name is reserved"));
      }
      validate_source(name, source, &mut violations);
    }

    for (target, patches) in &self.patches {
      if !self.sources.contains_key(target) {
        violations.push(Error::invalid(
          format!("patches.{target}"),
          "patches a source that is not defined",
        ));
      }
      for (idx, patch) in patches.iter().enumerate() {
        if !self.sources.contains_key(&patch.source) {
          violations.push(Error::invalid(
            format!("patches.{target}[{idx}].source"),
            format!("patch source {:?} is not defined", patch.source),
          ));
        }
      }
    }

    for (idx, step) in self.build.steps.iter().enumerate() {
      if step.command.trim().is_empty() {
        violations.push(Error::invalid(format!("build.steps[{idx}].command"), "must not be empty"));
      }
    }

    if let Some(deps) = &self.dependencies {
      validate_constraints("dependencies.build", &deps.build, &mut violations);
      validate_constraints("dependencies.runtime", &deps.runtime, &mut violations);
      validate_constraints("dependencies.recommends", &deps.recommends, &mut violations);
    }
    validate_constraints("conflicts", &self.conflicts, &mut violations);
    validate_constraints("provides", &self.provides, &mut violations);
    validate_constraints("replaces", &self.replaces, &mut violations);

    validate_artifacts("artifacts", &self.artifacts, &mut violations);

    for (key, target) in &self.targets {
      if let Some(deps) = &target.dependencies {
        validate_constraints(&format!("targets.{key}.dependencies.build"), &deps.build, &mut violations);
        validate_constraints(&format!("targets.{key}.dependencies.runtime"), &deps.runtime, &mut violations);
        validate_constraints(
          &format!("targets.{key}.dependencies.recommends"),
          &deps.recommends,
          &mut violations,
        );
      }
      if let Some(artifacts) = &target.artifacts {
        validate_artifacts(&format!("targets.{key}.artifacts"), artifacts, &mut violations);
      }
      if let Some(frontend) = &target.frontend
        && frontend.image.trim().is_empty()
      {
        violations.push(Error::invalid(format!("targets.{key}.frontend.image"), "must not be empty"));
      }
    }

    for (idx, entry) in self.changelog.iter().enumerate() {
      if entry.author.trim().is_empty() {
        violations.push(Error::invalid(format!("changelog[{idx}].author"), "must not be empty"));
      }
    }

    if violations.is_empty() {
      Ok(())
    } else {
      Err(Error::InvalidSpec { violations })
    }
  }
}

impl Source {
  /// Validate a single source on its own.
  pub fn validate(&self, name: &str) -> Result<()> {
    let mut violations = Vec::new();
    validate_source(name, self, &mut violations);
    if violations.is_empty() {
      Ok(())
    } else {
      Err(Error::InvalidSpec { violations })
    }
  }
}

fn validate_source(name: &str, source: &Source, out: &mut Vec<Error>) {
  let origin = match source.origin() {
    Ok(origin) => origin,
    Err(reason) => {
      out.push(Error::invalid_source(name, reason));
      return;
    }
  };

  match origin {
    Origin::DockerImage(image) => {
      if image.reference.trim().is_empty() {
        out.push(Error::invalid_source(name, "image ref must not be empty"));
      }
      if let Some(cmd) = &image.cmd {
        for (idx, step) in cmd.steps.iter().enumerate() {
          if step.command.trim().is_empty() {
            out.push(Error::invalid_source(name, format!("cmd step {idx} has an empty command")));
          }
        }
        for mount in &cmd.mounts {
          if !mount.dest.starts_with('/') || path::clean(&mount.dest) == "/" {
            out.push(Error::invalid_source(
              name,
              format!("mount destination {:?} must be an absolute path other than /", mount.dest),
            ));
          }
          if mount.spec.gomod.is_some() {
            out.push(Error::invalid_source(name, "go module sources cannot be mounted"));
          }
          validate_source(&format!("{name}:{}", mount.dest), &mount.spec, out);
        }
      }
    }
    Origin::Git(git) => {
      if git.url.trim().is_empty() {
        out.push(Error::invalid_source(name, "git url must not be empty"));
      }
      if git.commit.trim().is_empty() {
        out.push(Error::invalid_source(name, "git commit must not be empty"));
      }
    }
    Origin::Http(http) => {
      if http.url.trim().is_empty() {
        out.push(Error::invalid_source(name, "http url must not be empty"));
      }
      if source.has_filters() {
        out.push(Error::invalid_source(name, "path, includes and excludes are not supported on file sources"));
      }
    }
    Origin::Context(_) => {}
    Origin::Build(build) => {
      if build.source.is_none() && build.dockerfile.is_none() {
        out.push(Error::invalid_source(name, "build source must set a context source, a dockerfile, or both"));
      }
      for nested in [&build.source, &build.dockerfile].into_iter().flatten() {
        if nested.build.is_some() {
          out.push(Error::invalid_source(name, "build sources cannot be recursive"));
          continue;
        }
        validate_source(name, nested, out);
      }
    }
    Origin::GoModule(gomod) => {
      if gomod.from.gomod.is_some() {
        out.push(Error::invalid_source(name, "go module sources cannot be nested"));
        return;
      }
      validate_source(name, &gomod.from, out);
    }
    Origin::Inline(inline) => match (&inline.file, &inline.dir) {
      (Some(_), None) => {
        if source.has_filters() {
          out.push(Error::invalid_source(name, "path, includes and excludes are not supported on file sources"));
        }
      }
      (None, Some(dir)) => {
        for file in dir.files.keys() {
          if !path::is_path_segment(file) {
            out.push(Error::invalid_source(
              name,
              format!("inline file name {file:?} must be a valid path segment"),
            ));
          }
        }
      }
      _ => out.push(Error::invalid_source(name, "inline source must set exactly one of file or dir")),
    },
  }
}

/// Check the per-artifact fields that rendering depends on.
pub(crate) fn validate_artifacts(field: &str, artifacts: &Artifacts, out: &mut Vec<Error>) {
  for (key, dropin) in artifacts.dropins() {
    if dropin.unit.trim().is_empty() {
      out.push(Error::invalid(
        format!("{field}.systemd.dropins.{key}.unit"),
        "must name the unit being extended",
      ));
    }
  }
  for (idx, link) in artifacts.links.iter().enumerate() {
    if link.source.trim().is_empty() {
      out.push(Error::invalid(format!("{field}.links[{idx}].source"), "must not be empty"));
    }
    if !link.dest.starts_with('/') {
      out.push(Error::invalid(
        format!("{field}.links[{idx}].dest"),
        "must be an absolute path",
      ));
    }
  }
  if let Some(dirs) = &artifacts.directories {
    for (kind, entries) in [("config", &dirs.config), ("state", &dirs.state)] {
      for name in entries.keys() {
        if name.trim().is_empty() || name.starts_with('/') {
          out.push(Error::invalid(
            format!("{field}.directories.{kind}.{name}"),
            "must be a relative path",
          ));
        }
      }
    }
  }
}

fn validate_constraints(field: &str, deps: &BTreeMap<String, PackageConstraints>, out: &mut Vec<Error>) {
  for (pkg, constraints) in deps {
    if pkg.is_empty() || pkg.contains(char::is_whitespace) {
      out.push(Error::invalid(
        format!("{field}.{pkg}"),
        "package name must be a single non-empty word",
      ));
    }
    for version in &constraints.version {
      if !is_version_constraint(version) {
        out.push(Error::invalid(
          format!("{field}.{pkg}.version"),
          format!("malformed version constraint {version:?}"),
        ));
      }
    }
    for arch in &constraints.arch {
      if !is_arch_tag(arch) {
        out.push(Error::invalid(
          format!("{field}.{pkg}.arch"),
          format!("malformed architecture {arch:?}"),
        ));
      }
    }
  }
}

/// `<op> <version>` where op is one of the relational operators shared by rpm
/// and dpkg.
fn is_version_constraint(constraint: &str) -> bool {
  let constraint = constraint.trim();
  let Some(rest) = VERSION_OPERATORS.iter().find_map(|op| constraint.strip_prefix(op)) else {
    return false;
  };
  let version = rest.trim();
  !version.is_empty() && !version.contains(char::is_whitespace) && !version.contains(['(', ')', ','])
}

fn is_arch_tag(arch: &str) -> bool {
  !arch.is_empty() && arch.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_package_name(name: &str) -> bool {
  name
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
}

fn is_reserved_source_name(name: &str) -> bool {
  name == BUILD_SCRIPT || name == GOMODS_ARCHIVE_STEM || name.starts_with(&format!("{GOMODS_ARCHIVE_STEM}."))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::spec::source::{SourceBuild, SourceGit, SourceGoModule, SourceInline, SourceInlineFile};
  use crate::spec::types::{PackageDependencies, PatchSpec};

  fn spec() -> Spec {
    Spec {
      name: "hello".into(),
      version: "1.0".into(),
      ..Default::default()
    }
  }

  fn git_source() -> Source {
    Source {
      git: Some(SourceGit {
        url: "https://example.com/hello.git".into(),
        commit: "v1".into(),
        keep_git_dir: false,
      }),
      ..Default::default()
    }
  }

  fn violations(spec: &Spec) -> Vec<Error> {
    match spec.validate() {
      Err(Error::InvalidSpec { violations }) => violations,
      other => panic!("expected InvalidSpec, got {other:?}"),
    }
  }

  mod sources {
    use super::*;

    #[test]
    fn inline_and_git_together_is_invalid_source() {
      let mut src = git_source();
      src.inline = Some(SourceInline {
        file: Some(SourceInlineFile::default()),
        dir: None,
      });
      let mut spec = spec();
      spec.sources.insert("src".into(), src);

      let found = violations(&spec);
      assert_eq!(found.len(), 1);
      assert!(matches!(&found[0], Error::InvalidSource { name, .. } if name == "src"));
    }

    #[test]
    fn source_without_origin_is_invalid_source() {
      let mut spec = spec();
      spec.sources.insert("empty".into(), Source::default());
      let found = violations(&spec);
      assert!(matches!(&found[0], Error::InvalidSource { name, .. } if name == "empty"));
    }

    #[test]
    fn recursive_build_sources_are_rejected() {
      let inner = Source {
        build: Some(SourceBuild {
          source: Some(Box::new(git_source())),
          ..Default::default()
        }),
        ..Default::default()
      };
      let outer = Source {
        build: Some(SourceBuild {
          source: Some(Box::new(inner)),
          ..Default::default()
        }),
        ..Default::default()
      };
      let mut spec = spec();
      spec.sources.insert("img".into(), outer);

      let found = violations(&spec);
      assert!(
        found
          .iter()
          .any(|e| matches!(e, Error::InvalidSource { reason, .. } if reason.contains("recursive")))
      );
    }

    #[test]
    fn build_source_needs_context_or_dockerfile() {
      let mut spec = spec();
      spec.sources.insert(
        "img".into(),
        Source {
          build: Some(SourceBuild::default()),
          ..Default::default()
        },
      );
      assert!(matches!(&violations(&spec)[0], Error::InvalidSource { .. }));
    }

    #[test]
    fn nested_gomod_is_rejected() {
      let inner = Source {
        gomod: Some(SourceGoModule {
          from: Box::new(git_source()),
        }),
        ..Default::default()
      };
      let mut spec = spec();
      spec.sources.insert(
        "mods".into(),
        Source {
          gomod: Some(SourceGoModule { from: Box::new(inner) }),
          ..Default::default()
        },
      );
      assert_eq!(violations(&spec).len(), 1);
    }

    #[test]
    fn reserved_and_unsafe_names_are_rejected() {
      let mut spec = spec();
      spec.sources.insert("build.sh".into(), git_source());
      spec.sources.insert("a/b".into(), git_source());
      assert_eq!(violations(&spec).len(), 2);
    }
  }

  #[test]
  fn collects_every_violation() {
    let mut spec = Spec::default();
    spec.sources.insert("bad".into(), Source::default());
    spec.patches.insert(
      "missing".into(),
      vec![PatchSpec {
        source: "also-missing".into(),
        path: String::new(),
        strip: None,
      }],
    );
    spec.dependencies = Some(PackageDependencies {
      runtime: BTreeMap::from([(
        "libfoo".to_string(),
        PackageConstraints {
          version: vec!["1.0".into()],
          arch: vec!["x86 64".into()],
        },
      )]),
      ..Default::default()
    });

    // name, version, source, patch target, patch source, version, arch
    assert_eq!(violations(&spec).len(), 7);
  }

  #[test]
  fn version_constraints() {
    assert!(is_version_constraint(">= 1.0"));
    assert!(is_version_constraint("<<2"));
    assert!(is_version_constraint("= ${VERSION}"));
    assert!(!is_version_constraint("1.0"));
    assert!(!is_version_constraint(">= "));
    assert!(!is_version_constraint(">= 1.0, << 2"));
  }

  #[test]
  fn valid_spec_passes() {
    let mut spec = spec();
    spec.sources.insert("src".into(), git_source());
    assert!(spec.validate().is_ok());
  }
}
