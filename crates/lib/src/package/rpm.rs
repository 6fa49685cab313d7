//! rpm `.spec` rendering.

use std::fmt::{self, Write};

use super::install::{FileKind, InstallPlan, RPM_ROOTS};
use crate::consts::{ARCHIVE_SUFFIX, BUILD_SCRIPT, GOMODS_ARCHIVE_STEM, GOMODS_KEY};
use crate::deps::{self, DependencyMap};
use crate::source::file_name;
use crate::spec::{PackageConstraints, Spec};
use crate::util::path;

pub(super) fn render(spec: &Spec, target_key: &str) -> Result<String, fmt::Error> {
  let writer = SpecWriter::new(spec, target_key);
  let mut out = String::new();
  writer.write(&mut out)?;
  Ok(out)
}

struct SpecWriter<'a> {
  spec: &'a Spec,
  target_key: &'a str,
  plan: InstallPlan,
}

impl<'a> SpecWriter<'a> {
  fn new(spec: &'a Spec, target_key: &'a str) -> Self {
    let plan = InstallPlan::new(&spec.name, spec.artifacts_for(target_key), &RPM_ROOTS);
    Self { spec, target_key, plan }
  }

  fn write(&self, out: &mut String) -> fmt::Result {
    self.preamble(out)?;
    self.sources(out)?;
    self.relations(out)?;
    self.requires(out)?;
    self.description(out)?;
    self.prep(out)?;
    self.build(out)?;
    self.install(out)?;
    self.scriptlets(out)?;
    self.files(out)?;
    self.changelog(out)
  }

  fn preamble(&self, out: &mut String) -> fmt::Result {
    let spec = self.spec;
    let release = if spec.revision.is_empty() { "1" } else { spec.revision.as_str() };
    writeln!(out, "Name: {}", spec.name)?;
    writeln!(out, "Version: {}", spec.version)?;
    writeln!(out, "Release: {release}%{{?dist}}")?;
    if !spec.license.is_empty() {
      writeln!(out, "License: {}", spec.license)?;
    }
    writeln!(out, "Summary: {}", summary(spec))?;
    for (tag, value) in [("URL", &spec.website), ("Vendor", &spec.vendor), ("Packager", &spec.packager)] {
      if !value.is_empty() {
        writeln!(out, "{tag}: {value}")?;
      }
    }
    if spec.noarch {
      writeln!(out, "BuildArch: noarch")?;
    }
    writeln!(out)
  }

  fn sources(&self, out: &mut String) -> fmt::Result {
    let mut idx = 0;
    for (name, source) in &self.spec.sources {
      for line in source.doc() {
        writeln!(out, "# {line}")?;
      }
      writeln!(out, "Source{idx}: {}", file_name(name, source))?;
      idx += 1;
    }
    if self.spec.requires_go() {
      writeln!(out, "Source{idx}: {GOMODS_ARCHIVE_STEM}{ARCHIVE_SUFFIX}")?;
      idx += 1;
    }
    if !self.spec.build.steps.is_empty() {
      writeln!(out, "Source{idx}: {BUILD_SCRIPT}")?;
      idx += 1;
    }
    if idx > 0 {
      writeln!(out)?;
    }
    Ok(())
  }

  fn relations(&self, out: &mut String) -> fmt::Result {
    let spec = self.spec;
    let sections = [
      ("Conflicts", &spec.conflicts),
      ("Provides", &spec.provides),
      ("Obsoletes", &spec.replaces),
    ];
    let mut any = false;
    for (tag, entries) in sections {
      for (name, constraints) in &deps::merge(entries) {
        write_dep(out, tag, name, constraints)?;
        any = true;
      }
    }
    if any {
      writeln!(out)?;
    }
    Ok(())
  }

  fn requires(&self, out: &mut String) -> fmt::Result {
    let artifacts = self.spec.artifacts_for(self.target_key);
    if artifacts.has_units() {
      let mut phases = Vec::new();
      if artifacts.has_enabled_units() {
        phases.push("post");
      }
      phases.extend(["preun", "postun"]);
      for phase in phases {
        writeln!(out, "Requires({phase}): systemd")?;
        writeln!(out, "OrderWithRequires({phase}): systemd")?;
      }
    }

    let empty = DependencyMap::new();
    let package_deps = self.spec.package_deps(self.target_key);
    let build = package_deps.map_or(&empty, |d| &d.build);
    let runtime = package_deps.map_or(&empty, |d| &d.runtime);
    let recommends = package_deps.map_or(&empty, |d| &d.recommends);

    for (name, constraints) in &deps::merge(build) {
      write_dep(out, "BuildRequires", name, constraints)?;
    }
    if !build.is_empty() {
      writeln!(out)?;
    }
    for (name, constraints) in &deps::merge(runtime) {
      write_dep(out, "Requires", name, constraints)?;
    }
    for (name, constraints) in &deps::merge(recommends) {
      write_dep(out, "Recommends", name, constraints)?;
    }
    writeln!(out)
  }

  fn description(&self, out: &mut String) -> fmt::Result {
    writeln!(out, "%description")?;
    let description = self.spec.description.trim_end();
    if description.is_empty() {
      writeln!(out, "{}", self.spec.name)?;
    } else {
      writeln!(out, "{description}")?;
    }
    writeln!(out)
  }

  fn prep(&self, out: &mut String) -> fmt::Result {
    let spec = self.spec;
    if spec.sources.is_empty() {
      return Ok(());
    }
    writeln!(out, "%prep")?;
    for (name, source) in &spec.sources {
      if source.is_dir() {
        writeln!(out, "mkdir -p \"%{{_builddir}}/{name}\"")?;
        writeln!(
          out,
          "tar -C \"%{{_builddir}}/{name}\" -xzf \"%{{_sourcedir}}/{}\"",
          file_name(name, source)
        )?;
      } else {
        writeln!(out, "cp -a \"%{{_sourcedir}}/{name}\" .")?;
      }
    }
    if spec.requires_go() {
      writeln!(out, "mkdir -p \"%{{_builddir}}/{GOMODS_KEY}\"")?;
      writeln!(
        out,
        "tar -C \"%{{_builddir}}/{GOMODS_KEY}\" -xzf \"%{{_sourcedir}}/{GOMODS_ARCHIVE_STEM}{ARCHIVE_SUFFIX}\""
      )?;
    }
    for (target, patches) in &spec.patches {
      for patch in patches {
        let input = path::join(&["%{_builddir}", patch.source.as_str(), patch.path.as_str()]);
        writeln!(
          out,
          "patch -d \"{target}\" -p{} -s --input \"{input}\"",
          patch.strip()
        )?;
      }
    }
    writeln!(out)
  }

  fn build(&self, out: &mut String) -> fmt::Result {
    if self.spec.build.steps.is_empty() {
      return Ok(());
    }
    writeln!(out, "%build")?;
    if self.spec.requires_go() {
      writeln!(out, "export GOMODCACHE=\"$(pwd)/{GOMODS_KEY}\"")?;
    }
    writeln!(out, "%{{_sourcedir}}/{BUILD_SCRIPT}")?;
    writeln!(out)
  }

  fn install(&self, out: &mut String) -> fmt::Result {
    writeln!(out, "%install")?;
    for command in &self.plan.commands {
      writeln!(out, "{command}")?;
    }
    writeln!(out)
  }

  fn scriptlets(&self, out: &mut String) -> fmt::Result {
    let artifacts = self.spec.artifacts_for(self.target_key);
    let units: Vec<String> = artifacts
      .units()
      .map(|(src, unit)| unit.artifact().resolve_name(src))
      .collect();
    if units.is_empty() {
      return Ok(());
    }

    let enabled: Vec<String> = artifacts
      .units()
      .filter(|(_, unit)| unit.enable)
      .map(|(src, unit)| unit.artifact().resolve_name(src))
      .collect();
    if !enabled.is_empty() {
      writeln!(out, "%post")?;
      writeln!(out, "if [ $1 -eq 1 ]; then")?;
      for unit in &enabled {
        writeln!(out, "  systemctl enable {unit}")?;
      }
      writeln!(out, "fi")?;
      writeln!(out)?;
    }

    writeln!(out, "%preun")?;
    writeln!(out, "%systemd_preun {}", units.join(" "))?;
    writeln!(out)?;
    writeln!(out, "%postun")?;
    writeln!(out, "%systemd_postun {}", units.join(" "))?;
    writeln!(out)
  }

  fn files(&self, out: &mut String) -> fmt::Result {
    writeln!(out, "%files")?;
    for entry in &self.plan.files {
      let path = &entry.path;
      match entry.kind {
        FileKind::Plain => writeln!(out, "{path}")?,
        FileKind::Config => writeln!(out, "%config(noreplace) {path}")?,
        FileKind::Doc => writeln!(out, "%doc {path}")?,
        FileKind::License => writeln!(out, "%license {path}")?,
        FileKind::Dir => writeln!(out, "%dir {path}")?,
      }
    }
    writeln!(out)
  }

  fn changelog(&self, out: &mut String) -> fmt::Result {
    writeln!(out, "%changelog")?;
    for entry in &self.spec.changelog {
      writeln!(out, "* {} {}", entry.date.format("%a %b %-d %Y"), entry.author)?;
      for change in &entry.changes {
        writeln!(out, "- {change}")?;
      }
    }
    Ok(())
  }
}

/// First line of the description, falling back to the package name.
fn summary(spec: &Spec) -> &str {
  spec
    .description
    .lines()
    .map(str::trim)
    .find(|line| !line.is_empty())
    .unwrap_or(spec.name.as_str())
}

/// One line per version constraint, wrapped in `%ifarch` when restricted.
fn write_dep(out: &mut String, tag: &str, name: &str, constraints: &PackageConstraints) -> fmt::Result {
  if !constraints.arch.is_empty() {
    writeln!(out, "%ifarch {}", constraints.arch.join(" "))?;
  }
  if constraints.version.is_empty() {
    writeln!(out, "{tag}: {name}")?;
  }
  for version in &constraints.version {
    writeln!(out, "{tag}: {name} {version}")?;
  }
  if !constraints.arch.is_empty() {
    writeln!(out, "%endif")?;
  }
  Ok(())
}
