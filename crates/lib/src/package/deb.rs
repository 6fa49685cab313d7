//! debian packaging files: `control`, `rules`, `changelog` and the install
//! script `rules` calls into.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use super::install::{DEB_ROOTS, InstallPlan};
use super::script::build_script;
use crate::consts::{BUILD_SCRIPT, DEBHELPER_COMPAT};
use crate::deps::{self, DependencyMap, debian_relation};
use crate::spec::Spec;

const STANDARDS_VERSION: &str = "4.1.4";
/// Directory under `debian/` holding the generated scripts.
pub(crate) const SCRIPTS_DIR: &str = "pkgraph";
const INSTALL_SCRIPT: &str = "install.sh";
/// Used when the spec has no changelog; keeps the output reproducible.
const EPOCH_DATE: &str = "Thu, 01 Jan 1970 00:00:00 +0000";

pub(super) fn render(spec: &Spec, target_key: &str) -> Result<String, fmt::Error> {
  let mut out = String::new();
  let empty = DependencyMap::new();
  let package_deps = spec.package_deps(target_key);

  writeln!(out, "Source: {}", spec.name)?;
  writeln!(out, "Section: misc")?;
  writeln!(out, "Priority: optional")?;
  writeln!(out, "Maintainer: {}", maintainer(spec))?;
  let mut build_deps = relations(package_deps.map_or(&empty, |d| &d.build));
  build_deps.push(format!("debhelper-compat (= {DEBHELPER_COMPAT})"));
  write_list(&mut out, "Build-Depends", &build_deps)?;
  writeln!(out, "Standards-Version: {STANDARDS_VERSION}")?;
  if !spec.website.is_empty() {
    writeln!(out, "Homepage: {}", spec.website)?;
  }
  writeln!(out)?;

  writeln!(out, "Package: {}", spec.name)?;
  writeln!(out, "Architecture: {}", if spec.noarch { "all" } else { "linux-any" })?;
  let runtime = deps::merge_runtime(package_deps.map_or(&empty, |d| &d.runtime));
  write_list(&mut out, "Depends", &relations(&runtime))?;
  write_list(&mut out, "Recommends", &relations(package_deps.map_or(&empty, |d| &d.recommends)))?;
  write_list(&mut out, "Conflicts", &relations(&spec.conflicts))?;
  write_list(&mut out, "Provides", &relations(&spec.provides))?;
  write_list(&mut out, "Replaces", &relations(&spec.replaces))?;
  write_description(&mut out, spec)?;
  Ok(out)
}

/// Every file under `debian/`, keyed by its path relative to that directory.
pub(super) fn files(spec: &Spec, target_key: &str) -> Result<BTreeMap<String, String>, fmt::Error> {
  let mut files = BTreeMap::new();
  files.insert("control".to_string(), render(spec, target_key)?);
  files.insert("rules".to_string(), rules(spec, target_key)?);
  files.insert("changelog".to_string(), changelog(spec)?);
  files.insert(format!("{SCRIPTS_DIR}/{INSTALL_SCRIPT}"), install_script(spec, target_key));
  if !spec.build.steps.is_empty() {
    files.insert(format!("{SCRIPTS_DIR}/{BUILD_SCRIPT}"), build_script(spec));
  }
  Ok(files)
}

fn rules(spec: &Spec, target_key: &str) -> Result<String, fmt::Error> {
  let mut out = String::from("#!/usr/bin/make -f\n\n%:\n\tdh $@\n\n");
  writeln!(out, "override_dh_auto_configure:\n")?;
  if spec.build.steps.is_empty() {
    writeln!(out, "override_dh_auto_build:\n")?;
  } else {
    writeln!(out, "override_dh_auto_build:\n\tsh debian/{SCRIPTS_DIR}/{BUILD_SCRIPT}\n")?;
  }
  writeln!(out, "override_dh_auto_test:\n")?;
  writeln!(
    out,
    "override_dh_auto_install:\n\tDESTDIR=\"$(CURDIR)/debian/{}\" sh debian/{SCRIPTS_DIR}/{INSTALL_SCRIPT}",
    spec.name
  )?;

  let artifacts = spec.artifacts_for(target_key);
  if artifacts.has_units() && !artifacts.has_enabled_units() {
    writeln!(out, "\noverride_dh_installsystemd:\n\tdh_installsystemd --no-enable")?;
  }
  Ok(out)
}

fn changelog(spec: &Spec) -> Result<String, fmt::Error> {
  let mut out = String::new();
  let revision = if spec.revision.is_empty() { "1" } else { spec.revision.as_str() };
  let header = format!("{} ({}-{revision}) unstable; urgency=medium", spec.name, spec.version);

  if spec.changelog.is_empty() {
    writeln!(out, "{header}\n\n  * Automated build\n\n -- {}  {EPOCH_DATE}", maintainer(spec))?;
    return Ok(out);
  }

  for (idx, entry) in spec.changelog.iter().enumerate() {
    if idx > 0 {
      writeln!(out)?;
    }
    writeln!(out, "{header}\n")?;
    for change in &entry.changes {
      writeln!(out, "  * {change}")?;
    }
    writeln!(
      out,
      "\n -- {}  {}",
      entry.author,
      entry.date.format("%a, %d %b %Y 00:00:00 +0000")
    )?;
  }
  Ok(out)
}

fn install_script(spec: &Spec, target_key: &str) -> String {
  let plan = InstallPlan::new(&spec.name, spec.artifacts_for(target_key), &DEB_ROOTS);
  let mut out = String::from("#!/usr/bin/env sh\n\nset -e\n\n");
  for command in plan.commands {
    out.push_str(&command);
    out.push('\n');
  }
  out
}

fn maintainer(spec: &Spec) -> &str {
  [&spec.packager, &spec.vendor]
    .into_iter()
    .find(|value| !value.is_empty())
    .map_or(spec.name.as_str(), String::as_str)
}

fn relations(deps: &DependencyMap) -> Vec<String> {
  deps::merge(deps)
    .iter()
    .map(|(name, constraints)| debian_relation(name, constraints))
    .collect()
}

/// `Field: a,` with continuation lines aligned under the first entry.
fn write_list(out: &mut String, field: &str, entries: &[String]) -> fmt::Result {
  if entries.is_empty() {
    return Ok(());
  }
  let indent = " ".repeat(field.len() + 2);
  writeln!(out, "{field}: {}", entries.join(&format!(",\n{indent}")))
}

fn write_description(out: &mut String, spec: &Spec) -> fmt::Result {
  let mut lines = spec.description.trim().lines();
  let summary = lines.next().map(str::trim).filter(|l| !l.is_empty());
  writeln!(out, "Description: {}", summary.unwrap_or(spec.name.as_str()))?;
  for line in lines {
    if line.trim().is_empty() {
      writeln!(out, " .")?;
    } else {
      writeln!(out, " {}", line.trim_end())?;
    }
  }
  Ok(())
}
