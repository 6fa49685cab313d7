//! Deterministic dependency merging.
//!
//! Dependency maps are already keyed in name order; merging normalizes the
//! constraints inside each entry so rendering the same spec twice, or
//! rendering already-merged data, always yields the same text.

use std::collections::BTreeMap;

use crate::spec::PackageConstraints;

/// Resolved shared-library dependencies, filled in by `dh_shlibdeps`.
pub const SHLIBS_DEPENDS: &str = "${shlibs:Depends}";
/// Dependencies added by other debhelper tools.
pub const MISC_DEPENDS: &str = "${misc:Depends}";

pub type DependencyMap = BTreeMap<String, PackageConstraints>;

impl PackageConstraints {
  /// Versions and architectures sorted and de-duplicated.
  pub fn normalized(&self) -> Self {
    let mut version = self.version.iter().map(|v| v.trim().to_string()).collect::<Vec<_>>();
    version.sort();
    version.dedup();
    let mut arch = self.arch.clone();
    arch.sort();
    arch.dedup();
    Self { version, arch }
  }

  /// Version constraints joined with `, `.
  pub fn version_list(&self) -> String {
    self.version.join(", ")
  }
}

/// Normalize every entry of a dependency map.
pub fn merge(deps: &DependencyMap) -> DependencyMap {
  deps
    .iter()
    .map(|(name, constraints)| (name.clone(), constraints.normalized()))
    .collect()
}

/// [`merge`], then add the debhelper substitution placeholders if absent.
pub fn merge_runtime(deps: &DependencyMap) -> DependencyMap {
  let mut merged = merge(deps);
  for placeholder in [SHLIBS_DEPENDS, MISC_DEPENDS] {
    merged.entry(placeholder.to_string()).or_default();
  }
  merged
}

/// A dependency in debian relation syntax: `name (v1, v2) [a1 a2]`.
pub fn debian_relation(name: &str, constraints: &PackageConstraints) -> String {
  let mut relation = name.to_string();
  if !constraints.version.is_empty() {
    relation.push_str(&format!(" ({})", constraints.version_list()));
  }
  if !constraints.arch.is_empty() {
    relation.push_str(&format!(" [{}]", constraints.arch.join(" ")));
  }
  relation
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn constraints(version: &[&str], arch: &[&str]) -> PackageConstraints {
    PackageConstraints {
      version: version.iter().map(|s| s.to_string()).collect(),
      arch: arch.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn merge_sorts_constraints() {
    let deps = DependencyMap::from([("libfoo".to_string(), constraints(&["<< 2.0", ">= 1.0"], &["arm64", "amd64"]))]);
    let merged = merge(&deps);
    assert_eq!(merged["libfoo"].version, vec!["<< 2.0", ">= 1.0"]);
    assert_eq!(merged["libfoo"].arch, vec!["amd64", "arm64"]);
  }

  #[test]
  fn runtime_gets_placeholders() {
    let merged = merge_runtime(&DependencyMap::new());
    let names: Vec<_> = merged.keys().map(String::as_str).collect();
    assert_eq!(names, vec![MISC_DEPENDS, SHLIBS_DEPENDS]);
  }

  #[test]
  fn debian_relation_format() {
    assert_eq!(debian_relation("libfoo", &constraints(&[], &[])), "libfoo");
    assert_eq!(
      debian_relation("libfoo", &constraints(&[">= 1.0"], &["amd64", "arm64"])),
      "libfoo (>= 1.0) [amd64 arm64]"
    );
  }

  fn dependency_map() -> impl Strategy<Value = DependencyMap> {
    let constraint = (
      prop::collection::vec("(>=|<=|=|<<|>>) [0-9]\\.[0-9]", 0..4),
      prop::collection::vec("(amd64|arm64|riscv64)", 0..3),
    )
      .prop_map(|(version, arch)| PackageConstraints { version, arch });
    prop::collection::btree_map("[a-z][a-z0-9-]{0,8}", constraint, 0..6)
  }

  proptest! {
    #[test]
    fn merge_is_idempotent(deps in dependency_map()) {
      let once = merge(&deps);
      prop_assert_eq!(merge(&once), once);
    }

    #[test]
    fn merge_runtime_is_idempotent(deps in dependency_map()) {
      let once = merge_runtime(&deps);
      prop_assert_eq!(merge_runtime(&once), once);
    }

    #[test]
    fn merge_keeps_every_package(deps in dependency_map()) {
      let merged = merge(&deps);
      prop_assert!(merged.keys().eq(deps.keys()));
    }
  }
}
