//! Package metadata rendered from a parsed spec.

use pkgraph_lib::package::{self, PackageFormat};
use pkgraph_lib::spec::Spec;
use pkgraph_lib::Error;
use proptest::prelude::*;

use super::common::{args, service_spec};

fn resolved() -> Spec {
  service_spec().substitute_args(&args(&[("COMMIT", "v1")])).unwrap()
}

fn line_index(text: &str, line: &str) -> usize {
  text
    .lines()
    .position(|l| l == line)
    .unwrap_or_else(|| panic!("missing line {line:?} in:\n{text}"))
}

mod rpm {
  use super::*;

  #[test]
  fn sections_appear_in_order() {
    let text = package::render(&resolved(), "", PackageFormat::RpmSpec).unwrap();

    let ordered = [
      "Name: svc",
      "Version: 1.2.3",
      "Summary: A small service",
      "Source0: a",
      "Source1: b.tar.gz",
      "Source2: fix",
      "Source3: build.sh",
      "Requires(post): systemd",
      "BuildRequires: golang",
      "Requires: libc >= 2.31",
      "%description",
      "%prep",
      "%build",
      "%install",
      "%post",
      "  systemctl enable svc.service",
      "%preun",
      "%files",
      "%{_bindir}/svc",
      "%{_unitdir}/svc.service",
      "%changelog",
    ];
    let positions: Vec<usize> = ordered.iter().map(|line| line_index(&text, line)).collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted, "sections out of order:\n{text}");
  }

  #[test]
  fn patch_follows_extraction() {
    let text = package::render(&resolved(), "", PackageFormat::RpmSpec).unwrap();
    let extract = text.find("-xzf \"%{_sourcedir}/b.tar.gz\"").unwrap();
    let patch = text.find("patch -d \"b\" -p1 -s --input \"%{_builddir}/fix\"").unwrap();
    assert!(extract < patch);
  }

  #[test]
  fn unsubstituted_spec_renders_literally() {
    let text = package::render(&service_spec(), "", PackageFormat::RpmSpec).unwrap();
    assert!(text.contains("Version: ${VERSION}\n"));
  }
}

mod deb {
  use super::*;

  #[test]
  fn control_lists_runtime_with_placeholders() {
    let text = package::render(&resolved(), "", PackageFormat::DebControl).unwrap();
    assert!(text.contains("Depends: ${misc:Depends},\n         ${shlibs:Depends},\n         libc (>= 2.31)\n"));
    assert!(text.contains("Build-Depends: golang,\n               debhelper-compat (= 11)\n"));
    assert!(text.contains("Homepage: https://example.com/svc\n"));
  }

  #[test]
  fn debian_files_enable_units_by_default() {
    let files = package::debian_files(&resolved(), "").unwrap();
    assert!(!files["rules"].contains("--no-enable"));
    assert!(files["pkgraph/install.sh"].contains("/lib/systemd/system"));
    assert!(files["pkgraph/build.sh"].contains("export CGO_ENABLED=\"0\""));
  }
}

#[test]
fn non_ascii_description_is_rejected() {
  let mut spec = resolved();
  spec.description = "Serviço".into();
  for format in [PackageFormat::RpmSpec, PackageFormat::DebControl] {
    assert!(matches!(
      package::render(&spec, "", format),
      Err(Error::InvalidSpec { .. })
    ));
  }
}

proptest! {
  #[test]
  fn rendering_is_deterministic(version in "[0-9]{1,3}\\.[0-9]{1,3}", runtime in prop::collection::btree_set("[a-z]{2,8}", 0..6)) {
    let mut spec = resolved();
    spec.version = version;
    if let Some(deps) = spec.dependencies.as_mut() {
      deps.runtime = runtime.into_iter().map(|name| (name, Default::default())).collect();
    }
    for format in [PackageFormat::RpmSpec, PackageFormat::DebControl] {
      let first = package::render(&spec, "", format).unwrap();
      let second = package::render(&spec.clone(), "", format).unwrap();
      prop_assert_eq!(first, second);
    }
  }
}
