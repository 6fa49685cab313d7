//! Source resolution through the public collaborators.

use std::sync::Arc;

use pkgraph_lib::graph::{Definition, Op};
use pkgraph_lib::source::{self, SourceOpts};
use pkgraph_lib::spec::Spec;
use pkgraph_lib::Error;

use super::common::{args, service_spec, ImageWorker};

fn opts() -> SourceOpts {
  SourceOpts {
    worker: Some(Arc::new(ImageWorker)),
    ..Default::default()
  }
}

fn parse(yaml: &str) -> Spec {
  Spec::parse(yaml.as_bytes()).unwrap()
}

#[test]
fn entries_follow_name_order() {
  let spec = service_spec().substitute_args(&args(&[("COMMIT", "v1")])).unwrap();
  let resolved = source::resolve_all(&spec, &opts()).unwrap();

  let layout: Vec<(&str, &str, bool)> = resolved
    .entries
    .iter()
    .map(|e| (e.name.as_str(), e.file_name.as_str(), e.is_dir))
    .collect();
  assert_eq!(
    layout,
    vec![("a", "a", false), ("b", "b.tar.gz", true), ("fix", "fix", false)]
  );
  assert!(resolved.gomods.is_none());
}

#[test]
fn directory_sources_are_archived_in_the_worker() {
  let spec = service_spec().substitute_args(&args(&[("COMMIT", "v1")])).unwrap();
  let resolved = source::resolve_all(&spec, &opts()).unwrap();
  let definition = Definition::from_fragment(&resolved.entries[1].fragment).unwrap();

  assert!(definition
    .ops
    .iter()
    .any(|op| matches!(&op.op, Op::Image { reference } if reference == "worker:latest")));
  assert!(definition
    .ops
    .iter()
    .any(|op| matches!(&op.op, Op::Git { reference, .. } if reference == "v1")));
}

#[test]
fn layout_places_every_entry_at_the_root() {
  let spec = service_spec().substitute_args(&args(&[("COMMIT", "v1")])).unwrap();
  let resolved = source::resolve_all(&spec, &opts()).unwrap();
  let merged = Definition::from_fragment(&resolved.layout(true)).unwrap();
  let copied = Definition::from_fragment(&resolved.layout(false)).unwrap();

  assert!(matches!(merged.root_op().unwrap().op, Op::Merge));
  assert!(copied.ops.iter().all(|op| !matches!(op.op, Op::Merge)));
}

#[test]
fn go_modules_need_a_worker() {
  let spec = parse(
    r#"
name: mods
version: "1"
sources:
  deps:
    gomod:
      from:
        git:
          url: https://example.com/app.git
          commit: v1
"#,
  );
  let err = source::resolve_all(&spec, &SourceOpts::default()).unwrap_err();
  assert!(matches!(err.root_cause(), Error::MissingWorker { .. }), "{err:?}");

  let resolved = source::resolve_all(&spec, &opts()).unwrap();
  assert!(resolved.gomods.is_some());
}

#[test]
fn build_sources_need_a_forwarder() {
  let spec = parse(
    r#"
name: img
version: "1"
sources:
  rootfs:
    build:
      dockerfile:
        inline:
          file:
            contents: "FROM scratch\n"
"#,
  );
  let err = source::resolve_all(&spec, &opts()).unwrap_err();
  assert!(matches!(err.root_cause(), Error::MissingForwarder { .. }), "{err:?}");
}

#[test]
fn cancelled_resolution_stops() {
  let opts = opts();
  opts.cancel.cancel();
  let err = source::resolve_all(&service_spec(), &opts).unwrap_err();
  assert!(matches!(err, Error::Cancelled));
}
