//! rpm targets for the tdnf-based distros.

use super::build::{for_each_platform, source_opts};
use super::distro::Distro;
use crate::consts::{ARCHIVE_SUFFIX, BUILD_SCRIPT, GOMODS_ARCHIVE_STEM};
use crate::error::Result;
use crate::graph::{Constraints, Exec, FileAttrs, Fragment, Mount, merge_at_path};
use crate::package::{self, PackageFormat, build_script};
use crate::router::{Request, Response, RouteMux, TargetInfo};
use crate::source::{self, SourceOpts};
use crate::spec::Spec;

const SOURCES_DIR: &str = "SOURCES";
const TOPDIR: &str = "/build/top";
const OUTDIR: &str = "/build/out";

/// Location of the rendered spec inside the buildroot.
pub(super) fn spec_path(spec: &Spec) -> String {
  format!("SPECS/{0}/{0}.spec", spec.name)
}

pub(super) fn router(distro: &'static Distro) -> RouteMux {
  let mut debug = RouteMux::new();
  debug.add(
    "buildroot",
    move |request: Request| handle_buildroot(distro, request),
    Some(TargetInfo::new(
      "buildroot",
      "Outputs an rpm buildroot suitable for passing to rpmbuild.",
    )),
  );
  debug.add(
    "sources",
    move |request: Request| handle_sources(distro, request),
    Some(TargetInfo::new(
      "sources",
      "Outputs all the sources specified in the spec file in the format given to rpmbuild.",
    )),
  );
  debug.add(
    "spec",
    handle_spec,
    Some(TargetInfo::new("spec", "Outputs the generated RPM spec file")),
  );

  let mut rpm = RouteMux::new();
  rpm.add(
    "",
    move |request: Request| handle_rpm(distro, request),
    Some(TargetInfo::new("", "Builds an rpm and src.rpm.").as_default()),
  );
  rpm.add("debug", debug, None);

  let mut mux = RouteMux::new();
  mux.add("rpm", rpm, None);
  mux.add(
    "container/depsonly",
    move |request: Request| {
      let key = request.target_key.clone();
      for_each_platform(&request, |spec, _| Ok(distro.depsonly(&spec.runtime_deps(&key))))
    },
    Some(TargetInfo::new(
      "container/depsonly",
      "Builds a container image with only the runtime dependencies installed.",
    )),
  );
  mux
}

/// Everything rpmbuild expects in SOURCES, at the root: one file per
/// source, the archived module cache and the build script.
pub(super) fn sources(spec: &Spec, distro: &Distro, opts: &SourceOpts) -> Result<Fragment> {
  let resolved = source::resolve_all(spec, opts)?;
  let mut layers = resolved.fragments();

  if let Some(gomods) = &resolved.gomods {
    let worker = distro.worker(&Constraints::group("Archive go modules"));
    layers.push(source::tar(&worker, gomods, &format!("{GOMODS_ARCHIVE_STEM}{ARCHIVE_SUFFIX}")));
  }
  if !spec.build.steps.is_empty() {
    layers.push(Fragment::scratch().mkfile(BUILD_SCRIPT, build_script(spec), FileAttrs::mode(0o755)));
  }
  Ok(merge_at_path(&Fragment::scratch(), &layers, "/", opts.merge_supported))
}

/// The rendered spec at [`spec_path`].
pub(super) fn spec_file(spec: &Spec, target_key: &str) -> Result<Fragment> {
  let text = package::render(spec, target_key, PackageFormat::RpmSpec)?;
  Ok(
    Fragment::scratch()
      .mkdir(format!("/SPECS/{}", spec.name), 0o755)
      .mkfile(format!("/{}", spec_path(spec)), text, FileAttrs::mode(0o644))
      .with_constraints(&Constraints::group("Generate rpm spec file")),
  )
}

pub(super) fn buildroot(spec: &Spec, target_key: &str, distro: &Distro, opts: &SourceOpts) -> Result<Fragment> {
  let spec_file = spec_file(spec, target_key)?;
  let sources = sources(spec, distro, opts)?;
  Ok(merge_at_path(
    &spec_file,
    &[sources],
    &format!("/{SOURCES_DIR}"),
    opts.merge_supported,
  ))
}

/// rpmbuild in the distro worker. The result holds `RPMS` and `SRPMS`.
pub(super) fn rpm(spec: &Spec, target_key: &str, distro: &Distro, opts: &SourceOpts) -> Result<Fragment> {
  let root = buildroot(spec, target_key, distro, opts)?;
  let group = Constraints::group(format!("Build rpm: {}", spec.name));
  let worker = distro.install(
    &distro.worker(&group),
    &spec.build_deps(target_key),
    &Constraints::group("Install build deps"),
  );

  let script = format!(
    "rpmbuild --define \"_topdir {TOPDIR}\" --define \"_rpmdir {OUTDIR}/RPMS\" --define \"_srcrpmdir {OUTDIR}/SRPMS\" -ba \"{TOPDIR}/{}\"",
    spec_path(spec)
  );
  Ok(
    worker
      .run(
        Exec::shell(script)
          .cwd(TOPDIR)
          .mount(Mount::new(TOPDIR, &root))
          .mount(Mount::scratch(OUTDIR)),
      )
      .output(OUTDIR)
      .with_constraints(&group),
  )
}

fn handle_rpm(distro: &'static Distro, request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| {
    let opts = source_opts(&request, spec, distro);
    rpm(spec, &request.target_key, distro, &opts)
  })
}

fn handle_buildroot(distro: &'static Distro, request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| {
    let opts = source_opts(&request, spec, distro);
    buildroot(spec, &request.target_key, distro, &opts)
  })
}

fn handle_sources(distro: &'static Distro, request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| {
    let opts = source_opts(&request, spec, distro);
    let sources = sources(spec, distro, &opts)?;
    Ok(merge_at_path(
      &Fragment::scratch(),
      &[sources],
      &format!("/{SOURCES_DIR}"),
      opts.merge_supported,
    ))
  })
}

fn handle_spec(request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| spec_file(spec, &request.target_key))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frontend::MARINER2;
  use crate::frontend::testutil::{request_for, spec};
  use crate::graph::{Definition, Op};
  use crate::router::Subrequest;
  use crate::source::testutil::opts;
  use crate::spec::{BuildStep, Source, SourceGit, SourceGoModule};

  fn full_spec() -> Spec {
    let git = Source {
      git: Some(SourceGit {
        url: "https://example.com/app.git".into(),
        commit: "v1".into(),
        keep_git_dir: false,
      }),
      ..Default::default()
    };
    let mut spec = spec();
    spec.sources.insert("app".into(), git.clone());
    spec.sources.insert(
      "mods".into(),
      Source {
        gomod: Some(SourceGoModule { from: Box::new(git) }),
        ..Default::default()
      },
    );
    spec.build.steps.push(BuildStep {
      command: "make".into(),
      ..Default::default()
    });
    spec
  }

  fn mkfile_paths(definition: &Definition) -> Vec<String> {
    definition
      .ops
      .iter()
      .filter_map(|op| match &op.op {
        Op::Mkfile { path, .. } => Some(path.clone()),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn spec_path_is_nested_by_name() {
    assert_eq!(spec_path(&spec()), "SPECS/hello/hello.spec");
  }

  #[test]
  fn sources_archive_gomods_and_add_build_script() {
    let fragment = sources(&full_spec(), &MARINER2, &opts()).unwrap();
    let definition = Definition::from_fragment(&fragment).unwrap();

    assert!(mkfile_paths(&definition).contains(&"build.sh".to_string()));
    let tars: Vec<String> = definition
      .ops
      .iter()
      .filter_map(|op| match &op.op {
        Op::Exec(exec) if exec.args[2].starts_with("tar ") => Some(exec.args[2].clone()),
        _ => None,
      })
      .collect();
    assert!(tars.iter().any(|t| t.contains("/out/app.tar.gz")));
    assert!(tars.iter().any(|t| t.contains("/out/__gomods.tar.gz")));
  }

  #[test]
  fn buildroot_places_spec_and_sources() {
    let fragment = buildroot(&full_spec(), "", &MARINER2, &opts()).unwrap();
    let definition = Definition::from_fragment(&fragment).unwrap();
    assert!(mkfile_paths(&definition).contains(&"/SPECS/hello/hello.spec".to_string()));
    assert!(definition.ops.iter().any(|op| matches!(&op.op, Op::Copy(copy) if copy.dest == "/SOURCES")));
  }

  #[test]
  fn rpmbuild_runs_in_worker_with_build_deps() {
    let mut spec = full_spec();
    spec.dependencies = Some(crate::spec::PackageDependencies {
      build: [("golang".to_string(), Default::default())].into(),
      ..Default::default()
    });
    let fragment = rpm(&spec, "", &MARINER2, &opts()).unwrap();
    let Op::Exec(exec) = fragment.op() else {
      panic!("expected exec");
    };
    assert!(exec.args[2].contains("-ba \"/build/top/SPECS/hello/hello.spec\""));
    let Op::Exec(install) = fragment.inputs()[0].op() else {
      panic!("expected build deps install");
    };
    assert_eq!(install.args[2], "tdnf install --releasever=2.0 -y golang");
  }

  #[test]
  fn targets_are_listed_with_descriptions() {
    let list = router(&MARINER2)
      .handle(request_for(spec()).with_subrequest(Subrequest::ListTargets))
      .unwrap()
      .into_targets("")
      .unwrap();
    assert_eq!(
      list.names(),
      vec![
        "container/depsonly",
        "rpm",
        "rpm/debug/buildroot",
        "rpm/debug/sources",
        "rpm/debug/spec",
      ]
    );
    assert!(list.targets[1].default);
  }

  #[test]
  fn spec_target_renders_for_target_key() {
    let response = router(&MARINER2)
      .handle(request_for(spec()).with_target("rpm/debug/spec").with_target_key("mariner2"))
      .unwrap();
    let result = response.into_build("rpm/debug/spec").unwrap();
    match &result.outputs[0].definition.root_op().unwrap().op {
      Op::Mkfile { contents, .. } => assert!(contents.starts_with("Name: hello\n")),
      other => panic!("unexpected op {other:?}"),
    }
  }
}
