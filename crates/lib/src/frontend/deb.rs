//! deb targets for the apt-based distros.

use std::collections::BTreeSet;

use super::build::{for_each_platform, source_opts};
use super::distro::Distro;
use crate::consts::GOMODS_KEY;
use crate::error::Result;
use crate::graph::{Constraints, Exec, FileAttrs, Fragment, Mount, merge_at_path};
use crate::package::{self, PackageFormat};
use crate::router::{Request, Response, RouteMux, TargetInfo};
use crate::source::{self, SourceOpts};
use crate::spec::Spec;
use crate::util::{path, shell};

const WORKDIR: &str = "/work";
const OUTDIR: &str = "/out";

pub(super) fn router(distro: &'static Distro) -> RouteMux {
  let mut debug = RouteMux::new();
  debug.add(
    "buildroot",
    move |request: Request| handle_buildroot(distro, request),
    Some(TargetInfo::new(
      "buildroot",
      "Outputs a debian source tree suitable for passing to dpkg-buildpackage.",
    )),
  );
  debug.add(
    "control",
    handle_control,
    Some(TargetInfo::new("control", "Outputs the generated debian control file")),
  );
  debug.add(
    "sources",
    move |request: Request| handle_sources(distro, request),
    Some(TargetInfo::new("sources", "Outputs all the sources specified in the spec file.")),
  );

  let mut deb = RouteMux::new();
  deb.add(
    "",
    move |request: Request| handle_deb(distro, request),
    Some(TargetInfo::new("", "Builds a deb package.").as_default()),
  );
  deb.add("debug", debug, None);

  let mut mux = RouteMux::new();
  mux.add("deb", deb, None);
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

/// The `debian/` directory with every generated file.
pub(super) fn debian_dir(spec: &Spec, target_key: &str) -> Result<Fragment> {
  let files = package::debian_files(spec, target_key)?;
  let dirs: BTreeSet<String> = files
    .keys()
    .map(|name| path::dir(&path::join(&["/debian", name.as_str()])))
    .collect();

  let base = dirs.iter().fold(Fragment::scratch(), |acc, dir| acc.mkdir(dir, 0o755));
  let debian = files.into_iter().fold(base, |acc, (name, contents)| {
    let mode = if name == "rules" || name.ends_with(".sh") { 0o755 } else { 0o644 };
    acc.mkfile(path::join(&["/debian", name.as_str()]), contents, FileAttrs::mode(mode))
  });
  Ok(debian.with_constraints(&Constraints::group("Generate debian directory")))
}

/// Every source unpacked the way the build steps see it: directory sources
/// under their name, file sources at the root, the module cache under
/// `gomods`.
pub(super) fn source_tree(spec: &Spec, distro: &Distro, opts: &SourceOpts) -> Result<Fragment> {
  let resolved = source::resolve_all(spec, opts)?;
  if resolved.entries.is_empty() && resolved.gomods.is_none() {
    return Ok(Fragment::scratch());
  }

  let mut script = vec!["set -e".to_string()];
  for entry in &resolved.entries {
    if entry.is_dir {
      let dest = shell::quote(&format!("{OUTDIR}/{}", entry.name));
      script.push(format!("mkdir -p {dest}"));
      script.push(format!(
        "tar -C {dest} -xzf {}",
        shell::quote(&format!("/src/{}", entry.file_name))
      ));
    } else {
      script.push(format!("cp -a {} {OUTDIR}/", shell::quote(&format!("/src/{}", entry.name))));
    }
  }
  if resolved.gomods.is_some() {
    script.push(format!("cp -a /src/{GOMODS_KEY} {OUTDIR}/{GOMODS_KEY}"));
  }

  let layout = resolved.layout(opts.merge_supported);
  let worker = distro.worker(&Constraints::group("Unpack sources"));
  Ok(
    worker
      .run(
        Exec::shell(script.join("\n"))
          .mount(Mount::readonly("/src", &layout))
          .mount(Mount::scratch(OUTDIR)),
      )
      .output(OUTDIR),
  )
}

pub(super) fn buildroot(spec: &Spec, target_key: &str, distro: &Distro, opts: &SourceOpts) -> Result<Fragment> {
  let tree = source_tree(spec, distro, opts)?;
  let debian = debian_dir(spec, target_key)?;
  Ok(merge_at_path(&tree, &[debian], "/", opts.merge_supported))
}

/// dpkg-buildpackage in the distro worker. The result holds the `.deb` files.
pub(super) fn deb(spec: &Spec, target_key: &str, distro: &Distro, opts: &SourceOpts) -> Result<Fragment> {
  let root = buildroot(spec, target_key, distro, opts)?;
  let group = Constraints::group(format!("Build deb: {}", spec.name));

  let mut deps = spec.build_deps(target_key);
  deps.push("debhelper".to_string());
  deps.sort();
  deps.dedup();
  let worker = distro.install(&distro.worker(&group), &deps, &Constraints::group("Install build deps"));

  let srcdir = format!("{WORKDIR}/{}", spec.name);
  let mut exec = Exec::shell(format!("dpkg-buildpackage -b -uc -us && cp ../*.deb {OUTDIR}/"))
    .cwd(&srcdir)
    .mount(Mount::scratch(WORKDIR))
    .mount(Mount::new(&srcdir, &root))
    .mount(Mount::scratch(OUTDIR));
  if spec.requires_go() {
    exec = exec.env("GOMODCACHE", format!("{srcdir}/{GOMODS_KEY}"));
  }
  Ok(worker.run(exec).output(OUTDIR).with_constraints(&group))
}

fn handle_deb(distro: &'static Distro, request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| {
    let opts = source_opts(&request, spec, distro);
    deb(spec, &request.target_key, distro, &opts)
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
    Ok(source::resolve_all(spec, &opts)?.layout(opts.merge_supported))
  })
}

fn handle_control(request: Request) -> Result<Response> {
  for_each_platform(&request, |spec, _| {
    let control = package::render(spec, &request.target_key, PackageFormat::DebControl)?;
    Ok(
      Fragment::scratch()
        .mkfile("control", control, FileAttrs::mode(0o644))
        .with_constraints(&Constraints::group("Generate debian control file")),
    )
  })
}
