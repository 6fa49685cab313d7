//! Built-in distro definitions.
//!
//! Each distro is a static table: the worker image, how its package manager
//! is driven, and which cache the package manager writes to. The per-format
//! routers in `rpm` and `deb` build on these.

use std::sync::Arc;

use super::{deb, rpm};
use crate::error::Result;
use crate::graph::{Constraints, Exec, Fragment, Mount};
use crate::package::PackageFormat;
use crate::router::RouteMux;
use crate::source::SourceWorker;
use crate::util::shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
  Tdnf { release: &'static str },
  Apt,
}

impl PackageManager {
  fn words(packages: &[String]) -> String {
    packages.iter().map(|p| shell::quote(p)).collect::<Vec<_>>().join(" ")
  }

  /// Install `packages` from the configured repositories.
  pub fn install(&self, packages: &[String]) -> String {
    let packages = Self::words(packages);
    match self {
      Self::Tdnf { release } => format!("tdnf install --releasever={release} -y {packages}"),
      Self::Apt => format!(
        "apt-get update && DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends {packages}"
      ),
    }
  }

  /// Download `packages` and everything they depend on into `dir` without
  /// installing them.
  pub fn download(&self, packages: &[String], dir: &str) -> String {
    let packages = Self::words(packages);
    match self {
      Self::Tdnf { release } => format!(
        "set -ex; dir=\"{dir}/RPMS/$(uname -m)\"; mkdir -p \"${{dir}}\"; tdnf install -y --releasever={release} --downloadonly --alldeps --downloaddir \"${{dir}}\" {packages}"
      ),
      Self::Apt => format!(
        "set -ex; mkdir -p \"{dir}\"; apt-get update; apt-get install -y --download-only --no-install-recommends -o Dir::Cache::archives=\"{dir}\" {packages}"
      ),
    }
  }

  /// Install every package file under `dir`.
  pub fn install_local(&self, dir: &str) -> String {
    match self {
      Self::Tdnf { release } => format!("tdnf install -y --releasever={release} {dir}/RPMS/*/*.rpm"),
      Self::Apt => format!("DEBIAN_FRONTEND=noninteractive apt-get install -y {dir}/*.deb"),
    }
  }
}

#[derive(Debug)]
pub struct Distro {
  /// Route key, also the default spec target key.
  pub key: &'static str,
  pub image: &'static str,
  pub manager: PackageManager,
  pub format: PackageFormat,
  /// Installed into the image to make it a build worker.
  pub worker_packages: &'static [&'static str],
  /// Added to the source worker when a spec has go module sources.
  pub go_packages: &'static [&'static str],
  pub cache_dir: &'static str,
  pub cache_id: &'static str,
}

pub static MARINER2: Distro = Distro {
  key: "mariner2",
  image: "mcr.microsoft.com/cbl-mariner/base/core:2.0",
  manager: PackageManager::Tdnf { release: "2.0" },
  format: PackageFormat::RpmSpec,
  worker_packages: &["rpm-build", "mariner-rpm-macros", "build-essential", "ca-certificates"],
  go_packages: &["git", "msft-golang"],
  cache_dir: "/var/cache/tdnf",
  cache_id: "mariner2-tdnf-cache",
};

pub static JAMMY: Distro = Distro {
  key: "jammy",
  image: "mcr.microsoft.com/mirror/docker/library/ubuntu:jammy",
  manager: PackageManager::Apt,
  format: PackageFormat::DebControl,
  worker_packages: &[
    "aptitude",
    "build-essential",
    "ca-certificates",
    "debhelper",
    "devscripts",
    "dh-apparmor",
    "dh-exec",
    "dh-make",
    "dpkg-dev",
    "equivs",
    "fakeroot",
  ],
  go_packages: &["git", "golang-go"],
  cache_dir: "/var/cache/apt",
  cache_id: "jammy-apt-cache",
};

impl Distro {
  fn cache(&self) -> Mount {
    Mount::cache(self.cache_dir, self.cache_id)
  }

  /// The base image with the build tooling installed.
  pub fn worker(&self, constraints: &Constraints) -> Fragment {
    let packages: Vec<String> = self.worker_packages.iter().map(|p| p.to_string()).collect();
    Fragment::image(self.image)
      .with_constraints(constraints)
      .run(Exec::shell(self.manager.install(&packages)).mount(self.cache()))
      .root()
      .with_constraints(&Constraints::group("Prepare worker image"))
  }

  /// `base` with `packages` installed. No packages leaves `base` untouched.
  pub fn install(&self, base: &Fragment, packages: &[String], constraints: &Constraints) -> Fragment {
    if packages.is_empty() {
      return base.clone();
    }
    base
      .run(Exec::shell(self.manager.install(packages)).mount(self.cache()))
      .root()
      .with_constraints(constraints)
  }

  /// A container image with only the runtime dependencies of the package.
  pub fn depsonly(&self, runtime: &[String]) -> Fragment {
    let group = Constraints::group(format!("Build {} deps-only container", self.key));
    let base = Fragment::image(self.image).with_constraints(&group);
    if runtime.is_empty() {
      return base;
    }

    const DOWNLOAD_DIR: &str = "/tmp/pkgs";
    let downloaded = self
      .worker(&group)
      .run(
        Exec::shell(self.manager.download(runtime, DOWNLOAD_DIR))
          .mount(self.cache())
          .mount(Mount::scratch(DOWNLOAD_DIR)),
      )
      .output(DOWNLOAD_DIR);

    base
      .run(Exec::shell(self.manager.install_local(DOWNLOAD_DIR)).mount(Mount::readonly(DOWNLOAD_DIR, &downloaded)))
      .root()
      .with_constraints(&group)
  }

  /// The router serving this distro's targets.
  pub fn router(&'static self) -> RouteMux {
    match self.format {
      PackageFormat::RpmSpec => rpm::router(self),
      PackageFormat::DebControl => deb::router(self),
    }
  }
}

/// Source worker backed by a distro image, with go installed when the spec
/// fetches go modules.
pub struct DistroWorker {
  distro: &'static Distro,
  requires_go: bool,
}

impl DistroWorker {
  pub fn new(distro: &'static Distro, requires_go: bool) -> Self {
    Self { distro, requires_go }
  }

  pub fn shared(distro: &'static Distro, requires_go: bool) -> Arc<dyn SourceWorker> {
    Arc::new(Self::new(distro, requires_go))
  }
}

impl SourceWorker for DistroWorker {
  fn worker(&self, constraints: &Constraints) -> Result<Fragment> {
    let worker = self.distro.worker(constraints);
    if !self.requires_go {
      return Ok(worker);
    }
    let go: Vec<String> = self.distro.go_packages.iter().map(|p| p.to_string()).collect();
    Ok(self.distro.install(&worker, &go, &Constraints::group("Add golang to worker image")))
  }
}
