//! Install commands and file listings for every artifact class.
//!
//! Both package formats install the same artifacts; they differ only in the
//! roots each class lands under and how the listing is written out.

use std::collections::BTreeSet;

use crate::spec::{ArtifactConfig, Artifacts};
use crate::util::path;

/// Canonical install root of every artifact class.
pub(crate) struct Roots {
  /// Staging prefix prepended to every install destination.
  pub destdir: &'static str,
  pub bin: &'static str,
  pub man: &'static str,
  pub lib: &'static str,
  pub libexec: &'static str,
  pub include: &'static str,
  pub doc: &'static str,
  pub license: &'static str,
  pub config: &'static str,
  pub data: &'static str,
  pub state: &'static str,
  pub unit: &'static str,
}

pub(crate) const RPM_ROOTS: Roots = Roots {
  destdir: "%{buildroot}",
  bin: "%{_bindir}",
  man: "%{_mandir}",
  lib: "%{_libdir}",
  libexec: "%{_libexecdir}",
  include: "%{_includedir}",
  doc: "%{_docdir}",
  license: "%{_licensedir}",
  config: "%{_sysconfdir}",
  data: "%{_datadir}",
  state: "%{_sharedstatedir}",
  unit: "%{_unitdir}",
};

pub(crate) const DEB_ROOTS: Roots = Roots {
  destdir: "${DESTDIR}",
  bin: "/usr/bin",
  man: "/usr/share/man",
  lib: "/usr/lib",
  libexec: "/usr/libexec",
  include: "/usr/include",
  doc: "/usr/share/doc",
  license: "/usr/share/doc",
  config: "/etc",
  data: "/usr/share",
  state: "/var/lib",
  unit: "/lib/systemd/system",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileKind {
  Plain,
  Config,
  Doc,
  License,
  Dir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileEntry {
  pub kind: FileKind,
  pub path: String,
}

#[derive(Debug, Default)]
pub(crate) struct InstallPlan {
  pub commands: Vec<String>,
  pub files: Vec<FileEntry>,
}

impl InstallPlan {
  /// Plan the installation of `artifacts` for package `name`.
  pub fn new(name: &str, artifacts: &Artifacts, roots: &Roots) -> Self {
    let mut plan = Self::default();

    if let Some(dirs) = &artifacts.directories {
      for (root, entries) in [(roots.config, &dirs.config), (roots.state, &dirs.state)] {
        for (dir, cfg) in entries {
          let target = path::join(&[root, dir.as_str()]);
          plan.commands.push(format!(
            "mkdir -p -m {:04o} \"{}\"",
            cfg.mode(),
            path::join(&[roots.destdir, target.as_str()])
          ));
          plan.push(FileKind::Dir, target);
        }
      }
    }

    plan.copy_all(roots, roots.bin, &artifacts.binaries, FileKind::Plain);
    plan.copy_all(roots, roots.man, &artifacts.manpages, FileKind::Plain);
    plan.copy_all(roots, roots.data, &artifacts.data_dirs, FileKind::Plain);
    plan.copy_all(roots, roots.libexec, &artifacts.libexec, FileKind::Plain);
    plan.copy_all(roots, roots.config, &artifacts.config_files, FileKind::Config);

    for (src, unit) in artifacts.units() {
      plan.copy(roots, roots.unit, src, &unit.artifact(), FileKind::Plain);
    }
    let dropin_dirs: BTreeSet<String> = artifacts
      .dropins()
      .map(|(_, dropin)| path::join(&[roots.unit, dropin.artifact().subpath.as_str()]))
      .collect();
    for dir in dropin_dirs {
      plan.push(FileKind::Dir, dir);
    }
    for (src, dropin) in artifacts.dropins() {
      plan.copy(roots, roots.unit, src, &dropin.artifact(), FileKind::Plain);
    }

    let doc_root = path::join(&[roots.doc, name]);
    let license_root = path::join(&[roots.license, name]);
    plan.copy_all(roots, &doc_root, &artifacts.docs, FileKind::Doc);
    plan.copy_all(roots, &license_root, &artifacts.licenses, FileKind::License);
    plan.copy_all(roots, roots.lib, &artifacts.libs, FileKind::Plain);
    plan.copy_all(roots, roots.include, &artifacts.headers, FileKind::Plain);

    for link in &artifacts.links {
      plan.commands.push(format!(
        "mkdir -p \"{}\"",
        path::join(&[roots.destdir, path::dir(&link.dest).as_str()])
      ));
      plan.commands.push(format!(
        "ln -sf \"{}\" \"{}\"",
        link.source,
        path::join(&[roots.destdir, link.dest.as_str()])
      ));
      plan.push(FileKind::Plain, link.dest.clone());
    }

    plan
  }

  fn push(&mut self, kind: FileKind, path: String) {
    self.files.push(FileEntry { kind, path });
  }

  fn copy_all<'a>(
    &mut self,
    roots: &Roots,
    root: &str,
    entries: impl IntoIterator<Item = (&'a String, &'a ArtifactConfig)>,
    kind: FileKind,
  ) {
    for (src, cfg) in entries {
      self.copy(roots, root, src, cfg, kind);
    }
  }

  fn copy(&mut self, roots: &Roots, root: &str, src: &str, cfg: &ArtifactConfig, kind: FileKind) {
    let dir = path::join(&[root, cfg.subpath.as_str()]);
    let name = cfg.resolve_name(src);
    let staged_dir = path::join(&[roots.destdir, dir.as_str()]);

    // Globs must reach the shell unquoted to expand.
    let src_arg = if src.contains('*') { src.to_string() } else { format!("\"{src}\"") };
    let dest = if cfg.is_glob(src) {
      format!("\"{staged_dir}/\"")
    } else {
      format!("\"{}\"", path::join(&[staged_dir.as_str(), name.as_str()]))
    };

    self.commands.push(format!("mkdir -p \"{staged_dir}\""));
    self.commands.push(format!("cp -r {src_arg} {dest}"));
    self.push(kind, path::join(&[dir.as_str(), name.as_str()]));
  }
}
