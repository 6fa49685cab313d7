//! Source resolution.
//!
//! [`resolve`] turns one named [`Source`] into a graph fragment, dispatching on
//! its [`Origin`]. Nothing is fetched here: git, http and image content are
//! described for the execution engine, dockerfile builds are handed to an
//! injected [`Forwarder`], and go module downloads run in an injected
//! [`SourceWorker`] environment.
//!
//! [`resolve_all`] resolves every source of a spec in name order and lays each
//! one out as a single file: file sources keep their name, directory sources
//! become `<name>.tar.gz`.

mod archive;
mod build;
mod filter;
mod gomod;
mod image;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::consts::{ARCHIVE_SUFFIX, GOMODS_KEY};
use crate::error::{Error, Result};
use crate::graph::{Constraints, FileAttrs, Fragment, merge_at_path};
use crate::spec::{Origin, Source, SourceBuild, SourceInline, Spec};
use crate::util::path;

pub use archive::tar;

/// Hands a dockerfile build to an external frontend.
pub trait Forwarder: Send + Sync {
  /// Describe the result of building `dockerfile` with `context`.
  fn forward(&self, context: &Fragment, dockerfile: &Fragment, build: &SourceBuild) -> Result<Fragment>;
}

/// Supplies the base environment for commands that process sources.
pub trait SourceWorker: Send + Sync {
  fn worker(&self, constraints: &Constraints) -> Result<Fragment>;
}

/// Collaborators and request state threaded through every resolver call.
#[derive(Clone, Default)]
pub struct SourceOpts {
  pub forwarder: Option<Arc<dyn Forwarder>>,
  pub worker: Option<Arc<dyn SourceWorker>>,
  pub cancel: CancellationToken,
  /// Whether the engine supports merge nodes.
  pub merge_supported: bool,
}

impl fmt::Debug for SourceOpts {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SourceOpts")
      .field("forwarder", &self.forwarder.is_some())
      .field("worker", &self.worker.is_some())
      .field("cancelled", &self.cancel.is_cancelled())
      .field("merge_supported", &self.merge_supported)
      .finish()
  }
}

impl SourceOpts {
  pub fn check_cancelled(&self) -> Result<()> {
    if self.cancel.is_cancelled() {
      Err(Error::Cancelled)
    } else {
      Ok(())
    }
  }

  fn worker_for(&self, name: &str, constraints: &Constraints) -> Result<Fragment> {
    let worker = self.worker.as_ref().ok_or_else(|| Error::MissingWorker { name: name.to_string() })?;
    worker.worker(constraints)
  }
}

/// A resolved source and any extra fragments it depends on.
#[derive(Debug, Clone)]
pub struct Resolved {
  pub fragment: Fragment,
  /// Extra content keyed by a reserved name (the go module cache is
  /// returned under [`GOMODS_KEY`]).
  pub extra: BTreeMap<String, Fragment>,
}

impl Resolved {
  fn plain(fragment: Fragment) -> Self {
    Self {
      fragment,
      extra: BTreeMap::new(),
    }
  }
}

/// Resolve one named source.
///
/// Filters (`path`, `includes`, `excludes`) are applied after the origin is
/// resolved, whatever its kind.
///
/// # Errors
///
/// - [`Error::InvalidSource`] when the source has no origin or several
/// - [`Error::MissingWorker`] for a go module source without a worker
/// - [`Error::MissingForwarder`] for a build source without a forwarder
/// - [`Error::Cancelled`] once the request is cancelled
pub fn resolve(name: &str, source: &Source, opts: &SourceOpts) -> Result<Resolved> {
  opts.check_cancelled()?;
  let origin = source.origin().map_err(|reason| Error::invalid_source(name, reason))?;
  debug!(source = name, kind = origin.kind(), "resolving source");

  let resolved = match origin {
    Origin::DockerImage(img) => Resolved::plain(filter::apply(image::resolve(name, img, opts)?, source)),
    Origin::Git(git) => Resolved::plain(filter::apply(
      Fragment::git(&git.url, &git.commit, git.keep_git_dir),
      source,
    )),
    Origin::Http(http) => Resolved::plain(Fragment::http(&http.url, name, http.digest.clone(), http.permissions)),
    Origin::Context(ctx) => {
      // includes/excludes are pushed down into the local transfer
      let local = Fragment::local(ctx.name(), &source.includes, &source.excludes);
      Resolved::plain(filter::apply_path(local, source))
    }
    Origin::Build(build) => Resolved::plain(filter::apply(build::resolve(name, build, opts)?, source)),
    Origin::GoModule(gomod) => gomod::resolve(name, gomod, source, opts)?,
    Origin::Inline(inline) => Resolved::plain(inline_fragment(name, inline)?),
  };

  Ok(Resolved {
    fragment: resolved
      .fragment
      .with_constraints(&Constraints::group(format!("Add source: {name}"))),
    extra: resolved.extra,
  })
}

fn inline_fragment(name: &str, inline: &SourceInline) -> Result<Fragment> {
  match (&inline.file, &inline.dir) {
    (Some(file), None) => {
      let attrs = FileAttrs {
        mode: file.permissions(),
        uid: file.uid,
        gid: file.gid,
      };
      let parent = path::dir(name);
      let base = if parent == "." {
        Fragment::scratch()
      } else {
        Fragment::scratch().mkdir(parent, 0o755)
      };
      Ok(base.mkfile(name, &file.contents, attrs))
    }
    (None, Some(dir)) => Ok(dir.files.iter().fold(Fragment::scratch(), |acc, (file_name, file)| {
      let attrs = FileAttrs {
        mode: file.permissions(),
        uid: file.uid,
        gid: file.gid,
      };
      acc.mkfile(file_name, &file.contents, attrs)
    })),
    _ => Err(Error::invalid_source(name, "inline source must set exactly one of file or dir")),
  }
}

/// One source laid out as a single file.
#[derive(Debug, Clone)]
pub struct SourceEntry {
  pub name: String,
  /// File name in the layout: the source name, or `<name>.tar.gz` for dirs.
  pub file_name: String,
  pub is_dir: bool,
  pub fragment: Fragment,
}

/// Every source of a spec, in name order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSources {
  pub entries: Vec<SourceEntry>,
  /// Merged go module cache of all go module sources, if any.
  pub gomods: Option<Fragment>,
}

impl ResolvedSources {
  pub fn fragments(&self) -> Vec<Fragment> {
    self.entries.iter().map(|e| e.fragment.clone()).collect()
  }

  /// All entries at the root with the module cache as a plain directory under
  /// [`GOMODS_KEY`].
  pub fn layout(&self, merge_supported: bool) -> Fragment {
    let root = merge_at_path(&Fragment::scratch(), &self.fragments(), "/", merge_supported);
    match &self.gomods {
      Some(gomods) => merge_at_path(&root, std::slice::from_ref(gomods), &format!("/{GOMODS_KEY}"), merge_supported),
      None => root,
    }
  }
}

/// Layout name for a source.
pub fn file_name(name: &str, source: &Source) -> String {
  if source.is_dir() {
    format!("{name}{ARCHIVE_SUFFIX}")
  } else {
    name.to_string()
  }
}

/// Resolve every source of `spec` in lexicographic name order.
///
/// A failing source does not stop its siblings from resolving; all failures
/// are reported together once every source has been tried.
pub fn resolve_all(spec: &Spec, opts: &SourceOpts) -> Result<ResolvedSources> {
  let mut out = ResolvedSources::default();
  let mut gomods = Vec::new();
  let mut errors = Vec::new();

  for (name, source) in &spec.sources {
    match resolve_entry(name, source, opts) {
      Ok((entry, extra)) => {
        out.entries.push(entry);
        for (key, fragment) in extra {
          if key == GOMODS_KEY {
            gomods.push(fragment);
          } else {
            errors.push(Error::invalid_source(name, format!("unexpected extra dependency {key:?}")));
          }
        }
      }
      Err(Error::Cancelled) => return Err(Error::Cancelled),
      Err(err) => {
        warn!(source = %name, error = %err, "source failed to resolve");
        errors.push(err.in_source(name));
      }
    }
  }

  match errors.len() {
    0 => {}
    1 => return Err(errors.remove(0)),
    _ => return Err(Error::Sources(errors)),
  }

  if !gomods.is_empty() {
    out.gomods = Some(merge_at_path(&Fragment::scratch(), &gomods, "/", opts.merge_supported));
  }
  Ok(out)
}

fn resolve_entry(name: &str, source: &Source, opts: &SourceOpts) -> Result<(SourceEntry, BTreeMap<String, Fragment>)> {
  let resolved = resolve(name, source, opts)?;
  let is_dir = source.is_dir();
  let file_name = file_name(name, source);

  let fragment = if is_dir {
    let worker = opts.worker_for(name, &Constraints::group(format!("Archive source: {name}")))?;
    archive::tar(&worker, &resolved.fragment, &file_name)
  } else {
    resolved.fragment
  };

  let entry = SourceEntry {
    name: name.to_string(),
    file_name,
    is_dir,
    fragment,
  };
  Ok((entry, resolved.extra))
}
