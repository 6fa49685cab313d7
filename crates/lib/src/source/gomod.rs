//! Go module dependency sources.

use std::collections::BTreeMap;

use crate::consts::{GOMODCACHE, GOMODS_KEY};
use crate::error::{Error, Result};
use crate::graph::{Constraints, Exec, Mount};
use crate::spec::{Source, SourceGoModule};

use super::{Resolved, SourceOpts, filter};

/// Resolve the module source itself and describe downloading its module
/// graph in the source worker. The populated cache is returned as an extra
/// dependency under [`GOMODS_KEY`].
pub(super) fn resolve(name: &str, gomod: &SourceGoModule, source: &Source, opts: &SourceOpts) -> Result<Resolved> {
  let worker = opts.worker_for(name, &Constraints::group(format!("Fetch go modules: {name}")))?;

  let module = super::resolve(name, &gomod.from, opts)?;
  if !module.extra.is_empty() {
    return Err(Error::invalid_source(
      name,
      "go module sources whose module has extra dependencies are not supported",
    ));
  }
  let module = filter::apply(module.fragment, source);

  let deps = worker
    .run(
      Exec::shell("go mod download -x")
        .env("GOMODCACHE", GOMODCACHE)
        .cwd("/src")
        .mount(Mount::readonly("/src", &module))
        .mount(Mount::scratch(GOMODCACHE)),
    )
    .output(GOMODCACHE);

  Ok(Resolved {
    fragment: module,
    extra: BTreeMap::from([(GOMODS_KEY.to_string(), deps)]),
  })
}
