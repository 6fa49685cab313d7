//! Dockerfile build sources.

use crate::error::{Error, Result};
use crate::graph::Fragment;
use crate::spec::{Source, SourceBuild};

use super::SourceOpts;

pub(super) fn resolve(name: &str, build: &SourceBuild, opts: &SourceOpts) -> Result<Fragment> {
  if build.source.is_none() && build.dockerfile.is_none() {
    return Err(Error::invalid_source(
      name,
      "build source must set a context source, a dockerfile, or both",
    ));
  }

  let context = match &build.source {
    // An inline file as the context is the dockerfile itself.
    Some(src) if src.inline.as_ref().is_some_and(|i| i.file.is_some()) => {
      nested(name, build.dockerfile_path(), src, opts)?
    }
    Some(src) => nested(name, name, src, opts)?,
    None => Fragment::scratch(),
  };

  let dockerfile = match &build.dockerfile {
    Some(src) => nested(name, build.dockerfile_path(), src, opts)?,
    None => context.clone(),
  };

  let forwarder = opts
    .forwarder
    .as_ref()
    .ok_or_else(|| Error::MissingForwarder { name: name.to_string() })?;
  forwarder.forward(&context, &dockerfile, build)
}

fn nested(owner: &str, name: &str, source: &Source, opts: &SourceOpts) -> Result<Fragment> {
  if source.build.is_some() {
    return Err(Error::invalid_source(owner, "build sources cannot be recursive"));
  }
  let resolved = super::resolve(name, source, opts)?;
  if !resolved.extra.is_empty() {
    return Err(Error::invalid_source(
      owner,
      "build context sources cannot carry extra dependencies",
    ));
  }
  Ok(resolved.fragment)
}
