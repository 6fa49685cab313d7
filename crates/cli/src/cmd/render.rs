//! Implementation of the `pkgraph render` command.
//!
//! Prints the package metadata the rpm or deb targets would generate, after
//! substituting build args for the first requested platform.

use std::path::Path;

use anyhow::{Context, Result};
use pkgraph_lib::package::{self, PackageFormat};
use pkgraph_lib::platform::{Platform, fill_platform_args};
use pkgraph_lib::spec::Spec;
use tracing::debug;

use super::{BuildArgs, read_spec};

pub fn cmd_render(path: &Path, format: PackageFormat, build: &BuildArgs) -> Result<()> {
  let bytes = read_spec(path)?;
  let spec = Spec::load(&bytes).with_context(|| format!("Failed to load spec: {}", path.display()))?;

  let host = Platform::current().context("Unsupported host platform")?;
  let platform = match build.platforms.first() {
    Some(platform) => platform
      .parse::<Platform>()
      .with_context(|| format!("Invalid platform: {platform}"))?,
    None => host.clone(),
  };
  debug!(%platform, %format, "rendering package metadata");

  let args = fill_platform_args(&spec.args, &build.arg_map(), &platform, &host);
  let spec = spec.substitute_args(&args).context("Failed to substitute build args")?;
  let text = package::render(&spec, build.target_key(), format)
    .with_context(|| format!("Failed to render {format} for {}", spec.name))?;
  print!("{text}");
  Ok(())
}
