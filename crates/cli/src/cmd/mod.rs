mod describe;
mod graph;
mod render;
mod targets;
mod validate;

pub use describe::cmd_describe;
pub use graph::cmd_graph;
pub use render::cmd_render;
pub use targets::cmd_targets;
pub use validate::cmd_validate;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use pkgraph_lib::frontend::{BUILD_ARG_PREFIX, PLATFORM_OPT, TARGET_KEY_OPT, TARGET_OPT};
use pkgraph_lib::package::PackageFormat;

/// Options shared by every command that builds a request.
#[derive(Debug, Default, Args)]
pub struct BuildArgs {
  /// Spec `targets` entry whose overrides apply
  #[arg(long)]
  pub target_key: Option<String>,

  /// Build arg, repeatable
  #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
  pub args: Vec<(String, String)>,

  /// Target platform such as linux/arm64, repeatable
  #[arg(long = "platform")]
  pub platforms: Vec<String>,
}

impl BuildArgs {
  pub fn target_key(&self) -> &str {
    self.target_key.as_deref().unwrap_or_default()
  }

  pub fn arg_map(&self) -> BTreeMap<String, String> {
    self.args.iter().cloned().collect()
  }

  /// Frontend request options for `target`.
  pub fn opts(&self, target: &str) -> BTreeMap<String, String> {
    let mut opts = BTreeMap::new();
    if !target.is_empty() {
      opts.insert(TARGET_OPT.to_string(), target.to_string());
    }
    if let Some(key) = &self.target_key {
      opts.insert(TARGET_KEY_OPT.to_string(), key.clone());
    }
    for (key, value) in &self.args {
      opts.insert(format!("{BUILD_ARG_PREFIX}{key}"), value.clone());
    }
    if !self.platforms.is_empty() {
      opts.insert(PLATFORM_OPT.to_string(), self.platforms.join(","));
    }
    opts
  }
}

pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected KEY=VALUE, got {s:?}")),
  }
}

pub fn parse_format(s: &str) -> Result<PackageFormat, String> {
  s.parse().map_err(|_| format!("unknown format {s:?}, expected rpm or deb"))
}

pub fn read_spec(path: &Path) -> Result<Vec<u8>> {
  fs::read(path).with_context(|| format!("Failed to read spec file: {}", path.display()))
}
