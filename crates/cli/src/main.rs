use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod gateway;
mod output;

use cmd::{
  BuildArgs, cmd_describe, cmd_graph, cmd_render, cmd_targets, cmd_validate, parse_format,
};
use pkgraph_lib::package::PackageFormat;

/// pkgraph - compile package specs into build graphs
#[derive(Parser)]
#[command(name = "pkgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output as JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Parse and validate a spec file
  Validate {
    /// Path to the spec file
    spec: PathBuf,
  },

  /// Print the rpm spec or debian control file generated for a spec
  Render {
    /// Path to the spec file
    spec: PathBuf,

    /// Output format: rpm or deb
    #[arg(short, long, default_value = "rpm", value_parser = parse_format)]
    format: PackageFormat,

    #[command(flatten)]
    build: BuildArgs,
  },

  /// List every target the spec can be built for
  Targets {
    /// Path to the spec file
    spec: PathBuf,

    /// Only list targets under this path
    #[arg(default_value = "")]
    target: String,

    #[command(flatten)]
    build: BuildArgs,
  },

  /// List the supported subrequests
  Describe,

  /// Print the build graph for a target
  Graph {
    /// Path to the spec file
    spec: PathBuf,

    /// Target path, e.g. mariner2/rpm
    #[arg(default_value = "")]
    target: String,

    #[command(flatten)]
    build: BuildArgs,
  },
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cli.command {
    Commands::Validate { spec } => cmd_validate(&spec, cli.json),
    Commands::Render { spec, format, build } => cmd_render(&spec, format, &build),
    Commands::Targets { spec, target, build } => cmd_targets(&spec, &target, &build, cli.json),
    Commands::Describe => cmd_describe(cli.json),
    Commands::Graph { spec, target, build } => cmd_graph(&spec, &target, &build, cli.json),
  }
}
