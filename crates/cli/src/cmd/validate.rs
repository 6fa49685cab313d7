//! Implementation of the `pkgraph validate` command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use pkgraph_lib::Error;
use pkgraph_lib::spec::Spec;

use super::read_spec;
use crate::output::{print_error, print_json, print_success};

pub fn cmd_validate(path: &Path, json: bool) -> Result<()> {
  let bytes = read_spec(path)?;
  let spec = Spec::parse(&bytes).with_context(|| format!("Failed to parse spec: {}", path.display()))?;

  let violations = match spec.validate() {
    Ok(()) => Vec::new(),
    Err(Error::InvalidSpec { violations }) => violations.iter().map(ToString::to_string).collect(),
    Err(err) => return Err(err).context("Failed to validate spec"),
  };

  if json {
    print_json(&serde_json::json!({
      "name": spec.name,
      "version": spec.version,
      "valid": violations.is_empty(),
      "violations": violations,
    }))?;
  } else if violations.is_empty() {
    print_success(&format!("{} {} is valid", spec.name, spec.version));
  } else {
    for violation in &violations {
      print_error(violation);
    }
  }

  if !violations.is_empty() {
    bail!("{} has {} violation(s)", path.display(), violations.len());
  }
  Ok(())
}
