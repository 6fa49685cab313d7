//! Reading and writing spec documents.

use tracing::debug;

use super::types::Spec;
use crate::error::{Error, Result};

impl Spec {
  /// Parse a YAML spec document.
  ///
  /// # Errors
  ///
  /// Returns [`Error::MalformedSpec`] on YAML syntax errors, unknown fields,
  /// duplicate keys and type mismatches.
  pub fn parse(bytes: &[u8]) -> Result<Spec> {
    let spec: Spec = serde_yaml::from_slice(bytes).map_err(Error::MalformedSpec)?;
    debug!(name = %spec.name, sources = spec.sources.len(), "parsed spec");
    Ok(spec)
  }

  /// Parse then validate.
  pub fn load(bytes: &[u8]) -> Result<Spec> {
    let spec = Self::parse(bytes)?;
    spec.validate()?;
    Ok(spec)
  }

  pub fn to_yaml(&self) -> Result<String> {
    serde_yaml::to_string(self).map_err(Error::SerializeYaml)
  }
}
