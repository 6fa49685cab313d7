pub mod arch;
pub mod os;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
pub use arch::Arch;
pub use os::Os;

/// Build args injected for the platform a build targets.
pub const TARGET_ARGS_PREFIX: &str = "TARGET";
/// Build args injected for the platform a build runs on.
pub const BUILD_ARGS_PREFIX: &str = "BUILD";

/// An OCI-style platform: `os/arch[/variant]`, e.g. `linux/arm/v7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
  pub variant: Option<String>,
}

impl Platform {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch, variant: None }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self::new(Os::current()?, Arch::current()?))
  }

  /// Platform-identifying build args under `prefix` (`TARGET` or `BUILD`):
  /// `{prefix}OS`, `{prefix}ARCH`, `{prefix}VARIANT` and `{prefix}PLATFORM`.
  pub fn build_args(&self, prefix: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
      (format!("{prefix}OS"), self.os.to_string()),
      (format!("{prefix}ARCH"), self.arch.to_string()),
      (format!("{prefix}VARIANT"), self.variant.clone().unwrap_or_default()),
      (format!("{prefix}PLATFORM"), self.to_string()),
    ])
  }
}

/// The args a build for `target` running on `build` substitutes with.
///
/// Supplied values are kept only for args the spec declares; the platform
/// args are always present and win over anything supplied.
pub fn fill_platform_args(
  declared: &BTreeMap<String, Option<String>>,
  supplied: &BTreeMap<String, String>,
  target: &Platform,
  build: &Platform,
) -> BTreeMap<String, String> {
  let mut args: BTreeMap<String, String> = supplied
    .iter()
    .filter(|(key, _)| declared.contains_key(*key))
    .map(|(k, v)| (k.clone(), v.clone()))
    .collect();
  args.extend(target.build_args(TARGET_ARGS_PREFIX));
  args.extend(build.build_args(BUILD_ARGS_PREFIX));
  args
}

impl FromStr for Platform {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut parts = s.split('/');
    let (os, arch) = match (parts.next(), parts.next()) {
      (Some(os), Some(arch)) => (os.parse::<Os>()?, arch.parse::<Arch>()?),
      _ => return Err(Error::InvalidPlatform(s.to_string())),
    };
    let variant = parts.next().filter(|v| !v.is_empty()).map(str::to_string);
    if parts.next().is_some() {
      return Err(Error::InvalidPlatform(s.to_string()));
    }

    let variant = match variant {
      Some(v) if Some(v.as_str()) == arch.default_variant() => None,
      other => other,
    };
    Ok(Self { os, arch, variant })
  }
}

impl TryFrom<String> for Platform {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Platform> for String {
  fn from(value: Platform) -> Self {
    value.to_string()
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.variant {
      Some(variant) => write!(f, "{}/{}/{}", self.os, self.arch, variant),
      None => write!(f, "{}/{}", self.os, self.arch),
    }
  }
}
