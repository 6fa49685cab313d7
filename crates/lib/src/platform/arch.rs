use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// CPU architectures, named the way OCI platforms name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Arch {
  #[default]
  Amd64,
  Arm64,
  Arm,
  I386,
  Ppc64le,
  S390x,
  Riscv64,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::Amd64),
      "aarch64" => Some(Self::Arm64),
      "arm" => Some(Self::Arm),
      "x86" => Some(Self::I386),
      "powerpc64" => Some(Self::Ppc64le),
      "s390x" => Some(Self::S390x),
      "riscv64" => Some(Self::Riscv64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
      Self::Arm => "arm",
      Self::I386 => "386",
      Self::Ppc64le => "ppc64le",
      Self::S390x => "s390x",
      Self::Riscv64 => "riscv64",
    }
  }

  /// The variant implied when none is given; such variants are dropped on parse.
  pub(crate) fn default_variant(&self) -> Option<&'static str> {
    match self {
      Self::Arm64 => Some("v8"),
      Self::Arm => Some("v7"),
      _ => None,
    }
  }
}

impl FromStr for Arch {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "amd64" | "x86_64" | "x86-64" => Ok(Self::Amd64),
      "arm64" | "aarch64" => Ok(Self::Arm64),
      "arm" | "armhf" => Ok(Self::Arm),
      "386" | "i386" | "x86" => Ok(Self::I386),
      "ppc64le" => Ok(Self::Ppc64le),
      "s390x" => Ok(Self::S390x),
      "riscv64" => Ok(Self::Riscv64),
      _ => Err(Error::InvalidPlatform(s.to_string())),
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
