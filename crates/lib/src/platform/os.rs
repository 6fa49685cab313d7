use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Operating systems a build can target, named the way OCI platforms name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Os {
  #[default]
  Linux,
  Windows,
  Darwin,
  FreeBsd,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::Darwin),
      "windows" => Some(Self::Windows),
      "freebsd" => Some(Self::FreeBsd),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Windows => "windows",
      Self::Darwin => "darwin",
      Self::FreeBsd => "freebsd",
    }
  }
}

impl FromStr for Os {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "linux" => Ok(Self::Linux),
      "windows" => Ok(Self::Windows),
      "darwin" | "macos" => Ok(Self::Darwin),
      "freebsd" => Ok(Self::FreeBsd),
      _ => Err(Error::InvalidPlatform(s.to_string())),
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
