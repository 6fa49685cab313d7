//! Error taxonomy for spec handling, source resolution, rendering and routing.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced anywhere in the crate.
///
/// Every failure aborts the request that produced it; there are no partial
/// graphs. Validation collects all violations into [`Error::InvalidSpec`],
/// everything else propagates immediately with enough context to identify the
/// failing source or route.
#[derive(Debug, Error)]
pub enum Error {
  /// The spec document is not well-formed YAML or does not match the schema.
  #[error("malformed spec: {0}")]
  MalformedSpec(#[source] serde_yaml::Error),

  /// Validation failed. Each violation is reported.
  #[error("invalid spec: {}", join_errors(.violations))]
  InvalidSpec { violations: Vec<Error> },

  /// A single field failed validation.
  #[error("{field}: {reason}")]
  Invalid { field: String, reason: String },

  /// A source does not have exactly one usable origin.
  #[error("invalid source {name:?}: {reason}")]
  InvalidSource { name: String, reason: String },

  /// A go module source was resolved without a source worker.
  #[error("source {name:?} requires a source worker but none was configured")]
  MissingWorker { name: String },

  /// A build source was resolved without a forwarder.
  #[error("source {name:?} requires a build forwarder but none was configured")]
  MissingForwarder { name: String },

  /// No route matched the requested target.
  #[error("no such handler for target {target:?}: available targets: {}", .available.join(", "))]
  HandlerNotFound { target: String, available: Vec<String> },

  /// A build arg was referenced with no default and no supplied value.
  #[error("undefined build arg {name:?} referenced in {field}")]
  UndefinedArg { name: String, field: String },

  #[error("unsupported subrequest {0:?}")]
  UnsupportedSubrequest(String),

  /// A handler answered with a different kind of response than requested.
  #[error("unexpected response from target {target:?}: expected {expected}")]
  UnexpectedResponse { target: String, expected: &'static str },

  /// A spec target tried to forward a route that must stay local.
  #[error("target {0:?} is always served locally and cannot be forwarded")]
  ForwardAlwaysTarget(String),

  #[error("invalid platform {0:?}")]
  InvalidPlatform(String),

  #[error("request cancelled")]
  Cancelled,

  #[error("cycle detected in build graph")]
  CycleDetected,

  /// Failure reported by the gateway collaborator.
  #[error("gateway: {0}")]
  Gateway(String),

  #[error("serialization failed: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("yaml serialization failed: {0}")]
  SerializeYaml(#[source] serde_yaml::Error),

  /// Wraps a failure with the name of the source being resolved.
  #[error("source {name:?}: {source}")]
  Source {
    name: String,
    #[source]
    source: Box<Error>,
  },

  /// Several sibling sources failed; each is reported.
  #[error("{} source(s) failed: {}", .0.len(), join_errors(.0))]
  Sources(Vec<Error>),
}

impl Error {
  pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Error::Invalid {
      field: field.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn invalid_source(name: impl Into<String>, reason: impl Into<String>) -> Self {
    Error::InvalidSource {
      name: name.into(),
      reason: reason.into(),
    }
  }

  /// Attach the name of the source that produced this error.
  ///
  /// Errors that already identify their source are returned unchanged.
  pub(crate) fn in_source(self, name: &str) -> Self {
    match self {
      Error::InvalidSource { .. }
      | Error::MissingWorker { .. }
      | Error::MissingForwarder { .. }
      | Error::Cancelled
      | Error::Source { .. } => self,
      other => Error::Source {
        name: name.to_string(),
        source: Box::new(other),
      },
    }
  }

  /// Strip [`Error::Source`] wrappers and return the innermost error.
  pub fn root_cause(&self) -> &Error {
    match self {
      Error::Source { source, .. } => source.root_cause(),
      other => other,
    }
  }
}

fn join_errors(errors: &[Error]) -> String {
  errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
