use std::sync::OnceLock;

use tracing::debug;

use crate::consts::DISABLE_DIFF_MERGE_ARG;
use crate::router::Request;

/// A capability probed once and then shared by every later request.
#[derive(Debug, Default)]
pub struct CapabilityCache {
  cell: OnceLock<bool>,
}

impl CapabilityCache {
  pub const fn new() -> Self {
    Self { cell: OnceLock::new() }
  }

  /// The cached answer, running `probe` if this is the first caller.
  /// Concurrent first callers block until one probe has finished.
  pub fn get_or_probe(&self, probe: impl FnOnce() -> bool) -> bool {
    *self.cell.get_or_init(probe)
  }

  pub fn get(&self) -> Option<bool> {
    self.cell.get().copied()
  }
}

static DIFF_MERGE: CapabilityCache = CapabilityCache::new();

/// Whether layouts may use merge nodes.
///
/// Decided by the first request in the process: false if it sets
/// `DISABLE_DIFF_MERGE=1`, otherwise whether the engine supports both merge
/// and diff.
pub fn supports_diff_merge(request: &Request) -> bool {
  DIFF_MERGE.get_or_probe(|| probe_diff_merge(request))
}

fn probe_diff_merge(request: &Request) -> bool {
  if request.args.get(DISABLE_DIFF_MERGE_ARG).map(String::as_str) == Some("1") {
    debug!("diff/merge disabled by build arg");
    return false;
  }
  let caps = request.gateway.capabilities();
  caps.merge_op && caps.diff_op
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::frontend::testutil::{NullGateway, spec};
  use crate::frontend::Capabilities;

  fn request(merge: bool, diff: bool) -> Request {
    let gateway = NullGateway {
      caps: Capabilities {
        merge_op: merge,
        diff_op: diff,
      },
      ..Default::default()
    };
    Request::new(Arc::new(spec()), Arc::new(gateway))
  }

  #[test]
  fn needs_both_merge_and_diff() {
    assert!(probe_diff_merge(&request(true, true)));
    assert!(!probe_diff_merge(&request(true, false)));
    assert!(!probe_diff_merge(&request(false, true)));
  }

  #[test]
  fn build_arg_disables_merge() {
    let req = request(true, true).with_args(BTreeMap::from([(
      DISABLE_DIFF_MERGE_ARG.to_string(),
      "1".to_string(),
    )]));
    assert!(!probe_diff_merge(&req));

    let req = request(true, true).with_args(BTreeMap::from([(
      DISABLE_DIFF_MERGE_ARG.to_string(),
      "0".to_string(),
    )]));
    assert!(probe_diff_merge(&req));
  }

  #[test]
  fn first_probe_wins() {
    let cache = CapabilityCache::new();
    let probes = AtomicUsize::new(0);

    std::thread::scope(|scope| {
      for idx in 0..8 {
        let (cache, probes) = (&cache, &probes);
        scope.spawn(move || {
          cache.get_or_probe(|| {
            probes.fetch_add(1, Ordering::SeqCst);
            idx % 2 == 0
          })
        });
      }
    });

    assert_eq!(probes.load(Ordering::SeqCst), 1);
    let first = cache.get().unwrap();
    assert_eq!(cache.get_or_probe(|| !first), first);
  }
}
