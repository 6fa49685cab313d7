//! Post-resolution filtering shared by every source kind.

use crate::graph::{CopySpec, Fragment};
use crate::spec::Source;

/// Keep only `path` (contents, not the directory itself) and the entries
/// matching `includes`/`excludes`. Unfiltered sources pass through.
pub(super) fn apply(fragment: Fragment, source: &Source) -> Fragment {
  if !source.has_filters() {
    return fragment;
  }
  let src = if source.path.is_empty() { "/" } else { source.path.as_str() };
  Fragment::scratch().copy_from(
    &fragment,
    CopySpec::new(src, "/")
      .contents_only()
      .filtered(&source.includes, &source.excludes),
  )
}

/// Like [`apply`] for content whose includes/excludes were already applied
/// at the origin.
pub(super) fn apply_path(fragment: Fragment, source: &Source) -> Fragment {
  if source.path.is_empty() {
    return fragment;
  }
  Fragment::scratch().copy_from(&fragment, CopySpec::new(source.path.as_str(), "/").contents_only())
}
