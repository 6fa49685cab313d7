//! Archiving directory sources.

use crate::graph::{Exec, Fragment, Mount};
use crate::util::shell;

/// Describe packing `content` into a gzipped tarball named `file_name`.
///
/// The returned fragment holds only the archive, at its root.
pub fn tar(worker: &Fragment, content: &Fragment, file_name: &str) -> Fragment {
  let script = format!("tar -C /src -czf /out/{} .", shell::quote(file_name));
  worker
    .run(
      Exec::shell(script)
        .mount(Mount::readonly("/src", content))
        .mount(Mount::scratch("/out")),
    )
    .output("/out")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::{Op, Output};

  #[test]
  fn archive_is_the_output_mount() {
    let out = tar(&Fragment::image("worker"), &Fragment::scratch(), "src.tar.gz");
    assert_eq!(out.output(), &Output::Mount("/out".into()));
    let Op::Exec(exec) = out.op() else {
      panic!("expected exec");
    };
    assert_eq!(exec.args[2], "tar -C /src -czf /out/src.tar.gz .");
  }
}
