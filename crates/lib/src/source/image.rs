//! Image sources, optionally modified by commands.

use crate::error::{Error, Result};
use crate::graph::{Exec, Fragment, Mount};
use crate::spec::SourceDockerImage;

use super::SourceOpts;

pub(super) fn resolve(name: &str, image: &SourceDockerImage, opts: &SourceOpts) -> Result<Fragment> {
  let base = Fragment::image(&image.reference);
  let Some(cmd) = &image.cmd else {
    return Ok(base);
  };

  let mut mounts = Vec::with_capacity(cmd.mounts.len());
  for mount in &cmd.mounts {
    let resolved = super::resolve(name, &mount.spec, opts)?;
    if !resolved.extra.is_empty() {
      return Err(Error::invalid_source(
        name,
        format!("source mounted at {} cannot carry extra dependencies", mount.dest),
      ));
    }
    mounts.push(Mount::readonly(&mount.dest, &resolved.fragment));
  }

  let cwd = if cmd.dir.is_empty() { "/" } else { cmd.dir.as_str() };
  let mut state = base;
  for step in &cmd.steps {
    opts.check_cancelled()?;
    let exec = mounts.iter().cloned().fold(
      Exec::shell(&step.command).cwd(cwd).envs(&cmd.env).envs(&step.env),
      Exec::mount,
    );
    state = state.run(exec).root();
  }
  Ok(state)
}
