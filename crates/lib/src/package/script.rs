//! The generated `build.sh`.

use crate::spec::Spec;

/// Render the build steps as a POSIX shell script.
///
/// Each step runs in its own subshell with only its own environment
/// exported on top of the build-wide environment, so exports never leak
/// from one step into the next.
pub fn build_script(spec: &Spec) -> String {
  let mut out = String::from("#!/usr/bin/env sh\n\nset -e\n");

  if !spec.build.env.is_empty() {
    out.push('\n');
    for (key, value) in &spec.build.env {
      out.push_str(&export(key, value));
    }
  }

  for step in &spec.build.steps {
    out.push_str("\n(\n");
    for (key, value) in &step.env {
      out.push_str(&export(key, value));
    }
    out.push_str(step.command.trim_end());
    out.push_str("\n)\n");
  }
  out
}

fn export(key: &str, value: &str) -> String {
  format!("export {key}=\"{}\"\n", escape(value))
}

/// Escape for a double-quoted sh string; `$` is left to expand.
fn escape(value: &str) -> String {
  value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::spec::{ArtifactBuild, BuildStep};

  #[test]
  fn steps_run_in_isolated_subshells() {
    let spec = Spec {
      build: ArtifactBuild {
        env: BTreeMap::from([("CGO_ENABLED".to_string(), "0".to_string())]),
        steps: vec![
          BuildStep {
            command: "make\nmake check\n".into(),
            env: BTreeMap::from([
              ("B".to_string(), "two".to_string()),
              ("A".to_string(), "say \"hi\"".to_string()),
            ]),
          },
          BuildStep {
            command: "make install".into(),
            env: BTreeMap::new(),
          },
        ],
      },
      ..Default::default()
    };

    let expected = "#!/usr/bin/env sh\n\nset -e\n\nexport CGO_ENABLED=\"0\"\n\n(\nexport A=\"say \\\"hi\\\"\"\nexport B=\"two\"\nmake\nmake check\n)\n\n(\nmake install\n)\n";
    assert_eq!(build_script(&spec), expected);
  }
}
