//! Build-arg substitution.
//!
//! String fields of a spec may reference build args as `${NAME}` or `$NAME`.
//! A literal dollar sign is written `$$`. A `$` not followed by a name, a
//! brace or another `$` passes through unchanged.
//!
//! Substitution never mutates the parsed spec: [`Spec::substitute_args`]
//! returns a new value so one parsed spec can feed several platform-specific
//! builds.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use pkgraph_lib::spec::args::{expand, ArgEnv};
//!
//! let declared = BTreeMap::from([("VERSION".to_string(), Some("1.2.3".to_string()))]);
//! let supplied = BTreeMap::new();
//! let env = ArgEnv::new(&declared, &supplied);
//! assert_eq!(expand("v${VERSION}-$$HOME", "version", &env).unwrap(), "v1.2.3-$HOME");
//! ```

use std::collections::BTreeMap;

use super::source::Source;
use super::types::Spec;
use crate::error::{Error, Result};

/// Where substituted values come from: supplied values win over declared
/// defaults.
pub struct ArgEnv<'a> {
  declared: &'a BTreeMap<String, Option<String>>,
  supplied: &'a BTreeMap<String, String>,
}

impl<'a> ArgEnv<'a> {
  pub fn new(declared: &'a BTreeMap<String, Option<String>>, supplied: &'a BTreeMap<String, String>) -> Self {
    Self { declared, supplied }
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .supplied
      .get(name)
      .map(String::as_str)
      .or_else(|| self.declared.get(name).and_then(|d| d.as_deref()))
  }
}

/// Substitute every arg reference in `input`.
///
/// # Errors
///
/// Returns [`Error::UndefinedArg`] when a referenced arg has neither a
/// supplied value nor a default, and [`Error::Invalid`] for an unterminated
/// or empty `${...}`.
pub fn expand(input: &str, field: &str, env: &ArgEnv<'_>) -> Result<String> {
  if !input.contains('$') {
    return Ok(input.to_string());
  }

  let mut out = String::with_capacity(input.len());
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      out.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();
        out.push('$');
      }
      Some((_, '{')) => {
        chars.next();
        let mut name = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          name.push(c);
        }
        if !found_close {
          return Err(Error::invalid(field, format!("unclosed ${{ at position {pos}")));
        }
        if !is_identifier(&name) {
          return Err(Error::invalid(field, format!("invalid build arg reference ${{{name}}}")));
        }
        out.push_str(lookup(&name, field, env)?);
      }
      Some(&(_, c)) if c == '_' || c.is_ascii_alphabetic() => {
        let mut name = String::new();
        while let Some(&(_, c)) = chars.peek() {
          if c == '_' || c.is_ascii_alphanumeric() {
            name.push(c);
            chars.next();
          } else {
            break;
          }
        }
        out.push_str(lookup(&name, field, env)?);
      }
      _ => out.push('$'),
    }
  }

  Ok(out)
}

fn lookup<'e>(name: &str, field: &str, env: &'e ArgEnv<'_>) -> Result<&'e str> {
  env.get(name).ok_or_else(|| Error::UndefinedArg {
    name: name.to_string(),
    field: field.to_string(),
  })
}

fn is_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
    && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

impl Spec {
  /// Return a copy of the spec with build args substituted.
  ///
  /// Substituted fields: `version`, `revision`, build and step environment
  /// values, and the string fields of every source (urls, refs, paths, build
  /// args). Build step commands are left alone; they run in a shell.
  pub fn substitute_args(&self, supplied: &BTreeMap<String, String>) -> Result<Spec> {
    let env = ArgEnv::new(&self.args, supplied);
    let mut spec = self.clone();

    spec.version = expand(&spec.version, "version", &env)?;
    spec.revision = expand(&spec.revision, "revision", &env)?;

    for (key, value) in spec.build.env.iter_mut() {
      *value = expand(value, &format!("build.env.{key}"), &env)?;
    }
    for (idx, step) in spec.build.steps.iter_mut().enumerate() {
      for (key, value) in step.env.iter_mut() {
        *value = expand(value, &format!("build.steps[{idx}].env.{key}"), &env)?;
      }
    }

    for (name, source) in spec.sources.iter_mut() {
      substitute_source(source, &format!("sources.{name}"), &env)?;
    }

    Ok(spec)
  }
}

fn substitute_source(source: &mut Source, field: &str, env: &ArgEnv<'_>) -> Result<()> {
  source.path = expand(&source.path, &format!("{field}.path"), env)?;

  if let Some(image) = &mut source.docker_image {
    image.reference = expand(&image.reference, &format!("{field}.image.ref"), env)?;
    if let Some(cmd) = &mut image.cmd {
      cmd.dir = expand(&cmd.dir, &format!("{field}.image.cmd.dir"), env)?;
      for (key, value) in cmd.env.iter_mut() {
        *value = expand(value, &format!("{field}.image.cmd.env.{key}"), env)?;
      }
      for (idx, mount) in cmd.mounts.iter_mut().enumerate() {
        substitute_source(&mut mount.spec, &format!("{field}.image.cmd.mounts[{idx}]"), env)?;
      }
    }
  }
  if let Some(git) = &mut source.git {
    git.url = expand(&git.url, &format!("{field}.git.url"), env)?;
    git.commit = expand(&git.commit, &format!("{field}.git.commit"), env)?;
  }
  if let Some(http) = &mut source.http {
    http.url = expand(&http.url, &format!("{field}.http.url"), env)?;
  }
  if let Some(build) = &mut source.build {
    build.target = expand(&build.target, &format!("{field}.build.target"), env)?;
    build.dockerfile_path = expand(&build.dockerfile_path, &format!("{field}.build.dockerfile_path"), env)?;
    for (key, value) in build.args.iter_mut() {
      *value = expand(value, &format!("{field}.build.args.{key}"), env)?;
    }
    if let Some(inner) = &mut build.source {
      substitute_source(inner, &format!("{field}.build.source"), env)?;
    }
    if let Some(inner) = &mut build.dockerfile {
      substitute_source(inner, &format!("{field}.build.dockerfile"), env)?;
    }
  }
  if let Some(gomod) = &mut source.gomod {
    substitute_source(&mut gomod.from, &format!("{field}.gomod.from"), env)?;
  }
  Ok(())
}
