//! Immutable, content-addressed graph fragments.
//!
//! A [`Fragment`] is one output of one operation node. Nodes are shared via
//! `Arc` and never mutated once built: every builder method returns a new
//! fragment whose node points at its inputs. A node's digest covers its
//! operation and the digests of its inputs, so identical descriptions always
//! hash identically regardless of how they were assembled.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::hash::{Hashable, ObjectHash};

/// One filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
  /// An empty filesystem.
  Scratch,
  /// Root filesystem of a container image.
  Image { reference: String },
  Git {
    remote: String,
    reference: String,
    keep_git_dir: bool,
  },
  /// A single downloaded file.
  Http {
    url: String,
    filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permissions: Option<u32>,
  },
  /// Content supplied by the client under `name`.
  Local {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    excludes: Vec<String>,
  },
  Mkfile {
    path: String,
    contents: String,
    attrs: FileAttrs,
  },
  Mkdir {
    path: String,
    mode: u32,
    parents: bool,
  },
  /// Copy from the second input onto the first.
  Copy(CopySpec),
  /// Run a command with the first input as root filesystem.
  Exec(ExecOp),
  /// Layer every input on top of the previous ones.
  Merge,
  /// A sub-build solved by another frontend. `inputs` names the node inputs.
  Frontend {
    frontend: String,
    opts: BTreeMap<String, String>,
    inputs: Vec<String>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttrs {
  pub mode: u32,
  pub uid: u32,
  pub gid: u32,
}

impl FileAttrs {
  pub fn mode(mode: u32) -> Self {
    Self { mode, uid: 0, gid: 0 }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySpec {
  pub src: String,
  pub dest: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub includes: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub excludes: Vec<String>,
  /// Copy the contents of `src` rather than `src` itself.
  pub contents_only: bool,
  pub create_dest_path: bool,
}

impl CopySpec {
  pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
    Self {
      src: src.into(),
      dest: dest.into(),
      includes: Vec::new(),
      excludes: Vec::new(),
      contents_only: false,
      create_dest_path: true,
    }
  }

  pub fn contents_only(mut self) -> Self {
    self.contents_only = true;
    self
  }

  pub fn filtered(mut self, includes: &[String], excludes: &[String]) -> Self {
    self.includes = includes.to_vec();
    self.excludes = excludes.to_vec();
    self
  }
}

/// Serialized form of an exec: mounts refer to node inputs by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOp {
  pub args: Vec<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
  pub cwd: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub mounts: Vec<MountOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOp {
  pub dest: String,
  /// Index into the node inputs. `None` mounts an empty directory.
  pub input: Option<usize>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub selector: String,
  pub readonly: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cache: Option<CacheMount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMount {
  pub id: String,
  /// Serialize access between concurrent builds.
  pub locked: bool,
}

/// Which output of a node a fragment refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
  #[default]
  Root,
  /// The final state of an exec mount.
  Mount(String),
}

impl Output {
  pub fn is_root(&self) -> bool {
    matches!(self, Output::Root)
  }
}

/// Reference to a node output by digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
  pub digest: ObjectHash,
  #[serde(default, skip_serializing_if = "Output::is_root")]
  pub output: Output,
}

/// Metadata attached to a node that does not affect its digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
  pub progress_group: Option<String>,
}

impl Constraints {
  pub fn group(name: impl Into<String>) -> Self {
    Self {
      progress_group: Some(name.into()),
    }
  }
}

#[derive(Debug)]
pub(crate) struct Node {
  pub(crate) op: Op,
  pub(crate) inputs: Vec<Fragment>,
  pub(crate) progress_group: Option<String>,
  digest: OnceLock<ObjectHash>,
}

#[derive(Serialize)]
struct NodeRecord<'a> {
  op: &'a Op,
  inputs: Vec<InputRef>,
}

impl Hashable for NodeRecord<'_> {}

impl Node {
  fn new(op: Op, inputs: Vec<Fragment>) -> Arc<Self> {
    Arc::new(Self {
      op,
      inputs,
      progress_group: None,
      digest: OnceLock::new(),
    })
  }

  pub(crate) fn digest(&self) -> Result<ObjectHash> {
    if let Some(digest) = self.digest.get() {
      return Ok(digest.clone());
    }
    let inputs = self.inputs.iter().map(Fragment::input_ref).collect::<Result<Vec<_>>>()?;
    let digest = NodeRecord { op: &self.op, inputs }.compute_hash()?;
    Ok(self.digest.get_or_init(|| digest).clone())
  }
}

#[derive(Debug, Clone)]
pub struct Fragment {
  pub(crate) node: Arc<Node>,
  output: Output,
}

impl Fragment {
  fn from_op(op: Op, inputs: Vec<Fragment>) -> Self {
    Self {
      node: Node::new(op, inputs),
      output: Output::Root,
    }
  }

  pub fn scratch() -> Self {
    Self::from_op(Op::Scratch, Vec::new())
  }

  pub fn image(reference: impl Into<String>) -> Self {
    Self::from_op(
      Op::Image {
        reference: reference.into(),
      },
      Vec::new(),
    )
  }

  pub fn git(remote: impl Into<String>, reference: impl Into<String>, keep_git_dir: bool) -> Self {
    Self::from_op(
      Op::Git {
        remote: remote.into(),
        reference: reference.into(),
        keep_git_dir,
      },
      Vec::new(),
    )
  }

  pub fn http(
    url: impl Into<String>,
    filename: impl Into<String>,
    digest: Option<String>,
    permissions: Option<u32>,
  ) -> Self {
    Self::from_op(
      Op::Http {
        url: url.into(),
        filename: filename.into(),
        digest,
        permissions,
      },
      Vec::new(),
    )
  }

  pub fn local(name: impl Into<String>, includes: &[String], excludes: &[String]) -> Self {
    Self::from_op(
      Op::Local {
        name: name.into(),
        includes: includes.to_vec(),
        excludes: excludes.to_vec(),
      },
      Vec::new(),
    )
  }

  /// Layer `inputs` in order. A single input is returned unchanged.
  pub fn merge(mut inputs: Vec<Fragment>) -> Self {
    match inputs.len() {
      0 => Self::scratch(),
      1 => inputs.remove(0),
      _ => Self::from_op(Op::Merge, inputs),
    }
  }

  /// A sub-build solved by `frontend`, with named inputs.
  pub fn frontend(
    frontend: impl Into<String>,
    opts: BTreeMap<String, String>,
    inputs: Vec<(String, Fragment)>,
  ) -> Self {
    let (names, fragments): (Vec<String>, Vec<Fragment>) = inputs.into_iter().unzip();
    Self::from_op(
      Op::Frontend {
        frontend: frontend.into(),
        opts,
        inputs: names,
      },
      fragments,
    )
  }

  pub fn mkfile(&self, path: impl Into<String>, contents: impl Into<String>, attrs: FileAttrs) -> Self {
    Self::from_op(
      Op::Mkfile {
        path: path.into(),
        contents: contents.into(),
        attrs,
      },
      vec![self.clone()],
    )
  }

  /// Create `path` and any missing parents.
  pub fn mkdir(&self, path: impl Into<String>, mode: u32) -> Self {
    Self::from_op(
      Op::Mkdir {
        path: path.into(),
        mode,
        parents: true,
      },
      vec![self.clone()],
    )
  }

  pub fn copy_from(&self, from: &Fragment, copy: CopySpec) -> Self {
    Self::from_op(Op::Copy(copy), vec![self.clone(), from.clone()])
  }

  /// Run a command on top of this fragment.
  pub fn run(&self, exec: Exec) -> ExecState {
    let mut inputs = vec![self.clone()];
    let mut mounts = Vec::with_capacity(exec.mounts.len());
    for mount in exec.mounts {
      let input = mount.source.map(|source| {
        inputs.push(source);
        inputs.len() - 1
      });
      mounts.push(MountOp {
        dest: mount.dest,
        input,
        selector: mount.selector,
        readonly: mount.readonly,
        cache: mount.cache,
      });
    }

    let op = Op::Exec(ExecOp {
      args: exec.args,
      env: exec.env,
      cwd: exec.cwd,
      mounts,
    });
    ExecState {
      node: Node::new(op, inputs),
    }
  }

  /// Attach progress metadata. The digest is unaffected.
  pub fn with_constraints(self, constraints: &Constraints) -> Self {
    if constraints.progress_group.is_none() {
      return self;
    }
    let node = Arc::new(Node {
      op: self.node.op.clone(),
      inputs: self.node.inputs.clone(),
      progress_group: constraints.progress_group.clone(),
      digest: self.node.digest.clone(),
    });
    Self {
      node,
      output: self.output,
    }
  }

  pub fn op(&self) -> &Op {
    &self.node.op
  }

  pub fn inputs(&self) -> &[Fragment] {
    &self.node.inputs
  }

  pub fn output(&self) -> &Output {
    &self.output
  }

  pub fn progress_group(&self) -> Option<&str> {
    self.node.progress_group.as_deref()
  }

  pub fn digest(&self) -> Result<ObjectHash> {
    self.node.digest()
  }

  pub fn input_ref(&self) -> Result<InputRef> {
    Ok(InputRef {
      digest: self.digest()?,
      output: self.output.clone(),
    })
  }
}

impl PartialEq for Fragment {
  fn eq(&self, other: &Self) -> bool {
    if self.output != other.output {
      return false;
    }
    Arc::ptr_eq(&self.node, &other.node)
      || matches!((self.digest(), other.digest()), (Ok(a), Ok(b)) if a == b)
  }
}

/// A command to run, built up before being attached with [`Fragment::run`].
#[derive(Debug, Clone, Default)]
pub struct Exec {
  pub args: Vec<String>,
  pub env: BTreeMap<String, String>,
  pub cwd: String,
  pub mounts: Vec<Mount>,
}

impl Exec {
  /// `sh -c <script>` in `/`.
  pub fn shell(script: impl Into<String>) -> Self {
    Self {
      args: vec!["sh".to_string(), "-c".to_string(), script.into()],
      env: BTreeMap::new(),
      cwd: "/".to_string(),
      mounts: Vec::new(),
    }
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
    self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
    self
  }

  pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
    self.cwd = cwd.into();
    self
  }

  pub fn mount(mut self, mount: Mount) -> Self {
    self.mounts.push(mount);
    self
  }
}

#[derive(Debug, Clone)]
pub struct Mount {
  pub dest: String,
  pub source: Option<Fragment>,
  pub selector: String,
  pub readonly: bool,
  pub cache: Option<CacheMount>,
}

impl Mount {
  /// A writable mount of `source`; its final state is available as an output.
  pub fn new(dest: impl Into<String>, source: &Fragment) -> Self {
    Self {
      dest: dest.into(),
      source: Some(source.clone()),
      selector: String::new(),
      readonly: false,
      cache: None,
    }
  }

  pub fn readonly(dest: impl Into<String>, source: &Fragment) -> Self {
    Self {
      readonly: true,
      ..Self::new(dest, source)
    }
  }

  /// An empty writable directory.
  pub fn scratch(dest: impl Into<String>) -> Self {
    Self {
      dest: dest.into(),
      source: None,
      selector: String::new(),
      readonly: false,
      cache: None,
    }
  }

  /// A persistent cache directory shared between builds with the same id.
  pub fn cache(dest: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      cache: Some(CacheMount {
        id: id.into(),
        locked: true,
      }),
      ..Self::scratch(dest)
    }
  }
}

/// The node created by [`Fragment::run`].
#[derive(Debug, Clone)]
pub struct ExecState {
  node: Arc<Node>,
}

impl ExecState {
  /// The root filesystem after the command ran.
  pub fn root(&self) -> Fragment {
    Fragment {
      node: self.node.clone(),
      output: Output::Root,
    }
  }

  /// The state of the mount at `dest` after the command ran.
  pub fn output(&self, dest: impl Into<String>) -> Fragment {
    Fragment {
      node: self.node.clone(),
      output: Output::Mount(dest.into()),
    }
  }
}

/// Place every input's content under `dest` on top of `base`.
///
/// With merge support this is one merge node over independent copies, so a
/// change in one input does not invalidate the copies of the others. Without
/// it the copies are chained onto `base`.
pub fn merge_at_path(base: &Fragment, inputs: &[Fragment], dest: &str, merge_supported: bool) -> Fragment {
  if inputs.is_empty() {
    return base.clone();
  }
  let copy = || CopySpec::new("/", dest).contents_only();
  if merge_supported {
    let mut layers = Vec::with_capacity(inputs.len() + 1);
    layers.push(base.clone());
    layers.extend(inputs.iter().map(|input| Fragment::scratch().copy_from(input, copy())));
    Fragment::merge(layers)
  } else {
    inputs.iter().fold(base.clone(), |acc, input| acc.copy_from(input, copy()))
  }
}
