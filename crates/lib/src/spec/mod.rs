//! The package spec: types, loading, validation and build-arg substitution.

pub mod args;
pub mod load;
pub mod source;
pub mod types;
pub mod validate;

pub use source::{
  Command, Origin, Source, SourceBuild, SourceContext, SourceDockerImage, SourceGit, SourceGoModule, SourceHttp,
  SourceInline, SourceInlineDir, SourceInlineFile, SourceMount,
};
pub use types::{
  ArtifactBuild, ArtifactConfig, ArtifactDirConfig, ArtifactSymlinkConfig, Artifacts, BuildStep, ChangelogEntry,
  CreateArtifactDirectories, Frontend, PackageConstraints, PackageDependencies, PatchSpec, Spec, SystemdConfiguration,
  SystemdDropinConfig, SystemdUnitConfig, Target,
};
