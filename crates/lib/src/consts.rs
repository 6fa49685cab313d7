//! Reserved names and fixed values shared across the crate.

/// Length of the truncated object hash used for graph node digests.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Key under which a go module cache is returned in the extra dependencies
/// of a resolved source, and the directory it is merged into.
pub const GOMODS_KEY: &str = "gomods";

/// File name stem of the archived go module cache in an rpm SOURCES dir.
pub const GOMODS_ARCHIVE_STEM: &str = "__gomods";

/// Suffix appended to the name of every directory source once archived.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Name of the generated build script placed next to the sources.
pub const BUILD_SCRIPT: &str = "build.sh";

/// Dockerfile name used when a build source does not set one.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Module cache location inside the source worker.
pub const GOMODCACHE: &str = "/go/pkg/mod";

/// Build arg that turns off merge ops when set to `1`.
pub const DISABLE_DIFF_MERGE_ARG: &str = "DISABLE_DIFF_MERGE";

/// debhelper compatibility level written to `Build-Depends`.
pub const DEBHELPER_COMPAT: &str = "11";

/// Route key that is always served locally.
pub const DEBUG_ROUTE: &str = "debug";
