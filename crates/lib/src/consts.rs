//! Shared constants.

/// Name of the native build description file that makes a directory a package.
pub const NATIVE_BUILD_FILE: &str = "Android.bp";

/// Names of target-system build files, in lookup order.
pub const TARGET_BUILD_FILES: [&str; 2] = ["BUILD", "BUILD.bazel"];

/// Directory of modules defined at the root of the source tree.
///
/// Explicit opt-ins in this directory bypass the allowlist.
pub const TOP_LEVEL_DIR: &str = ".";

/// Suffix appended to the name of a dependency that could not be found.
pub const MISSING_DEP_SUFFIX: &str = "__BP2BUILD__MISSING__DEP";

/// Platform that never participates in mixed execution.
pub const MIXED_BUILD_EXCLUDED_OS: &str = "windows";

/// Characters that turn a source path into a glob pattern.
pub const GLOB_CHARS: [char; 3] = ['*', '?', '['];
