//! Reference resolution.
//!
//! [`PackageResolver`] maps module-relative paths onto the package that owns
//! them; [`Expander`] turns whole list properties (paths, globs and module
//! references) into resolved label lists.

mod expand;
mod package;

pub use expand::{Expander, ModuleRef, ReferenceRecord};
pub use package::PackageResolver;
