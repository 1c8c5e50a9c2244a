//! Target-system labels.
//!
//! A [`Label`] is an address in the target build system together with the
//! source-level spelling that produced it. A [`LabelList`] carries includes and
//! excludes; excludes are subtracted by address only.

mod types;

pub use types::*;
