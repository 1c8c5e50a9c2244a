//! bpbridge-lib: compile module declarations into target-system build files
//!
//! The crate turns a graph of declared modules into labelled target
//! declarations for another build system:
//! - `label`: the addressing scheme for files and targets
//! - `resolve`: package boundaries and reference expansion
//! - `decision`: which modules convert, per the allowlist
//! - `schedule`: phase-by-phase, wave-parallel graph mutation
//! - `mixed`: batched queries to an external executor in mixed builds
//! - `pipeline`: the standard phases and the final report

pub mod config;
pub mod consts;
pub mod convert;
pub mod decision;
pub mod fs;
pub mod graph;
pub mod label;
pub mod mixed;
pub mod module;
pub mod pipeline;
pub mod resolve;
pub mod schedule;
