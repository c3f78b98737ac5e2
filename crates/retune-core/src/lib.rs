#![forbid(unsafe_code)]

//! Core types and errors for the retune configuration subsystem.
//!
//! This crate defines the shared vocabulary used across all retune crates:
//! the unified error type (`ConfError`), value provenance (`Source`), the
//! boot/reload context split (`SettingContext`), per-setting change policy
//! (`ChangeClass`), and the tracing conventions of the subsystem.
//!
//! It has minimal external dependencies and is intended to be depended on
//! by every other crate in the workspace.

pub mod error;
pub mod tracing_config;
pub mod types;

pub use error::{ConfError, ConfResult};
pub use types::{ChangeClass, ProcessRole, SettingContext, Source, WHITELIST_SETTING};
