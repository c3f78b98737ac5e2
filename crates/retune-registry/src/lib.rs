#![forbid(unsafe_code)]

//! Typed runtime-setting registry for the retune configuration subsystem.
//!
//! Layout: `setting.rs` (one tunable parameter: typed kinds, hooks, value
//! stack, unit-aware parsing) and `registry.rs` (the process-wide
//! [`SettingRegistry`] with the validate-or-apply primitive the reload
//! engine drives).

pub mod registry;
pub mod setting;

pub use registry::SettingRegistry;
pub use setting::{
    AssignHook, CheckHook, DynamicDefault, Setting, SettingSnapshot, SettingValue, StackedValue,
    Unit,
};
