#![forbid(unsafe_code)]

//! retune: configuration-file parsing and atomic reload for a database
//! server's tunable parameters.
//!
//! The subsystem parses a `name [=] value` configuration file (with
//! recursive `include` directives) into an ordered assignment list, then
//! reconciles that list with a process-wide registry of typed settings.
//! Validation runs over the whole file before anything is committed, so a
//! failed reload is observationally equivalent to no reload at all;
//! settings removed from the file revert to their boot defaults, and
//! startup-only settings produce warnings rather than silent changes.

pub use retune_conf as conf;
pub use retune_core as core;
pub use retune_registry as registry;
pub use retune_reload as reload;

pub use retune_conf::{parse_config_file, ConfigItem, ConfigItemList};
pub use retune_core::{
    ChangeClass, ConfError, ConfResult, ProcessRole, SettingContext, Source, WHITELIST_SETTING,
};
pub use retune_registry::{Setting, SettingRegistry, Unit};
pub use retune_reload::{process_config_file, ReloadChange, ReloadOptions, ReloadReport};
