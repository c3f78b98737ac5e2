//! Process-wide registry of tunable settings.
//!
//! The registry owns every [`Setting`] and exposes the validate-or-apply
//! primitive [`SettingRegistry::set_option`] the reload engine drives. It is
//! an explicit-lifecycle service: the host constructs it once at process
//! start and threads `&mut` through the reload path, which also guarantees
//! that only one reload is in flight at a time.

use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use retune_core::{
    ChangeClass, ConfError, ConfResult, SettingContext, Source, WHITELIST_SETTING,
};
use tracing::{debug, warn};

use crate::setting::{Setting, SettingSnapshot, Unit};

/// Registry of every tunable setting in the process.
#[derive(Debug, Default)]
pub struct SettingRegistry {
    settings: Vec<Setting>,
    index: HashMap<String, usize>,
    env_bindings: Vec<(String, String)>,
    last_reload_time: Option<SystemTime>,
}

impl SettingRegistry {
    /// An empty registry; callers define their own settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the server's built-in settings.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for setting in builtins() {
            registry.define(setting);
        }
        registry.bind_env("client_encoding", "RETUNE_CLIENT_ENCODING");
        registry
    }

    /// Register a setting. A definition for an existing name replaces the
    /// earlier entry, which upgrades placeholders created from the file.
    pub fn define(&mut self, setting: Setting) {
        let key = setting.name().to_ascii_lowercase();
        match self.index.get(&key) {
            Some(&idx) => self.settings[idx] = setting,
            None => {
                self.index.insert(key, self.settings.len());
                self.settings.push(setting);
            }
        }
    }

    /// Look up a setting by name (case-insensitive).
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Setting> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&idx| &self.settings[idx])
    }

    /// Mutable lookup, for host modules that manage a setting directly.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Setting> {
        self.index
            .get(&name.to_ascii_lowercase())
            .copied()
            .map(|idx| &mut self.settings[idx])
    }

    fn find_idx(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_ascii_lowercase()).copied()
    }

    /// All registered settings, in definition order.
    pub fn settings(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Display form of a setting's currently effective value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.find(name).map(|s| s.value().display_current())
    }

    /// Clear every setting's transient in-file flag.
    pub fn clear_in_file_flags(&mut self) {
        for setting in &mut self.settings {
            setting.set_in_file(false);
        }
    }

    /// Record which file and line a committed value came from.
    pub fn set_sourcefile(&mut self, name: &str, file: &Path, line: u32) {
        if let Some(idx) = self.find_idx(name) {
            self.settings[idx].set_sourcefile(file, line);
        }
    }

    /// True iff `class` appears in the comma-separated whitelist value.
    #[must_use]
    pub fn is_custom_class(class: &str, whitelist: &str) -> bool {
        whitelist
            .split(',')
            .any(|entry| entry.trim().eq_ignore_ascii_case(class))
    }

    /// Check hook for the class-whitelist setting: validates each class
    /// name and rewrites the value into canonical comma-separated form.
    pub fn check_class_whitelist(value: &mut String) -> Result<(), String> {
        let mut classes = Vec::new();
        for piece in value.split([',', ' ', '\t']) {
            if piece.is_empty() {
                continue;
            }
            let bytes = piece.as_bytes();
            let valid = (bytes[0].is_ascii_alphabetic() || bytes[0] == b'_')
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_');
            if !valid {
                return Err(format!("invalid class name \"{piece}\""));
            }
            classes.push(piece);
        }
        *value = classes.join(",");
        Ok(())
    }

    /// Validate or apply one assignment: the atomic primitive the reload
    /// engine calls twice, first with `apply = false` over the whole file
    /// (the dry run) and then with `apply = true` to commit.
    ///
    /// A `None` value reverts the setting to its boot default. The dry run
    /// marks the setting's in-file flag when the assignment came from the
    /// file. Returns `Ok(true)` when the value was (or would be) accepted,
    /// `Ok(false)` when the assignment is legal but cannot take effect in
    /// this context (a startup-only setting re-read on reload).
    ///
    /// # Errors
    ///
    /// [`ConfError::UnknownParameter`], [`ConfError::UnknownClass`],
    /// [`ConfError::ReadOnly`], or [`ConfError::InvalidValue`].
    pub fn set_option(
        &mut self,
        name: &str,
        value: Option<&str>,
        context: SettingContext,
        source: Source,
        apply: bool,
    ) -> ConfResult<bool> {
        let Some(idx) = self.find_idx(name) else {
            return self.missing_option(name, value, context, source, apply);
        };

        if !apply && source == Source::File {
            self.settings[idx].set_in_file(true);
        }

        let setting = &mut self.settings[idx];
        if setting.change_class() == ChangeClass::Internal && source >= Source::Environment {
            return Err(ConfError::ReadOnly {
                name: setting.name().to_string(),
            });
        }

        let parsed = match value {
            Some(raw) => {
                let mut text = raw.to_string();
                if let Some(check) = setting.check_hook() {
                    check(&mut text).map_err(|reason| ConfError::InvalidValue {
                        name: setting.name().to_string(),
                        value: raw.to_string(),
                        reason,
                    })?;
                }
                setting.value().validate(setting.name(), &text)?
            }
            None => setting.value().boot_parsed(),
        };

        // A startup-only setting re-read on reload cannot change; warn
        // once (during the dry run) when the file value differs.
        if setting.change_class() == ChangeClass::OnlyAtBoot
            && context == SettingContext::Reload
        {
            if setting.value().current_equals(&parsed) {
                return Ok(true);
            }
            if !apply {
                warn!(
                    target: "retune",
                    parameter = setting.name(),
                    "parameter \"{}\" cannot be changed without restarting the server",
                    setting.name()
                );
            }
            return Ok(false);
        }

        if !apply {
            return Ok(true);
        }

        let display = setting.value().display_parsed(&parsed);
        if setting.source() <= source {
            setting.value_mut().assign(&parsed);
            setting.set_source(source);
            if let Some(hook) = setting.assign_hook() {
                hook(name, &display);
            }
        }
        if setting.reset_source() <= source {
            setting.value_mut().assign_reset(&parsed);
            setting.set_reset_source(source);
        }
        for entry in setting.stack_mut() {
            if entry.source <= source {
                entry.value.clone_from(&display);
                entry.source = source;
            }
        }
        Ok(true)
    }

    fn missing_option(
        &mut self,
        name: &str,
        value: Option<&str>,
        context: SettingContext,
        source: Source,
        apply: bool,
    ) -> ConfResult<bool> {
        let Some((class, _)) = name.split_once('.') else {
            return Err(ConfError::UnknownParameter {
                name: name.to_string(),
            });
        };
        if !apply {
            // A whitelisted qualified name with no entry yet: the engine
            // has already vetted the class, and the placeholder is only
            // created at commit time.
            debug!(
                target: "retune",
                parameter = name,
                "custom setting has no registry entry yet; deferring to commit"
            );
            return Ok(true);
        }
        let whitelist = self.get(WHITELIST_SETTING).unwrap_or_default();
        if !Self::is_custom_class(class, &whitelist) {
            return Err(ConfError::UnknownClass {
                name: name.to_string(),
                class: class.to_string(),
            });
        }
        let Some(raw) = value else {
            return Ok(false);
        };
        self.define(Setting::custom_placeholder(name));
        self.set_option(name, Some(raw), context, source, true)
    }

    /// Demote file-sourced provenance to default on a setting that is no
    /// longer present in the file: current source, reset source, and every
    /// stacked value.
    pub fn demote_file_sources(&mut self, name: &str) {
        let Some(idx) = self.find_idx(name) else {
            return;
        };
        let setting = &mut self.settings[idx];
        if setting.source() == Source::File {
            setting.set_source(Source::Default);
        }
        if setting.reset_source() == Source::File {
            setting.set_reset_source(Source::Default);
        }
        for entry in setting.stack_mut() {
            if entry.source == Source::File {
                entry.source = Source::Default;
            }
        }
    }

    /// Demote only the reset source. Used for a removed setting whose
    /// change class forbids reverting it now, so the restart warning fires
    /// once rather than on every subsequent reload.
    pub fn demote_reset_source(&mut self, name: &str) {
        if let Some(idx) = self.find_idx(name) {
            let setting = &mut self.settings[idx];
            if setting.reset_source() == Source::File {
                setting.set_reset_source(Source::Default);
            }
        }
    }

    /// Associate a setting with an environment variable consulted by
    /// [`SettingRegistry::reseed_derived_defaults`].
    pub fn bind_env(&mut self, setting: &str, var: &str) {
        self.env_bindings
            .push((setting.to_string(), var.to_string()));
    }

    /// Re-read environment-derived and dynamic defaults. Run on reload
    /// only: it repairs settings that fell back from the file to a
    /// lower-precedence source. Source precedence inside `set_option`
    /// keeps these from clobbering file or command-line values.
    pub fn reseed_derived_defaults(&mut self, context: SettingContext) {
        let dynamic: Vec<(String, String)> = self
            .settings
            .iter()
            .filter_map(|s| {
                s.dynamic_default_hook()
                    .map(|hook| (s.name().to_string(), hook()))
            })
            .collect();
        for (name, value) in dynamic {
            if let Err(error) =
                self.set_option(&name, Some(&value), context, Source::DynamicDefault, true)
            {
                warn!(
                    target: "retune",
                    parameter = %name,
                    error = %error,
                    "could not re-apply dynamic default"
                );
            }
        }

        let from_env: Vec<(String, String)> = self
            .env_bindings
            .iter()
            .filter_map(|(setting, var)| {
                std::env::var(var).ok().map(|v| (setting.clone(), v))
            })
            .collect();
        for (name, value) in from_env {
            if let Err(error) =
                self.set_option(&name, Some(&value), context, Source::Environment, true)
            {
                warn!(
                    target: "retune",
                    parameter = %name,
                    error = %error,
                    "could not re-apply environment default"
                );
            }
        }
    }

    /// Timestamp of the last successful reload.
    #[must_use]
    pub const fn last_reload_time(&self) -> Option<SystemTime> {
        self.last_reload_time
    }

    /// Record a successful reload.
    pub fn stamp_reload_time(&mut self) {
        self.last_reload_time = Some(SystemTime::now());
    }

    /// Observable state of every setting, for reports and tests.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SettingSnapshot> {
        self.settings.iter().map(Setting::snapshot).collect()
    }
}

fn timezone_abbreviations_default() -> String {
    "Default".to_string()
}

/// The server's built-in demonstration settings, one per kind and change
/// class so the subsystem is exercisable end-to-end.
fn builtins() -> Vec<Setting> {
    vec![
        Setting::string(
            WHITELIST_SETTING,
            "list of custom variable class names",
            ChangeClass::BySignalOrBoot,
            "",
        )
        .with_check(SettingRegistry::check_class_whitelist),
        Setting::string(
            "server_version",
            "server version string",
            ChangeClass::Internal,
            "16.3",
        ),
        Setting::int(
            "port",
            "TCP port the server listens on",
            ChangeClass::OnlyAtBoot,
            5432,
            1,
            65535,
        ),
        Setting::int(
            "max_connections",
            "maximum number of concurrent connections",
            ChangeClass::OnlyAtBoot,
            100,
            1,
            262_143,
        ),
        Setting::int(
            "shared_buffers",
            "amount of memory used for shared buffers",
            ChangeClass::BySignalOrBoot,
            16384,
            128,
            i64::MAX / 2,
        )
        .with_unit(Unit::KiloBytes),
        Setting::int(
            "work_mem",
            "memory used by internal sort and hash operations",
            ChangeClass::RuntimeByAny,
            4096,
            64,
            i64::MAX / 2,
        )
        .with_unit(Unit::KiloBytes),
        Setting::int(
            "authentication_timeout",
            "maximum time to complete client authentication",
            ChangeClass::BySignalOrBoot,
            60,
            1,
            600,
        )
        .with_unit(Unit::Seconds),
        Setting::bool(
            "fsync",
            "force synchronization of updates to disk",
            ChangeClass::BySignalOrBoot,
            true,
        ),
        Setting::real(
            "checkpoint_completion_target",
            "fraction of the checkpoint interval to spread writes over",
            ChangeClass::BySignalOrBoot,
            0.5,
            0.0,
            1.0,
        ),
        Setting::enumerated(
            "log_min_messages",
            "minimum severity of messages to log",
            ChangeClass::BySignalOrBoot,
            "warning",
            &["debug", "info", "notice", "warning", "error", "log", "fatal"],
        ),
        Setting::string(
            "search_path",
            "schema search order for unqualified names",
            ChangeClass::RuntimeByAny,
            "\"$user\",public",
        ),
        Setting::string(
            "client_encoding",
            "client-side character set encoding",
            ChangeClass::RuntimeByAny,
            "SQL_ASCII",
        ),
        Setting::string(
            "timezone_abbreviations",
            "active set of time zone abbreviations",
            ChangeClass::BySignalOrBoot,
            "Default",
        )
        .with_dynamic_default(timezone_abbreviations_default),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SettingRegistry {
        SettingRegistry::with_builtins()
    }

    #[test]
    fn find_is_case_insensitive() {
        let reg = registry();
        assert!(reg.find("WORK_MEM").is_some());
        assert!(reg.find("Work_Mem").is_some());
        assert!(reg.find("no_such_setting").is_none());
    }

    #[test]
    fn set_option_applies_and_records_source() {
        let mut reg = registry();
        let applied = reg
            .set_option(
                "work_mem",
                Some("64MB"),
                SettingContext::Reload,
                Source::File,
                true,
            )
            .expect("apply");
        assert!(applied);
        assert_eq!(reg.get("work_mem").as_deref(), Some("64MB"));
        let setting = reg.find("work_mem").expect("entry");
        assert_eq!(setting.source(), Source::File);
        assert_eq!(setting.reset_source(), Source::File);
    }

    #[test]
    fn dry_run_validates_without_mutating() {
        let mut reg = registry();
        let before = reg.snapshot();
        let ok = reg
            .set_option(
                "work_mem",
                Some("64MB"),
                SettingContext::Reload,
                Source::File,
                false,
            )
            .expect("dry run");
        assert!(ok);
        assert_eq!(reg.snapshot(), before);
        assert!(reg.find("work_mem").expect("entry").in_file());
    }

    #[test]
    fn dry_run_rejects_bad_values() {
        let mut reg = registry();
        let err = reg
            .set_option(
                "fsync",
                Some("sometimes"),
                SettingContext::Reload,
                Source::File,
                false,
            )
            .expect_err("must reject");
        assert!(matches!(err, ConfError::InvalidValue { .. }));
    }

    #[test]
    fn unknown_bare_name_is_an_error() {
        let mut reg = registry();
        let err = reg
            .set_option(
                "bogus_param",
                Some("1"),
                SettingContext::Reload,
                Source::File,
                false,
            )
            .expect_err("must reject");
        assert!(matches!(err, ConfError::UnknownParameter { .. }));
    }

    #[test]
    fn lower_trust_source_cannot_override() {
        let mut reg = registry();
        reg.set_option(
            "work_mem",
            Some("32MB"),
            SettingContext::Boot,
            Source::Argv,
            true,
        )
        .expect("argv");
        reg.set_option(
            "work_mem",
            Some("64MB"),
            SettingContext::Reload,
            Source::File,
            true,
        )
        .expect("file");
        // argv outranks file; the file value is accepted but not applied.
        assert_eq!(reg.get("work_mem").as_deref(), Some("32MB"));
        assert_eq!(
            reg.find("work_mem").expect("entry").source(),
            Source::Argv
        );
    }

    #[test]
    fn startup_only_setting_warns_instead_of_changing_on_reload() {
        let mut reg = registry();
        let outcome = reg
            .set_option(
                "max_connections",
                Some("200"),
                SettingContext::Reload,
                Source::File,
                false,
            )
            .expect("dry run");
        assert!(!outcome);
        assert_eq!(reg.get("max_connections").as_deref(), Some("100"));
        // Same value: accepted as a no-op.
        let outcome = reg
            .set_option(
                "max_connections",
                Some("100"),
                SettingContext::Reload,
                Source::File,
                false,
            )
            .expect("dry run");
        assert!(outcome);
    }

    #[test]
    fn startup_only_setting_changes_at_boot() {
        let mut reg = registry();
        reg.set_option(
            "max_connections",
            Some("200"),
            SettingContext::Boot,
            Source::File,
            true,
        )
        .expect("boot apply");
        assert_eq!(reg.get("max_connections").as_deref(), Some("200"));
    }

    #[test]
    fn internal_setting_rejects_file_assignment() {
        let mut reg = registry();
        let err = reg
            .set_option(
                "server_version",
                Some("17.0"),
                SettingContext::Reload,
                Source::File,
                false,
            )
            .expect_err("must reject");
        assert!(matches!(err, ConfError::ReadOnly { .. }));
    }

    #[test]
    fn reset_reverts_to_boot_default() {
        let mut reg = registry();
        reg.set_option(
            "fsync",
            Some("off"),
            SettingContext::Reload,
            Source::File,
            true,
        )
        .expect("apply");
        assert_eq!(reg.get("fsync").as_deref(), Some("off"));

        reg.demote_file_sources("fsync");
        reg.set_option("fsync", None, SettingContext::Reload, Source::Default, true)
            .expect("reset");
        let setting = reg.find("fsync").expect("entry");
        assert_eq!(setting.value().display_current(), "on");
        assert_eq!(setting.source(), Source::Default);
        assert_eq!(setting.reset_source(), Source::Default);
    }

    #[test]
    fn whitelist_canonicalizes_on_apply() {
        let mut reg = registry();
        reg.set_option(
            WHITELIST_SETTING,
            Some("myapp,  other"),
            SettingContext::Reload,
            Source::File,
            true,
        )
        .expect("apply");
        assert_eq!(reg.get(WHITELIST_SETTING).as_deref(), Some("myapp,other"));
    }

    #[test]
    fn whitelist_rejects_bad_class_names() {
        let mut reg = registry();
        let err = reg
            .set_option(
                WHITELIST_SETTING,
                Some("my-app"),
                SettingContext::Reload,
                Source::File,
                false,
            )
            .expect_err("must reject");
        assert!(matches!(err, ConfError::InvalidValue { .. }));
    }

    #[test]
    fn placeholder_is_created_at_commit_only() {
        let mut reg = registry();
        reg.set_option(
            WHITELIST_SETTING,
            Some("myapp"),
            SettingContext::Reload,
            Source::File,
            true,
        )
        .expect("whitelist");

        // Dry run: no entry appears.
        reg.set_option(
            "myapp.flag",
            Some("on"),
            SettingContext::Reload,
            Source::File,
            false,
        )
        .expect("dry run");
        assert!(reg.find("myapp.flag").is_none());

        // Commit: placeholder appears with the value.
        reg.set_option(
            "myapp.flag",
            Some("on"),
            SettingContext::Reload,
            Source::File,
            true,
        )
        .expect("commit");
        let placeholder = reg.find("myapp.flag").expect("placeholder");
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.value().display_current(), "on");
        assert_eq!(placeholder.source(), Source::File);
    }

    #[test]
    fn placeholder_outside_whitelist_is_rejected_at_commit() {
        let mut reg = registry();
        reg.set_option(
            WHITELIST_SETTING,
            Some("other"),
            SettingContext::Reload,
            Source::File,
            true,
        )
        .expect("whitelist");
        let err = reg
            .set_option(
                "myapp.flag",
                Some("on"),
                SettingContext::Reload,
                Source::File,
                true,
            )
            .expect_err("must reject");
        assert!(matches!(err, ConfError::UnknownClass { .. }));
    }

    #[test]
    fn is_custom_class_matches_comma_entries() {
        assert!(SettingRegistry::is_custom_class("myapp", "myapp"));
        assert!(SettingRegistry::is_custom_class("b", "a,b,c"));
        assert!(!SettingRegistry::is_custom_class("d", "a,b,c"));
        assert!(!SettingRegistry::is_custom_class("myapp", ""));
    }

    #[test]
    fn defining_over_a_placeholder_upgrades_it() {
        let mut reg = registry();
        reg.set_option(
            WHITELIST_SETTING,
            Some("myapp"),
            SettingContext::Boot,
            Source::File,
            true,
        )
        .expect("whitelist");
        reg.set_option(
            "myapp.retries",
            Some("3"),
            SettingContext::Boot,
            Source::File,
            true,
        )
        .expect("placeholder");

        reg.define(Setting::int(
            "myapp.retries",
            "retry budget",
            ChangeClass::RuntimeByAny,
            5,
            0,
            100,
        ));
        let upgraded = reg.find("myapp.retries").expect("entry");
        assert!(!upgraded.is_placeholder());
        assert_eq!(upgraded.value().kind_name(), "integer");
    }

    #[test]
    fn reseed_respects_source_precedence() {
        let mut reg = registry();
        reg.set_option(
            "timezone_abbreviations",
            Some("India"),
            SettingContext::Reload,
            Source::File,
            true,
        )
        .expect("file value");
        reg.reseed_derived_defaults(SettingContext::Reload);
        // File outranks the dynamic default, so the value survives.
        assert_eq!(
            reg.get("timezone_abbreviations").as_deref(),
            Some("India")
        );

        reg.demote_file_sources("timezone_abbreviations");
        reg.set_option(
            "timezone_abbreviations",
            None,
            SettingContext::Reload,
            Source::Default,
            true,
        )
        .expect("reset");
        reg.reseed_derived_defaults(SettingContext::Reload);
        let setting = reg.find("timezone_abbreviations").expect("entry");
        assert_eq!(setting.source(), Source::DynamicDefault);
    }

    #[test]
    fn stacked_values_follow_file_demotion() {
        let mut reg = registry();
        reg.set_option(
            "work_mem",
            Some("64MB"),
            SettingContext::Reload,
            Source::File,
            true,
        )
        .expect("apply");
        reg.find_mut("work_mem").expect("entry").push_value();
        assert_eq!(
            reg.find("work_mem").expect("entry").stack()[0].source,
            Source::File
        );

        reg.demote_file_sources("work_mem");
        let entry = reg.find("work_mem").expect("entry");
        assert_eq!(entry.source(), Source::Default);
        assert_eq!(entry.stack()[0].source, Source::Default);
    }

    #[test]
    fn sourcefile_is_recorded() {
        let mut reg = registry();
        reg.set_sourcefile("work_mem", Path::new("/data/server.conf"), 7);
        let (file, line) = reg.find("work_mem").expect("entry").sourcefile().expect("loc");
        assert_eq!(file, Path::new("/data/server.conf"));
        assert_eq!(line, 7);
    }

    #[test]
    fn snapshot_serializes() {
        let reg = registry();
        let json = serde_json::to_string(&reg.snapshot()).expect("serialize");
        assert!(json.contains("work_mem"));
        assert!(json.contains("\"source\":\"default\""));
    }
}
