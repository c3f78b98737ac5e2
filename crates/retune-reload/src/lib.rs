#![forbid(unsafe_code)]

//! Configuration reload engine.
//!
//! [`process_config_file`] re-reads the server configuration file and
//! reconciles it with the [`SettingRegistry`], in sequenced phases: parse,
//! resolve the class whitelist, clear presence flags, validate everything
//! (a dry run), revert settings removed from the file, re-seed derived
//! defaults (reload only), commit, and stamp the reload time.
//!
//! Atomicity: the registry is first mutated after the dry run over the
//! whole assignment list has succeeded, so a reload that reports failure
//! leaves every setting exactly as it was.
//!
//! Severity: at boot the first error propagates to the caller, which
//! terminates the process. On reload every error is demoted to a log
//! event; the primary process logs at the operator-visible level and
//! workers at debug.

use std::path::{Path, PathBuf};

use retune_conf::parser::{parse_config_file, ConfigItem, ConfigItemList};
use retune_core::{
    ConfError, ConfResult, ProcessRole, SettingContext, Source, WHITELIST_SETTING,
};
use retune_registry::SettingRegistry;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

/// Per-process inputs to a reload: who is running it and where relative
/// include paths resolve when no calling file exists.
#[derive(Debug, Clone)]
pub struct ReloadOptions {
    pub role: ProcessRole,
    pub data_dir: PathBuf,
}

impl ReloadOptions {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            role: ProcessRole::Primary,
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: ProcessRole) -> Self {
        self.role = role;
        self
    }
}

/// One committed value change observed during the apply pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadChange {
    pub name: String,
    pub value: String,
}

/// Outcome of a successful reload, in the shape the host logs or exposes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReloadReport {
    pub context: SettingContext,
    /// Assignments committed during the apply pass.
    pub applied: usize,
    /// Parameters whose effective value actually changed (primary only).
    pub changed: Vec<ReloadChange>,
    /// Per-setting warnings that did not abort the reload.
    pub warnings: Vec<String>,
}

/// Parse `config_file` and reconcile the registry with its contents.
///
/// # Errors
///
/// Any parse or validation failure aborts the reload before the registry
/// is touched and is returned to the caller; at boot the caller is
/// expected to treat it as fatal. A removed setting that cannot change in
/// this context is a warning, not an error.
pub fn process_config_file(
    registry: &mut SettingRegistry,
    config_file: &Path,
    context: SettingContext,
    options: &ReloadOptions,
) -> ConfResult<ReloadReport> {
    let span = info_span!(
        target: "retune",
        "reload",
        file = %config_file.display(),
        context = ?context,
    );
    let _guard = span.entered();

    let list = parse_config_file(config_file, None, &options.data_dir, 0)
        .map_err(|error| fail(error, context, options.role))?;

    // The whitelist assignment sits at the head of the list, so every
    // other assignment is validated against the proposed new whitelist.
    let whitelist =
        resolve_whitelist(registry, &list).map_err(|error| fail(error, context, options.role))?;

    registry.clear_in_file_flags();

    // Dry run over the whole list; nothing is committed past this loop
    // unless every assignment checks out.
    let mut warnings = Vec::new();
    for item in &list {
        if let Some((class, _)) = item.name.split_once('.') {
            if !SettingRegistry::is_custom_class(class, whitelist.as_deref().unwrap_or("")) {
                let error = ConfError::UnknownClass {
                    name: item.name.clone(),
                    class: class.to_string(),
                };
                return Err(fail_at(error, item, context, options.role));
            }
            if registry.find(&item.name).is_none() {
                // No entry yet; a placeholder is created at commit time.
                continue;
            }
        }
        match registry.set_option(&item.name, Some(&item.value), context, Source::File, false) {
            Ok(true) => {}
            Ok(false) => warnings.push(
                ConfError::CannotChangeNow {
                    name: item.name.clone(),
                }
                .to_string(),
            ),
            Err(error) => return Err(fail_at(error, item, context, options.role)),
        }
    }

    revert_removed(registry, context, options.role, &mut warnings);

    // Re-read environment-derived and dynamic defaults so settings that
    // fell back from the file land on them. Skipped at boot: the
    // subsystems feeding those defaults are not initialized yet.
    if context == SettingContext::Reload {
        registry.reseed_derived_defaults(context);
    }

    let (applied, changed) = apply(registry, &list, context, options);

    registry.stamp_reload_time();
    info!(
        target: "retune",
        applied_count = applied,
        changed_count = changed.len(),
        "configuration file processed"
    );
    Ok(ReloadReport {
        context,
        applied,
        changed,
        warnings,
    })
}

/// The effective class whitelist for this reload: a command-line value
/// outranks the file; otherwise the file's own (canonicalized) assignment;
/// otherwise whatever is currently configured.
fn resolve_whitelist(
    registry: &SettingRegistry,
    list: &ConfigItemList,
) -> ConfResult<Option<String>> {
    if let Some(setting) = registry.find(WHITELIST_SETTING) {
        if setting.reset_source() > Source::File {
            return Ok(Some(setting.value().display_reset()));
        }
    }
    if let Some(head) = list.whitelist_head() {
        let mut value = head.value.clone();
        SettingRegistry::check_class_whitelist(&mut value).map_err(|reason| {
            ConfError::InvalidValue {
                name: WHITELIST_SETTING.to_string(),
                value: head.value.clone(),
                reason,
            }
        })?;
        return Ok(Some(value));
    }
    Ok(registry.get(WHITELIST_SETTING))
}

/// Revert every setting that was last set from the file but no longer
/// appears in it. Settings whose change class forbids a change in this
/// context are left alone with a one-time warning.
fn revert_removed(
    registry: &mut SettingRegistry,
    context: SettingContext,
    role: ProcessRole,
    warnings: &mut Vec<String>,
) {
    let removed: Vec<String> = registry
        .settings()
        .filter(|s| s.reset_source() == Source::File && !s.in_file())
        .map(|s| s.name().to_string())
        .collect();

    for name in removed {
        let changeable = registry
            .find(&name)
            .is_some_and(|s| s.change_class().changeable_in(context));
        if !changeable {
            let warning = ConfError::CannotChangeNow { name: name.clone() };
            warn!(target: "retune", parameter = %name, "{warning}");
            warnings.push(warning.to_string());
            // Demote the reset source so the warning fires once, not on
            // every future reload; the running value stays put.
            registry.demote_reset_source(&name);
            continue;
        }

        registry.demote_file_sources(&name);
        if let Err(error) = registry.set_option(&name, None, context, Source::Default, true) {
            warn!(
                target: "retune",
                parameter = %name,
                error = %error,
                "could not restore default for removed parameter"
            );
            continue;
        }
        if context == SettingContext::Reload {
            log_at_role(
                role,
                &format!("parameter \"{name}\" removed from configuration file, reset to default"),
            );
        }
    }
}

/// The commit pass: apply every assignment, record provenance, and log
/// effective changes when running as the primary during a reload.
fn apply(
    registry: &mut SettingRegistry,
    list: &ConfigItemList,
    context: SettingContext,
    options: &ReloadOptions,
) -> (usize, Vec<ReloadChange>) {
    let capture = context == SettingContext::Reload && options.role == ProcessRole::Primary;
    let mut applied = 0usize;
    let mut changed = Vec::new();

    for item in list {
        let pre_value = if capture { registry.get(&item.name) } else { None };
        match registry.set_option(&item.name, Some(&item.value), context, Source::File, true) {
            Ok(true) => {
                registry.set_sourcefile(&item.name, &item.file, item.line);
                applied += 1;
                if let Some(pre) = pre_value {
                    let post = registry.get(&item.name);
                    if let Some(post) = post.filter(|post| *post != pre) {
                        info!(
                            target: "retune",
                            parameter = %item.name,
                            value = %post,
                            "parameter \"{}\" changed to \"{}\"",
                            item.name,
                            post
                        );
                        changed.push(ReloadChange {
                            name: item.name.clone(),
                            value: post,
                        });
                    }
                }
            }
            Ok(false) => {}
            Err(error) => {
                // The dry run vetted this exact list; a commit-time
                // failure is unexpected. Skip the item, keep going.
                warn!(
                    target: "retune",
                    parameter = %item.name,
                    error = %error,
                    "could not apply validated parameter"
                );
            }
        }
    }
    (applied, changed)
}

fn fail(error: ConfError, context: SettingContext, role: ProcessRole) -> ConfError {
    if context == SettingContext::Reload {
        match role {
            ProcessRole::Primary => info!(
                target: "retune",
                error = %error,
                "configuration file contains errors; no changes were applied"
            ),
            ProcessRole::Worker => debug!(
                target: "retune",
                error = %error,
                "configuration file contains errors; no changes were applied"
            ),
        }
    }
    error
}

fn fail_at(
    error: ConfError,
    item: &ConfigItem,
    context: SettingContext,
    role: ProcessRole,
) -> ConfError {
    if context == SettingContext::Reload {
        match role {
            ProcessRole::Primary => info!(
                target: "retune",
                file = %item.file.display(),
                line = item.line,
                error = %error,
                "configuration file contains errors; no changes were applied"
            ),
            ProcessRole::Worker => debug!(
                target: "retune",
                file = %item.file.display(),
                line = item.line,
                error = %error,
                "configuration file contains errors; no changes were applied"
            ),
        }
    }
    error
}

fn log_at_role(role: ProcessRole, message: &str) {
    match role {
        ProcessRole::Primary => info!(target: "retune", "{message}"),
        ProcessRole::Worker => debug!(target: "retune", "{message}"),
    }
}
