use serde::{Deserialize, Serialize};

/// Name of the distinguished setting whose value lists the class prefixes
/// permitted for qualified setting names.
pub const WHITELIST_SETTING: &str = "custom_variable_classes";

/// Provenance of a setting's effective value, totally ordered by trust.
///
/// Declaration order is the trust order: a value may only be replaced by a
/// value from an equal or higher source. `Default` is the boot-time wired-in
/// value; `Client` is the most trusted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Wired-in boot default.
    Default,
    /// Default computed at runtime (e.g. derived from another subsystem).
    DynamicDefault,
    /// Taken from an environment variable.
    Environment,
    /// Read from the configuration file.
    File,
    /// Supplied on the server command line.
    Argv,
    /// Set by a connected client.
    Client,
}

impl Source {
    /// Lowercase label used in log events and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::DynamicDefault => "dynamic_default",
            Self::Environment => "environment",
            Self::File => "file",
            Self::Argv => "argv",
            Self::Client => "client",
        }
    }
}

/// Which configuration pass is running.
///
/// The context picks the severity policy (boot errors are fatal, reload
/// errors are demoted to log events) and whether derived defaults are
/// re-seeded after removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingContext {
    /// Initial load during process startup.
    Boot,
    /// Re-read triggered by a reload signal.
    Reload,
}

/// Per-setting policy stating in which contexts a change is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClass {
    /// Computed by the server; never assignable from configuration.
    Internal,
    /// Settable only while the process is starting.
    OnlyAtBoot,
    /// Settable at boot or on a reload signal.
    BySignalOrBoot,
    /// Settable in any context, including by clients at runtime.
    RuntimeByAny,
}

impl ChangeClass {
    /// Whether a value change is legal in the given context.
    #[must_use]
    pub const fn changeable_in(self, context: SettingContext) -> bool {
        match self {
            Self::Internal => false,
            Self::OnlyAtBoot => matches!(context, SettingContext::Boot),
            Self::BySignalOrBoot | Self::RuntimeByAny => true,
        }
    }
}

/// Role of the process running the reload engine.
///
/// On reload the primary process logs outcomes at the operator-visible
/// level while workers demote the same events to debug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    /// The supervising server process.
    Primary,
    /// A child/worker process re-reading the file after a signal.
    Worker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_trust_order_matches_declaration() {
        assert!(Source::Default < Source::DynamicDefault);
        assert!(Source::DynamicDefault < Source::Environment);
        assert!(Source::Environment < Source::File);
        assert!(Source::File < Source::Argv);
        assert!(Source::Argv < Source::Client);
    }

    #[test]
    fn change_class_gates_by_context() {
        assert!(ChangeClass::OnlyAtBoot.changeable_in(SettingContext::Boot));
        assert!(!ChangeClass::OnlyAtBoot.changeable_in(SettingContext::Reload));
        assert!(ChangeClass::BySignalOrBoot.changeable_in(SettingContext::Reload));
        assert!(ChangeClass::RuntimeByAny.changeable_in(SettingContext::Reload));
        assert!(!ChangeClass::Internal.changeable_in(SettingContext::Boot));
        assert!(!ChangeClass::Internal.changeable_in(SettingContext::Reload));
    }

    #[test]
    fn source_labels_are_stable() {
        assert_eq!(Source::File.label(), "file");
        assert_eq!(Source::Default.label(), "default");
        assert_eq!(Source::DynamicDefault.label(), "dynamic_default");
    }

    #[test]
    fn serde_round_trip_uses_snake_case() {
        let json = serde_json::to_string(&Source::DynamicDefault).expect("serialize");
        assert_eq!(json, "\"dynamic_default\"");
        let back: Source = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Source::DynamicDefault);
    }
}
