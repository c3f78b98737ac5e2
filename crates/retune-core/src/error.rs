use std::path::PathBuf;

/// Unified error type covering every failure mode of the configuration
/// subsystem: lexing/parsing, file access, include nesting, and the
/// semantic checks run against the setting registry.
///
/// The reload engine decides severity, not this type: at boot every variant
/// except [`ConfError::CannotChangeNow`] is fatal, while on reload the engine
/// demotes all of them to log events and aborts the reload with the registry
/// untouched. `CannotChangeNow` is always a per-setting warning.
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    // === Parse errors ===
    /// A token appeared where the grammar did not allow it.
    #[error("syntax error in file \"{file}\" line {line}, near token \"{token}\"")]
    SyntaxNear {
        /// File being parsed.
        file: PathBuf,
        /// 1-based line the token was found on.
        line: u32,
        /// Text of the offending token.
        token: String,
    },

    /// A line ended before the grammar was satisfied.
    #[error("syntax error in file \"{file}\" line {line}, near end of line")]
    SyntaxEol {
        /// File being parsed.
        file: PathBuf,
        /// 1-based line that ended early.
        line: u32,
    },

    /// A configuration file (root or included) could not be opened or read.
    #[error("could not open configuration file \"{path}\": {source}")]
    FileAccess {
        /// Path that failed to open.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// An `include` chain went deeper than the allowed bound.
    #[error(
        "could not open configuration file \"{path}\": maximum nesting depth exceeded ({depth})"
    )]
    NestingTooDeep {
        /// The file whose open was refused.
        path: PathBuf,
        /// Depth at which the open was attempted.
        depth: usize,
    },

    // === Registry errors ===
    /// A bare name matched no registered setting.
    #[error("unrecognized configuration parameter \"{name}\"")]
    UnknownParameter {
        /// The unmatched name.
        name: String,
    },

    /// A qualified name used a class prefix absent from the effective
    /// class whitelist.
    #[error(
        "unrecognized configuration parameter \"{name}\": class \"{class}\" is not listed in custom_variable_classes"
    )]
    UnknownClass {
        /// The full qualified name.
        name: String,
        /// Its class prefix.
        class: String,
    },

    /// A check hook or typed parse rejected the proposed value.
    #[error("invalid value for parameter \"{name}\": \"{value}\": {reason}")]
    InvalidValue {
        /// Setting the value was proposed for.
        name: String,
        /// The rejected value, as written in the file.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The setting can never be assigned from a configuration file.
    #[error("parameter \"{name}\" cannot be changed")]
    ReadOnly {
        /// The internal setting.
        name: String,
    },

    /// The setting is only settable at server start; emitted as a warning,
    /// never an abort.
    #[error("parameter \"{name}\" cannot be changed without restarting the server")]
    CannotChangeNow {
        /// The startup-only setting.
        name: String,
    },

    // === I/O errors ===
    /// Wraps `std::io::Error` where no file path context is available.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the retune crate hierarchy.
pub type ConfResult<T> = Result<T, ConfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfError>();
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let conf_err: ConfError = io_err.into();
        assert!(matches!(conf_err, ConfError::Io(_)));
        assert!(conf_err.to_string().contains("gone"));
    }

    #[test]
    fn syntax_messages_cite_file_and_line() {
        let err = ConfError::SyntaxNear {
            file: PathBuf::from("/data/server.conf"),
            line: 12,
            token: "=".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("server.conf"));
        assert!(msg.contains("line 12"));
        assert!(msg.contains("\"=\""));

        let err = ConfError::SyntaxEol {
            file: PathBuf::from("/data/server.conf"),
            line: 3,
        };
        assert!(err.to_string().contains("near end of line"));
    }

    #[test]
    fn restart_warning_names_the_parameter() {
        let err = ConfError::CannotChangeNow {
            name: "max_connections".into(),
        };
        assert_eq!(
            err.to_string(),
            "parameter \"max_connections\" cannot be changed without restarting the server"
        );
    }

    #[test]
    fn unknown_class_suggests_the_whitelist() {
        let err = ConfError::UnknownClass {
            name: "myapp.flag".into(),
            class: "myapp".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("myapp.flag"));
        assert!(msg.contains("custom_variable_classes"));
    }
}
