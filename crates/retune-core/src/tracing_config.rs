//! Tracing conventions for the retune configuration subsystem.
//!
//! The library emits `tracing` spans and events but never installs a
//! subscriber; the host process brings its own. This module pins down the
//! target prefix, span names, and structured field names so that operators
//! and tests can match on them reliably.
//!
//! ```text
//! RUST_LOG=retune=debug
//! ```

use tracing::Level;

/// Target prefix used by all retune tracing spans and events.
pub const TARGET_PREFIX: &str = "retune";

/// Standard tracing span names used across the subsystem.
pub mod span_names {
    /// Parsing one configuration file (root or included).
    pub const PARSE: &str = "retune::parse";
    /// One full reload attempt, boot or signal-triggered.
    pub const RELOAD: &str = "retune::reload";
    /// The validation dry run over the assignment list.
    pub const VALIDATE: &str = "retune::validate";
    /// The commit pass over the assignment list.
    pub const APPLY: &str = "retune::apply";
}

/// Standard structured field names used in tracing events.
pub mod field_names {
    pub const FILE: &str = "file";
    pub const LINE: &str = "line";
    pub const PARAMETER: &str = "parameter";
    pub const VALUE: &str = "value";
    pub const SOURCE: &str = "source";
    pub const CONTEXT: &str = "context";
    pub const DEPTH: &str = "depth";
    pub const APPLIED_COUNT: &str = "applied_count";
}

/// Level names accepted by [`parse_level`], most verbose first.
const LEVEL_NAMES: [(&str, Level); 5] = [
    ("trace", Level::TRACE),
    ("debug", Level::DEBUG),
    ("info", Level::INFO),
    ("warn", Level::WARN),
    ("error", Level::ERROR),
];

/// Parse a log level name (case-insensitive, surrounding whitespace
/// ignored). Returns `None` for anything not in [`LEVEL_NAMES`].
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    let wanted = s.trim();
    LEVEL_NAMES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|&(_, level)| level)
}

/// The `tracing::Level` the subsystem should run at: the value of
/// `RETUNE_LOG_LEVEL` when it is set and parses, `default` otherwise.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    match std::env::var("RETUNE_LOG_LEVEL") {
        Ok(raw) => parse_level(&raw).unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_prefix_is_retune() {
        assert_eq!(TARGET_PREFIX, "retune");
    }

    #[test]
    fn span_names_share_the_prefix() {
        assert!(span_names::PARSE.starts_with("retune::"));
        assert!(span_names::RELOAD.starts_with("retune::"));
        assert!(span_names::VALIDATE.starts_with("retune::"));
        assert!(span_names::APPLY.starts_with("retune::"));
    }

    #[test]
    fn parse_level_recognizes_valid_levels() {
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level("ERROR"), Some(Level::ERROR));
    }

    #[test]
    fn parse_level_returns_none_for_invalid() {
        assert_eq!(parse_level("loud"), None);
        assert_eq!(parse_level(""), None);
    }
}
