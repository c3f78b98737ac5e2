//! One tunable setting: typed value storage, hooks, and provenance.

use std::path::{Path, PathBuf};

use retune_core::{ChangeClass, ConfError, ConfResult, Source};
use serde::Serialize;

/// Validates (and may canonicalize in place) a proposed value before it is
/// parsed and applied.
pub type CheckHook = fn(&mut String) -> Result<(), String>;

/// Observes a committed value change.
pub type AssignHook = fn(name: &str, value: &str);

/// Produces a runtime-computed default, re-read on reload.
pub type DynamicDefault = fn() -> String;

/// Base unit an integer setting is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    KiloBytes,
    Milliseconds,
    Seconds,
}

impl Unit {
    /// Convert `value` carrying `suffix` into this base unit.
    fn convert(self, value: i64, suffix: &str) -> Result<i64, String> {
        let factor = match self {
            Self::KiloBytes => match suffix {
                "kB" => 1,
                "MB" => 1024,
                "GB" => 1024 * 1024,
                "TB" => 1024 * 1024 * 1024,
                _ => return Err(format!("invalid unit \"{suffix}\" ({})", self.hint())),
            },
            Self::Milliseconds | Self::Seconds => {
                let to_ms: i64 = match suffix {
                    "ms" => 1,
                    "s" => 1000,
                    "min" => 60 * 1000,
                    "h" => 60 * 60 * 1000,
                    "d" => 24 * 60 * 60 * 1000,
                    _ => return Err(format!("invalid unit \"{suffix}\" ({})", self.hint())),
                };
                if self == Self::Milliseconds {
                    to_ms
                } else {
                    // Base is seconds: go through milliseconds and round.
                    let ms = value.saturating_mul(to_ms);
                    return Ok((ms + ms.signum() * 500) / 1000);
                }
            }
        };
        Ok(value.saturating_mul(factor))
    }

    fn hint(self) -> &'static str {
        match self {
            Self::KiloBytes => "valid units are \"kB\", \"MB\", \"GB\", and \"TB\"",
            Self::Milliseconds | Self::Seconds => {
                "valid units are \"ms\", \"s\", \"min\", \"h\", and \"d\""
            }
        }
    }

    /// Render a base-unit value with the largest unit that divides it.
    fn display(self, value: i64) -> String {
        if value <= 0 {
            return value.to_string();
        }
        let table: &[(i64, &str)] = match self {
            Self::KiloBytes => &[
                (1024 * 1024 * 1024, "TB"),
                (1024 * 1024, "GB"),
                (1024, "MB"),
                (1, "kB"),
            ],
            Self::Milliseconds => &[
                (24 * 60 * 60 * 1000, "d"),
                (60 * 60 * 1000, "h"),
                (60 * 1000, "min"),
                (1000, "s"),
                (1, "ms"),
            ],
            Self::Seconds => &[
                (24 * 60 * 60, "d"),
                (60 * 60, "h"),
                (60, "min"),
                (1, "s"),
            ],
        };
        for &(factor, suffix) in table {
            if value % factor == 0 {
                return format!("{}{suffix}", value / factor);
            }
        }
        value.to_string()
    }
}

/// A value parsed and validated against a setting's kind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Parsed {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    Enum(&'static str),
}

/// Typed storage for a setting: current, boot-default, and reset values.
#[derive(Debug, Clone)]
pub enum SettingValue {
    Bool {
        current: bool,
        boot: bool,
        reset: bool,
    },
    Int {
        current: i64,
        boot: i64,
        reset: i64,
        min: i64,
        max: i64,
        unit: Option<Unit>,
    },
    Real {
        current: f64,
        boot: f64,
        reset: f64,
        min: f64,
        max: f64,
    },
    Str {
        current: String,
        boot: String,
        reset: String,
    },
    Enum {
        current: &'static str,
        boot: &'static str,
        reset: &'static str,
        options: &'static [&'static str],
    },
}

/// Accept unambiguous case-insensitive prefixes of the usual boolean
/// spellings, plus literal `1` / `0`.
fn parse_bool(raw: &str) -> Option<bool> {
    let lower = raw.to_ascii_lowercase();
    let s = lower.as_str();
    if s.is_empty() {
        return None;
    }
    if "true".starts_with(s) || "yes".starts_with(s) {
        return Some(true);
    }
    if "false".starts_with(s) || "no".starts_with(s) {
        return Some(false);
    }
    match s {
        "on" => Some(true),
        "of" | "off" => Some(false),
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Split an integer literal into its numeric part and unit suffix, honoring
/// the hex form (where letters belong to the number, not the unit).
fn split_int_literal(s: &str) -> (&str, &str) {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let offset = s.len() - unsigned.len();
    let digits = if unsigned.len() > 2 && (unsigned.starts_with("0x") || unsigned.starts_with("0X"))
    {
        2 + unsigned[2..]
            .bytes()
            .take_while(u8::is_ascii_hexdigit)
            .count()
    } else {
        unsigned.bytes().take_while(u8::is_ascii_digit).count()
    };
    s.split_at(offset + digits)
}

fn parse_int(raw: &str) -> Result<(i64, &str), ()> {
    let trimmed = raw.trim();
    let (number, suffix) = split_int_literal(trimmed);
    let unsigned = number.strip_prefix(['+', '-']).unwrap_or(number);
    let value = if unsigned.len() > 2 && (unsigned.starts_with("0x") || unsigned.starts_with("0X"))
    {
        i64::from_str_radix(&unsigned[2..], 16).map_err(|_| ())?
    } else {
        unsigned.parse::<i64>().map_err(|_| ())?
    };
    let value = if number.starts_with('-') { -value } else { value };
    Ok((value, suffix.trim()))
}

impl SettingValue {
    /// Kind label used in messages and snapshots.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool { .. } => "boolean",
            Self::Int { .. } => "integer",
            Self::Real { .. } => "real",
            Self::Str { .. } => "string",
            Self::Enum { .. } => "enum",
        }
    }

    /// Parse and range-check a proposed value without touching storage.
    pub(crate) fn validate(&self, name: &str, raw: &str) -> ConfResult<Parsed> {
        let invalid = |reason: String| ConfError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
            reason,
        };
        match self {
            Self::Bool { .. } => parse_bool(raw)
                .map(Parsed::Bool)
                .ok_or_else(|| invalid("requires a Boolean value".into())),
            Self::Int { min, max, unit, .. } => {
                let (value, suffix) =
                    parse_int(raw).map_err(|()| invalid("requires an integer value".into()))?;
                let value = if suffix.is_empty() {
                    value
                } else {
                    let unit =
                        (*unit).ok_or_else(|| invalid(format!("invalid unit \"{suffix}\"")))?;
                    unit.convert(value, suffix).map_err(invalid)?
                };
                if value < *min || value > *max {
                    return Err(invalid(format!(
                        "{value} is outside the valid range ({min} .. {max})"
                    )));
                }
                Ok(Parsed::Int(value))
            }
            Self::Real { min, max, .. } => {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| invalid("requires a numeric value".into()))?;
                if value < *min || value > *max {
                    return Err(invalid(format!(
                        "{value} is outside the valid range ({min} .. {max})"
                    )));
                }
                Ok(Parsed::Real(value))
            }
            Self::Str { .. } => Ok(Parsed::Str(raw.to_string())),
            Self::Enum { options, .. } => options
                .iter()
                .copied()
                .find(|option| option.eq_ignore_ascii_case(raw))
                .map(Parsed::Enum)
                .ok_or_else(|| {
                    invalid(format!("available values: {}", options.join(", ")))
                }),
        }
    }

    pub(crate) fn boot_parsed(&self) -> Parsed {
        match self {
            Self::Bool { boot, .. } => Parsed::Bool(*boot),
            Self::Int { boot, .. } => Parsed::Int(*boot),
            Self::Real { boot, .. } => Parsed::Real(*boot),
            Self::Str { boot, .. } => Parsed::Str(boot.clone()),
            Self::Enum { boot, .. } => Parsed::Enum(*boot),
        }
    }

    pub(crate) fn current_equals(&self, parsed: &Parsed) -> bool {
        match (self, parsed) {
            (Self::Bool { current, .. }, Parsed::Bool(v)) => current == v,
            (Self::Int { current, .. }, Parsed::Int(v)) => current == v,
            (Self::Real { current, .. }, Parsed::Real(v)) => current == v,
            (Self::Str { current, .. }, Parsed::Str(v)) => current == v,
            (Self::Enum { current, .. }, Parsed::Enum(v)) => current == v,
            _ => false,
        }
    }

    pub(crate) fn assign(&mut self, parsed: &Parsed) {
        match (self, parsed) {
            (Self::Bool { current, .. }, Parsed::Bool(v)) => *current = *v,
            (Self::Int { current, .. }, Parsed::Int(v)) => *current = *v,
            (Self::Real { current, .. }, Parsed::Real(v)) => *current = *v,
            (Self::Str { current, .. }, Parsed::Str(v)) => v.clone_into(current),
            (Self::Enum { current, .. }, Parsed::Enum(v)) => *current = *v,
            _ => {}
        }
    }

    pub(crate) fn assign_reset(&mut self, parsed: &Parsed) {
        match (self, parsed) {
            (Self::Bool { reset, .. }, Parsed::Bool(v)) => *reset = *v,
            (Self::Int { reset, .. }, Parsed::Int(v)) => *reset = *v,
            (Self::Real { reset, .. }, Parsed::Real(v)) => *reset = *v,
            (Self::Str { reset, .. }, Parsed::Str(v)) => v.clone_into(reset),
            (Self::Enum { reset, .. }, Parsed::Enum(v)) => *reset = *v,
            _ => {}
        }
    }

    /// Display form of the current value.
    #[must_use]
    pub fn display_current(&self) -> String {
        match self {
            Self::Bool { current, .. } => bool_label(*current).to_string(),
            Self::Int { current, unit, .. } => int_display(*current, *unit),
            Self::Real { current, .. } => current.to_string(),
            Self::Str { current, .. } => current.clone(),
            Self::Enum { current, .. } => (*current).to_string(),
        }
    }

    /// Display form of the reset value.
    #[must_use]
    pub fn display_reset(&self) -> String {
        match self {
            Self::Bool { reset, .. } => bool_label(*reset).to_string(),
            Self::Int { reset, unit, .. } => int_display(*reset, *unit),
            Self::Real { reset, .. } => reset.to_string(),
            Self::Str { reset, .. } => reset.clone(),
            Self::Enum { reset, .. } => (*reset).to_string(),
        }
    }

    pub(crate) fn display_parsed(&self, parsed: &Parsed) -> String {
        match parsed {
            Parsed::Bool(v) => bool_label(*v).to_string(),
            Parsed::Int(v) => {
                let unit = match self {
                    Self::Int { unit, .. } => *unit,
                    _ => None,
                };
                int_display(*v, unit)
            }
            Parsed::Real(v) => v.to_string(),
            Parsed::Str(v) => v.clone(),
            Parsed::Enum(v) => (*v).to_string(),
        }
    }
}

const fn bool_label(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn int_display(value: i64, unit: Option<Unit>) -> String {
    match unit {
        Some(unit) => unit.display(value),
        None => value.to_string(),
    }
}

/// A value saved on a setting's stack, carrying its own provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedValue {
    pub value: String,
    pub source: Source,
}

/// One registered tunable parameter.
#[derive(Debug, Clone)]
pub struct Setting {
    name: String,
    description: String,
    change_class: ChangeClass,
    value: SettingValue,
    source: Source,
    reset_source: Source,
    in_file: bool,
    stack: Vec<StackedValue>,
    check: Option<CheckHook>,
    assign: Option<AssignHook>,
    dynamic_default: Option<DynamicDefault>,
    sourcefile: Option<(PathBuf, u32)>,
    placeholder: bool,
}

impl Setting {
    fn new(
        name: &str,
        description: &str,
        change_class: ChangeClass,
        value: SettingValue,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            change_class,
            value,
            source: Source::Default,
            reset_source: Source::Default,
            in_file: false,
            stack: Vec::new(),
            check: None,
            assign: None,
            dynamic_default: None,
            sourcefile: None,
            placeholder: false,
        }
    }

    #[must_use]
    pub fn bool(name: &str, description: &str, change_class: ChangeClass, boot: bool) -> Self {
        Self::new(
            name,
            description,
            change_class,
            SettingValue::Bool {
                current: boot,
                boot,
                reset: boot,
            },
        )
    }

    #[must_use]
    pub fn int(
        name: &str,
        description: &str,
        change_class: ChangeClass,
        boot: i64,
        min: i64,
        max: i64,
    ) -> Self {
        Self::new(
            name,
            description,
            change_class,
            SettingValue::Int {
                current: boot,
                boot,
                reset: boot,
                min,
                max,
                unit: None,
            },
        )
    }

    #[must_use]
    pub fn real(
        name: &str,
        description: &str,
        change_class: ChangeClass,
        boot: f64,
        min: f64,
        max: f64,
    ) -> Self {
        Self::new(
            name,
            description,
            change_class,
            SettingValue::Real {
                current: boot,
                boot,
                reset: boot,
                min,
                max,
            },
        )
    }

    #[must_use]
    pub fn string(name: &str, description: &str, change_class: ChangeClass, boot: &str) -> Self {
        Self::new(
            name,
            description,
            change_class,
            SettingValue::Str {
                current: boot.to_string(),
                boot: boot.to_string(),
                reset: boot.to_string(),
            },
        )
    }

    #[must_use]
    pub fn enumerated(
        name: &str,
        description: &str,
        change_class: ChangeClass,
        boot: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        debug_assert!(options.contains(&boot));
        Self::new(
            name,
            description,
            change_class,
            SettingValue::Enum {
                current: boot,
                boot,
                reset: boot,
                options,
            },
        )
    }

    /// String placeholder created at commit time for a whitelisted
    /// qualified name no module has registered yet.
    #[must_use]
    pub(crate) fn custom_placeholder(name: &str) -> Self {
        let mut setting = Self::string(
            name,
            "configuration file placeholder",
            ChangeClass::RuntimeByAny,
            "",
        );
        setting.placeholder = true;
        setting
    }

    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        if let SettingValue::Int { unit: slot, .. } = &mut self.value {
            *slot = Some(unit);
        }
        self
    }

    #[must_use]
    pub fn with_check(mut self, hook: CheckHook) -> Self {
        self.check = Some(hook);
        self
    }

    #[must_use]
    pub fn with_assign(mut self, hook: AssignHook) -> Self {
        self.assign = Some(hook);
        self
    }

    #[must_use]
    pub fn with_dynamic_default(mut self, hook: DynamicDefault) -> Self {
        self.dynamic_default = Some(hook);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub const fn change_class(&self) -> ChangeClass {
        self.change_class
    }

    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    #[must_use]
    pub const fn reset_source(&self) -> Source {
        self.reset_source
    }

    #[must_use]
    pub const fn in_file(&self) -> bool {
        self.in_file
    }

    #[must_use]
    pub fn stack(&self) -> &[StackedValue] {
        &self.stack
    }

    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    #[must_use]
    pub fn sourcefile(&self) -> Option<(&Path, u32)> {
        self.sourcefile
            .as_ref()
            .map(|(path, line)| (path.as_path(), *line))
    }

    #[must_use]
    pub const fn value(&self) -> &SettingValue {
        &self.value
    }

    /// Push the current value onto the stack (a client-side save point).
    pub fn push_value(&mut self) {
        self.stack.push(StackedValue {
            value: self.value.display_current(),
            source: self.source,
        });
    }

    pub(crate) fn set_in_file(&mut self, flag: bool) {
        self.in_file = flag;
    }

    pub(crate) fn set_sourcefile(&mut self, file: &Path, line: u32) {
        self.sourcefile = Some((file.to_path_buf(), line));
    }

    pub(crate) const fn check_hook(&self) -> Option<CheckHook> {
        self.check
    }

    pub(crate) const fn assign_hook(&self) -> Option<AssignHook> {
        self.assign
    }

    pub(crate) const fn dynamic_default_hook(&self) -> Option<DynamicDefault> {
        self.dynamic_default
    }

    pub(crate) fn value_mut(&mut self) -> &mut SettingValue {
        &mut self.value
    }

    pub(crate) fn set_source(&mut self, source: Source) {
        self.source = source;
    }

    pub(crate) fn set_reset_source(&mut self, source: Source) {
        self.reset_source = source;
    }

    pub(crate) fn stack_mut(&mut self) -> &mut Vec<StackedValue> {
        &mut self.stack
    }
}

/// Serializable view of one setting's observable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingSnapshot {
    pub name: String,
    pub kind: &'static str,
    pub value: String,
    pub source: Source,
    pub reset_source: Source,
    pub change_class: ChangeClass,
    pub sourcefile: Option<(PathBuf, u32)>,
    pub stack: Vec<StackedValue>,
}

impl Setting {
    /// Observable state of this setting, for reports and tests.
    #[must_use]
    pub fn snapshot(&self) -> SettingSnapshot {
        SettingSnapshot {
            name: self.name.clone(),
            kind: self.value.kind_name(),
            value: self.value.display_current(),
            source: self.source,
            reset_source: self.reset_source,
            change_class: self.change_class,
            sourcefile: self.sourcefile.clone(),
            stack: self.stack.clone(),
        }
    }
}
