//! Single-option value rules.
//!
//! All of these share the same frame: absent options are silently fine
//! (presence is [`IsRequiredAll`]'s business), and empty values are fine by
//! default because an empty value means "remove the option". Reports always
//! quote the value as the caller typed it, not the normalized form.
//!
//! [`IsRequiredAll`]: super::IsRequiredAll

use crate::reports::{AllowedValues, ForceCode, ReportItem, ReportMessage, Severity};

use super::{OptionMap, Validate, ValidationContext};

const TRUE_VALUES: &[&str] = &["1", "on", "true", "y", "yes"];
const FALSE_VALUES: &[&str] = &["0", "off", "false", "n", "no"];

/// Map an accepted boolean spelling to the canonical "1"/"0" written into
/// the cluster configuration. `None` when the value is not a boolean.
pub fn canonical_boolean(value: &str) -> Option<&'static str> {
    let lowered = value.to_lowercase();
    if TRUE_VALUES.contains(&lowered.as_str()) {
        Some("1")
    } else if FALSE_VALUES.contains(&lowered.as_str()) {
        Some("0")
    } else {
        None
    }
}

// Shared plumbing: look the option up, apply the empty-value policy, run the
// predicate, build the violation item.
struct ValueRule {
    key: String,
    force_code: Option<ForceCode>,
    allow_empty: bool,
}

impl ValueRule {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            force_code: None,
            allow_empty: true,
        }
    }

    fn check<F>(
        &self,
        options: &OptionMap,
        ctx: &ValidationContext,
        valid: F,
        allowed: AllowedValues,
    ) -> Vec<ReportItem>
    where
        F: Fn(&str) -> bool,
    {
        let Some(pair) = options.get(&self.key) else {
            return Vec::new();
        };
        if pair.is_removal() && self.allow_empty {
            return Vec::new();
        }
        if valid(pair.normalized()) {
            return Vec::new();
        }
        vec![ctx.localize(ReportItem::new(
            Severity::Error,
            self.force_code,
            ReportMessage::InvalidOptionValue {
                option_name: self.key.clone(),
                option_value: pair.original().to_string(),
                allowed,
            },
        ))]
    }
}

macro_rules! builder_methods {
    () => {
        /// Let the caller downgrade violations by activating `code`.
        pub fn forceable(mut self, code: ForceCode) -> Self {
            self.rule.force_code = Some(code);
            self
        }

        /// Treat an empty value as a violation instead of a removal.
        pub fn forbid_empty(mut self) -> Self {
            self.rule.allow_empty = false;
            self
        }
    };
}

// ── Concrete rules ──────────────────────────────────────────────────────────

/// Value must come from a closed list.
pub struct ValueIn {
    rule: ValueRule,
    allowed: Vec<String>,
}

impl ValueIn {
    pub fn new<I, S>(key: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rule: ValueRule::new(key),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    builder_methods!();
}

impl Validate for ValueIn {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        self.rule.check(
            options,
            ctx,
            |value| self.allowed.iter().any(|allowed| allowed == value),
            AllowedValues::list(self.allowed.clone()),
        )
    }
}

/// Value must be one of the accepted boolean spellings, case-insensitive.
pub struct ValueBoolean {
    rule: ValueRule,
}

impl ValueBoolean {
    pub fn new(key: &str) -> Self {
        Self {
            rule: ValueRule::new(key),
        }
    }

    builder_methods!();
}

impl Validate for ValueBoolean {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        self.rule.check(
            options,
            ctx,
            |value| canonical_boolean(value).is_some(),
            AllowedValues::shape("a boolean value (yes/no, on/off, 1/0, true/false)"),
        )
    }
}

/// Value must parse as an integer within the inclusive range.
pub struct ValueIntegerInRange {
    rule: ValueRule,
    min: i64,
    max: i64,
}

impl ValueIntegerInRange {
    pub fn new(key: &str, min: i64, max: i64) -> Self {
        Self {
            rule: ValueRule::new(key),
            min,
            max,
        }
    }

    builder_methods!();
}

impl Validate for ValueIntegerInRange {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        self.rule.check(
            options,
            ctx,
            |value| {
                value
                    .parse::<i64>()
                    .map(|n| n >= self.min && n <= self.max)
                    .unwrap_or(false)
            },
            AllowedValues::shape(format!("an integer between {} and {}", self.min, self.max)),
        )
    }
}

/// Value must be a usable TCP/UDP port.
pub struct ValuePortNumber {
    rule: ValueRule,
}

impl ValuePortNumber {
    pub fn new(key: &str) -> Self {
        Self {
            rule: ValueRule::new(key),
        }
    }

    builder_methods!();
}

impl Validate for ValuePortNumber {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        self.rule.check(
            options,
            ctx,
            |value| matches!(value.parse::<u16>(), Ok(port) if port >= 1),
            AllowedValues::shape("a port number (1-65535)"),
        )
    }
}

/// Value must be a well-formed identifier: a letter or underscore first,
/// then letters, digits, '_', '-' or '.'.
pub struct ValueId {
    rule: ValueRule,
}

impl ValueId {
    pub fn new(key: &str) -> Self {
        Self {
            rule: ValueRule::new(key),
        }
    }

    builder_methods!();
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl Validate for ValueId {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        self.rule.check(
            options,
            ctx,
            is_identifier,
            AllowedValues::shape("an identifier (letters, digits, '_', '-', '.')"),
        )
    }
}

/// Value must be non-empty. The one rule where an empty value is the
/// violation rather than a removal.
pub struct ValueNotEmpty {
    key: String,
    force_code: Option<ForceCode>,
}

impl ValueNotEmpty {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            force_code: None,
        }
    }

    pub fn forceable(mut self, code: ForceCode) -> Self {
        self.force_code = Some(code);
        self
    }
}

impl Validate for ValueNotEmpty {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        let Some(pair) = options.get(&self.key) else {
            return Vec::new();
        };
        if !pair.is_removal() {
            return Vec::new();
        }
        vec![ctx.localize(ReportItem::new(
            Severity::Error,
            self.force_code,
            ReportMessage::InvalidOptionValue {
                option_name: self.key.clone(),
                option_value: pair.original().to_string(),
                allowed: AllowedValues::shape("a non-empty value"),
            },
        ))]
    }
}
