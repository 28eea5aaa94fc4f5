//! Structural rules over option names, and the two composition strategies.

use crate::reports::{ForceCode, ReportItem, ReportMessage, Severity};

use super::{OptionMap, Validate, ValidationContext};

fn to_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

// ── NamesIn ─────────────────────────────────────────────────────────────────

/// Every option name must come from the allowed set. One batched item names
/// all offenders at once.
pub struct NamesIn {
    allowed: Vec<String>,
    banned: Vec<String>,
    option_type: String,
    force_code: Option<ForceCode>,
}

impl NamesIn {
    pub fn new<I, S>(allowed: I, option_type: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed = to_names(allowed);
        allowed.sort();
        Self {
            allowed,
            banned: Vec::new(),
            option_type: option_type.to_string(),
            force_code: None,
        }
    }

    /// Names that are rejected even though they appear in the allowed set.
    /// Banned names are also left out of the "allowed options are" wording.
    pub fn banned<I, S>(mut self, banned: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.banned = to_names(banned);
        self
    }

    pub fn forceable(mut self, code: ForceCode) -> Self {
        self.force_code = Some(code);
        self
    }
}

impl Validate for NamesIn {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        // Map keys are already in name order.
        let offenders: Vec<String> = options
            .keys()
            .filter(|name| !self.allowed.contains(name) || self.banned.contains(name))
            .cloned()
            .collect();
        if offenders.is_empty() {
            return Vec::new();
        }
        let advertised: Vec<String> = self
            .allowed
            .iter()
            .filter(|name| !self.banned.contains(name))
            .cloned()
            .collect();
        vec![ctx.localize(ReportItem::new(
            Severity::Error,
            self.force_code,
            ReportMessage::InvalidOptions {
                option_names: offenders,
                allowed: advertised,
                option_type: self.option_type.clone(),
            },
        ))]
    }
}

// ── Required options ────────────────────────────────────────────────────────

/// Every listed name must be present. Missing names are reported in one
/// batched item, sorted.
pub struct IsRequiredAll {
    required: Vec<String>,
    option_type: String,
}

impl IsRequiredAll {
    pub fn new<I, S>(required: I, option_type: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut required = to_names(required);
        required.sort();
        Self {
            required,
            option_type: option_type.to_string(),
        }
    }
}

impl Validate for IsRequiredAll {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| !options.contains_key(*name))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Vec::new();
        }
        vec![ctx.localize(ReportItem::error(ReportMessage::RequiredOptionsMissing {
            option_names: missing,
            option_type: self.option_type.clone(),
        }))]
    }
}

/// At least one of the listed names must be present.
pub struct IsRequiredSome {
    alternatives: Vec<String>,
    option_type: String,
}

impl IsRequiredSome {
    pub fn new<I, S>(alternatives: I, option_type: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut alternatives = to_names(alternatives);
        alternatives.sort();
        Self {
            alternatives,
            option_type: option_type.to_string(),
        }
    }
}

impl Validate for IsRequiredSome {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        if self
            .alternatives
            .iter()
            .any(|name| options.contains_key(name))
        {
            return Vec::new();
        }
        vec![ctx.localize(ReportItem::error(
            ReportMessage::RequiredOptionOfAlternativesMissing {
                option_names: self.alternatives.clone(),
                option_type: self.option_type.clone(),
            },
        ))]
    }
}

// ── Relations between options ───────────────────────────────────────────────

// Relation rules look at effective assignments: an option being removed
// (empty value) cannot conflict with or depend on anything.
fn is_set(options: &OptionMap, name: &str) -> bool {
    options.get(name).is_some_and(|pair| !pair.is_removal())
}

/// At most one of the listed names may be set to a value. The report names
/// every set member of the group, so the caller sees the whole conflict.
pub struct MutuallyExclusive {
    group: Vec<String>,
    option_type: String,
}

impl MutuallyExclusive {
    pub fn new<I, S>(group: I, option_type: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut group = to_names(group);
        group.sort();
        Self {
            group,
            option_type: option_type.to_string(),
        }
    }
}

impl Validate for MutuallyExclusive {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        let present: Vec<String> = self
            .group
            .iter()
            .filter(|name| is_set(options, name))
            .cloned()
            .collect();
        if present.len() <= 1 {
            return Vec::new();
        }
        vec![ctx.localize(ReportItem::error(
            ReportMessage::MutuallyExclusiveOptions {
                option_names: present,
                option_type: self.option_type.clone(),
            },
        ))]
    }
}

/// Each dependent may only be set when `prerequisite` is set too. One
/// report per violating dependent, in name order.
pub struct DependsOnOption {
    dependents: Vec<String>,
    prerequisite: String,
    option_type: String,
}

impl DependsOnOption {
    pub fn new<I, S>(dependents: I, prerequisite: &str, option_type: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dependents = to_names(dependents);
        dependents.sort();
        Self {
            dependents,
            prerequisite: prerequisite.to_string(),
            option_type: option_type.to_string(),
        }
    }
}

impl Validate for DependsOnOption {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        if is_set(options, &self.prerequisite) {
            return Vec::new();
        }
        self.dependents
            .iter()
            .filter(|name| is_set(options, name))
            .map(|name| {
                ctx.localize(ReportItem::error(
                    ReportMessage::PrerequisiteOptionMissing {
                        option_name: name.clone(),
                        prerequisite: self.prerequisite.clone(),
                        option_type: self.option_type.clone(),
                    },
                ))
            })
            .collect()
    }
}

// ── Composition ─────────────────────────────────────────────────────────────

/// Run every rule, keep every item.
pub struct ValidatorAll {
    rules: Vec<Box<dyn Validate>>,
}

impl ValidatorAll {
    pub fn new(rules: Vec<Box<dyn Validate>>) -> Self {
        Self { rules }
    }
}

impl Validate for ValidatorAll {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        self.rules
            .iter()
            .flat_map(|rule| rule.validate(options, ctx))
            .collect()
    }
}

/// Run the rules in order, but let only the first error through; later
/// errors are redundant detail once the first is fixed. Non-error items
/// always pass.
pub struct ValidatorFirstError {
    rules: Vec<Box<dyn Validate>>,
}

impl ValidatorFirstError {
    pub fn new(rules: Vec<Box<dyn Validate>>) -> Self {
        Self { rules }
    }
}

impl Validate for ValidatorFirstError {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem> {
        let mut out = Vec::new();
        let mut error_seen = false;
        for rule in &self.rules {
            for item in rule.validate(options, ctx) {
                if item.severity == Severity::Error {
                    if !error_seen {
                        error_seen = true;
                        out.push(item);
                    }
                } else {
                    out.push(item);
                }
            }
        }
        out
    }
}
