//! Report items — immutable records of everything an operation wants to say.
//!
//! Validation failures, node communication problems and progress notices all
//! travel through the same type. An item pairs a severity with a structured
//! message, an optional force code (the caller flag that downgrades this
//! particular error) and an optional node context. Items are never mutated
//! in place; forcing an item builds a new one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::messages::ReportMessage;

// ── Severity ────────────────────────────────────────────────────────────────

/// How serious an item is. `Error` is the only severity that blocks an
/// operation from proceeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Force codes ─────────────────────────────────────────────────────────────

/// Caller-supplied override switches. Each forceable error names the single
/// code that downgrades it; an active code never touches errors that carry a
/// different one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForceCode {
    /// The generic `--force` switch for validation errors.
    Force,
    /// `--skip-offline`: tolerate nodes that cannot be reached.
    SkipOffline,
}

/// The set of codes the caller activated for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForceFlags(BTreeSet<ForceCode>);

impl ForceFlags {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: ForceCode) -> bool {
        self.0.contains(&code)
    }

    pub fn insert(&mut self, code: ForceCode) {
        self.0.insert(code);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ForceCode> for ForceFlags {
    fn from_iter<I: IntoIterator<Item = ForceCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Context ─────────────────────────────────────────────────────────────────

/// The sub-target an item is about, for operations that validate per-node
/// input. Distinct from the communication layer's own target bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportContext {
    pub node: String,
}

impl ReportContext {
    pub fn node(label: impl Into<String>) -> Self {
        Self { node: label.into() }
    }
}

// ── ReportItem ──────────────────────────────────────────────────────────────

/// One record produced during an operation.
///
/// Only `Error` items may carry a force code; the fixed-severity constructors
/// make the severity decision explicit at every call site, and [`new`] exists
/// for the few places that decide severity dynamically.
///
/// [`new`]: ReportItem::new
#[derive(Debug, Clone, PartialEq)]
pub struct ReportItem {
    pub severity: Severity,
    pub force_code: Option<ForceCode>,
    pub message: ReportMessage,
    pub context: Option<ReportContext>,
}

impl ReportItem {
    /// Item with an explicit severity and force code. A force code on a
    /// non-error severity has no meaning and is dropped.
    pub fn new(severity: Severity, force_code: Option<ForceCode>, message: ReportMessage) -> Self {
        let force_code = match severity {
            Severity::Error => force_code,
            _ => None,
        };
        Self {
            severity,
            force_code,
            message,
            context: None,
        }
    }

    pub fn error(message: ReportMessage) -> Self {
        Self::new(Severity::Error, None, message)
    }

    /// Error the caller can downgrade by activating `code`.
    pub fn forceable_error(code: ForceCode, message: ReportMessage) -> Self {
        Self::new(Severity::Error, Some(code), message)
    }

    pub fn warning(message: ReportMessage) -> Self {
        Self::new(Severity::Warning, None, message)
    }

    pub fn info(message: ReportMessage) -> Self {
        Self::new(Severity::Info, None, message)
    }

    pub fn debug(message: ReportMessage) -> Self {
        Self::new(Severity::Debug, None, message)
    }

    /// Attach the node this item is about.
    pub fn in_context(mut self, node: impl Into<String>) -> Self {
        self.context = Some(ReportContext::node(node));
        self
    }
}

/// Rewrite one item according to the active force flags.
///
/// An error whose force code is in `flags` becomes a warning with the same
/// message and no remaining force code. Everything else passes through
/// unchanged, so applying the same flags twice is a no-op and forcing can
/// never raise a severity.
pub fn apply_force(item: ReportItem, flags: &ForceFlags) -> ReportItem {
    match item.force_code {
        Some(code) if item.severity == Severity::Error && flags.contains(code) => ReportItem {
            severity: Severity::Warning,
            force_code: None,
            message: item.message,
            context: item.context,
        },
        _ => item,
    }
}

/// [`apply_force`] over a whole batch, preserving order.
pub fn apply_force_all(items: Vec<ReportItem>, flags: &ForceFlags) -> Vec<ReportItem> {
    items
        .into_iter()
        .map(|item| apply_force(item, flags))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::messages::ReportMessage;

    fn restart_required() -> ReportMessage {
        ReportMessage::ClusterRestartRequired
    }

    #[test]
    fn non_error_severities_drop_force_codes() {
        let item = ReportItem::new(
            Severity::Warning,
            Some(ForceCode::Force),
            restart_required(),
        );
        assert_eq!(item.force_code, None);
    }

    #[test]
    fn matching_flag_downgrades_error_to_warning() {
        let flags: ForceFlags = [ForceCode::Force].into_iter().collect();
        let item = ReportItem::forceable_error(ForceCode::Force, restart_required());

        let forced = apply_force(item, &flags);
        assert_eq!(forced.severity, Severity::Warning);
        assert_eq!(forced.force_code, None);
    }

    #[test]
    fn mismatched_flag_leaves_error_alone() {
        let flags: ForceFlags = [ForceCode::SkipOffline].into_iter().collect();
        let item = ReportItem::forceable_error(ForceCode::Force, restart_required());

        let forced = apply_force(item, &flags);
        assert_eq!(forced.severity, Severity::Error);
        assert_eq!(forced.force_code, Some(ForceCode::Force));
    }

    #[test]
    fn unforceable_error_ignores_all_flags() {
        let flags: ForceFlags = [ForceCode::Force, ForceCode::SkipOffline]
            .into_iter()
            .collect();
        let item = ReportItem::error(restart_required());

        assert_eq!(apply_force(item, &flags).severity, Severity::Error);
    }

    #[test]
    fn forcing_is_idempotent() {
        let flags: ForceFlags = [ForceCode::SkipOffline].into_iter().collect();
        let item = ReportItem::forceable_error(ForceCode::SkipOffline, restart_required());

        let once = apply_force(item, &flags);
        let twice = apply_force(once.clone(), &flags);
        assert_eq!(once, twice);
        assert_eq!(twice.severity, Severity::Warning);
    }

    #[test]
    fn context_survives_forcing() {
        let flags: ForceFlags = [ForceCode::Force].into_iter().collect();
        let item =
            ReportItem::forceable_error(ForceCode::Force, restart_required()).in_context("n1");

        let forced = apply_force(item, &flags);
        assert_eq!(forced.context, Some(ReportContext::node("n1")));
    }
}
