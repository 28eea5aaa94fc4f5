//! Report processor — per-operation accumulator and gatekeeper.
//!
//! Every item an operation produces goes through exactly one processor. The
//! processor forwards each item to the tracing sink as it arrives, buffers it
//! for the final export, and remembers whether any error came through so the
//! orchestration can ask "may I continue?" without re-scanning the buffer.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::item::{ForceCode, ReportContext, ReportItem, Severity};

/// Returned by [`ReportProcessor::check`] when at least one error has been
/// reported. Carries no payload; the accumulated report is the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation aborted, see the accumulated report")]
pub struct OperationAborted;

/// Stable, serializable snapshot of one report item. This is the only shape
/// report consumers outside the engine ever see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub severity: Severity,
    pub code: &'static str,
    pub payload: Value,
    pub force_code: Option<ForceCode>,
    pub context: Option<ReportContext>,
}

impl ReportEntry {
    pub fn from_item(item: &ReportItem) -> Self {
        Self {
            severity: item.severity,
            code: item.message.code(),
            payload: item.message.payload(),
            force_code: item.force_code,
            context: item.context.clone(),
        }
    }
}

/// Sink for report items. Implementations decide where items go; the engine
/// only requires that errors are remembered.
pub trait ReportProcessor {
    fn report(&mut self, item: ReportItem);

    fn report_all(&mut self, items: Vec<ReportItem>) {
        for item in items {
            self.report(item);
        }
    }

    /// Whether any `Error` item has been reported so far. Forced items were
    /// already downgraded before they got here, so they do not count.
    fn has_errors(&self) -> bool;

    /// Gate between operation phases.
    fn check(&self) -> Result<(), OperationAborted> {
        if self.has_errors() {
            Err(OperationAborted)
        } else {
            Ok(())
        }
    }
}

/// The standard processor: logs each item as it arrives and keeps the whole
/// sequence, in arrival order, for the final report.
#[derive(Debug, Default)]
pub struct SimpleReportProcessor {
    items: Vec<ReportItem>,
    error_seen: bool,
}

impl SimpleReportProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.items.iter().map(ReportEntry::from_item).collect()
    }
}

impl ReportProcessor for SimpleReportProcessor {
    fn report(&mut self, item: ReportItem) {
        let code = item.message.code();
        match item.severity {
            Severity::Debug => debug!(code, "{}", item.message),
            Severity::Info => info!(code, "{}", item.message),
            Severity::Warning => warn!(code, "{}", item.message),
            Severity::Error => error!(code, "{}", item.message),
        }
        if item.severity == Severity::Error {
            self.error_seen = true;
        }
        self.items.push(item);
    }

    fn has_errors(&self) -> bool {
        self.error_seen
    }
}
