//! Severity-graded reporting: items, the message catalog and the processor.

mod item;
mod messages;
mod processor;

pub use item::{
    apply_force, apply_force_all, ForceCode, ForceFlags, ReportContext, ReportItem, Severity,
};
pub use messages::{AllowedValues, ReportMessage, ServiceAction};
pub use processor::{OperationAborted, ReportEntry, ReportProcessor, SimpleReportProcessor};
