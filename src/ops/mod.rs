//! Cluster operations: validate, execute across nodes, commit.

pub mod auth;
mod document;
mod env;
pub mod fencing;
pub mod qdevice;
pub mod quorum;
pub mod sbd;

pub use document::ClusterDocument;
pub use env::{OperationEnv, OperationOptions, Outcome};

use std::collections::BTreeSet;

use crate::comm::Target;

/// Labels of a target set, for progress messages.
pub(crate) fn labels(targets: &[Target]) -> Vec<String> {
    targets
        .iter()
        .map(|target| target.label().to_string())
        .collect()
}

/// Labels in `wanted` that `reached` does not cover, sorted.
pub(crate) fn missing_labels(wanted: &[Target], reached: &[Target]) -> Vec<String> {
    let reached: BTreeSet<&str> = reached.iter().map(Target::label).collect();
    let mut missing: Vec<String> = wanted
        .iter()
        .map(Target::label)
        .filter(|label| !reached.contains(label))
        .map(str::to_string)
        .collect();
    missing.sort();
    missing
}
