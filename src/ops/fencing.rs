//! Fencing topology operations.
//!
//! Levels are pure document surgery: no node traffic, just validate against
//! the device index, edit, commit. The device index is read from the
//! document once per operation and carried in an explicit cache, so a batch
//! of level specs costs one scan however many specs it validates.

use std::collections::BTreeSet;

use crate::reports::{ForceCode, OperationAborted, ReportItem, ReportMessage};
use crate::validate::{
    options_from, Validate, ValidationContext, ValidatorFirstError, ValueIntegerInRange,
    ValueNotEmpty,
};

use super::document::ClusterDocument;
use super::env::{OperationEnv, Outcome};

/// One requested fence level: which node, which position in the escalation
/// order, which devices to fire.
pub struct FenceLevelSpec {
    pub level: String,
    pub target_node: String,
    pub devices: Vec<String>,
}

/// Fence device ids known to the cluster document, computed on first use.
/// Owned by the operation entry point and passed down by reference, never
/// stashed in longer-lived state.
pub struct DeviceIndexCache {
    devices: Option<BTreeSet<String>>,
}

impl DeviceIndexCache {
    pub fn new() -> Self {
        Self { devices: None }
    }

    pub fn devices(&mut self, document: &ClusterDocument) -> &BTreeSet<String> {
        self.devices
            .get_or_insert_with(|| document.fence_device_ids())
    }
}

impl Default for DeviceIndexCache {
    fn default() -> Self {
        Self::new()
    }
}

fn level_rule() -> ValidatorFirstError {
    ValidatorFirstError::new(vec![
        Box::new(ValueNotEmpty::new("level")),
        Box::new(ValueIntegerInRange::new("level", 1, 9)),
    ])
}

pub async fn set_levels(env: &mut OperationEnv, specs: Vec<FenceLevelSpec>) -> Outcome<()> {
    let result = set(env, specs).await;
    env.outcome(result)
}

async fn set(env: &mut OperationEnv, specs: Vec<FenceLevelSpec>) -> Result<(), OperationAborted> {
    if specs.is_empty() {
        return Ok(());
    }
    let mut document = env.load_document().await?;

    // Validating: batch unknown nodes and missing devices across the whole
    // request, one item each.
    let mut cache = DeviceIndexCache::new();
    let mut unknown_nodes = BTreeSet::new();
    let mut missing_devices = BTreeSet::new();
    for spec in &specs {
        let level_options = options_from([("level", spec.level.as_str())]);
        let ctx = ValidationContext::for_node(&spec.target_node);
        env.report_all(level_rule().validate(&level_options, &ctx));

        if !env.inventory().contains(&spec.target_node) {
            unknown_nodes.insert(spec.target_node.clone());
        }
        if spec.devices.is_empty() {
            env.report(
                ReportItem::error(ReportMessage::RequiredOptionsMissing {
                    option_names: vec!["devices".to_string()],
                    option_type: "fence level".to_string(),
                })
                .in_context(&spec.target_node),
            );
        }
        for device in &spec.devices {
            if !cache.devices(&document).contains(device) {
                missing_devices.insert(device.clone());
            }
        }
    }
    if !unknown_nodes.is_empty() {
        env.report(ReportItem::error(ReportMessage::UnknownNodes {
            nodes: unknown_nodes.into_iter().collect(),
        }));
    }
    if !missing_devices.is_empty() {
        // Forceable: the caller may be wiring levels ahead of the devices.
        env.report(ReportItem::forceable_error(
            ForceCode::Force,
            ReportMessage::ResourcesNotFound {
                ids: missing_devices.into_iter().collect(),
            },
        ));
    }
    env.check()?;

    // Committing
    for spec in &specs {
        // The range rule above keeps this in 1..=9.
        let level = spec.level.trim().parse::<u8>().unwrap_or_default();
        document.set_fencing_level(level, &spec.target_node, &spec.devices);
    }
    env.commit(document, None).await?;
    Ok(())
}

pub async fn clear_levels(env: &mut OperationEnv, target_node: Option<String>) -> Outcome<()> {
    let result = clear(env, target_node).await;
    env.outcome(result)
}

async fn clear(
    env: &mut OperationEnv,
    target_node: Option<String>,
) -> Result<(), OperationAborted> {
    if let Some(node) = &target_node {
        if !env.inventory().contains(node) {
            env.report(ReportItem::error(ReportMessage::UnknownNodes {
                nodes: vec![node.clone()],
            }));
        }
    }
    env.check()?;

    let mut document = env.load_document().await?;
    let removed = document.clear_fencing_levels(target_node.as_deref());
    if removed == 0 {
        // Nothing to clear is not an error; the desired state holds.
        return Ok(());
    }
    env.commit(document, None).await?;
    Ok(())
}
