//! `capstan fencing` — fence level topology for cluster nodes.

use anyhow::Result;

use capstan::ops::fencing::{self, FenceLevelSpec};

use super::CommonArgs;

pub fn set_level(
    common: &CommonArgs,
    level: String,
    node: String,
    devices: Vec<String>,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_set_level(common, level, node, devices).await })
}

async fn run_set_level(
    common: &CommonArgs,
    level: String,
    node: String,
    devices: Vec<String>,
) -> Result<()> {
    let mut env = super::build_env(common)?;
    let spec = FenceLevelSpec {
        level,
        target_node: node,
        devices,
    };
    let outcome = fencing::set_levels(&mut env, vec![spec]).await;
    super::finish(&env, &outcome, common)
}

pub fn clear_levels(common: &CommonArgs, node: Option<String>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_clear_levels(common, node).await })
}

async fn run_clear_levels(common: &CommonArgs, node: Option<String>) -> Result<()> {
    let mut env = super::build_env(common)?;
    let outcome = fencing::clear_levels(&mut env, node).await;
    super::finish(&env, &outcome, common)
}
