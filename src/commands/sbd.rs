//! `capstan sbd` — enable or disable SBD self-fencing across the cluster.

use anyhow::Result;

use capstan::ops::sbd::{self, SbdEnableRequest};
use capstan::validate::options_from;

use super::CommonArgs;

pub fn enable(
    common: &CommonArgs,
    options: Vec<(String, String)>,
    watchdogs: Vec<(String, String)>,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_enable(common, options, watchdogs).await })
}

async fn run_enable(
    common: &CommonArgs,
    options: Vec<(String, String)>,
    watchdogs: Vec<(String, String)>,
) -> Result<()> {
    let mut env = super::build_env(common)?;
    let request = SbdEnableRequest {
        options: options_from(options),
        watchdog_by_node: watchdogs.into_iter().collect(),
    };
    let outcome = sbd::enable_sbd(&mut env, request).await;
    super::finish(&env, &outcome, common)
}

pub fn disable(common: &CommonArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_disable(common).await })
}

async fn run_disable(common: &CommonArgs) -> Result<()> {
    let mut env = super::build_env(common)?;
    let outcome = sbd::disable_sbd(&mut env).await;
    super::finish(&env, &outcome, common)
}
