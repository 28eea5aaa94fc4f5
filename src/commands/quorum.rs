//! `capstan quorum` — quorum option updates.

use anyhow::Result;

use capstan::ops::quorum;
use capstan::validate::options_from;

use super::CommonArgs;

pub fn update(common: &CommonArgs, options: Vec<(String, String)>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_update(common, options).await })
}

async fn run_update(common: &CommonArgs, options: Vec<(String, String)>) -> Result<()> {
    let mut env = super::build_env(common)?;
    let outcome = quorum::update_options(&mut env, options_from(options)).await;
    super::finish(&env, &outcome, common)
}
