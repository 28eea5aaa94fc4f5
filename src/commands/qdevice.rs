//! `capstan qdevice` — quorum device client management.

use anyhow::Result;

use capstan::ops::qdevice;

use super::CommonArgs;

pub fn setup_certs(common: &CommonArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_setup_certs(common).await })
}

async fn run_setup_certs(common: &CommonArgs) -> Result<()> {
    let mut env = super::build_env(common)?;
    let outcome = qdevice::setup_client_certificates(&mut env).await;
    super::finish(&env, &outcome, common)
}

pub fn enable(common: &CommonArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_enable(common).await })
}

async fn run_enable(common: &CommonArgs) -> Result<()> {
    let mut env = super::build_env(common)?;
    let outcome = qdevice::enable_client(&mut env).await;
    super::finish(&env, &outcome, common)
}

pub fn disable(common: &CommonArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_disable(common).await })
}

async fn run_disable(common: &CommonArgs) -> Result<()> {
    let mut env = super::build_env(common)?;
    let outcome = qdevice::disable_client(&mut env).await;
    super::finish(&env, &outcome, common)
}
