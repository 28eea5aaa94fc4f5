//! CLI command implementations.
//!
//! Every command follows the same shape: build an [`OperationEnv`] from the
//! settings and inventory files, run one operation on a fresh tokio runtime,
//! render the accumulated report, and exit non-zero when the operation
//! aborted.

pub mod fencing;
pub mod qdevice;
pub mod quorum;
pub mod sbd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use capstan::comm::{HttpTransport, NodeCommunicator};
use capstan::config::{Inventory, Settings};
use capstan::ops::{OperationEnv, OperationOptions, Outcome};
use capstan::reports::{ForceCode, ForceFlags, ReportItem, Severity};
use capstan::runner::SystemRunner;

/// Switches shared by every capstan command.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Settings file (default: <config dir>/capstan/capstan.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cluster inventory file (default: <config dir>/capstan/cluster.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Downgrade forceable validation errors to warnings
    #[arg(long, global = true)]
    pub force: bool,

    /// Carry on when some nodes cannot be reached
    #[arg(long, global = true)]
    pub skip_offline: bool,

    /// Output format: table or json
    #[arg(long, global = true, default_value = "table")]
    pub format: String,

    /// Include debug-level report items in the output
    #[arg(long, global = true)]
    pub verbose: bool,
}

impl CommonArgs {
    fn forces(&self) -> ForceFlags {
        let mut forces = ForceFlags::none();
        if self.force {
            forces.insert(ForceCode::Force);
        }
        if self.skip_offline {
            forces.insert(ForceCode::SkipOffline);
        }
        forces
    }
}

/// Parse a `KEY=VALUE` argument. An empty value is allowed; for option maps
/// it means "remove this option".
pub fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Build the environment a command's operation runs against.
pub fn build_env(common: &CommonArgs) -> Result<OperationEnv> {
    let settings = Settings::load(common.config.as_deref())?;
    let inventory_path = match &common.inventory {
        Some(path) => path.clone(),
        None => Inventory::default_path()?,
    };
    let inventory = Inventory::load(&inventory_path)?;

    let transport = HttpTransport::new(settings.comm.use_tls, settings.auth_token()?)?;
    let communicator = NodeCommunicator::new(Arc::new(transport))
        .request_timeout(settings.request_timeout())
        .parallelism(settings.comm.parallelism)
        .call_timeout(settings.call_timeout());

    let options = OperationOptions {
        forces: common.forces(),
        skip_offline: common.skip_offline,
    };
    Ok(OperationEnv::new(
        inventory,
        communicator,
        Box::new(SystemRunner),
        options,
    ))
}

/// Render the accumulated report and turn the outcome into an exit status.
pub fn finish<T>(env: &OperationEnv, outcome: &Outcome<T>, common: &CommonArgs) -> Result<()> {
    match common.format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&env.reports.entries())?;
            println!("{}", json);
        }
        _ => {
            for item in env.reports.items() {
                if item.severity == Severity::Debug && !common.verbose {
                    continue;
                }
                println!("{}", render_line(item));
            }
        }
    }
    if outcome.is_aborted() {
        eprintln!("{}", "Operation aborted".red().bold());
        std::process::exit(1);
    }
    Ok(())
}

fn render_line(item: &ReportItem) -> String {
    let mut line = format!("{} ", severity_tag(item.severity));
    if let Some(context) = &item.context {
        line.push_str(&format!("[{}] ", context.node).dimmed().to_string());
    }
    line.push_str(&item.message.to_string());
    if item.severity == Severity::Error {
        if let Some(code) = item.force_code {
            let hint = format!(", use {} to override", force_hint(code));
            line.push_str(&hint.dimmed().to_string());
        }
    }
    line
}

fn severity_tag(severity: Severity) -> String {
    match severity {
        Severity::Debug => "DEBUG".dimmed().to_string(),
        Severity::Info => " INFO".cyan().to_string(),
        Severity::Warning => " WARN".yellow().bold().to_string(),
        Severity::Error => "ERROR".red().bold().to_string(),
    }
}

fn force_hint(code: ForceCode) -> &'static str {
    match code {
        ForceCode::Force => "--force",
        ForceCode::SkipOffline => "--skip-offline",
    }
}
