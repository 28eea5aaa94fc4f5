mod commands;

use clap::{Parser, Subcommand};

use capstan::config::Settings;
use commands::CommonArgs;

#[derive(Parser)]
#[command(
    name = "capstan",
    version,
    about = "Cluster configuration control plane: validate, distribute, commit"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage SBD self-fencing
    Sbd {
        #[command(subcommand)]
        command: SbdCommands,
    },

    /// Manage the quorum device client
    Qdevice {
        #[command(subcommand)]
        command: QdeviceCommands,
    },

    /// Update quorum options
    Quorum {
        #[command(subcommand)]
        command: QuorumCommands,
    },

    /// Manage fence level topology
    Fencing {
        #[command(subcommand)]
        command: FencingCommands,
    },
}

#[derive(Subcommand)]
enum SbdCommands {
    /// Enable SBD on every cluster node
    Enable {
        /// SBD option (repeatable)
        #[arg(long = "option", value_parser = commands::parse_key_val, value_name = "KEY=VALUE")]
        options: Vec<(String, String)>,

        /// Watchdog device for one node (repeatable)
        #[arg(long = "watchdog", value_parser = commands::parse_key_val, value_name = "NODE=PATH")]
        watchdogs: Vec<(String, String)>,
    },

    /// Disable SBD on every cluster node
    Disable,
}

#[derive(Subcommand)]
enum QdeviceCommands {
    /// Distribute quorum device certificates to every node
    SetupCerts,

    /// Enable and start the quorum device client on every node
    Enable,

    /// Stop and disable the quorum device client on every node
    Disable,
}

#[derive(Subcommand)]
enum QuorumCommands {
    /// Update quorum options (an empty value removes the option)
    Update {
        /// Quorum option (repeatable)
        #[arg(
            long = "option",
            value_parser = commands::parse_key_val,
            value_name = "KEY=VALUE",
            required = true
        )]
        options: Vec<(String, String)>,
    },
}

#[derive(Subcommand)]
enum FencingCommands {
    /// Add or replace one fence level for a node
    SetLevel {
        /// Level number, 1 to 9
        level: String,

        /// Cluster node the level applies to
        node: String,

        /// Fence devices tried at this level, in order
        #[arg(required = true)]
        devices: Vec<String>,
    },

    /// Remove fence levels, all of them or one node's
    ClearLevels {
        /// Only clear levels for this node
        #[arg(long)]
        node: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.common);

    match cli.command {
        Commands::Sbd { command } => match command {
            SbdCommands::Enable { options, watchdogs } => {
                commands::sbd::enable(&cli.common, options, watchdogs)
            }
            SbdCommands::Disable => commands::sbd::disable(&cli.common),
        },
        Commands::Qdevice { command } => match command {
            QdeviceCommands::SetupCerts => commands::qdevice::setup_certs(&cli.common),
            QdeviceCommands::Enable => commands::qdevice::enable(&cli.common),
            QdeviceCommands::Disable => commands::qdevice::disable(&cli.common),
        },
        Commands::Quorum { command } => match command {
            QuorumCommands::Update { options } => commands::quorum::update(&cli.common, options),
        },
        Commands::Fencing { command } => match command {
            FencingCommands::SetLevel {
                level,
                node,
                devices,
            } => commands::fencing::set_level(&cli.common, level, node, devices),
            FencingCommands::ClearLevels { node } => {
                commands::fencing::clear_levels(&cli.common, node)
            }
        },
    }
}

/// Report items stream to tracing as they arrive; the rendered report at the
/// end is the summary. Logs go to stderr so they never mix with the report.
fn init_tracing(common: &CommonArgs) {
    let fallback = Settings::load(common.config.as_deref())
        .map(|settings| settings.log_level)
        .unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
