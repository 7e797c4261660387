mod cmd;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use settings::Overrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hostd",
    about = "Single-flight GPU action daemon and its Unix-socket client",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML config file (default: built-in settings)
    #[arg(long, global = true, env = "HOSTD_CONFIG")]
    config: Option<PathBuf>,

    /// Daemon Unix socket path
    #[arg(long, global = true, env = "HOSTD_SOCK")]
    socket: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon on the Unix socket
    Serve {
        /// Octal permissions for the socket file
        #[arg(long)]
        chmod: Option<String>,

        /// Path to the gpu-shed script backing the gpu_shed.* actions
        #[arg(long, env = "GPU_SHED_SCRIPT")]
        script: Option<PathBuf>,
    },

    /// Check that the daemon is up
    Health,

    /// Show the currently running job, if any
    Busy,

    /// Run an action through the daemon
    Run {
        /// Action name, e.g. gpu_shed.shed
        action: String,

        /// Action arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        /// Fail with 409 instead of waiting when a job is running
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the externally maintained list of shed consumers
    ShedState {
        /// Path of the state file written by the shed script
        #[arg(long, env = "GPU_SHED_STATE_FILE")]
        state_file: Option<PathBuf>,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let mut overrides = Overrides {
        socket: cli.socket,
        ..Overrides::default()
    };
    match &cli.command {
        Commands::Serve { chmod, script } => {
            overrides.socket_mode = chmod.clone();
            overrides.gpu_shed_script = script.clone();
        }
        Commands::ShedState { state_file } => {
            overrides.shed_state_file = state_file.clone();
        }
        _ => {}
    }

    let result = settings::resolve(cli.config.as_deref(), overrides).and_then(|config| {
        match cli.command {
            Commands::Serve { .. } => cmd::serve::run(&config),
            Commands::Health => cmd::client::health(&config.socket),
            Commands::Busy => cmd::client::busy(&config.socket),
            Commands::Run {
                action,
                args,
                no_wait,
            } => cmd::client::run(&config.socket, &action, &args, !no_wait),
            Commands::ShedState { .. } => cmd::shed_state::run(&config.shed_state_file, cli.json),
            Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
        }
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
