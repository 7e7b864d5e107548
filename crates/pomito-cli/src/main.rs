use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "pomito-cli", version, about = "Pomito pomodoro timer")]
struct Cli {
    /// Configuration file (defaults to $POMITO_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pomodoro session, printing events as JSON lines
    Session(commands::session::SessionArgs),
    /// Run one break, printing events as JSON lines
    Break(commands::session::BreakArgs),
    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Session(args) => commands::session::run_session(config, args),
        Commands::Break(args) => commands::session::run_break(config, args),
        Commands::Config { action } => commands::config::run(config, action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
