use std::path::PathBuf;

use clap::{Parser, Subcommand};
use teucrium::config::{Config, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "teucrium", version)]
#[command(about = "Per-interface traffic accounting with netfilter counters and RRD")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "TEUCRIUM_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the round-robin databases
    Rrdcreate,
    /// Install the counting chains and rules
    Xtsetup {
        /// Print the commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },
    /// Poll counters and write them to the databases
    Daemon,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::from_path(&args.config)?;
    match args.command {
        Command::Rrdcreate => teucrium::rrdcreate(&config).await,
        Command::Xtsetup { dry_run } => teucrium::xtsetup(&config, dry_run).await,
        Command::Daemon => teucrium::run_daemon(&config).await,
    }
}
