use std::io::IsTerminal;

use clap::{Parser, Subcommand};

use crate::{
    profile::ProfileSubcommands,
    route::{MatrixArgs, RouteArgs},
    setup::{RunArgs, SetupArgs},
    supervise::{DataDirArgs, MonitorArgs, StopArgs},
};

mod parsers;
mod profile;
mod route;
mod setup;
mod supervise;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the container runtime, installing it when asked
    Provision {
        /// Install docker with the distribution package manager (needs sudo)
        #[arg(long)]
        install: bool,
    },
    /// Download, preprocess and serve an extract in the foreground
    Setup {
        #[command(flatten)]
        args: SetupArgs,
    },
    /// Run the whole setup, in the background with --detach
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
    /// Show what a background setup is doing
    Status {
        #[command(flatten)]
        args: DataDirArgs,

        #[arg(long)]
        json: bool,
    },
    /// Follow the log of a background setup until it exits
    Monitor {
        #[command(flatten)]
        args: MonitorArgs,
    },
    /// Stop a background setup, and the routing server with --server
    Stop {
        #[command(flatten)]
        args: StopArgs,
    },
    /// Report known failures found in the newest setup log
    Diagnose {
        #[command(flatten)]
        args: DataDirArgs,
    },
    /// Compare route alternatives between two points
    #[command(visible_alias = "r")]
    Route {
        #[command(flatten)]
        args: RouteArgs,
    },
    /// Durations and distances between two sets of points
    Matrix {
        #[command(flatten)]
        args: MatrixArgs,
    },
    /// Inspect the truck routing profile
    Profile {
        #[command(subcommand)]
        commands: ProfileSubcommands,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Provision { install } => setup::provision(install).await?,
        Commands::Setup { args } => setup::run_setup(args).await?,
        Commands::Run { args } => setup::run(args).await?,
        Commands::Status { args, json } => supervise::status(args, json).await?,
        Commands::Monitor { args } => supervise::monitor(args).await?,
        Commands::Stop { args } => supervise::stop(args).await?,
        Commands::Diagnose { args } => supervise::diagnose(args).await?,
        Commands::Route { args } => route::route(args).await?,
        Commands::Matrix { args } => route::matrix(args).await?,
        Commands::Profile { commands } => profile::run(commands)?,
    }

    Ok(())
}
