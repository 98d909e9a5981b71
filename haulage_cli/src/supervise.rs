use std::path::PathBuf;

use clap::Args;
use haulage_setup::{
    SetupError,
    pipeline::stop_server,
    supervisor::{self, MONITOR_INTERVAL, STOP_GRACE, StopOutcome, SupervisorStatus},
};

use crate::{parsers, setup::PipelineArgs};

#[derive(Args)]
pub struct DataDirArgs {
    #[arg(long, env = "HAULAGE_DATA_DIR", default_value = "./osrm-data")]
    data_dir: PathBuf,
}

#[derive(Args)]
pub struct MonitorArgs {
    #[command(flatten)]
    data: DataDirArgs,

    /// Poll interval (e.g., "2s")
    #[arg(long, value_parser = parsers::parse_duration)]
    interval: Option<jiff::SignedDuration>,
}

#[derive(Args)]
pub struct StopArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Wait this long before each escalation (e.g., "10s")
    #[arg(long, value_parser = parsers::parse_duration)]
    grace: Option<jiff::SignedDuration>,

    /// Also stop and remove the routing server container
    #[arg(long)]
    server: bool,
}

pub async fn status(args: DataDirArgs, json: bool) -> anyhow::Result<()> {
    let status = supervisor::status(&args.data_dir).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match status {
        SupervisorStatus::Running {
            record,
            status,
            state,
        } => {
            println!(
                "Setup running (pid {}, started {})",
                record.pid, record.started_at
            );
            println!("Log: {}", record.log_file.display());
            match (status, state) {
                (Some(status), _) => {
                    println!("Stage: {}", status.stage);
                    if let Some(step) = status.current_step {
                        println!("Step: {step}");
                    }
                    if let Some(event) = status.last_event {
                        println!("Last output: {event}");
                    }
                    if status.stopping {
                        println!("Stopping");
                    }
                }
                (None, Some(state)) => {
                    println!("Stage: {} (runner not answering, from state file)", state.stage)
                }
                (None, None) => println!("Stage: unknown (runner not answering)"),
            }
        }
        SupervisorStatus::NotRunning { state } => match state {
            Some(state) => println!(
                "No setup running. {} is at stage {} (since {})",
                state.extract, state.stage, state.updated_at
            ),
            None => println!("No setup running and nothing set up yet"),
        },
    }

    Ok(())
}

pub async fn monitor(args: MonitorArgs) -> anyhow::Result<()> {
    let interval = match args.interval {
        Some(interval) => interval.unsigned_abs(),
        None => MONITOR_INTERVAL,
    };

    supervisor::monitor(&args.data.data_dir, interval, &mut std::io::stdout()).await?;
    Ok(())
}

pub async fn stop(args: StopArgs) -> anyhow::Result<()> {
    let grace = match args.grace {
        Some(grace) => grace.unsigned_abs(),
        None => STOP_GRACE,
    };
    let config = args.pipeline.into_config(None);

    match supervisor::stop(&config.data_dir, grace).await {
        Ok(StopOutcome::AlreadyExited) => println!("Setup had already exited"),
        Ok(StopOutcome::Cooperative) => println!("Setup stopped"),
        Ok(StopOutcome::Terminated) => println!("Setup terminated with SIGTERM"),
        Ok(StopOutcome::Killed) => println!("Setup killed with SIGKILL"),
        Err(SetupError::NotRunning) if args.server => {}
        Err(err) => return Err(err.into()),
    }

    if args.server {
        stop_server(&config).await?;
        println!("Routing server {} stopped", config.server_container);
    }

    Ok(())
}

pub async fn diagnose(args: DataDirArgs) -> anyhow::Result<()> {
    let report = supervisor::diagnose(&args.data_dir).await?;

    match &report.log_file {
        Some(path) => println!("Log: {}", path.display()),
        None => println!("No setup log found"),
    }

    if report.diagnoses.is_empty() {
        println!("No known failure found");
    }
    for diagnosis in &report.diagnoses {
        println!("- {diagnosis}\n  {}", diagnosis.hint());
    }

    println!(
        "Recommended preprocessing threads: {}",
        report.resources.threads
    );
    for warning in &report.resources.warnings {
        println!("Warning: {warning}");
    }

    Ok(())
}
