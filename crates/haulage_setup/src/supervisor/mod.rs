//! Commands acting on a setup started with `start_detached`.

pub mod control;
pub mod process;
pub mod record;
pub mod runner;

use std::{
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    dataset::{control_socket_path, runner_config_path, state_path},
    diagnosis::{Diagnosis, scan_log},
    error::SetupError,
    resources::{ResourceAdvice, advise, probe},
    state::PipelineState,
};

use control::{ControlRequest, RunnerStatus, request};
use process::{Signal, is_alive, is_runner_command, newest_log, process_cmdline, send_signal};
use record::RunnerRecord;

pub const MONITOR_INTERVAL: Duration = Duration::from_secs(2);
pub const STOP_GRACE: Duration = Duration::from_secs(10);
const CONTROL_TIMEOUT: Duration = Duration::from_secs(2);
const LIVENESS_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "runner", rename_all = "snake_case")]
pub enum SupervisorStatus {
    Running {
        record: RunnerRecord,
        /// `None` when the control socket did not answer.
        status: Option<RunnerStatus>,
        state: Option<PipelineState>,
    },
    NotRunning {
        state: Option<PipelineState>,
    },
}

/// Who holds the pid of a runner record.
#[derive(Debug, Clone, PartialEq)]
enum RunnerIdentity {
    /// The runner answered its control socket.
    Answering(RunnerStatus),
    /// The process runs `run --config` on this data directory but does not
    /// answer.
    Silent,
    /// Exited, or the pid now belongs to another process.
    Gone,
}

async fn identify(data_dir: &Path, record: &RunnerRecord) -> RunnerIdentity {
    if !is_alive(record.pid).await {
        debug!("Runner {} is gone", record.pid);
        return RunnerIdentity::Gone;
    }

    match request(&record.control_socket, ControlRequest::Status, CONTROL_TIMEOUT).await {
        Ok(status) if status.pid == record.pid => return RunnerIdentity::Answering(status),
        Ok(status) => debug!(
            "Control socket answered for pid {}, record has {}",
            status.pid, record.pid
        ),
        Err(err) => debug!("Runner {} did not answer: {}", record.pid, err),
    }

    match process_cmdline(record.pid) {
        Some(Ok(cmdline)) if is_runner_command(&cmdline, &runner_config_path(data_dir)) => {
            RunnerIdentity::Silent
        }
        Some(Ok(_)) => {
            warn!(
                "Pid {} of the runner record belongs to another process",
                record.pid
            );
            RunnerIdentity::Gone
        }
        Some(Err(err)) => {
            debug!("Cannot read the command line of {}: {}", record.pid, err);
            RunnerIdentity::Gone
        }
        // No /proc: a live pid is all there is to go on
        None => RunnerIdentity::Silent,
    }
}

pub async fn status(data_dir: &Path) -> Result<SupervisorStatus, SetupError> {
    let state = PipelineState::read_file(&state_path(data_dir))?;

    let Some(record) = RunnerRecord::load(data_dir)? else {
        return Ok(SupervisorStatus::NotRunning { state });
    };

    let status = match identify(data_dir, &record).await {
        RunnerIdentity::Answering(status) => Some(status),
        RunnerIdentity::Silent => None,
        RunnerIdentity::Gone => return Ok(SupervisorStatus::NotRunning { state }),
    };

    Ok(SupervisorStatus::Running {
        record,
        status,
        state,
    })
}

fn describe(status: &RunnerStatus) -> String {
    match &status.current_step {
        Some(step) => format!("stage: {} ({})", status.stage, step),
        None => format!("stage: {}", status.stage),
    }
}

/// Copies what was appended to the log since `position` into `out`.
fn follow(log_file: &Path, position: &mut u64, out: &mut impl Write) -> std::io::Result<()> {
    let mut file = std::fs::File::open(log_file)?;
    let length = file.metadata()?.len();
    if length < *position {
        *position = 0;
    }

    file.seek(SeekFrom::Start(*position))?;
    let mut appended = Vec::new();
    file.read_to_end(&mut appended)?;
    *position += appended.len() as u64;

    out.write_all(&appended)?;
    out.flush()
}

/// Follows the runner's log and reports stage changes until it exits.
pub async fn monitor(
    data_dir: &Path,
    interval: Duration,
    out: &mut impl Write,
) -> Result<(), SetupError> {
    let record = RunnerRecord::load(data_dir)?.ok_or(SetupError::NotRunning)?;
    let mut position = 0;
    let mut last_stage = None;

    loop {
        if let Err(err) = follow(&record.log_file, &mut position, out) {
            debug!("Cannot read {}: {}", record.log_file.display(), err);
        }

        if !is_alive(record.pid).await {
            break;
        }

        if let Ok(status) =
            request(&record.control_socket, ControlRequest::Status, CONTROL_TIMEOUT).await
        {
            let description = describe(&status);
            if last_stage.as_ref() != Some(&description) {
                writeln!(out, "== {description}").map_err(SetupError::io(&record.log_file))?;
                last_stage = Some(description);
            }
        }

        tokio::time::sleep(interval).await;
    }

    if let Err(err) = follow(&record.log_file, &mut position, out) {
        warn!("Cannot read {}: {}", record.log_file.display(), err);
    }
    let state = PipelineState::read_file(&state_path(data_dir))?;
    let written = match state {
        Some(state) => writeln!(out, "== runner exited at stage {}", state.stage),
        None => writeln!(out, "== runner exited"),
    };
    written.map_err(SetupError::io(&record.log_file))?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    AlreadyExited,
    Cooperative,
    Terminated,
    Killed,
}

async fn wait_exit(pid: u32, grace: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        if !is_alive(pid).await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(LIVENESS_POLL).await;
    }
}

/// Asks the runner to stop, then escalates to SIGTERM and SIGKILL, each after
/// `grace`.
pub async fn stop(data_dir: &Path, grace: Duration) -> Result<StopOutcome, SetupError> {
    let record = RunnerRecord::load(data_dir)?.ok_or(SetupError::NotRunning)?;

    let outcome = if identify(data_dir, &record).await == RunnerIdentity::Gone {
        StopOutcome::AlreadyExited
    } else {
        match request(&record.control_socket, ControlRequest::Stop, CONTROL_TIMEOUT).await {
            Ok(_) => info!("Stop requested, waiting for pid {}", record.pid),
            Err(err) => warn!("Runner did not answer the stop request: {}", err),
        }

        if wait_exit(record.pid, grace).await {
            StopOutcome::Cooperative
        } else {
            warn!("Runner still alive after {:?}, sending SIGTERM", grace);
            send_signal(record.pid, Signal::Term).await?;

            if wait_exit(record.pid, grace).await {
                StopOutcome::Terminated
            } else {
                warn!("Runner ignored SIGTERM, sending SIGKILL");
                send_signal(record.pid, Signal::Kill).await?;
                wait_exit(record.pid, grace).await;
                StopOutcome::Killed
            }
        }
    };

    RunnerRecord::remove(data_dir)?;
    let socket = control_socket_path(data_dir);
    if socket.exists()
        && let Err(err) = std::fs::remove_file(&socket)
    {
        warn!("Cannot remove {}: {}", socket.display(), err);
    }

    Ok(outcome)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnoseReport {
    pub log_file: Option<PathBuf>,
    pub diagnoses: Vec<Diagnosis>,
    pub resources: ResourceAdvice,
}

/// Failures found in the newest log, plus the current resource advice.
pub async fn diagnose(data_dir: &Path) -> Result<DiagnoseReport, SetupError> {
    let log_file = newest_log(data_dir);

    let diagnoses = match &log_file {
        Some(path) => {
            let content = std::fs::read(path).map_err(SetupError::io(path))?;
            scan_log(&String::from_utf8_lossy(&content))
        }
        None => vec![],
    };

    let resources = advise(&probe(data_dir).await, None, None);

    Ok(DiagnoseReport {
        log_file,
        diagnoses,
        resources,
    })
}
