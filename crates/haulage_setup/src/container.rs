//! Thin wrapper around the `docker` command line.

use std::{path::Path, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::{mpsc, watch},
};
use tracing::{debug, error, info, warn};

use crate::{
    diagnosis::{Diagnosis, EngineEvent, classify_line},
    error::SetupError,
};

const DOCKER: &str = "docker";

/// Port `osrm-routed` listens on inside its container.
pub const ROUTED_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeStatus {
    Ready { server_version: String },
    PermissionDenied,
    DaemonUnreachable(String),
    Missing,
}

/// Result of a foreground container run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    /// Failure events seen on the way, in order.
    pub failures: Vec<EngineEvent>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn diagnosis(&self) -> Diagnosis {
        Diagnosis::from_events(&self.failures, self.exit_code)
    }
}

/// Waits until `cancel` turns true. Never resolves once the sender is gone.
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub fn mount_arg(data_dir: &Path) -> String {
    format!("{}:/data", data_dir.display())
}

/// `docker run --rm -t` arguments of one preprocessing tool.
pub fn tool_args(data_dir: &Path, image: &str, name: &str, command: &[String]) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "run".into(),
        "--rm".into(),
        "-t".into(),
        "--name".into(),
        name.into(),
        "-v".into(),
        mount_arg(data_dir),
        image.into(),
    ];
    args.extend(command.iter().cloned());
    args
}

/// `docker run -d` arguments of the routing server.
pub fn server_args(
    data_dir: &Path,
    image: &str,
    name: &str,
    port: u16,
    osrm_file: &str,
    max_table_size: usize,
) -> Vec<String> {
    vec![
        "run".into(),
        "-d".into(),
        "--name".into(),
        name.into(),
        "-p".into(),
        format!("{port}:{ROUTED_PORT}"),
        "-v".into(),
        mount_arg(data_dir),
        image.into(),
        "osrm-routed".into(),
        "--algorithm".into(),
        "mld".into(),
        "--max-table-size".into(),
        max_table_size.to_string(),
        osrm_file.into(),
    ]
}

fn permission_denied(output: &str) -> bool {
    output.lines().any(|line| {
        matches!(
            classify_line(line),
            EngineEvent::Failure(Diagnosis::DockerPermissionDenied)
        )
    })
}

/// Maps the outcome of `docker info --format {{.ServerVersion}}`.
pub fn runtime_status(success: bool, stdout: &str, stderr: &str) -> RuntimeStatus {
    if success {
        return RuntimeStatus::Ready {
            server_version: stdout.trim().to_string(),
        };
    }

    if permission_denied(stderr) {
        RuntimeStatus::PermissionDenied
    } else {
        RuntimeStatus::DaemonUnreachable(stderr.trim().to_string())
    }
}

fn no_such_container(stderr: &str) -> bool {
    stderr.contains("No such container")
}

/// Docker invocations, escalated to `sudo docker` after the first daemon
/// permission failure.
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    program: String,
    use_sudo: bool,
}

impl Default for ContainerRuntime {
    fn default() -> Self {
        Self::with_program(DOCKER)
    }
}

impl ContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime driving another docker-compatible client, such as `podman`.
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
            use_sudo: false,
        }
    }

    pub fn uses_sudo(&self) -> bool {
        self.use_sudo
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = if self.use_sudo {
            let mut command = Command::new("sudo");
            command.arg(&self.program);
            command
        } else {
            Command::new(&self.program)
        };
        command.args(args);
        command
    }

    fn escalate(&mut self) -> bool {
        if self.use_sudo {
            return false;
        }
        warn!("Permission denied on the docker daemon, retrying with sudo");
        self.use_sudo = true;
        true
    }

    pub async fn probe(&self) -> RuntimeStatus {
        let output = self
            .command(&[
                "info".into(),
                "--format".into(),
                "{{.ServerVersion}}".into(),
            ])
            .output()
            .await;

        match output {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => RuntimeStatus::Missing,
            Err(err) => RuntimeStatus::DaemonUnreachable(err.to_string()),
            Ok(output) => runtime_status(
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
        }
    }

    /// Runs a container in the foreground, classifying every output line.
    ///
    /// When `cancel` turns true the container is killed and removed and
    /// `SetupError::Cancelled` is returned.
    pub async fn run<F>(
        &mut self,
        args: &[String],
        container_name: &str,
        cancel: &mut watch::Receiver<bool>,
        on_event: &mut F,
    ) -> Result<RunOutcome, SetupError>
    where
        F: FnMut(&EngineEvent),
    {
        let outcome = self.run_once(args, container_name, cancel, on_event).await?;

        let denied = outcome
            .failures
            .contains(&EngineEvent::Failure(Diagnosis::DockerPermissionDenied));
        if !outcome.success() && denied && self.escalate() {
            return self.run_once(args, container_name, cancel, on_event).await;
        }

        Ok(outcome)
    }

    async fn run_once<F>(
        &mut self,
        args: &[String],
        container_name: &str,
        cancel: &mut watch::Receiver<bool>,
        on_event: &mut F,
    ) -> Result<RunOutcome, SetupError>
    where
        F: FnMut(&EngineEvent),
    {
        debug!("docker {}", args.join(" "));

        let mut child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SetupError::ContainerRuntime(format!("Cannot run docker: {err}")))?;

        let (sender, mut lines) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, sender.clone());
        }
        drop(sender);

        let mut failures = Vec::new();

        loop {
            tokio::select! {
                line = lines.recv() => {
                    let Some(line) = line else {
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let event = classify_line(&line);
                    match &event {
                        EngineEvent::Progress(line) => info!("{}", line),
                        EngineEvent::Warning(line) => warn!("{}", line),
                        EngineEvent::Failure(diagnosis) => error!("{} ({})", line.trim(), diagnosis),
                    }
                    on_event(&event);
                    if event.is_failure() {
                        failures.push(event);
                    }
                }
                _ = cancelled(cancel) => {
                    warn!("Cancelling container {}", container_name);
                    if let Err(err) = child.kill().await {
                        debug!("Failed to kill docker client: {}", err);
                    }
                    if let Err(err) = self.remove_container(container_name).await {
                        warn!("Container {} may still be running: {}", container_name, err);
                    }
                    return Err(SetupError::Cancelled);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|err| SetupError::ContainerRuntime(format!("Cannot wait for docker: {err}")))?;

        Ok(RunOutcome {
            exit_code: status.code(),
            failures,
        })
    }

    /// Starts a detached container and returns its id.
    pub async fn run_detached(&mut self, args: &[String]) -> Result<String, SetupError> {
        loop {
            debug!("docker {}", args.join(" "));

            let output = self
                .command(args)
                .output()
                .await
                .map_err(|err| SetupError::ContainerRuntime(format!("Cannot run docker: {err}")))?;

            if output.status.success() {
                return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }

            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if permission_denied(&stderr) && self.escalate() {
                continue;
            }

            return Err(SetupError::ContainerRuntime(stderr.trim().to_string()));
        }
    }

    /// Force-removes a container. A container that does not exist counts as
    /// removed.
    pub async fn remove_container(&mut self, name: &str) -> Result<(), SetupError> {
        let args: Vec<String> = vec!["rm".into(), "-f".into(), name.into()];

        loop {
            debug!("docker {}", args.join(" "));

            let output = self
                .command(&args)
                .output()
                .await
                .map_err(|err| SetupError::ContainerRuntime(format!("Cannot run docker: {err}")))?;

            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if output.status.success() || no_such_container(&stderr) {
                debug!("Removed container {}", name);
                return Ok(());
            }

            if permission_denied(&stderr) && self.escalate() {
                continue;
            }

            return Err(SetupError::ContainerRuntime(format!(
                "Cannot remove container {name}: {}",
                stderr.trim()
            )));
        }
    }

    pub async fn is_running(&self, name: &str) -> bool {
        let output = self
            .command(&[
                "inspect".into(),
                "--format".into(),
                "{{.State.Running}}".into(),
                name.into(),
            ])
            .output()
            .await;

        matches!(output, Ok(output) if output.status.success()
            && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    /// Last `tail` lines of a container's output, stdout and stderr merged.
    pub async fn logs(&self, name: &str, tail: usize) -> Result<String, SetupError> {
        let output = self
            .command(&[
                "logs".into(),
                "--tail".into(),
                tail.to_string(),
                name.into(),
            ])
            .output()
            .await
            .map_err(|err| SetupError::ContainerRuntime(format!("Cannot run docker: {err}")))?;

        let mut logs = String::from_utf8_lossy(&output.stdout).to_string();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }
}

fn forward_lines<R>(reader: R, sender: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            // `-t` output carries carriage returns
            for part in line.split('\r') {
                if sender.send(part.to_string()).is_err() {
                    return;
                }
            }
        }
    });
}
