use tokio::process::Command;
use tracing::{info, warn};

use crate::{
    container::{ContainerRuntime, RuntimeStatus},
    error::SetupError,
};

/// Distribution commands installing and starting docker, run under `sudo`.
pub const INSTALL_COMMANDS: [&[&str]; 3] = [
    &["apt-get", "update"],
    &["apt-get", "install", "-y", "docker.io"],
    &["systemctl", "enable", "--now", "docker"],
];

async fn run_sudo(args: &[&str]) -> Result<(), SetupError> {
    info!("sudo {}", args.join(" "));

    let status = Command::new("sudo")
        .args(args)
        .status()
        .await
        .map_err(|err| SetupError::ContainerRuntime(format!("Cannot run sudo: {err}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(SetupError::ContainerRuntime(format!(
            "sudo {} exited with {}",
            args.join(" "),
            status
        )))
    }
}

/// Checks the container runtime, installing it first when `install` is set
/// and it is missing. Returns the docker server version.
pub async fn provision(runtime: &ContainerRuntime, install: bool) -> Result<String, SetupError> {
    match runtime.probe().await {
        RuntimeStatus::Ready { server_version } => {
            info!("Docker {} is ready", server_version);
            return Ok(server_version);
        }
        RuntimeStatus::PermissionDenied => {
            warn!("Docker is installed but the current user cannot reach the daemon, setup will use sudo");
            return Ok(String::from("unknown (sudo required)"));
        }
        RuntimeStatus::DaemonUnreachable(reason) if !install => {
            return Err(SetupError::ContainerRuntime(reason));
        }
        RuntimeStatus::Missing if !install => {
            return Err(SetupError::ContainerRuntime(String::from(
                "docker is not installed, rerun with --install",
            )));
        }
        status => info!("Docker not ready ({:?}), installing", status),
    }

    for command in INSTALL_COMMANDS {
        run_sudo(command).await?;
    }

    match runtime.probe().await {
        RuntimeStatus::Ready { server_version } => Ok(server_version),
        RuntimeStatus::PermissionDenied => Ok(String::from("unknown (sudo required)")),
        status => Err(SetupError::ContainerRuntime(format!(
            "docker still unavailable after install: {status:?}"
        ))),
    }
}
