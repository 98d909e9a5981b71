//! Line-delimited JSON over the runner's Unix socket.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use jiff::Timestamp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    sync::watch,
};
use tracing::{debug, info, warn};

use crate::{diagnosis::EngineEvent, error::SetupError, state::PipelineStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ControlRequest {
    Status,
    Stop,
}

/// What the running pipeline is doing right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerStatus {
    pub pid: u32,
    pub stage: PipelineStage,
    pub current_step: Option<String>,
    pub last_event: Option<EngineEvent>,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub stopping: bool,
}

impl RunnerStatus {
    pub fn new(pid: u32, stage: PipelineStage) -> Self {
        Self {
            pid,
            stage,
            current_step: None,
            last_event: None,
            updated_at: Timestamp::now(),
            stopping: false,
        }
    }
}

pub type SharedStatus = Arc<Mutex<RunnerStatus>>;

pub fn shared_status(status: RunnerStatus) -> SharedStatus {
    Arc::new(Mutex::new(status))
}

/// Accepts control connections until dropped; the socket file goes with it.
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    pub fn bind(path: &Path) -> Result<Self, SetupError> {
        // Left over by a runner that did not shut down cleanly
        if path.exists() {
            std::fs::remove_file(path).map_err(SetupError::io(path))?;
        }

        let listener = UnixListener::bind(path).map_err(SetupError::io(path))?;
        debug!("Control socket listening on {}", path.display());

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub async fn serve(self, status: SharedStatus, cancel: Arc<watch::Sender<bool>>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let status = Arc::clone(&status);
                    let cancel = Arc::clone(&cancel);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, status, cancel).await {
                            debug!("Control connection closed: {}", err);
                        }
                    });
                }
                Err(err) => {
                    warn!("Control socket accept failed: {}", err);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_connection(
    stream: UnixStream,
    status: SharedStatus,
    cancel: Arc<watch::Sender<bool>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let request: ControlRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                warn!("Invalid control request {:?}: {}", line, err);
                continue;
            }
        };

        if request == ControlRequest::Stop {
            info!("Stop requested over the control socket");
            status.lock().stopping = true;
            cancel.send_replace(true);
        }

        let snapshot = status.lock().clone();
        let mut response = serde_json::to_vec(&snapshot).map_err(std::io::Error::other)?;
        response.push(b'\n');
        writer.write_all(&response).await?;
    }

    Ok(())
}

/// Sends one request and waits for the runner's status.
pub async fn request(
    path: &Path,
    request: ControlRequest,
    timeout: Duration,
) -> Result<RunnerStatus, SetupError> {
    let exchange = async {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|err| SetupError::Control(format!("{}: {err}", path.display())))?;
        let (reader, mut writer) = stream.into_split();

        let mut line = serde_json::to_vec(&request)
            .map_err(|err| SetupError::Control(err.to_string()))?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .map_err(|err| SetupError::Control(err.to_string()))?;

        let mut response = String::new();
        BufReader::new(reader)
            .read_line(&mut response)
            .await
            .map_err(|err| SetupError::Control(err.to_string()))?;

        serde_json::from_str::<RunnerStatus>(&response)
            .map_err(|err| SetupError::Control(format!("Invalid status: {err}")))
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| SetupError::Control(String::from("No answer from the runner")))?
}
