use std::sync::Arc;

use tokio::{
    signal::unix::{SignalKind, signal},
    sync::watch,
};
use tracing::{debug, info, warn};

use crate::{
    config::SetupConfig,
    dataset::control_socket_path,
    error::SetupError,
    pipeline::Pipeline,
    state::PipelineStage,
    supervisor::{
        control::{ControlServer, RunnerStatus, shared_status},
        record::RunnerRecord,
    },
};

fn cancel_on_signal(kind: SignalKind, name: &'static str, cancel: Arc<watch::Sender<bool>>) {
    match signal(kind) {
        Ok(mut stream) => {
            tokio::spawn(async move {
                if stream.recv().await.is_some() {
                    warn!("Received {}, cancelling", name);
                    cancel.send_replace(true);
                }
            });
        }
        Err(err) => debug!("Cannot listen for {}: {}", name, err),
    }
}

/// Runs the pipeline while answering the control socket. SIGTERM and SIGINT
/// cancel the run like a `Stop` request.
pub async fn run(config: SetupConfig) -> Result<PipelineStage, SetupError> {
    let data_dir = config.data_dir.clone();
    std::fs::create_dir_all(&data_dir).map_err(SetupError::io(&data_dir))?;

    let (cancel, cancelled) = watch::channel(false);
    let cancel = Arc::new(cancel);
    cancel_on_signal(SignalKind::terminate(), "SIGTERM", Arc::clone(&cancel));
    cancel_on_signal(SignalKind::interrupt(), "SIGINT", Arc::clone(&cancel));

    let pid = std::process::id();
    let status = shared_status(RunnerStatus::new(pid, PipelineStage::NotStarted));

    let server = ControlServer::bind(&control_socket_path(&data_dir))?;
    let control = tokio::spawn(server.serve(Arc::clone(&status), Arc::clone(&cancel)));

    let result = match Pipeline::new(config, status, cancelled) {
        Ok(mut pipeline) => pipeline.run().await,
        Err(err) => Err(err),
    };

    control.abort();
    let _ = control.await;

    if let Ok(Some(record)) = RunnerRecord::load(&data_dir)
        && record.pid == pid
    {
        RunnerRecord::remove(&data_dir)?;
    }

    match &result {
        Ok(stage) => info!("Setup finished at stage {}", stage),
        Err(SetupError::Cancelled) => info!("Setup stopped"),
        Err(err) => warn!("Setup failed: {}", err),
    }

    result
}
