use std::{sync::Arc, time::Duration};

use haulage_osrm::{RouteAnalyzer, RouteAnalyzerParams, route_profile::RouteProfile};
use haulage_profile::lua;
use jiff::Timestamp;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    config::SetupConfig,
    container::{ContainerRuntime, cancelled, server_args, tool_args},
    dataset::Dataset,
    diagnosis::{Diagnosis, EngineEvent, scan_log},
    download::{download, remote_size},
    error::SetupError,
    prompt::should_overwrite,
    resources::{advise, log_advice, probe},
    state::{PipelineStage, PipelineState},
    supervisor::control::SharedStatus,
};

const HEALTH_POLL: Duration = Duration::from_secs(2);
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const SERVER_LOG_TAIL: usize = 50;

/// One of OSRM's MLD preprocessing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Extract,
    Partition,
    Customize,
}

impl EngineCommand {
    pub fn for_stage(stage: PipelineStage) -> Option<EngineCommand> {
        match stage {
            PipelineStage::Extracted => Some(EngineCommand::Extract),
            PipelineStage::Partitioned => Some(EngineCommand::Partition),
            PipelineStage::Customized => Some(EngineCommand::Customize),
            _ => None,
        }
    }

    pub fn tool(&self) -> &'static str {
        match self {
            EngineCommand::Extract => "osrm-extract",
            EngineCommand::Partition => "osrm-partition",
            EngineCommand::Customize => "osrm-customize",
        }
    }

    /// Command line inside the container, paths relative to `/data`.
    pub fn args(&self, dataset: &Dataset, threads: usize) -> Vec<String> {
        let mut args = vec![self.tool().to_string()];

        if *self == EngineCommand::Extract {
            args.push("-p".into());
            args.push(Dataset::container_path(dataset.profile_file_name()));
        }

        args.push("-t".into());
        args.push(threads.to_string());

        args.push(match self {
            EngineCommand::Extract => Dataset::container_path(&dataset.pbf_file_name()),
            _ => Dataset::container_path(&dataset.osrm_file_name()),
        });

        args
    }
}

/// Stages still to run to get from `current` to `target`.
pub fn pending_stages(current: PipelineStage, target: PipelineStage) -> Vec<PipelineStage> {
    PipelineStage::ALL
        .iter()
        .copied()
        .filter(|stage| *stage > current && *stage <= target)
        .collect()
}

/// Drives one extract through download, preprocessing and serving.
pub struct Pipeline {
    config: SetupConfig,
    dataset: Dataset,
    runtime: ContainerRuntime,
    http: reqwest::Client,
    state: PipelineState,
    status: SharedStatus,
    cancel: watch::Receiver<bool>,
}

impl Pipeline {
    pub fn new(
        config: SetupConfig,
        status: SharedStatus,
        cancel: watch::Receiver<bool>,
    ) -> Result<Self, SetupError> {
        let dataset = config.dataset()?;
        std::fs::create_dir_all(dataset.data_dir()).map_err(SetupError::io(dataset.data_dir()))?;

        let state = PipelineState::load(&dataset)?;
        status.lock().stage = state.stage;

        Ok(Self {
            config,
            dataset,
            runtime: ContainerRuntime::new(),
            http: reqwest::Client::new(),
            state,
            status,
            cancel,
        })
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn set_step(&self, step: Option<&str>) {
        let mut status = self.status.lock();
        status.current_step = step.map(String::from);
        status.updated_at = Timestamp::now();
    }

    fn reached(&mut self, stage: PipelineStage) -> Result<(), SetupError> {
        self.state.advance(stage)?;
        self.state.save(&self.dataset)?;

        let mut status = self.status.lock();
        status.stage = stage;
        status.current_step = None;
        status.updated_at = Timestamp::now();

        Ok(())
    }

    /// Output of `stage` exists without the state vouching for it.
    fn keep_existing(&self, stage: PipelineStage) -> Result<bool, SetupError> {
        let artifacts = stage.artifacts(&self.dataset);
        if artifacts.is_empty() || !stage.artifacts_present(&self.dataset) {
            return Ok(false);
        }

        let what = artifacts
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let overwrite = should_overwrite(self.config.overwrite, &what)
            .map_err(SetupError::io(self.dataset.data_dir()))?;

        if !overwrite {
            info!("Keeping existing {}", what);
        }
        Ok(!overwrite)
    }

    async fn thread_count(&self) -> usize {
        let extract_size = if self.state.stage < PipelineStage::Downloaded {
            remote_size(&self.http, &self.config.extract_url).await
        } else {
            std::fs::metadata(self.dataset.pbf_path())
                .map(|metadata| metadata.len())
                .ok()
        };

        let resources = probe(self.dataset.data_dir()).await;
        debug!("Host resources: {:?}", resources);

        let advice = advise(&resources, self.config.threads, extract_size);
        log_advice(&advice);
        advice.threads
    }

    /// Runs every stage up to the configured target. Returns the stage reached.
    pub async fn run(&mut self) -> Result<PipelineStage, SetupError> {
        let target = self.config.until.unwrap_or(PipelineStage::Serving);
        info!(
            "Setting up {} from stage {} to {}",
            self.dataset.name(),
            self.state.stage,
            target
        );

        let was_serving = self.state.stage == PipelineStage::Serving;
        let stages = pending_stages(self.state.stage, target);
        let threads = if stages.iter().any(|stage| EngineCommand::for_stage(*stage).is_some()) {
            self.thread_count().await
        } else {
            1
        };

        for stage in stages {
            if stage != PipelineStage::Serving && self.keep_existing(stage)? {
                self.reached(stage)?;
                continue;
            }

            match stage {
                PipelineStage::Downloaded => self.download().await?,
                PipelineStage::Serving => self.serve().await?,
                _ => {
                    if let Some(command) = EngineCommand::for_stage(stage) {
                        self.preprocess(command, threads).await?;
                    }
                }
            }

            self.reached(stage)?;
        }

        if target == PipelineStage::Serving && was_serving {
            self.ensure_serving().await?;
        }

        info!("{} is at stage {}", self.dataset.name(), self.state.stage);
        Ok(self.state.stage)
    }

    async fn download(&mut self) -> Result<(), SetupError> {
        self.set_step(Some("download"));
        let url = self.config.extract_url.clone();
        download(&self.http, &url, &self.dataset.pbf_path(), &mut self.cancel).await?;
        Ok(())
    }

    fn write_profile(&self) -> Result<(), SetupError> {
        let profile = self.config.truck_profile()?;
        let path = self.dataset.profile_path();

        info!(
            "Writing truck profile for a {}m x {}m x {}m, {}t vehicle to {}",
            profile.vehicle.height,
            profile.vehicle.width,
            profile.vehicle.length,
            profile.vehicle.weight,
            path.display()
        );
        std::fs::write(&path, lua::render(&profile)).map_err(SetupError::io(&path))
    }

    async fn preprocess(&mut self, command: EngineCommand, threads: usize) -> Result<(), SetupError> {
        let stage = match command {
            EngineCommand::Extract => PipelineStage::Extracted,
            EngineCommand::Partition => PipelineStage::Partitioned,
            EngineCommand::Customize => PipelineStage::Customized,
        };

        if command == EngineCommand::Extract {
            self.write_profile()?;
        }

        self.set_step(Some(command.tool()));
        info!("Running {} with {} threads", command.tool(), threads);

        let container_name = format!("{}-{}", self.config.server_container, command.tool());
        let args = tool_args(
            self.dataset.data_dir(),
            &self.config.image,
            &container_name,
            &command.args(&self.dataset, threads),
        );

        let status = Arc::clone(&self.status);
        let mut on_event = move |event: &EngineEvent| {
            let mut status = status.lock();
            status.last_event = Some(event.clone());
            status.updated_at = Timestamp::now();
        };

        let outcome = self
            .runtime
            .run(&args, &container_name, &mut self.cancel, &mut on_event)
            .await?;

        if !outcome.success() {
            let diagnosis = outcome.diagnosis();
            warn!("{} failed: {}. {}", command.tool(), diagnosis, diagnosis.hint());
            return Err(SetupError::Stage {
                stage,
                exit_code: outcome.exit_code,
                diagnosis,
            });
        }

        if !stage.artifacts_present(&self.dataset) {
            return Err(SetupError::Stage {
                stage,
                exit_code: outcome.exit_code,
                diagnosis: Diagnosis::Other(format!(
                    "{} exited successfully without writing its output",
                    command.tool()
                )),
            });
        }

        Ok(())
    }

    fn analyzer(&self) -> Result<RouteAnalyzer, SetupError> {
        Ok(RouteAnalyzer::new(RouteAnalyzerParams {
            osrm_url: self.config.osrm_url(),
            profile: RouteProfile::Driving,
            timeout: HEALTH_REQUEST_TIMEOUT,
        })?)
    }

    async fn server_diagnosis(&self) -> Diagnosis {
        match self
            .runtime
            .logs(&self.config.server_container, SERVER_LOG_TAIL)
            .await
        {
            Ok(logs) => {
                let failures: Vec<EngineEvent> = scan_log(&logs)
                    .into_iter()
                    .map(EngineEvent::Failure)
                    .collect();
                Diagnosis::from_events(&failures, None)
            }
            Err(err) => {
                debug!("Cannot read server logs: {}", err);
                Diagnosis::Unknown
            }
        }
    }

    async fn serve(&mut self) -> Result<(), SetupError> {
        let container = self.config.server_container.clone();
        self.set_step(Some("osrm-routed"));

        self.runtime.remove_container(&container).await?;

        let args = server_args(
            self.dataset.data_dir(),
            &self.config.image,
            &container,
            self.config.port,
            &Dataset::container_path(&self.dataset.osrm_file_name()),
            self.config.max_table_size,
        );
        let id = self.runtime.run_detached(&args).await?;
        info!("Started {} ({})", container, id);

        let timeout = self.config.server_start_timeout.unsigned_abs();
        let analyzer = self.analyzer()?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if analyzer.is_healthy().await {
                info!("OSRM is answering on {}", self.config.osrm_url());
                return Ok(());
            }

            if !self.runtime.is_running(&container).await {
                let diagnosis = self.server_diagnosis().await;
                return Err(SetupError::Stage {
                    stage: PipelineStage::Serving,
                    exit_code: None,
                    diagnosis,
                });
            }

            if tokio::time::Instant::now() >= deadline {
                let diagnosis = self.server_diagnosis().await;
                return Err(SetupError::ServerStartTimeout {
                    seconds: timeout.as_secs(),
                    diagnosis,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(HEALTH_POLL) => {}
                _ = cancelled(&mut self.cancel) => {
                    if let Err(err) = self.runtime.remove_container(&container).await {
                        warn!("{} may still be running: {}", container, err);
                    }
                    return Err(SetupError::Cancelled);
                }
            }
        }
    }

    /// The state says serving: restart the server unless it still answers.
    async fn ensure_serving(&mut self) -> Result<(), SetupError> {
        let container = self.config.server_container.clone();
        if self.runtime.is_running(&container).await && self.analyzer()?.is_healthy().await {
            info!("{} is already serving", container);
            return Ok(());
        }

        warn!("{} is not answering, restarting it", container);
        self.serve().await?;
        self.reached(PipelineStage::Serving)
    }
}

/// Stops and removes the routing server container.
pub async fn stop_server(config: &SetupConfig) -> Result<(), SetupError> {
    stop_server_with(&mut ContainerRuntime::new(), config).await
}

/// The state only leaves `serving` once the container is gone.
pub async fn stop_server_with(
    runtime: &mut ContainerRuntime,
    config: &SetupConfig,
) -> Result<(), SetupError> {
    let dataset = config.dataset()?;
    runtime.remove_container(&config.server_container).await?;

    if let Some(mut state) = PipelineState::read(&dataset)? {
        state.stop_serving();
        state.save(&dataset)?;
    }

    info!("Stopped {}", config.server_container);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        prompt::OverwritePolicy,
        supervisor::control::{RunnerStatus, shared_status},
        test_utils::TestDir,
    };
    use axum::{Router, routing::get};

    fn dataset() -> Dataset {
        Dataset::new("/srv/osrm", "us-latest")
    }

    #[test]
    fn test_extract_args() {
        assert_eq!(
            EngineCommand::Extract.args(&dataset(), 4),
            vec![
                "osrm-extract",
                "-p",
                "/data/truck.lua",
                "-t",
                "4",
                "/data/us-latest.osm.pbf"
            ]
        );
    }

    #[test]
    fn test_partition_and_customize_args() {
        assert_eq!(
            EngineCommand::Partition.args(&dataset(), 1),
            vec!["osrm-partition", "-t", "1", "/data/us-latest.osrm"]
        );
        assert_eq!(
            EngineCommand::Customize.args(&dataset(), 2),
            vec!["osrm-customize", "-t", "2", "/data/us-latest.osrm"]
        );
    }

    #[test]
    fn test_pending_stages() {
        assert_eq!(
            pending_stages(PipelineStage::Extracted, PipelineStage::Serving),
            vec![
                PipelineStage::Partitioned,
                PipelineStage::Customized,
                PipelineStage::Serving
            ]
        );
        assert_eq!(
            pending_stages(PipelineStage::NotStarted, PipelineStage::Downloaded),
            vec![PipelineStage::Downloaded]
        );
        assert!(pending_stages(PipelineStage::Serving, PipelineStage::Serving).is_empty());
    }

    async fn serve_extract() -> String {
        let app = Router::new().route("/us-latest.osm.pbf", get(|| async { "pbf" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}/us-latest.osm.pbf")
    }

    #[tokio::test]
    async fn test_run_until_downloaded() {
        let dir = TestDir::new();
        let config = SetupConfig {
            data_dir: dir.path().to_path_buf(),
            extract_url: serve_extract().await,
            overwrite: OverwritePolicy::Skip,
            until: Some(PipelineStage::Downloaded),
            ..SetupConfig::default()
        };
        let status = shared_status(RunnerStatus::new(1, PipelineStage::NotStarted));
        let (_sender, cancel) = watch::channel(false);

        let mut pipeline = Pipeline::new(config, Arc::clone(&status), cancel).unwrap();
        let reached = pipeline.run().await.unwrap();

        assert_eq!(reached, PipelineStage::Downloaded);
        assert_eq!(status.lock().stage, PipelineStage::Downloaded);
        assert_eq!(
            std::fs::read_to_string(pipeline.dataset().pbf_path()).unwrap(),
            "pbf"
        );

        let written = PipelineState::read(pipeline.dataset()).unwrap().unwrap();
        assert_eq!(written.stage, PipelineStage::Downloaded);
    }

    #[tokio::test]
    async fn test_existing_extract_is_kept_with_skip() {
        let dir = TestDir::new();
        let config = SetupConfig {
            data_dir: dir.path().to_path_buf(),
            // Nothing listens here: a download attempt would fail
            extract_url: String::from("http://127.0.0.1:9/us-latest.osm.pbf"),
            overwrite: OverwritePolicy::Skip,
            until: Some(PipelineStage::Downloaded),
            ..SetupConfig::default()
        };
        std::fs::write(dir.path().join("us-latest.osm.pbf"), "local").unwrap();

        let status = shared_status(RunnerStatus::new(1, PipelineStage::NotStarted));
        let (_sender, cancel) = watch::channel(false);

        let mut pipeline = Pipeline::new(config, status, cancel).unwrap();
        assert_eq!(pipeline.run().await.unwrap(), PipelineStage::Downloaded);
        assert_eq!(
            std::fs::read_to_string(pipeline.dataset().pbf_path()).unwrap(),
            "local"
        );
    }

    fn serving_state(config: &SetupConfig) -> Dataset {
        let dataset = config.dataset().unwrap();
        let mut state = PipelineState::new(dataset.name());
        for stage in PipelineStage::ALL.iter().skip(1) {
            state.advance(*stage).unwrap();
        }
        state.save(&dataset).unwrap();
        dataset
    }

    #[tokio::test]
    async fn test_failed_server_removal_keeps_serving_state() {
        let dir = TestDir::new();
        let config = SetupConfig {
            data_dir: dir.path().to_path_buf(),
            ..SetupConfig::default()
        };
        let dataset = serving_state(&config);

        let result = stop_server_with(&mut ContainerRuntime::with_program("false"), &config).await;

        assert!(matches!(result, Err(SetupError::ContainerRuntime(_))));
        let state = PipelineState::read(&dataset).unwrap().unwrap();
        assert_eq!(state.stage, PipelineStage::Serving);
    }

    #[tokio::test]
    async fn test_stop_server_steps_back_to_customized() {
        let dir = TestDir::new();
        let config = SetupConfig {
            data_dir: dir.path().to_path_buf(),
            ..SetupConfig::default()
        };
        let dataset = serving_state(&config);

        stop_server_with(&mut ContainerRuntime::with_program("true"), &config)
            .await
            .unwrap();

        let state = PipelineState::read(&dataset).unwrap().unwrap();
        assert_eq!(state.stage, PipelineStage::Customized);
    }

    #[tokio::test]
    async fn test_cancelled_download() {
        let dir = TestDir::new();
        let config = SetupConfig {
            data_dir: dir.path().to_path_buf(),
            extract_url: serve_extract().await,
            overwrite: OverwritePolicy::Overwrite,
            until: Some(PipelineStage::Downloaded),
            ..SetupConfig::default()
        };
        let status = shared_status(RunnerStatus::new(1, PipelineStage::NotStarted));
        let (sender, cancel) = watch::channel(true);

        let mut pipeline = Pipeline::new(config, status, cancel).unwrap();
        let result = pipeline.run().await;

        assert!(matches!(result, Err(SetupError::Cancelled)));
        assert_eq!(pipeline.state().stage, PipelineStage::NotStarted);
        drop(sender);
    }
}
