use std::path::PathBuf;

use clap::{Args, ValueEnum};
use haulage_setup::{
    OverwritePolicy, PipelineStage, SetupConfig,
    config::{DEFAULT_EXTRACT_URL, DEFAULT_IMAGE, DEFAULT_SERVER_CONTAINER},
    container::ContainerRuntime,
    supervisor::{process::start_detached, runner},
};
use tracing::info;

use crate::parsers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SetupStage {
    Download,
    Preprocess,
    Serve,
    All,
}

impl SetupStage {
    fn target(&self) -> PipelineStage {
        match self {
            SetupStage::Download => PipelineStage::Downloaded,
            SetupStage::Preprocess => PipelineStage::Customized,
            SetupStage::Serve | SetupStage::All => PipelineStage::Serving,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Directory holding the extract, the OSRM files and the logs
    #[arg(long, env = "HAULAGE_DATA_DIR", default_value = "./osrm-data")]
    pub data_dir: PathBuf,

    /// Geofabrik-style URL of the .osm.pbf extract
    #[arg(long, env = "HAULAGE_EXTRACT_URL", default_value = DEFAULT_EXTRACT_URL)]
    pub extract_url: String,

    #[arg(long, env = "HAULAGE_IMAGE", default_value = DEFAULT_IMAGE)]
    pub image: String,

    /// Name of the routing server container
    #[arg(long, env = "HAULAGE_CONTAINER", default_value = DEFAULT_SERVER_CONTAINER)]
    pub container: String,

    #[arg(short, long, env = "HAULAGE_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Preprocessing threads (default: derived from available memory)
    #[arg(short, long, env = "HAULAGE_THREADS")]
    pub threads: Option<usize>,

    /// JSON file with the truck height, width, length and weight
    #[arg(long, env = "HAULAGE_VEHICLE")]
    pub vehicle: Option<PathBuf>,

    /// What to do with existing output: ask, skip or overwrite
    #[arg(long, env = "HAULAGE_OVERWRITE", default_value = "ask")]
    pub overwrite: OverwritePolicy,

    /// How long to wait for the server to answer (e.g., "90s", "5m")
    #[arg(long, env = "HAULAGE_START_TIMEOUT", default_value = "5m", value_parser = parsers::parse_duration)]
    pub start_timeout: jiff::SignedDuration,

    #[arg(long, env = "HAULAGE_MAX_TABLE_SIZE", default_value_t = 10_000)]
    pub max_table_size: usize,
}

impl PipelineArgs {
    pub fn into_config(self, until: Option<PipelineStage>) -> SetupConfig {
        SetupConfig {
            data_dir: self.data_dir,
            extract_url: self.extract_url,
            image: self.image,
            server_container: self.container,
            port: self.port,
            threads: self.threads,
            vehicle_file: self.vehicle,
            overwrite: self.overwrite,
            server_start_timeout: self.start_timeout,
            max_table_size: self.max_table_size,
            until,
        }
    }
}

#[derive(Args)]
pub struct SetupArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Stages to run; earlier stages run first when needed
    #[arg(long, value_enum, default_value = "all")]
    stage: SetupStage,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Keep running in the background, see `status`, `monitor` and `stop`
    #[arg(long)]
    detach: bool,

    /// Configuration written by a detached start
    #[arg(long, conflicts_with = "detach")]
    config: Option<PathBuf>,
}

pub async fn provision(install: bool) -> anyhow::Result<()> {
    let version = haulage_setup::provision::provision(&ContainerRuntime::new(), install).await?;
    println!("Docker server version: {version}");
    Ok(())
}

pub async fn run_setup(args: SetupArgs) -> anyhow::Result<()> {
    let config = args.pipeline.into_config(Some(args.stage.target()));
    let stage = runner::run(config).await?;
    println!("Setup reached stage: {stage}");
    Ok(())
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = match args.config {
        Some(path) => SetupConfig::load(&path)?,
        None => args.pipeline.into_config(None),
    };

    if args.detach {
        let exe = std::env::current_exe()?;
        let record = start_detached(&config, &exe).await?;

        println!("Setup started in the background (pid {})", record.pid);
        println!("Log: {}", record.log_file.display());
        println!("Follow it with `haulage monitor`, stop it with `haulage stop`");
        return Ok(());
    }

    info!("Running setup of {}", config.extract_url);
    let stage = runner::run(config).await?;
    println!("Setup reached stage: {stage}");
    Ok(())
}
