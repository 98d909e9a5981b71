use std::path::PathBuf;

use thiserror::Error;

use crate::{diagnosis::Diagnosis, state::PipelineStage};

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Extract URL {0} does not end with an .osm.pbf file name")]
    InvalidExtractUrl(String),

    #[error("{stage} failed with exit code {exit_code:?}: {diagnosis}")]
    Stage {
        stage: PipelineStage,
        exit_code: Option<i32>,
        diagnosis: Diagnosis,
    },

    #[error("Cannot go from {from} to {to}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },

    #[error("Container runtime unavailable: {0}")]
    ContainerRuntime(String),

    #[error("Invalid state file {path}: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Truck profile error: {0}")]
    Profile(#[from] haulage_profile::error::ProfileError),

    #[error("Routing client error: {0}")]
    Client(#[from] haulage_osrm::OsrmError),

    #[error("No setup is running")]
    NotRunning,

    #[error("Setup was cancelled")]
    Cancelled,

    #[error("OSRM server did not answer within {seconds}s: {diagnosis}")]
    ServerStartTimeout { seconds: u64, diagnosis: Diagnosis },

    #[error("Control socket error: {0}")]
    Control(String),
}

impl SetupError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> SetupError {
        let path = path.into();
        move |source| SetupError::Io { path, source }
    }
}
