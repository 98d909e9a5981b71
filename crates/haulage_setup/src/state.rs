use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{dataset::Dataset, error::SetupError};

/// Progress of the setup pipeline, in the order stages complete.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    NotStarted,
    Downloaded,
    Extracted,
    Partitioned,
    Customized,
    Serving,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::NotStarted,
        PipelineStage::Downloaded,
        PipelineStage::Extracted,
        PipelineStage::Partitioned,
        PipelineStage::Customized,
        PipelineStage::Serving,
    ];

    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::NotStarted => Some(PipelineStage::Downloaded),
            PipelineStage::Downloaded => Some(PipelineStage::Extracted),
            PipelineStage::Extracted => Some(PipelineStage::Partitioned),
            PipelineStage::Partitioned => Some(PipelineStage::Customized),
            PipelineStage::Customized => Some(PipelineStage::Serving),
            PipelineStage::Serving => None,
        }
    }

    pub fn previous(&self) -> Option<PipelineStage> {
        PipelineStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.next() == Some(*self))
    }

    /// Files that must exist once this stage is reached, on top of the ones
    /// of earlier stages.
    pub fn artifacts(&self, dataset: &Dataset) -> Vec<PathBuf> {
        match self {
            PipelineStage::NotStarted => vec![],
            PipelineStage::Downloaded => vec![dataset.pbf_path()],
            PipelineStage::Extracted => vec![
                dataset.osrm_artifact("ebg"),
                dataset.osrm_artifact("nbg_nodes"),
            ],
            PipelineStage::Partitioned => vec![
                dataset.osrm_artifact("partition"),
                dataset.osrm_artifact("cells"),
            ],
            PipelineStage::Customized => vec![
                dataset.osrm_artifact("mldgr"),
                dataset.osrm_artifact("cell_metrics"),
            ],
            PipelineStage::Serving => vec![],
        }
    }

    pub fn artifacts_present(&self, dataset: &Dataset) -> bool {
        self.artifacts(dataset).iter().all(|path| path.is_file())
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PipelineStage::NotStarted => "not started",
                PipelineStage::Downloaded => "downloaded",
                PipelineStage::Extracted => "extracted",
                PipelineStage::Partitioned => "partitioned",
                PipelineStage::Customized => "customized",
                PipelineStage::Serving => "serving",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub reached_at: Timestamp,
}

/// Persisted pipeline progress of one extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub extract: String,
    pub stage: PipelineStage,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub history: Vec<StageRecord>,
}

impl PipelineState {
    pub fn new(extract: &str) -> Self {
        Self {
            extract: extract.to_string(),
            stage: PipelineStage::NotStarted,
            updated_at: Timestamp::now(),
            history: vec![],
        }
    }

    /// Loads the state file of `dataset`, then rolls back to the last stage
    /// whose artifacts are all on disk.
    pub fn load(dataset: &Dataset) -> Result<Self, SetupError> {
        let path = dataset.state_path();

        let mut state = if path.is_file() {
            let content = std::fs::read_to_string(&path).map_err(SetupError::io(&path))?;
            let state: PipelineState = serde_json::from_str(&content)
                .map_err(|source| SetupError::State { path, source })?;

            if state.extract != dataset.name() {
                warn!(
                    "State file belongs to extract {}, starting over for {}",
                    state.extract,
                    dataset.name()
                );
                PipelineState::new(dataset.name())
            } else {
                state
            }
        } else {
            PipelineState::new(dataset.name())
        };

        let verified = state.verified_stage(dataset);
        if verified < state.stage {
            warn!(
                "Artifacts of stage {} are missing, rolling back to {}",
                state.stage, verified
            );
            state.stage = verified;
            state.updated_at = Timestamp::now();
        }

        Ok(state)
    }

    /// Reads the state file as written, without verifying artifacts.
    pub fn read(dataset: &Dataset) -> Result<Option<Self>, SetupError> {
        Self::read_file(&dataset.state_path())
    }

    pub fn read_file(path: &Path) -> Result<Option<Self>, SetupError> {
        let path = path.to_path_buf();
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(SetupError::io(&path))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| SetupError::State { path, source })
    }

    /// Highest stage up to the recorded one whose artifacts, and those of
    /// every earlier stage, exist.
    pub fn verified_stage(&self, dataset: &Dataset) -> PipelineStage {
        let mut verified = PipelineStage::NotStarted;

        for stage in PipelineStage::ALL.iter().skip(1) {
            if *stage > self.stage || !stage.artifacts_present(dataset) {
                break;
            }
            verified = *stage;
        }

        verified
    }

    pub fn can_advance(&self, to: PipelineStage) -> bool {
        self.stage.next() == Some(to)
            || (self.stage == PipelineStage::Serving && to == PipelineStage::Serving)
    }

    pub fn advance(&mut self, to: PipelineStage) -> Result<(), SetupError> {
        if !self.can_advance(to) {
            return Err(SetupError::InvalidTransition {
                from: self.stage,
                to,
            });
        }

        let now = Timestamp::now();
        info!("Pipeline stage {} -> {}", self.stage, to);

        self.stage = to;
        self.updated_at = now;
        self.history.push(StageRecord {
            stage: to,
            reached_at: now,
        });

        Ok(())
    }

    /// Server stopped: the preprocessed data is still valid.
    pub fn stop_serving(&mut self) {
        if self.stage == PipelineStage::Serving {
            self.stage = PipelineStage::Customized;
            self.updated_at = Timestamp::now();
        }
    }

    pub fn save(&self, dataset: &Dataset) -> Result<(), SetupError> {
        let path = dataset.state_path();
        let tmp_path = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(self).map_err(|source| SetupError::State {
            path: path.clone(),
            source,
        })?;

        std::fs::write(&tmp_path, content).map_err(SetupError::io(&tmp_path))?;
        std::fs::rename(&tmp_path, &path).map_err(SetupError::io(&path))?;

        Ok(())
    }
}
