use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{dataset::runner_record_path, error::SetupError};

/// Written by `start_detached`, read by the status, monitor and stop commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerRecord {
    pub pid: u32,
    pub started_at: Timestamp,
    pub log_file: PathBuf,
    pub control_socket: PathBuf,
}

impl RunnerRecord {
    pub fn load(data_dir: &Path) -> Result<Option<Self>, SetupError> {
        let path = runner_record_path(data_dir);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(SetupError::io(&path))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| SetupError::State { path, source })
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), SetupError> {
        let path = runner_record_path(data_dir);
        let content = serde_json::to_string_pretty(self).map_err(|source| SetupError::State {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, content).map_err(SetupError::io(&path))
    }

    pub fn remove(data_dir: &Path) -> Result<(), SetupError> {
        let path = runner_record_path(data_dir);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SetupError::Io { path, source: err }),
        }
    }
}
