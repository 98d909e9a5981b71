use std::path::{Path, PathBuf};

use haulage_profile::{TruckProfile, VehicleSpec};
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::{dataset::Dataset, error::SetupError, prompt::OverwritePolicy};

pub const DEFAULT_EXTRACT_URL: &str =
    "https://download.geofabrik.de/north-america/us-latest.osm.pbf";
pub const DEFAULT_IMAGE: &str = "ghcr.io/project-osrm/osrm-backend";
pub const DEFAULT_SERVER_CONTAINER: &str = "haulage-osrm";

/// Everything a setup run needs. Written as JSON for detached runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    pub data_dir: PathBuf,
    pub extract_url: String,
    pub image: String,
    pub server_container: String,
    pub port: u16,
    /// Overrides the thread count derived from available memory.
    pub threads: Option<usize>,
    /// JSON file with the truck dimensions, defaults when absent.
    pub vehicle_file: Option<PathBuf>,
    pub overwrite: OverwritePolicy,
    pub server_start_timeout: SignedDuration,
    pub max_table_size: usize,
    /// Stop after this stage instead of serving.
    pub until: Option<crate::state::PipelineStage>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./osrm-data"),
            extract_url: String::from(DEFAULT_EXTRACT_URL),
            image: String::from(DEFAULT_IMAGE),
            server_container: String::from(DEFAULT_SERVER_CONTAINER),
            port: 5000,
            threads: None,
            vehicle_file: None,
            overwrite: OverwritePolicy::Ask,
            server_start_timeout: SignedDuration::from_mins(5),
            max_table_size: 10_000,
            until: None,
        }
    }
}

impl SetupConfig {
    pub fn dataset(&self) -> Result<Dataset, SetupError> {
        Dataset::from_url(&self.data_dir, &self.extract_url)
    }

    pub fn osrm_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    pub fn truck_profile(&self) -> Result<TruckProfile, SetupError> {
        let vehicle = match &self.vehicle_file {
            Some(path) => VehicleSpec::from_file(path)?,
            None => VehicleSpec::default(),
        };
        vehicle.validate()?;

        Ok(TruckProfile::for_vehicle(vehicle))
    }

    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let content = std::fs::read_to_string(path).map_err(SetupError::io(path))?;
        serde_json::from_str(&content).map_err(|source| SetupError::State {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SetupError> {
        let content = serde_json::to_string_pretty(self).map_err(|source| SetupError::State {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(SetupError::io(path))
    }
}
