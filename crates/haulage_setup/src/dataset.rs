use std::path::{Path, PathBuf};

use crate::error::SetupError;

const PBF_SUFFIX: &str = ".osm.pbf";

/// File layout of one extract inside the data directory.
///
/// The data directory is mounted as `/data` in every container.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    data_dir: PathBuf,
    /// File name without `.osm.pbf`, e.g. `us-latest`.
    name: String,
}

impl Dataset {
    pub fn new(data_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            name: name.into(),
        }
    }

    /// Dataset named after the last path segment of a Geofabrik-style URL.
    pub fn from_url(data_dir: impl Into<PathBuf>, url: &str) -> Result<Self, SetupError> {
        let file_name = url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default();

        match file_name.strip_suffix(PBF_SUFFIX) {
            Some(name) if !name.is_empty() => Ok(Dataset::new(data_dir, name)),
            _ => Err(SetupError::InvalidExtractUrl(url.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn pbf_file_name(&self) -> String {
        format!("{}{}", self.name, PBF_SUFFIX)
    }

    pub fn pbf_path(&self) -> PathBuf {
        self.data_dir.join(self.pbf_file_name())
    }

    /// Base name every OSRM tool takes, e.g. `us-latest.osrm`.
    pub fn osrm_file_name(&self) -> String {
        format!("{}.osrm", self.name)
    }

    /// One of the `<name>.osrm.<extension>` files written by the OSRM tools.
    pub fn osrm_artifact(&self, extension: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", self.osrm_file_name(), extension))
    }

    pub fn profile_file_name(&self) -> &'static str {
        "truck.lua"
    }

    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join(self.profile_file_name())
    }

    pub fn state_path(&self) -> PathBuf {
        state_path(&self.data_dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        logs_dir(&self.data_dir)
    }

    /// Path of `file_name` as seen from inside a container.
    pub fn container_path(file_name: &str) -> String {
        format!("/data/{file_name}")
    }
}

pub fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join("pipeline_state.json")
}

pub fn logs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

pub fn runner_record_path(data_dir: &Path) -> PathBuf {
    data_dir.join("runner.json")
}

pub fn runner_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("runner_config.json")
}

pub fn control_socket_path(data_dir: &Path) -> PathBuf {
    data_dir.join("haulage.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        let dataset = Dataset::from_url(
            "/srv/osrm",
            "https://download.geofabrik.de/north-america/us-latest.osm.pbf",
        )
        .unwrap();

        assert_eq!(dataset.name(), "us-latest");
        assert_eq!(dataset.pbf_path(), PathBuf::from("/srv/osrm/us-latest.osm.pbf"));
        assert_eq!(dataset.osrm_file_name(), "us-latest.osrm");
        assert_eq!(
            dataset.osrm_artifact("partition"),
            PathBuf::from("/srv/osrm/us-latest.osrm.partition")
        );
        assert_eq!(
            Dataset::container_path(&dataset.osrm_file_name()),
            "/data/us-latest.osrm"
        );
    }

    #[test]
    fn test_from_url_with_query() {
        let dataset = Dataset::from_url(
            "/srv/osrm",
            "https://mirror.example.org/europe/belgium-latest.osm.pbf?token=abc",
        )
        .unwrap();

        assert_eq!(dataset.name(), "belgium-latest");
    }

    #[test]
    fn test_from_url_rejects_other_files() {
        assert!(Dataset::from_url("/srv", "https://example.org/us-latest.osm.bz2").is_err());
        assert!(Dataset::from_url("/srv", "https://example.org/.osm.pbf").is_err());
    }
}
