use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read vehicle spec {path}")]
    ReadVehicle {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid vehicle spec {path}")]
    ParseVehicle {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Vehicle {0} must be a positive number")]
    InvalidDimension(&'static str),
}
