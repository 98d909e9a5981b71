use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Dimensions of the truck the profile is built for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSpec {
    /// Meters
    pub height: f64,
    /// Meters
    pub width: f64,
    /// Meters
    pub length: f64,
    /// Metric tonnes, loaded
    pub weight: f64,
}

impl Default for VehicleSpec {
    fn default() -> Self {
        Self {
            height: 4.0,
            width: 2.6,
            length: 12.0,
            weight: 18.0,
        }
    }
}

impl VehicleSpec {
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProfileError::ReadVehicle {
            path: path.to_path_buf(),
            source,
        })?;

        let vehicle: VehicleSpec =
            serde_json::from_str(&content).map_err(|source| ProfileError::ParseVehicle {
                path: path.to_path_buf(),
                source,
            })?;

        vehicle.validate()?;
        Ok(vehicle)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let dimensions = [
            ("height", self.height),
            ("width", self.width),
            ("length", self.length),
            ("weight", self.weight),
        ];

        for (name, value) in dimensions {
            if !(value.is_finite() && value > 0.0) {
                return Err(ProfileError::InvalidDimension(name));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let vehicle: VehicleSpec = serde_json::from_str(r#"{"height": 3.8}"#).unwrap();

        assert_eq!(vehicle.height, 3.8);
        assert_eq!(vehicle.weight, VehicleSpec::default().weight);
    }

    #[test]
    fn test_validate() {
        assert!(VehicleSpec::default().validate().is_ok());

        let vehicle = VehicleSpec {
            width: 0.0,
            ..VehicleSpec::default()
        };
        assert!(matches!(
            vehicle.validate(),
            Err(ProfileError::InvalidDimension("width"))
        ));
    }
}
