use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Profile segment of OSRM request paths.
///
/// `osrm-routed` serves a single dataset and ignores the segment, but it still
/// shows up in logs and makes the intent of a request explicit.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, Hash, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RouteProfile {
    #[default]
    Driving,
    Truck,
}

impl Display for RouteProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RouteProfile::Driving => "driving",
                RouteProfile::Truck => "truck",
            }
        )
    }
}

impl std::str::FromStr for RouteProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driving" | "car" => Ok(RouteProfile::Driving),
            "truck" | "hgv" => Ok(RouteProfile::Truck),
            other => Err(format!("Unknown routing profile: {other}")),
        }
    }
}
