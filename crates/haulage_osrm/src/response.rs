//! Wire types of the OSRM HTTP API (v5).
//!
//! Only the fields the client reads are modelled. Unknown fields are ignored
//! and optional ones default, so newer servers stay compatible.

use serde::{Deserialize, Serialize};

/// Every OSRM response carries a `code`, error responses also a `message`.
#[derive(Deserialize, Debug)]
pub struct OsrmStatus {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl OsrmStatus {
    pub fn is_ok(&self) -> bool {
        self.code == "Ok"
    }
}

#[derive(Deserialize, Debug)]
pub struct RouteResponse {
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

#[derive(Deserialize, Debug)]
pub struct OsrmRoute {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    pub weight: Option<f64>,
    pub weight_name: Option<String>,
    pub geometry: Option<OsrmGeometry>,
    #[serde(default)]
    pub legs: Vec<OsrmLeg>,
}

/// GeoJSON line geometry, requested with `geometries=geojson`.
#[derive(Deserialize, Debug)]
pub struct OsrmGeometry {
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize, Debug)]
pub struct OsrmLeg {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RouteStep {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub maneuver: Option<Maneuver>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Maneuver {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub modifier: Option<String>,
    #[serde(default)]
    pub location: Option<[f64; 2]>,
}

/// A coordinate snapped to the road network.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Waypoint {
    #[serde(default)]
    pub name: String,
    pub location: [f64; 2],
    /// Distance in meters between the input coordinate and the snapped one.
    #[serde(default)]
    pub distance: f64,
}

#[derive(Deserialize, Debug)]
pub struct TableResponse {
    #[serde(default)]
    pub durations: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub distances: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub sources: Vec<Waypoint>,
    #[serde(default)]
    pub destinations: Vec<Waypoint>,
}

#[derive(Deserialize, Debug)]
pub struct NearestResponse {
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

#[derive(Deserialize, Debug)]
pub struct MatchResponse {
    #[serde(default)]
    pub matchings: Vec<Matching>,
    #[serde(default)]
    pub tracepoints: Vec<Option<Waypoint>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Matching {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub confidence: f64,
}
