use serde::Serialize;

use crate::response::{TableResponse, Waypoint};

/// Durations (seconds) and distances (meters) between sources and
/// destinations, as returned by the OSRM table service.
///
/// Rows are sources, columns destinations. `None` marks an unreachable pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DistanceMatrixResult {
    pub durations: Vec<Vec<Option<f64>>>,
    pub distances: Vec<Vec<Option<f64>>>,
    pub sources: Vec<Waypoint>,
    pub destinations: Vec<Waypoint>,
}

impl DistanceMatrixResult {
    pub fn duration(&self, source: usize, destination: usize) -> Option<f64> {
        self.durations
            .get(source)
            .and_then(|row| row.get(destination))
            .copied()
            .flatten()
    }

    pub fn distance(&self, source: usize, destination: usize) -> Option<f64> {
        self.distances
            .get(source)
            .and_then(|row| row.get(destination))
            .copied()
            .flatten()
    }

    pub fn is_square(&self) -> bool {
        let rows = self.durations.len();
        self.durations.iter().all(|row| row.len() == rows)
    }
}

impl From<TableResponse> for DistanceMatrixResult {
    fn from(response: TableResponse) -> Self {
        Self {
            durations: response.durations,
            distances: response.distances,
            sources: response.sources,
            destinations: response.destinations,
        }
    }
}

/// Road network positions closest to a coordinate.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NearestResult {
    pub waypoints: Vec<Waypoint>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchResult {
    pub matchings: Vec<crate::response::Matching>,
    /// One entry per input coordinate, `None` when it was dropped as an outlier.
    pub tracepoints: Vec<Option<Waypoint>>,
}
