use geo_types::LineString;
use serde::Serialize;

use crate::response::{OsrmRoute, RouteStep};

const MILES_PER_KM: f64 = 0.621371;

/// Moving truck fuel economy.
pub const TRUCK_MILES_PER_GALLON: f64 = 8.0;
/// Fuel price in USD.
pub const FUEL_PRICE_PER_GALLON: f64 = 3.50;

/// Average speed band treated as mostly highway driving.
const HIGHWAY_SPEED_BAND_KMH: (f64, f64) = (60.0, 100.0);
/// Below this average speed the route is treated as mostly urban streets.
const URBAN_SPEED_KMH: f64 = 25.0;
const ROAD_MIX_ADJUSTMENT: f64 = 0.1;

const REFERENCE_SPEED_KMH: f64 = 90.0;
const LONG_HAUL_KM: f64 = 500.0;
const QUALITY_SPEED_WEIGHT: f64 = 0.6;
const QUALITY_DISTANCE_WEIGHT: f64 = 0.4;

/// One route returned by OSRM, with heuristics for moving trucks.
///
/// Every derived value is a pure function of `distance_meters` and
/// `duration_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOption {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub weight: f64,
    pub weight_name: String,
    pub geometry: Option<LineString<f64>>,
    pub steps: Option<Vec<RouteStep>>,
}

impl RouteOption {
    pub fn new(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            distance_meters,
            duration_seconds,
            weight: duration_seconds,
            weight_name: String::from("routability"),
            geometry: None,
            steps: None,
        }
    }

    pub(crate) fn from_osrm(route: OsrmRoute, include_steps: bool) -> Self {
        let steps = if include_steps {
            Some(
                route
                    .legs
                    .into_iter()
                    .next()
                    .map(|leg| leg.steps)
                    .unwrap_or_default(),
            )
        } else {
            None
        };

        Self {
            distance_meters: route.distance,
            duration_seconds: route.duration,
            weight: route.weight.unwrap_or(route.duration),
            weight_name: route
                .weight_name
                .unwrap_or_else(|| String::from("routability")),
            geometry: route
                .geometry
                .map(|geometry| LineString::from(geometry.coordinates)),
            steps,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds / 60.0
    }

    pub fn avg_speed_kmh(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }

        self.distance_km() / (self.duration_seconds / 3600.0)
    }

    /// Fuel cost in USD for a moving truck.
    pub fn estimated_fuel_cost(&self) -> f64 {
        let gallons = self.distance_km() * MILES_PER_KM / TRUCK_MILES_PER_GALLON;
        gallons * FUEL_PRICE_PER_GALLON
    }

    /// Score in `[0, 1]`, higher is better suited to a moving truck.
    ///
    /// OSRM does not return road classes, so the average speed stands in for
    /// the road mix: highway speeds raise the score, stop-and-go city speeds
    /// lower it.
    pub fn truck_suitability_score(&self) -> f64 {
        let base = match self.duration_seconds {
            d if d < 300.0 => 0.9,
            d if d < 900.0 => 0.8,
            d if d < 1800.0 => 0.7,
            _ => 0.6,
        };

        let speed = self.avg_speed_kmh();
        let adjustment = if speed >= HIGHWAY_SPEED_BAND_KMH.0 && speed <= HIGHWAY_SPEED_BAND_KMH.1 {
            ROAD_MIX_ADJUSTMENT
        } else if speed > 0.0 && speed < URBAN_SPEED_KMH {
            -ROAD_MIX_ADJUSTMENT
        } else {
            0.0
        };

        (base + adjustment).clamp(0.0, 1.0)
    }

    /// Score in `[0, 1]` mixing speed and distance.
    pub fn route_quality_score(&self) -> f64 {
        let speed_factor = (self.avg_speed_kmh() / REFERENCE_SPEED_KMH).min(1.0);
        let distance_factor = 1.0 / (1.0 + self.distance_km().max(0.0) / LONG_HAUL_KM);

        (QUALITY_SPEED_WEIGHT * speed_factor + QUALITY_DISTANCE_WEIGHT * distance_factor)
            .clamp(0.0, 1.0)
    }
}
