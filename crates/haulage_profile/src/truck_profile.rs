use serde::{Deserialize, Serialize};

use crate::{
    access_parser::{Exclusion, TruckAccessParser, WayAccess},
    average_speed_parser::AverageSpeedParser,
    oneway_parser::{OnewayParser, TravelDirections},
    vehicle_spec::VehicleSpec,
    way::Way,
};

/// Speed of a direction that cannot be travelled.
pub const IMPASSABLE: f64 = 0.0;

/// Forward and backward speed of a way in km/h, relative to its node order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedPair {
    pub forward: f64,
    pub backward: f64,
}

impl SpeedPair {
    pub fn is_forward_passable(&self) -> bool {
        self.forward > IMPASSABLE
    }

    pub fn is_backward_passable(&self) -> bool {
        self.backward > IMPASSABLE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentVerdict {
    Passable(SpeedPair),
    Excluded(Exclusion),
}

impl SegmentVerdict {
    pub fn speeds(self) -> Option<SpeedPair> {
        match self {
            SegmentVerdict::Passable(speeds) => Some(speeds),
            SegmentVerdict::Excluded(_) => None,
        }
    }
}

/// Per-way speed and exclusion rules for a moving truck.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruckProfile {
    pub vehicle: VehicleSpec,
    /// Applied to every class speed and posted limit: trucks drive slower than cars.
    pub speed_multiplier: f64,
    pub max_speed_kmh: f64,
}

impl Default for TruckProfile {
    fn default() -> Self {
        Self {
            vehicle: VehicleSpec::default(),
            speed_multiplier: 0.85,
            max_speed_kmh: 90.0,
        }
    }
}

impl TruckProfile {
    pub fn for_vehicle(vehicle: VehicleSpec) -> Self {
        Self {
            vehicle,
            ..Self::default()
        }
    }

    pub fn evaluate(&self, way: &Way) -> SegmentVerdict {
        if let WayAccess::Excluded(exclusion) = TruckAccessParser::get_truck_access(way, &self.vehicle)
        {
            return SegmentVerdict::Excluded(exclusion);
        }

        let Some(speed) = AverageSpeedParser::parse_average_speed(way) else {
            return SegmentVerdict::Excluded(Exclusion::NotDrivable(
                way.get_tag("highway").map(String::from),
            ));
        };

        let speed = (speed * self.speed_multiplier).min(self.max_speed_kmh);

        let speeds = match OnewayParser::parse(way) {
            TravelDirections::Both => SpeedPair {
                forward: speed,
                backward: speed,
            },
            TravelDirections::Forward => SpeedPair {
                forward: speed,
                backward: IMPASSABLE,
            },
            TravelDirections::Backward => SpeedPair {
                forward: IMPASSABLE,
                backward: speed,
            },
            TravelDirections::Reversible => return SegmentVerdict::Excluded(Exclusion::Reversible),
        };

        SegmentVerdict::Passable(speeds)
    }

    /// `None` when trucks may not use the way at all.
    pub fn speeds(&self, way: &Way) -> Option<SpeedPair> {
        self.evaluate(way).speeds()
    }
}
