use std::fmt::Display;

use crate::{
    average_speed_parser::AverageSpeedParser,
    units::{parse_length_meters, parse_weight_tonnes},
    vehicle_spec::VehicleSpec,
    way::Way,
};

/// Access tags from the most to the least specific; the first one present
/// decides.
// https://wiki.openstreetmap.org/wiki/Key:access#Land-based_transportation
pub static ACCESS_KEYS: [&str; 5] = ["hgv", "goods", "motor_vehicle", "vehicle", "access"];

pub static BLOCKED_ACCESS_VALUES: [&str; 7] = [
    "no",
    "private",
    "agricultural",
    "forestry",
    "emergency",
    "psv",
    "military",
];

pub static HEIGHT_KEYS: [&str; 2] = ["maxheight:physical", "maxheight"];
pub static WIDTH_KEYS: [&str; 2] = ["maxwidth:physical", "maxwidth"];
pub static LENGTH_KEYS: [&str; 2] = ["maxlength:hgv", "maxlength"];
pub static WEIGHT_KEYS: [&str; 2] = ["maxweight:hgv", "maxweight"];

#[derive(Debug, Clone, PartialEq)]
pub enum Exclusion {
    NotDrivable(Option<String>),
    AccessRestricted { key: String, value: String },
    Area,
    Impassable,
    EmergencyAccess,
    TooLow { limit: f64, height: f64 },
    TooNarrow { limit: f64, width: f64 },
    TooLong { limit: f64, length: f64 },
    TooHeavy { limit: f64, weight: f64 },
    Reversible,
}

impl Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::NotDrivable(Some(highway)) => write!(f, "highway={highway} is not drivable"),
            Exclusion::NotDrivable(None) => write!(f, "not a highway"),
            Exclusion::AccessRestricted { key, value } => write!(f, "{key}={value}"),
            Exclusion::Area => write!(f, "area"),
            Exclusion::Impassable => write!(f, "impassable"),
            Exclusion::EmergencyAccess => write!(f, "emergency access only"),
            Exclusion::TooLow { limit, height } => {
                write!(f, "clearance {limit:.2} m below vehicle height {height:.2} m")
            }
            Exclusion::TooNarrow { limit, width } => {
                write!(f, "width limit {limit:.2} m below vehicle width {width:.2} m")
            }
            Exclusion::TooLong { limit, length } => {
                write!(f, "length limit {limit:.2} m below vehicle length {length:.2} m")
            }
            Exclusion::TooHeavy { limit, weight } => {
                write!(f, "weight limit {limit:.2} t below vehicle weight {weight:.2} t")
            }
            Exclusion::Reversible => write!(f, "reversible lanes"),
        }
    }
}

pub enum WayAccess {
    Way,
    Excluded(Exclusion),
}

pub struct TruckAccessParser;

impl TruckAccessParser {
    fn highway_access(way: &Way) -> Result<(), Exclusion> {
        let highway = way.get_tag("highway");

        match highway {
            None => Err(Exclusion::NotDrivable(None)),
            // https://wiki.openstreetmap.org/wiki/Tag:highway%3Dservice
            Some("service") if way.has_tag("service", "emergency_access") => {
                Err(Exclusion::EmergencyAccess)
            }
            Some(value) if AverageSpeedParser::default_speed_for_highway(value).is_some() => {
                if way.has_tag("area", "yes") {
                    Err(Exclusion::Area)
                } else if way.has_tag("impassable", "yes") {
                    Err(Exclusion::Impassable)
                } else {
                    Ok(())
                }
            }
            Some(value) => Err(Exclusion::NotDrivable(Some(value.to_string()))),
        }
    }

    fn legal_access(way: &Way) -> Result<(), Exclusion> {
        match way.first_tag(&ACCESS_KEYS) {
            Some((key, value)) if BLOCKED_ACCESS_VALUES.contains(&value) => {
                Err(Exclusion::AccessRestricted {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn physical_access(way: &Way, vehicle: &VehicleSpec) -> Result<(), Exclusion> {
        let limit = |keys: &[&str], parse: fn(&str) -> Option<f64>| {
            way.first_tag(keys).and_then(|(_, value)| parse(value))
        };

        if let Some(limit) = limit(&HEIGHT_KEYS, parse_length_meters) {
            if vehicle.height > limit {
                return Err(Exclusion::TooLow {
                    limit,
                    height: vehicle.height,
                });
            }
        }

        if let Some(limit) = limit(&WIDTH_KEYS, parse_length_meters) {
            if vehicle.width > limit {
                return Err(Exclusion::TooNarrow {
                    limit,
                    width: vehicle.width,
                });
            }
        }

        if let Some(limit) = limit(&LENGTH_KEYS, parse_length_meters) {
            if vehicle.length > limit {
                return Err(Exclusion::TooLong {
                    limit,
                    length: vehicle.length,
                });
            }
        }

        if let Some(limit) = limit(&WEIGHT_KEYS, parse_weight_tonnes) {
            if vehicle.weight > limit {
                return Err(Exclusion::TooHeavy {
                    limit,
                    weight: vehicle.weight,
                });
            }
        }

        Ok(())
    }

    pub fn get_truck_access(way: &Way, vehicle: &VehicleSpec) -> WayAccess {
        let access = TruckAccessParser::highway_access(way)
            .and_then(|_| TruckAccessParser::legal_access(way))
            .and_then(|_| TruckAccessParser::physical_access(way, vehicle));

        match access {
            Ok(()) => WayAccess::Way,
            Err(exclusion) => WayAccess::Excluded(exclusion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excluded(way: &Way) -> Option<Exclusion> {
        match TruckAccessParser::get_truck_access(way, &VehicleSpec::default()) {
            WayAccess::Way => None,
            WayAccess::Excluded(exclusion) => Some(exclusion),
        }
    }

    fn primary() -> Way {
        Way::new().with_tag("highway", "primary")
    }

    #[test]
    fn test_drivable_classes() {
        assert_eq!(excluded(&primary()), None);
        assert_eq!(
            excluded(&Way::new().with_tag("highway", "footway")),
            Some(Exclusion::NotDrivable(Some(String::from("footway"))))
        );
        assert_eq!(
            excluded(&Way::new().with_tag("highway", "track")),
            Some(Exclusion::NotDrivable(Some(String::from("track"))))
        );
        assert_eq!(
            excluded(&Way::new().with_tag("railway", "rail")),
            Some(Exclusion::NotDrivable(None))
        );
    }

    #[test]
    fn test_service_roads() {
        let service = Way::new().with_tag("highway", "service");
        assert_eq!(excluded(&service), None);
        assert_eq!(
            excluded(&service.with_tag("service", "emergency_access")),
            Some(Exclusion::EmergencyAccess)
        );
    }

    #[test]
    fn test_access_hierarchy() {
        assert!(matches!(
            excluded(&primary().with_tag("access", "private")),
            Some(Exclusion::AccessRestricted { .. })
        ));
        assert!(matches!(
            excluded(&primary().with_tag("hgv", "no")),
            Some(Exclusion::AccessRestricted { .. })
        ));

        // The more specific tag wins
        assert_eq!(
            excluded(&primary().with_tag("access", "no").with_tag("hgv", "designated")),
            None
        );
        assert_eq!(
            excluded(&primary().with_tag("access", "destination")),
            None
        );
    }

    #[test]
    fn test_low_clearance() {
        assert_eq!(
            excluded(&primary().with_tag("maxheight", "3.5")),
            Some(Exclusion::TooLow {
                limit: 3.5,
                height: 4.0
            })
        );
        assert_eq!(excluded(&primary().with_tag("maxheight", "4.2")), None);
        assert_eq!(excluded(&primary().with_tag("maxheight", "4")), None);
        assert_eq!(excluded(&primary().with_tag("maxheight", "default")), None);
        assert!(excluded(&primary().with_tag("maxheight:physical", "12'6\"")).is_some());
    }

    #[test]
    fn test_width_length_and_weight() {
        assert!(matches!(
            excluded(&primary().with_tag("maxwidth", "2.2")),
            Some(Exclusion::TooNarrow { .. })
        ));
        assert!(matches!(
            excluded(&primary().with_tag("maxlength", "10")),
            Some(Exclusion::TooLong { .. })
        ));
        assert!(matches!(
            excluded(&primary().with_tag("maxweight", "7.5")),
            Some(Exclusion::TooHeavy { .. })
        ));
        assert_eq!(excluded(&primary().with_tag("maxweight", "40")), None);
    }
}
