use crate::{units::parse_max_speed_kmh, way::Way};

/// Free-flow truck speed per highway class, in km/h. Classes missing here
/// are not drivable by trucks.
pub static HIGHWAY_SPEEDS: [(&str, f64); 14] = [
    ("motorway", 90.0),
    ("motorway_link", 45.0),
    ("trunk", 85.0),
    ("trunk_link", 40.0),
    ("primary", 65.0),
    ("primary_link", 30.0),
    ("secondary", 55.0),
    ("secondary_link", 25.0),
    ("tertiary", 40.0),
    ("tertiary_link", 20.0),
    ("unclassified", 25.0),
    ("residential", 25.0),
    ("living_street", 10.0),
    ("service", 15.0),
];

pub struct AverageSpeedParser;

impl AverageSpeedParser {
    pub fn default_speed_for_highway(highway: &str) -> Option<f64> {
        HIGHWAY_SPEEDS
            .iter()
            .find(|(class, _)| *class == highway)
            .map(|(_, speed)| *speed)
    }

    fn max_speed(way: &Way) -> Option<f64> {
        way.first_tag(&["maxspeed:hgv", "maxspeed"])
            .and_then(|(_, value)| parse_max_speed_kmh(value))
    }

    /// Speed before the truck multiplier: the posted limit when there is one,
    /// the class default otherwise.
    pub fn parse_average_speed(way: &Way) -> Option<f64> {
        let highway_speed = AverageSpeedParser::default_speed_for_highway(way.get_tag("highway")?)?;

        Some(AverageSpeedParser::max_speed(way).unwrap_or(highway_speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_speed() {
        let way = Way::new().with_tag("highway", "primary");
        assert_eq!(AverageSpeedParser::parse_average_speed(&way), Some(65.0));
    }

    #[test]
    fn test_max_speed_overrides_default() {
        let way = Way::new()
            .with_tag("highway", "primary")
            .with_tag("maxspeed", "50");
        assert_eq!(AverageSpeedParser::parse_average_speed(&way), Some(50.0));

        let way = way.with_tag("maxspeed:hgv", "40");
        assert_eq!(AverageSpeedParser::parse_average_speed(&way), Some(40.0));
    }

    #[test]
    fn test_unknown_class_has_no_speed() {
        let way = Way::new().with_tag("highway", "footway");
        assert_eq!(AverageSpeedParser::parse_average_speed(&way), None);
        assert_eq!(AverageSpeedParser::parse_average_speed(&Way::new()), None);
    }
}
