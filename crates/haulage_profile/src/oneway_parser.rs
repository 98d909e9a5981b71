use crate::way::Way;

static ONEWAYS: [&str; 3] = ["yes", "true", "1"];
static TWOWAYS: [&str; 3] = ["no", "false", "0"];
static REVERSIBLE: [&str; 2] = ["reversible", "alternating"];

/// Directions a way can be travelled in, relative to its node order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelDirections {
    Both,
    Forward,
    Backward,
    /// Direction changes over time (`oneway=reversible`), not routable.
    Reversible,
}

pub struct OnewayParser;

impl OnewayParser {
    // https://wiki.openstreetmap.org/wiki/Key:junction
    fn is_roundabout(way: &Way) -> bool {
        way.has_tag("junction", "roundabout") || way.has_tag("junction", "circular")
    }

    fn is_implied_oneway(way: &Way) -> bool {
        OnewayParser::is_roundabout(way)
            || way.has_tag("highway", "motorway")
            || way.has_tag("highway", "motorway_link")
    }

    // https://wiki.openstreetmap.org/wiki/Key:oneway
    pub fn parse(way: &Way) -> TravelDirections {
        let oneway = way
            .first_tag(&["oneway:hgv", "oneway:vehicle", "oneway"])
            .map(|(_, value)| value);

        match oneway {
            Some("-1") => TravelDirections::Backward,
            Some(value) if ONEWAYS.contains(&value) => TravelDirections::Forward,
            Some(value) if TWOWAYS.contains(&value) => TravelDirections::Both,
            Some(value) if REVERSIBLE.contains(&value) => TravelDirections::Reversible,
            _ if OnewayParser::is_implied_oneway(way) => TravelDirections::Forward,
            _ => TravelDirections::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn road(tags: &[(&str, &str)]) -> Way {
        tags.iter()
            .copied()
            .chain([("highway", "secondary")])
            .collect()
    }

    #[test]
    fn test_explicit_oneway() {
        assert_eq!(OnewayParser::parse(&road(&[])), TravelDirections::Both);
        assert_eq!(
            OnewayParser::parse(&road(&[("oneway", "yes")])),
            TravelDirections::Forward
        );
        assert_eq!(
            OnewayParser::parse(&road(&[("oneway", "-1")])),
            TravelDirections::Backward
        );
        assert_eq!(
            OnewayParser::parse(&road(&[("oneway", "reversible")])),
            TravelDirections::Reversible
        );
    }

    #[test]
    fn test_implied_oneway() {
        assert_eq!(
            OnewayParser::parse(&road(&[("junction", "roundabout")])),
            TravelDirections::Forward
        );

        let motorway = Way::new().with_tag("highway", "motorway");
        assert_eq!(OnewayParser::parse(&motorway), TravelDirections::Forward);
        assert_eq!(
            OnewayParser::parse(&motorway.with_tag("oneway", "no")),
            TravelDirections::Both
        );
    }

    #[test]
    fn test_vehicle_specific_oneway_wins() {
        assert_eq!(
            OnewayParser::parse(&road(&[("oneway", "yes"), ("oneway:hgv", "no")])),
            TravelDirections::Both
        );
    }
}
