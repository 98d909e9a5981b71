//! Parsers for the unit-bearing values of restriction tags.
//!
//! Unparseable values yield `None`: a tag nobody can read does not restrict
//! anything.

const METERS_PER_FOOT: f64 = 0.3048;
const METERS_PER_INCH: f64 = 0.0254;
const TONNES_PER_POUND: f64 = 0.000_453_592_37;
const TONNES_PER_SHORT_TON: f64 = 0.907_184_74;
const KMH_PER_MPH: f64 = 1.609_344;

/// Speed used for `maxspeed=none`, capped later by the profile.
pub const UNLIMITED_SPEED_KMH: f64 = 150.0;
pub const WALK_SPEED_KMH: f64 = 5.0;

/// Length units with their factor to meters.
pub const LENGTH_UNITS: [(&str, f64); 11] = [
    ("", 1.0),
    ("m", 1.0),
    ("meter", 1.0),
    ("meters", 1.0),
    ("metre", 1.0),
    ("metres", 1.0),
    ("cm", 0.01),
    ("ft", METERS_PER_FOOT),
    ("feet", METERS_PER_FOOT),
    ("in", METERS_PER_INCH),
    ("\"", METERS_PER_INCH),
];

/// Weight units with their factor to metric tonnes.
pub const WEIGHT_UNITS: [(&str, f64); 10] = [
    ("", 1.0),
    ("t", 1.0),
    ("tonne", 1.0),
    ("tonnes", 1.0),
    ("kg", 0.001),
    ("lb", TONNES_PER_POUND),
    ("lbs", TONNES_PER_POUND),
    ("st", TONNES_PER_SHORT_TON),
    ("short_ton", TONNES_PER_SHORT_TON),
    ("short_tons", TONNES_PER_SHORT_TON),
];

/// Speed units with their factor to km/h.
pub const SPEED_UNITS: [(&str, f64); 6] = [
    ("", 1.0),
    ("km/h", 1.0),
    ("kmh", 1.0),
    ("kph", 1.0),
    ("mph", KMH_PER_MPH),
    ("knots", 1.852),
];

fn factor(units: &[(&str, f64)], unit: &str) -> Option<f64> {
    units
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, factor)| *factor)
}

/// Values meaning "there is a sign, but no restriction".
static NO_RESTRICTION: [&str; 7] = [
    "none",
    "default",
    "unsigned",
    "below_default",
    "no_sign",
    "no_indications",
    "unknown",
];

fn split_number(value: &str) -> Option<(f64, &str)> {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == ','))
        .map_or(value.len(), |(i, _)| i);

    let number = value[..end].replace(',', ".").parse::<f64>().ok()?;
    Some((number, value[end..].trim()))
}

// https://wiki.openstreetmap.org/wiki/Key:maxheight
fn parse_feet_inches(value: &str) -> Option<f64> {
    let (feet, rest) = value.split_once('\'')?;
    let feet = feet.trim().parse::<f64>().ok()?;
    let inches = rest.trim().trim_end_matches('"').trim();

    let inches = if inches.is_empty() {
        0.0
    } else {
        inches.parse::<f64>().ok()?
    };

    Some(feet * METERS_PER_FOOT + inches * METERS_PER_INCH)
}

/// Length in meters (`maxheight`, `maxwidth`, `maxlength`).
pub fn parse_length_meters(value: &str) -> Option<f64> {
    let value = value.trim();

    if NO_RESTRICTION.contains(&value) {
        return None;
    }

    if value.contains('\'') {
        return parse_feet_inches(value);
    }

    let (number, unit) = split_number(value)?;
    let meters = number * factor(&LENGTH_UNITS, unit)?;

    (meters > 0.0).then_some(meters)
}

/// Weight in metric tonnes (`maxweight`).
pub fn parse_weight_tonnes(value: &str) -> Option<f64> {
    let value = value.trim();

    if NO_RESTRICTION.contains(&value) {
        return None;
    }

    let (number, unit) = split_number(value)?;
    let tonnes = number * factor(&WEIGHT_UNITS, unit)?;

    (tonnes > 0.0).then_some(tonnes)
}

// https://wiki.openstreetmap.org/wiki/Key:maxspeed
pub fn parse_max_speed_kmh(value: &str) -> Option<f64> {
    match value.trim() {
        "walk" => Some(WALK_SPEED_KMH),
        "none" => Some(UNLIMITED_SPEED_KMH),
        max_speed => {
            let (number, unit) = split_number(max_speed)?;
            let speed = number * factor(&SPEED_UNITS, unit)?;
            (speed > 0.0).then_some(speed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(value: Option<f64>, expected: f64) -> bool {
        value.is_some_and(|v| (v - expected).abs() < 1e-3)
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length_meters("3.5"), Some(3.5));
        assert_eq!(parse_length_meters("3.5 m"), Some(3.5));
        assert_eq!(parse_length_meters("3,8m"), Some(3.8));
        assert!(approx(parse_length_meters("11'6\""), 3.5052));
        assert!(approx(parse_length_meters("12'"), 3.6576));
        assert!(approx(parse_length_meters("13 ft"), 3.9624));
        assert_eq!(parse_length_meters("350 cm"), Some(3.5));
        assert!(approx(parse_length_meters("150 in"), 3.81));
        assert!(approx(parse_length_meters("150\""), 3.81));
    }

    #[test]
    fn test_parse_length_without_restriction() {
        assert_eq!(parse_length_meters("none"), None);
        assert_eq!(parse_length_meters("default"), None);
        assert_eq!(parse_length_meters("below_default"), None);
        assert_eq!(parse_length_meters("low"), None);
        assert_eq!(parse_length_meters("0"), None);
    }

    #[test]
    fn test_parse_weight() {
        assert_eq!(parse_weight_tonnes("7.5"), Some(7.5));
        assert_eq!(parse_weight_tonnes("7.5 t"), Some(7.5));
        assert_eq!(parse_weight_tonnes("3500 kg"), Some(3.5));
        assert!(approx(parse_weight_tonnes("10000 lbs"), 4.5359));
        assert!(approx(parse_weight_tonnes("20 st"), 18.1437));
        assert_eq!(parse_weight_tonnes("unsigned"), None);
    }

    #[test]
    fn test_parse_max_speed() {
        assert_eq!(parse_max_speed_kmh("50"), Some(50.0));
        assert_eq!(parse_max_speed_kmh("walk"), Some(5.0));
        assert_eq!(parse_max_speed_kmh("none"), Some(150.0));
        assert!(approx(parse_max_speed_kmh("55 mph"), 88.514));
        assert_eq!(parse_max_speed_kmh("RU:urban"), None);
        assert_eq!(parse_max_speed_kmh("signals"), None);
    }
}
