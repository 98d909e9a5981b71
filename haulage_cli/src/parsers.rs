use haulage_osrm::Coordinate;
use jiff::SpanRelativeTo;

pub fn parse_duration(input: &str) -> Result<jiff::SignedDuration, String> {
    if let Ok(duration) = input.parse::<jiff::SignedDuration>() {
        return Ok(duration);
    }

    if let Ok(duration) = input
        .parse::<jiff::Span>()
        .and_then(|span| span.to_duration(SpanRelativeTo::days_are_24_hours()))
    {
        return Ok(duration);
    }

    if let Ok(seconds) = input.parse::<i64>() {
        return Ok(jiff::SignedDuration::from_secs(seconds.abs()));
    }

    Err(String::from("Invalid duration"))
}

/// `lon,lat`, the order OSRM uses.
pub fn parse_coordinate(input: &str) -> Result<Coordinate, String> {
    let (lon, lat) = input
        .split_once(',')
        .ok_or_else(|| format!("Expected lon,lat, got {input}"))?;

    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("Invalid longitude {lon}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("Invalid latitude {lat}"))?;

    Ok(Coordinate::new(lon, lat))
}

/// `key=value` OSM tag.
pub fn parse_tag(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Expected key=value, got {input}")),
    }
}
