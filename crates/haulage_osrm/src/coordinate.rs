use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A `(longitude, latitude)` pair, in the order OSRM expects it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lon, lat): (f64, f64)) -> Self {
        Coordinate::new(lon, lat)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Coordinate::new(lon, lat)
    }
}

impl From<&Coordinate> for geo_types::Point {
    fn from(coordinate: &Coordinate) -> Self {
        geo_types::Point::new(coordinate.lon, coordinate.lat)
    }
}

impl From<geo_types::Point> for Coordinate {
    fn from(point: geo_types::Point) -> Self {
        Coordinate::new(point.x(), point.y())
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lon, self.lat)
    }
}

/// Joins points into the `lon,lat;lon,lat` path segment of an OSRM request.
pub fn coordinates_path<P>(points: &[P]) -> String
where
    for<'a> &'a P: Into<geo_types::Point>,
{
    let mut path = String::new();

    for (i, point) in points.iter().enumerate() {
        let point: geo_types::Point = point.into();
        path.push_str(&format!("{},{}", point.x(), point.y()));

        if i < points.len() - 1 {
            path.push(';');
        }
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_path() {
        let points = [
            Coordinate::new(-74.006, 40.7128),
            Coordinate::new(-118.2437, 34.0522),
        ];

        assert_eq!(coordinates_path(&points), "-74.006,40.7128;-118.2437,34.0522");
    }

    #[test]
    fn test_single_coordinate_path() {
        let points = [Coordinate::new(4.35, 50.85)];
        assert_eq!(coordinates_path(&points), "4.35,50.85");
    }

    #[test]
    fn test_display_is_lon_lat() {
        assert_eq!(Coordinate::from((1.5, 2.5)).to_string(), "1.5,2.5");
    }
}
