use serde::Serialize;

use crate::{coordinate::Coordinate, error::OsrmError, route_option::RouteOption};

/// Route options between two points, in the order OSRM returned them.
#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub routes: Vec<RouteOption>,
    pub fastest_route: RouteOption,
    /// Only set when there is more than one route to choose from.
    pub shortest_route: Option<RouteOption>,
}

impl RouteResult {
    pub fn new(
        origin: Coordinate,
        destination: Coordinate,
        routes: Vec<RouteOption>,
    ) -> Result<Self, OsrmError> {
        let fastest_route = routes
            .iter()
            .min_by(|a, b| a.duration_seconds.total_cmp(&b.duration_seconds))
            .cloned()
            .ok_or(OsrmError::NoRoute)?;

        let shortest_route = if routes.len() > 1 {
            routes
                .iter()
                .min_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters))
                .cloned()
        } else {
            None
        };

        Ok(Self {
            origin,
            destination,
            routes,
            fastest_route,
            shortest_route,
        })
    }

    fn range(&self, value: impl Fn(&RouteOption) -> f64) -> (f64, f64) {
        self.routes
            .iter()
            .map(value)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
                (min.min(v), max.max(v))
            })
    }

    /// `(min, max)` distance in kilometers.
    pub fn distance_range(&self) -> (f64, f64) {
        self.range(RouteOption::distance_km)
    }

    /// `(min, max)` duration in minutes.
    pub fn duration_range(&self) -> (f64, f64) {
        self.range(RouteOption::duration_minutes)
    }

    /// `(min, max)` fuel cost in USD.
    pub fn fuel_cost_range(&self) -> (f64, f64) {
        self.range(RouteOption::estimated_fuel_cost)
    }

    /// First route with the highest truck suitability.
    pub fn best_truck_route(&self) -> &RouteOption {
        self.routes
            .iter()
            .reduce(|best, route| {
                if route.truck_suitability_score() > best.truck_suitability_score() {
                    route
                } else {
                    best
                }
            })
            .unwrap_or(&self.fastest_route)
    }

    pub fn most_efficient_route(&self) -> &RouteOption {
        self.routes
            .iter()
            .min_by(|a, b| a.estimated_fuel_cost().total_cmp(&b.estimated_fuel_cost()))
            .unwrap_or(&self.fastest_route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(routes: Vec<RouteOption>) -> RouteResult {
        RouteResult::new(
            Coordinate::new(-74.006, 40.7128),
            Coordinate::new(-73.9352, 40.7306),
            routes,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_routes_is_no_route() {
        let result = RouteResult::new(
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 1.0),
            vec![],
        );

        assert!(matches!(result, Err(OsrmError::NoRoute)));
    }

    #[test]
    fn test_single_route_has_no_shortest() {
        let result = result(vec![RouteOption::new(8_000.0, 900.0)]);

        assert_eq!(result.fastest_route, result.routes[0]);
        assert!(result.shortest_route.is_none());
    }

    #[test]
    fn test_fastest_and_shortest() {
        let result = result(vec![
            RouteOption::new(10_000.0, 1_000.0),
            RouteOption::new(8_000.0, 1_200.0),
            RouteOption::new(12_000.0, 800.0),
        ]);

        assert_eq!(result.fastest_route.distance_meters, 12_000.0);
        assert_eq!(
            result.shortest_route.as_ref().map(|r| r.distance_meters),
            Some(8_000.0)
        );
        // Engine order is preserved
        assert_eq!(result.routes[0].distance_meters, 10_000.0);
    }

    #[test]
    fn test_ranges() {
        let result = result(vec![
            RouteOption::new(10_000.0, 600.0),
            RouteOption::new(8_000.0, 1_200.0),
        ]);

        assert_eq!(result.distance_range(), (8.0, 10.0));
        assert_eq!(result.duration_range(), (10.0, 20.0));

        let (min_cost, max_cost) = result.fuel_cost_range();
        assert!(min_cost < max_cost);
        assert_eq!(min_cost, result.most_efficient_route().estimated_fuel_cost());
    }

    #[test]
    fn test_best_truck_route() {
        let result = result(vec![
            RouteOption::new(40_000.0, 3_600.0),
            RouteOption::new(4_000.0, 240.0),
        ]);

        assert_eq!(result.best_truck_route().distance_meters, 4_000.0);
        assert_eq!(result.most_efficient_route().distance_meters, 4_000.0);
    }
}
