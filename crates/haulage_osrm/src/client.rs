use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    coordinate::{Coordinate, coordinates_path},
    distance_matrix::{DistanceMatrixResult, MatchResult, NearestResult},
    error::OsrmError,
    response::{MatchResponse, NearestResponse, OsrmStatus, RouteResponse, TableResponse},
    route_option::RouteOption,
    route_profile::RouteProfile,
    route_result::RouteResult,
};

pub const DEFAULT_OSRM_URL: &str = "http://localhost:5000";

/// Manhattan to Brooklyn, used as the health check route.
const HEALTH_CHECK_ORIGIN: Coordinate = Coordinate::new(-74.0060, 40.7128);
const HEALTH_CHECK_DESTINATION: Coordinate = Coordinate::new(-73.9352, 40.7306);

#[derive(Debug, Clone)]
pub struct RouteAnalyzerParams {
    pub osrm_url: String,
    pub profile: RouteProfile,
    /// Upper bound of a whole request, connection included.
    pub timeout: Duration,
}

impl Default for RouteAnalyzerParams {
    fn default() -> Self {
        Self {
            osrm_url: String::from(DEFAULT_OSRM_URL),
            profile: RouteProfile::Driving,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Client of a self-hosted `osrm-routed` server.
///
/// Every call is a single HTTP round trip: no retries, no caching.
pub struct RouteAnalyzer {
    params: RouteAnalyzerParams,
    client: reqwest::Client,
}

impl RouteAnalyzer {
    pub fn new(mut params: RouteAnalyzerParams) -> Result<Self, OsrmError> {
        params.osrm_url = params.osrm_url.trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(params.timeout)
            .build()
            .map_err(OsrmError::Client)?;

        Ok(Self { params, client })
    }

    pub fn params(&self) -> &RouteAnalyzerParams {
        &self.params
    }

    fn service_url(&self, service: &str, coordinates: &str) -> String {
        format!(
            "{}/{}/v1/{}/{}",
            self.params.osrm_url, service, self.params.profile, coordinates
        )
    }

    async fn request<T>(&self, url: &str, query: &[(&str, String)]) -> Result<T, OsrmError>
    where
        T: DeserializeOwned,
    {
        debug!("OSRM request {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(OsrmError::Connectivity)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(OsrmError::Connectivity)?;

        // OSRM reports errors with a 4xx status and a JSON body carrying the code
        let osrm_status: OsrmStatus = serde_json::from_slice(&body)
            .map_err(|source| OsrmError::InvalidResponse { status, source })?;

        if !osrm_status.is_ok() {
            return Err(OsrmError::Routing {
                code: osrm_status.code,
                message: osrm_status
                    .message
                    .unwrap_or_else(|| String::from("Unknown error")),
            });
        }

        serde_json::from_slice(&body).map_err(|source| OsrmError::InvalidResponse { status, source })
    }

    /// Route options from `origin` to `destination`, at most
    /// `max(alternatives, 1)` of them.
    pub async fn get_routes(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        alternatives: usize,
        include_geometry: bool,
        include_steps: bool,
    ) -> Result<RouteResult, OsrmError> {
        let url = self.service_url("route", &coordinates_path(&[origin, destination]));

        // OSRM counts alternatives on top of the main route
        let alternatives_param = if alternatives <= 1 {
            String::from("false")
        } else {
            (alternatives - 1).to_string()
        };

        let mut query = vec![
            ("alternatives", alternatives_param),
            (
                "overview",
                String::from(if include_geometry { "full" } else { "false" }),
            ),
            ("steps", include_steps.to_string()),
            ("annotations", String::from("distance,duration")),
        ];

        if include_geometry {
            query.push(("geometries", String::from("geojson")));
        }

        let response: RouteResponse = self.request(&url, &query).await?;

        let routes: Vec<RouteOption> = response
            .routes
            .into_iter()
            .take(alternatives.max(1))
            .map(|route| RouteOption::from_osrm(route, include_steps))
            .collect();

        debug!(
            "OSRM returned {} route(s) from {} to {}",
            routes.len(),
            origin,
            destination
        );

        RouteResult::new(origin, destination, routes)
    }

    /// Table between `points`, restricted to the given source and destination
    /// indices (all points when `None`).
    pub async fn get_table<P>(
        &self,
        points: &[P],
        sources: Option<&[usize]>,
        destinations: Option<&[usize]>,
    ) -> Result<DistanceMatrixResult, OsrmError>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let url = self.service_url("table", &coordinates_path(points));

        let mut query = vec![("annotations", String::from("duration,distance"))];

        if let Some(sources) = sources {
            query.push(("sources", join_indices(sources)));
        }
        if let Some(destinations) = destinations {
            query.push(("destinations", join_indices(destinations)));
        }

        let response: TableResponse = self.request(&url, &query).await?;

        Ok(DistanceMatrixResult::from(response))
    }

    /// Matrix from every origin (rows) to every destination (columns).
    pub async fn get_distance_matrix<P>(
        &self,
        origins: &[P],
        destinations: &[P],
    ) -> Result<DistanceMatrixResult, OsrmError>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        if origins.is_empty() || destinations.is_empty() {
            return Ok(DistanceMatrixResult {
                durations: vec![],
                distances: vec![],
                sources: vec![],
                destinations: vec![],
            });
        }

        let points: Vec<Coordinate> = origins
            .iter()
            .chain(destinations.iter())
            .map(|point| {
                let point: geo_types::Point = point.into();
                Coordinate::from(point)
            })
            .collect();

        let source_indices: Vec<usize> = (0..origins.len()).collect();
        let destination_indices: Vec<usize> =
            (origins.len()..origins.len() + destinations.len()).collect();

        self.get_table::<Coordinate>(&points, Some(&source_indices), Some(&destination_indices))
            .await
    }

    /// The `number` road network positions closest to `coordinate`.
    pub async fn nearest(
        &self,
        coordinate: Coordinate,
        number: usize,
    ) -> Result<NearestResult, OsrmError> {
        let url = self.service_url("nearest", &coordinate.to_string());
        let query = [("number", number.max(1).to_string())];

        let response: NearestResponse = self.request(&url, &query).await?;

        Ok(NearestResult {
            waypoints: response.waypoints,
        })
    }

    /// Snaps a GPS trace to the road network.
    pub async fn match_trace<P>(&self, points: &[P]) -> Result<MatchResult, OsrmError>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let url = self.service_url("match", &coordinates_path(points));
        let query = [("overview", String::from("false"))];

        let response: MatchResponse = self.request(&url, &query).await?;

        Ok(MatchResult {
            matchings: response.matchings,
            tracepoints: response.tracepoints,
        })
    }

    /// True when the server answers a short route request with OSRM JSON.
    ///
    /// A `NoRoute` or `NoSegment` answer still counts: the server is up, it
    /// just serves another region.
    pub async fn is_healthy(&self) -> bool {
        match self
            .get_routes(HEALTH_CHECK_ORIGIN, HEALTH_CHECK_DESTINATION, 1, false, false)
            .await
        {
            Ok(_) => true,
            Err(err) if err.server_answered() => {
                debug!("OSRM is up but cannot route the health check: {}", err);
                true
            }
            Err(err) => {
                debug!("OSRM health check failed: {}", err);
                false
            }
        }
    }
}

/// Analyzer tuned for moving trucks: long timeout, car profile.
pub fn movers_route_analyzer(osrm_url: &str) -> Result<RouteAnalyzer, OsrmError> {
    RouteAnalyzer::new(RouteAnalyzerParams {
        osrm_url: osrm_url.to_string(),
        profile: RouteProfile::Driving,
        timeout: Duration::from_secs(90),
    })
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|index| index.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use axum::http::StatusCode;

    use super::*;
    use crate::test_utils::*;

    const NEW_YORK: Coordinate = Coordinate::new(-74.0060, 40.7128);
    const BROOKLYN: Coordinate = Coordinate::new(-73.9352, 40.7306);
    const LOS_ANGELES: Coordinate = Coordinate::new(-118.2437, 34.0522);

    fn analyzer(url: &str) -> RouteAnalyzer {
        RouteAnalyzer::new(RouteAnalyzerParams {
            osrm_url: url.to_string(),
            timeout: Duration::from_secs(5),
            ..RouteAnalyzerParams::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_routes() {
        let server = StubServer::start(StatusCode::OK, THREE_ROUTES).await;
        let analyzer = analyzer(&server.url);

        let result = analyzer
            .get_routes(NEW_YORK, BROOKLYN, 3, false, false)
            .await
            .unwrap();

        assert_eq!(result.routes.len(), 3);
        assert_eq!(result.origin, NEW_YORK);
        assert_eq!(result.fastest_route.duration_seconds, 912.4);
        assert_eq!(
            result.shortest_route.as_ref().map(|r| r.distance_meters),
            Some(9876.0)
        );
        // Missing weight falls back to the duration
        assert_eq!(result.routes[2].weight, 1210.7);
        assert!(result.routes.iter().all(|r| r.steps.is_none()));

        let request = server.last_request();
        assert!(request.starts_with("/route/v1/driving/-74.006,40.7128;-73.9352,40.7306?"));
        assert!(request.contains("alternatives=2"));
        assert!(request.contains("overview=false"));
        assert!(request.contains("steps=false"));
        assert!(!request.contains("geometries"));
    }

    #[tokio::test]
    async fn test_get_routes_caps_route_count() {
        let server = StubServer::start(StatusCode::OK, THREE_ROUTES).await;
        let analyzer = analyzer(&server.url);

        let result = analyzer
            .get_routes(NEW_YORK, BROOKLYN, 1, false, false)
            .await
            .unwrap();

        assert_eq!(result.routes.len(), 1);
        assert!(result.shortest_route.is_none());
        assert!(server.last_request().contains("alternatives=false"));

        let result = analyzer
            .get_routes(NEW_YORK, BROOKLYN, 2, false, false)
            .await
            .unwrap();

        assert_eq!(result.routes.len(), 2);
        assert!(
            result
                .routes
                .iter()
                .all(|r| r.distance_meters >= 0.0 && r.duration_seconds >= 0.0)
        );
    }

    #[tokio::test]
    async fn test_get_routes_with_geometry_and_steps() {
        let server = StubServer::start(StatusCode::OK, ROUTE_WITH_DETAILS).await;
        let analyzer = analyzer(&server.url);

        let result = analyzer
            .get_routes(NEW_YORK, BROOKLYN, 1, true, true)
            .await
            .unwrap();

        let route = &result.routes[0];
        assert_eq!(route.weight_name, "duration");
        assert_eq!(route.geometry.as_ref().map(|g| g.0.len()), Some(3));

        let steps = route.steps.as_ref().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].name, "Canal Street");
        assert_eq!(
            steps[1].maneuver.as_ref().and_then(|m| m.modifier.as_deref()),
            Some("left")
        );

        let request = server.last_request();
        assert!(request.contains("overview=full"));
        assert!(request.contains("steps=true"));
        assert!(request.contains("geometries=geojson"));
    }

    #[tokio::test]
    async fn test_error_code_is_routing_error() {
        let server = StubServer::start(StatusCode::BAD_REQUEST, NO_ROUTE).await;
        let analyzer = analyzer(&server.url);

        let result = analyzer.get_routes(NEW_YORK, BROOKLYN, 3, false, false).await;

        match result {
            Err(OsrmError::Routing { code, message }) => {
                assert_eq!(code, "NoRoute");
                assert_eq!(message, "Impossible route between points");
            }
            other => panic!("expected a routing error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ok_without_routes() {
        let server = StubServer::start(StatusCode::OK, OK_WITHOUT_ROUTES).await;
        let analyzer = analyzer(&server.url);

        let result = analyzer.get_routes(NEW_YORK, BROOKLYN, 3, false, false).await;

        assert!(matches!(result, Err(OsrmError::NoRoute)));
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let server = StubServer::start(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").await;
        let analyzer = analyzer(&server.url);

        let result = analyzer.get_routes(NEW_YORK, BROOKLYN, 1, false, false).await;

        assert!(matches!(
            result,
            Err(OsrmError::InvalidResponse { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        let url = unreachable_url().await;
        let analyzer = analyzer(&url);

        let result = analyzer.get_routes(NEW_YORK, BROOKLYN, 1, false, false).await;

        assert!(result.unwrap_err().is_connectivity());
        assert!(!analyzer.is_healthy().await);
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = StubServer::start_with_delay(
            StatusCode::OK,
            THREE_ROUTES,
            Duration::from_secs(10),
        )
        .await;
        let analyzer = RouteAnalyzer::new(RouteAnalyzerParams {
            osrm_url: server.url.clone(),
            timeout: Duration::from_millis(300),
            ..RouteAnalyzerParams::default()
        })
        .unwrap();

        let start = Instant::now();
        let result = analyzer.get_routes(NEW_YORK, BROOKLYN, 1, false, false).await;

        assert!(result.unwrap_err().is_connectivity());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_distance_matrix_of_identical_lists() {
        let server = StubServer::start(StatusCode::OK, SQUARE_TABLE).await;
        let analyzer = analyzer(&server.url);

        let points = [NEW_YORK, BROOKLYN];
        let matrix = analyzer
            .get_distance_matrix(&points, &points)
            .await
            .unwrap();

        assert!(matrix.is_square());
        for i in 0..points.len() {
            assert_eq!(matrix.duration(i, i), Some(0.0));
            assert_eq!(matrix.distance(i, i), Some(0.0));
        }
        assert_eq!(matrix.sources.len(), 2);

        let request = server.last_request();
        assert!(request.starts_with(
            "/table/v1/driving/-74.006,40.7128;-73.9352,40.7306;-74.006,40.7128;-73.9352,40.7306?"
        ));
        assert!(request.contains("sources=0%3B1"));
        assert!(request.contains("destinations=2%3B3"));
    }

    #[tokio::test]
    async fn test_distance_matrix_of_empty_list() {
        let analyzer = analyzer(&unreachable_url().await);
        let points: [Coordinate; 0] = [];

        let matrix = analyzer
            .get_distance_matrix(&points, &[NEW_YORK])
            .await
            .unwrap();

        assert!(matrix.durations.is_empty());
    }

    #[tokio::test]
    async fn test_nearest() {
        let server = StubServer::start(StatusCode::OK, NEAREST).await;
        let analyzer = analyzer(&server.url);

        let nearest = analyzer.nearest(NEW_YORK, 2).await.unwrap();

        assert_eq!(nearest.waypoints.len(), 2);
        assert_eq!(nearest.waypoints[0].name, "Broadway");
        assert!(
            server
                .last_request()
                .starts_with("/nearest/v1/driving/-74.006,40.7128?number=2")
        );
    }

    #[tokio::test]
    async fn test_match_trace() {
        let server = StubServer::start(StatusCode::OK, MATCH).await;
        let analyzer = analyzer(&server.url);

        let trace = [NEW_YORK, Coordinate::new(-74.003, 40.7131), BROOKLYN];
        let matched = analyzer.match_trace(&trace).await.unwrap();

        assert_eq!(matched.matchings.len(), 1);
        assert_eq!(matched.matchings[0].confidence, 0.87);
        assert_eq!(matched.tracepoints.len(), 3);
        assert!(matched.tracepoints[1].is_none());
    }

    #[tokio::test]
    async fn test_trailing_slash_is_trimmed() {
        let server = StubServer::start(StatusCode::OK, THREE_ROUTES).await;
        let analyzer = analyzer(&format!("{}/", server.url));

        assert!(analyzer.is_healthy().await);
        assert!(server.last_request().starts_with("/route/v1/"));
    }

    #[tokio::test]
    async fn test_health_check_counts_osrm_errors_as_up() {
        let server = StubServer::start(StatusCode::BAD_REQUEST, NO_ROUTE).await;
        let analyzer = analyzer(&server.url);

        assert!(analyzer.is_healthy().await);
    }

    fn live_analyzer() -> RouteAnalyzer {
        let url = std::env::var("HAULAGE_OSRM_URL").unwrap_or(String::from(DEFAULT_OSRM_URL));
        movers_route_analyzer(&url).unwrap()
    }

    #[tokio::test]
    #[ignore = "needs a provisioned OSRM server with US data"]
    async fn test_live_new_york_to_los_angeles() {
        let analyzer = live_analyzer();

        let result = analyzer
            .get_routes(NEW_YORK, LOS_ANGELES, 1, false, false)
            .await
            .unwrap();

        assert_eq!(result.routes.len(), 1);
        assert!(result.routes[0].distance_meters > 3_000_000.0);
        assert!(result.routes[0].duration_seconds > 100_000.0);
    }

    #[tokio::test]
    #[ignore = "needs a provisioned OSRM server with US data"]
    async fn test_live_matrix_diagonal_is_zero() {
        let analyzer = live_analyzer();
        let points = [NEW_YORK, BROOKLYN, LOS_ANGELES];

        let matrix = analyzer
            .get_distance_matrix(&points, &points)
            .await
            .unwrap();

        assert!(matrix.is_square());
        for i in 0..points.len() {
            assert_eq!(matrix.duration(i, i), Some(0.0));
        }
    }
}
