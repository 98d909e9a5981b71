use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    http::{StatusCode, Uri, header},
};

/// A local HTTP server answering every request with the same OSRM body.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start(status: StatusCode, body: &'static str) -> StubServer {
        StubServer::start_with_delay(status, body, Duration::ZERO).await
    }

    pub async fn start_with_delay(
        status: StatusCode,
        body: &'static str,
        delay: Duration,
    ) -> StubServer {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let app = Router::new().fallback(move |uri: Uri| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push(uri.to_string());
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        StubServer {
            url: format!("http://{address}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> String {
        self.requests().pop().unwrap_or_default()
    }
}

/// A URL nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{address}")
}

pub const THREE_ROUTES: &str = r#"{
    "code": "Ok",
    "routes": [
        {"distance": 10432.1, "duration": 912.4, "weight": 940.2, "weight_name": "routability", "legs": [{"steps": []}]},
        {"distance": 11873.9, "duration": 1004.0, "weight": 1020.5, "weight_name": "routability", "legs": [{"steps": []}]},
        {"distance": 9876.0, "duration": 1210.7, "legs": [{"steps": []}]}
    ],
    "waypoints": [
        {"name": "Broadway", "location": [-74.006, 40.7128], "distance": 3.1},
        {"name": "Flatbush Avenue", "location": [-73.9352, 40.7306], "distance": 1.2}
    ]
}"#;

pub const ROUTE_WITH_DETAILS: &str = r#"{
    "code": "Ok",
    "routes": [
        {
            "distance": 820.0,
            "duration": 95.5,
            "weight": 101.0,
            "weight_name": "duration",
            "geometry": {"type": "LineString", "coordinates": [[-74.006, 40.7128], [-74.004, 40.713], [-74.0, 40.714]]},
            "legs": [{
                "distance": 820.0,
                "duration": 95.5,
                "steps": [
                    {"distance": 500.0, "duration": 60.0, "name": "Broadway", "mode": "driving", "maneuver": {"type": "depart", "location": [-74.006, 40.7128]}},
                    {"distance": 320.0, "duration": 35.5, "name": "Canal Street", "mode": "driving", "maneuver": {"type": "turn", "modifier": "left", "location": [-74.004, 40.713]}}
                ]
            }]
        }
    ]
}"#;

pub const NO_ROUTE: &str = r#"{"code": "NoRoute", "message": "Impossible route between points"}"#;

pub const OK_WITHOUT_ROUTES: &str = r#"{"code": "Ok", "routes": [], "waypoints": []}"#;

pub const SQUARE_TABLE: &str = r#"{
    "code": "Ok",
    "durations": [[0.0, 610.2], [598.7, 0.0]],
    "distances": [[0.0, 7421.3], [7388.0, 0.0]],
    "sources": [
        {"name": "Broadway", "location": [-74.006, 40.7128], "distance": 3.1},
        {"name": "Flatbush Avenue", "location": [-73.9352, 40.7306], "distance": 1.2}
    ],
    "destinations": [
        {"name": "Broadway", "location": [-74.006, 40.7128], "distance": 3.1},
        {"name": "Flatbush Avenue", "location": [-73.9352, 40.7306], "distance": 1.2}
    ]
}"#;

pub const NEAREST: &str = r#"{
    "code": "Ok",
    "waypoints": [
        {"name": "Broadway", "location": [-74.00601, 40.71281], "distance": 1.4, "nodes": [1, 2]},
        {"name": "Chambers Street", "location": [-74.0058, 40.7131], "distance": 38.0, "nodes": [3, 4]}
    ]
}"#;

pub const MATCH: &str = r#"{
    "code": "Ok",
    "matchings": [{"distance": 1520.4, "duration": 210.0, "confidence": 0.87, "weight": 215.0}],
    "tracepoints": [
        {"name": "Broadway", "location": [-74.006, 40.7128], "distance": 2.0},
        null,
        {"name": "Canal Street", "location": [-74.0, 40.714], "distance": 4.5}
    ]
}"#;
