use thiserror::Error;

#[derive(Debug, Error)]
pub enum OsrmError {
    /// The server answered, but with a code other than `Ok`.
    #[error("OSRM routing failed: {code} - {message}")]
    Routing { code: String, message: String },

    #[error("No routes found between the specified points")]
    NoRoute,

    /// The HTTP round trip itself failed (refused, timed out, reset).
    #[error("Failed to reach OSRM server: {0}")]
    Connectivity(#[source] reqwest::Error),

    #[error("Invalid OSRM response (HTTP {status}): {source}")]
    InvalidResponse {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl OsrmError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, OsrmError::Connectivity(_))
    }

    /// True when the server answered with OSRM JSON, whatever the code.
    pub fn server_answered(&self) -> bool {
        matches!(self, OsrmError::Routing { .. } | OsrmError::NoRoute)
    }
}
