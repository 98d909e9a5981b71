pub mod client;
pub mod coordinate;
pub mod distance_matrix;
pub mod error;
pub mod response;
pub mod route_option;
pub mod route_profile;
pub mod route_result;

#[cfg(test)]
mod test_utils;

pub use client::{RouteAnalyzer, RouteAnalyzerParams, movers_route_analyzer};
pub use coordinate::Coordinate;
pub use error::OsrmError;
