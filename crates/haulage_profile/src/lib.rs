pub mod access_parser;
pub mod average_speed_parser;
pub mod error;
pub mod lua;
pub mod oneway_parser;
pub mod truck_profile;
pub mod units;
pub mod vehicle_spec;
pub mod way;

pub use access_parser::Exclusion;
pub use truck_profile::{SegmentVerdict, SpeedPair, TruckProfile};
pub use vehicle_spec::VehicleSpec;
pub use way::Way;
