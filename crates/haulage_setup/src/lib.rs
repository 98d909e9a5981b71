pub mod config;
pub mod container;
pub mod dataset;
pub mod diagnosis;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod provision;
pub mod resources;
pub mod state;
pub mod supervisor;

#[cfg(test)]
mod test_utils;

pub use config::SetupConfig;
pub use dataset::Dataset;
pub use diagnosis::{Diagnosis, EngineEvent};
pub use error::SetupError;
pub use pipeline::Pipeline;
pub use prompt::OverwritePolicy;
pub use state::{PipelineStage, PipelineState};
