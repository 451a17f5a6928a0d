pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::config::{CliConfig, StarMatchConfig};
pub use crate::core::{
    catalog::SkyServerClient, engine::StarMatchEngine, pipeline::StarMatchPipeline,
};
pub use crate::utils::error::{Result, StarMatchError};
