pub mod cli;
pub mod toml_config;

pub use cli::{CliConfig, USAGE};
pub use toml_config::{CatalogConfig, MatchingConfig, PhotometryConfig, StarMatchConfig};
