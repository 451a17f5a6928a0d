use crate::config::toml_config::StarMatchConfig;
use crate::core::photometry::ApertureMethod;
use crate::utils::error::{Result, StarMatchError};
use clap::error::ErrorKind;
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const USAGE: &str = "Usage: starmatch <filename>";

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "starmatch", version)]
#[command(about = "Aperture photometry cross-matched against a remote sky catalog")]
pub struct CliConfig {
    /// Image to measure (FITS, text grid or raster image)
    pub filename: String,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<String>,

    /// Aperture center as x,y in pixels; repeat for several apertures
    #[arg(long = "position", value_parser = parse_position)]
    pub positions: Vec<(f64, f64)>,

    /// Aperture radius in pixels
    #[arg(long)]
    pub radius: Option<f64>,

    #[arg(long, value_enum)]
    pub method: Option<ApertureMethod>,

    #[arg(long)]
    pub subpixels: Option<u32>,

    /// Catalog SQL-over-HTTP endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Catalog SQL template
    #[arg(long)]
    pub query: Option<String>,

    /// Matching tolerance in arcseconds (0 = exact)
    #[arg(long)]
    pub match_radius: Option<f64>,

    /// Run photometry only, without querying the catalog
    #[arg(long)]
    pub skip_catalog: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Emit log lines as JSON
    #[arg(long)]
    pub log_json: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// Parses arguments. `Ok(None)` means clap printed help or version and the
    /// process should exit successfully.
    pub fn parse_args<I, T>(args: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(config) => Ok(Some(config)),
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                // help/version 直接輸出
                let _ = e.print();
                Ok(None)
            }
            Err(e) => Err(StarMatchError::UsageError {
                detail: e.to_string(),
            }),
        }
    }

    /// Loads the TOML file (if any) and applies command-line overrides on top.
    pub fn resolve(&self) -> Result<StarMatchConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                StarMatchConfig::from_file(path)?
            }
            None => StarMatchConfig::default(),
        };
        self.apply_to(&mut config);
        Ok(config)
    }

    pub fn apply_to(&self, config: &mut StarMatchConfig) {
        if !self.positions.is_empty() {
            config.photometry.positions = self.positions.iter().map(|&(x, y)| [x, y]).collect();
        }
        if let Some(radius) = self.radius {
            config.photometry.radius = radius;
        }
        if let Some(method) = self.method {
            config.photometry.method = method;
        }
        if let Some(subpixels) = self.subpixels {
            config.photometry.subpixels = subpixels;
        }
        if let Some(endpoint) = &self.endpoint {
            config.catalog.endpoint = endpoint.clone();
        }
        if let Some(query) = &self.query {
            config.catalog.query = query.clone();
        }
        if let Some(radius) = self.match_radius {
            config.matching.match_radius_arcsec = radius;
        }
        if self.skip_catalog {
            config.catalog.enabled = false;
        }
    }
}

fn parse_position(raw: &str) -> std::result::Result<(f64, f64), String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{}'", raw))?;
    let x = x
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid x '{}': {}", x.trim(), e))?;
    let y = y
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid y '{}': {}", y.trim(), e))?;
    Ok((x, y))
}
