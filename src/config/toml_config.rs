use crate::core::photometry::{ApertureMethod, MAX_SUBPIXELS};
use crate::core::transform::TransformSettings;
use crate::utils::error::{Result, StarMatchError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_ENDPOINT: &str = "https://skyserver.sdss.org/dr17/en/tools/search/sql.aspx";

pub const DEFAULT_QUERY: &str = "SELECT objID, ra, dec FROM PhotoObj \
WHERE ra BETWEEN {min_ra} AND {max_ra} AND dec BETWEEN {min_dec} AND {max_dec}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarMatchConfig {
    pub photometry: PhotometryConfig,
    pub catalog: CatalogConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometryConfig {
    /// Aperture centers in pixel coordinates, `[x, y]`.
    pub positions: Vec<[f64; 2]>,
    pub radius: f64,
    pub method: ApertureMethod,
    /// Sub-pixel grid size per axis when `method = "subpixel"`.
    pub subpixels: u32,
}

impl Default for PhotometryConfig {
    fn default() -> Self {
        Self {
            positions: vec![[0.0, 0.0]],
            radius: 4.0,
            method: ApertureMethod::Center,
            subpixels: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub enabled: bool,
    pub endpoint: String,
    /// SQL template; `{min_ra}`, `{max_ra}`, `{min_dec}`, `{max_dec}` are filled in.
    pub query: String,
    pub format: String,
    pub user_agent: String,
    pub timeout_seconds: Option<u64>,
    /// Degrees added around the aperture positions when building the search box.
    pub search_margin_deg: f64,
    pub html_marker: String,
    pub pad_short_rows: bool,
    pub fill_value: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            query: DEFAULT_QUERY.to_string(),
            format: "csv".to_string(),
            user_agent: concat!("starmatch/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_seconds: None,
            search_margin_deg: 0.1,
            html_marker: "DOCTYPE html".to_string(),
            pad_short_rows: true,
            fill_value: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub transform: TransformSettings,
    /// 0 means the coordinates must be identical.
    pub match_radius_arcsec: f64,
    pub id_column: String,
    pub ra_column: String,
    pub dec_column: String,
    pub flux_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            transform: TransformSettings::Identity,
            match_radius_arcsec: 0.0,
            id_column: "objID".to_string(),
            ra_column: "ra".to_string(),
            dec_column: "dec".to_string(),
            flux_threshold: 0.0,
        }
    }
}

impl StarMatchConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| StarMatchError::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${CATALOG_URL})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| StarMatchError::config(format!("invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn positions(&self) -> Vec<(f64, f64)> {
        self.photometry
            .positions
            .iter()
            .map(|[x, y]| (*x, *y))
            .collect()
    }
}

impl Validate for StarMatchConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_positive("photometry.radius", self.photometry.radius)?;
        validation::validate_range("photometry.subpixels", self.photometry.subpixels, 1, MAX_SUBPIXELS)?;
        if self.photometry.positions.is_empty() {
            return Err(StarMatchError::InvalidConfigValueError {
                field: "photometry.positions".to_string(),
                value: "[]".to_string(),
                reason: "At least one aperture position is required".to_string(),
            });
        }
        for [x, y] in &self.photometry.positions {
            validation::validate_finite("photometry.positions", *x)?;
            validation::validate_finite("photometry.positions", *y)?;
        }

        if self.catalog.enabled {
            validation::validate_url("catalog.endpoint", &self.catalog.endpoint)?;
            validation::validate_non_empty_string("catalog.query", &self.catalog.query)?;
            validation::validate_non_empty_string("catalog.format", &self.catalog.format)?;
            validation::validate_non_empty_string(
                "catalog.html_marker",
                &self.catalog.html_marker,
            )?;
            validation::validate_non_negative(
                "catalog.search_margin_deg",
                self.catalog.search_margin_deg,
            )?;
        }

        validation::validate_non_negative(
            "matching.match_radius_arcsec",
            self.matching.match_radius_arcsec,
        )?;
        validation::validate_finite("matching.flux_threshold", self.matching.flux_threshold)?;
        validation::validate_non_empty_string("matching.id_column", &self.matching.id_column)?;
        validation::validate_non_empty_string("matching.ra_column", &self.matching.ra_column)?;
        validation::validate_non_empty_string("matching.dec_column", &self.matching.dec_column)?;
        self.matching.transform.validate()?;

        Ok(())
    }
}
