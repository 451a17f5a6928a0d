use crate::config::StarMatchConfig;
use crate::core::image::load_image;
use crate::core::matcher::{classify, Matcher};
use crate::core::photometry::{perform_photometry, ApertureSpec};
use crate::core::transform::PixelToSky;
use crate::core::{CatalogSource, Extraction, MatchOutcome, Pipeline, RunReport};
use crate::domain::model::{SkyBounds, SkyCoord};
use crate::utils::error::Result;
use crate::utils::validation::validate_path;
use chrono::Utc;
use std::path::PathBuf;

/// Photometry, catalog query and cross-match for one image.
pub struct StarMatchPipeline<C: CatalogSource> {
    image_path: PathBuf,
    config: StarMatchConfig,
    catalog: Option<C>,
}

impl<C: CatalogSource> StarMatchPipeline<C> {
    /// `catalog = None` runs photometry only.
    pub fn new(image_path: impl Into<PathBuf>, config: StarMatchConfig, catalog: Option<C>) -> Self {
        Self {
            image_path: image_path.into(),
            config,
            catalog,
        }
    }

    fn aperture_spec(&self) -> ApertureSpec {
        ApertureSpec {
            radius: self.config.photometry.radius,
            method: self.config.photometry.method,
            subpixels: self.config.photometry.subpixels,
        }
    }
}

#[async_trait::async_trait]
impl<C: CatalogSource> Pipeline for StarMatchPipeline<C> {
    async fn extract(&self) -> Result<Extraction> {
        validate_path("image", &self.image_path.to_string_lossy())?;

        // 先驗證影像形狀，再做測光
        let image = load_image(&self.image_path)?;
        let transform = PixelToSky::resolve(&self.config.matching.transform, &image)?;

        let photometry = perform_photometry(
            &image.pixels(),
            &self.config.positions(),
            &self.aperture_spec(),
        )?;
        let sky_positions: Vec<SkyCoord> = photometry
            .iter()
            .map(|row| transform.apply(row.xcenter, row.ycenter))
            .collect();

        let catalog = match &self.catalog {
            Some(source) if self.config.catalog.enabled => {
                match SkyBounds::around(&sky_positions, self.config.catalog.search_margin_deg) {
                    Some(bounds) => {
                        tracing::debug!("Catalog search box: {:?}", bounds);
                        source.fetch(Some(&bounds)).await
                    }
                    None => {
                        tracing::warn!(
                            "⚠️ No aperture maps to a valid sky position (|dec| <= 90), catalog query skipped"
                        );
                        None
                    }
                }
            }
            _ => {
                tracing::info!("⏭️ Catalog query skipped");
                None
            }
        };

        Ok(Extraction {
            photometry,
            sky_positions,
            catalog,
        })
    }

    async fn transform(&self, data: Extraction) -> Result<MatchOutcome> {
        let Some(catalog) = data.catalog else {
            tracing::warn!("⚠️ No catalog data available, nothing to match");
            return Ok(MatchOutcome {
                photometry: data.photometry,
                catalog_rows: None,
                ..MatchOutcome::default()
            });
        };

        let matcher = Matcher::from_config(&self.config.matching);
        let (notices, combined) =
            matcher.match_sources(&data.photometry, &data.sky_positions, &catalog)?;

        Ok(MatchOutcome {
            photometry: data.photometry,
            catalog_rows: Some(catalog.len()),
            notices,
            combined,
        })
    }

    async fn load(&self, outcome: MatchOutcome) -> Result<RunReport> {
        let threshold = self.config.matching.flux_threshold;
        let classifications = outcome
            .combined
            .iter()
            .map(|record| classify(record, threshold))
            .collect();

        Ok(RunReport {
            image: self.image_path.display().to_string(),
            photometry: outcome.photometry,
            catalog_rows: outcome.catalog_rows,
            notices: outcome.notices,
            matches: outcome.combined,
            classifications,
            generated_at: Utc::now(),
        })
    }
}
