use crate::core::{Pipeline, RunReport};
use crate::utils::error::Result;

pub struct StarMatchEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> StarMatchEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("🚀 Starting starmatch run");

        // Extract
        tracing::info!("🔭 Measuring apertures...");
        let extraction = self.pipeline.extract().await?;
        tracing::info!(
            "Measured {} apertures, catalog: {}",
            extraction.photometry.len(),
            extraction
                .catalog
                .as_ref()
                .map(|t| format!("{} rows", t.len()))
                .unwrap_or_else(|| "unavailable".to_string())
        );

        // Transform
        tracing::info!("🔗 Cross-matching...");
        let outcome = self.pipeline.transform(extraction).await?;
        tracing::info!(
            "Tested {} pairs, {} matched",
            outcome.notices.len(),
            outcome.combined.len()
        );

        // Load
        let report = self.pipeline.load(outcome).await?;
        tracing::info!(
            "✅ Classified {} matched sources",
            report.classifications.len()
        );

        Ok(report)
    }
}
