use crate::domain::model::{CatalogTable, Extraction, MatchOutcome, RunReport, SkyBounds};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Remote (or canned) source of catalog rows.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn query(&self, bounds: Option<&SkyBounds>) -> Result<CatalogTable>;

    /// Like `query`, but failures are logged and reported as an absent table.
    async fn fetch(&self, bounds: Option<&SkyBounds>) -> Option<CatalogTable> {
        match self.query(bounds).await {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::error!("❌ Error querying catalog: {}", e);
                tracing::error!("💡 {}", e.recovery_suggestion());
                None
            }
        }
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Extraction>;
    async fn transform(&self, data: Extraction) -> Result<MatchOutcome>;
    async fn load(&self, outcome: MatchOutcome) -> Result<RunReport>;
}
