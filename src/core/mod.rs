pub mod catalog;
pub mod engine;
pub mod image;
pub mod matcher;
pub mod photometry;
pub mod pipeline;
pub mod report;
pub mod transform;

pub use crate::domain::model::{
    CatalogTable, CombinedRecord, Extraction, MatchOutcome, PhotometryRow, RunReport,
};
pub use crate::domain::ports::{CatalogSource, Pipeline};
pub use crate::utils::error::Result;
