use crate::config::MatchingConfig;
use crate::core::transform::angular_separation_deg;
use crate::domain::model::{
    CatalogTable, Classification, CombinedRecord, MatchNotice, PhotometryRow, SkyCoord,
    Visibility,
};
use crate::utils::error::{Result, StarMatchError};

/// Catalog columns holding the identifier and the coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchColumns {
    pub id: String,
    pub ra: String,
    pub dec: String,
}

impl Default for MatchColumns {
    fn default() -> Self {
        Self {
            id: "objID".to_string(),
            ra: "ra".to_string(),
            dec: "dec".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    columns: MatchColumns,
    tolerance_arcsec: f64,
}

impl Matcher {
    pub fn new(columns: MatchColumns, tolerance_arcsec: f64) -> Self {
        Self {
            columns,
            tolerance_arcsec,
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(
            MatchColumns {
                id: config.id_column.clone(),
                ra: config.ra_column.clone(),
                dec: config.dec_column.clone(),
            },
            config.match_radius_arcsec,
        )
    }

    /// Tests every photometry row against every catalog row.
    ///
    /// `sky` holds the transformed photometry centers in the same order as
    /// `photometry`. Every matching pair adds a combined record.
    pub fn match_sources(
        &self,
        photometry: &[PhotometryRow],
        sky: &[SkyCoord],
        catalog: &CatalogTable,
    ) -> Result<(Vec<MatchNotice>, Vec<CombinedRecord>)> {
        if photometry.len() != sky.len() {
            return Err(StarMatchError::ProcessingError {
                message: format!(
                    "{} photometry rows but {} sky positions",
                    photometry.len(),
                    sky.len()
                ),
            });
        }

        let mut notices = Vec::with_capacity(photometry.len() * catalog.len());
        let mut combined = Vec::new();
        if catalog.is_empty() {
            return Ok((notices, combined));
        }

        let id_col = catalog.column_index(&self.columns.id)?;
        let ra_col = catalog.column_index(&self.columns.ra)?;
        let dec_col = catalog.column_index(&self.columns.dec)?;

        for (source, position) in photometry.iter().zip(sky) {
            for row in catalog.rows() {
                let object = SkyCoord::new(row.numeric_cell(ra_col)?, row.numeric_cell(dec_col)?);
                let separation_arcsec = angular_separation_deg(*position, object) * 3600.0;
                let matched = separation_arcsec <= self.tolerance_arcsec;

                if matched {
                    let record = CombinedRecord {
                        source_id: row.cell(id_col).to_string(),
                        flux: source.aperture_sum,
                        xcenter: source.xcenter,
                        ycenter: source.ycenter,
                        ra: object.ra,
                        dec: object.dec,
                        separation_arcsec,
                    };
                    tracing::info!(
                        "✅ Match found: aperture {} <-> {} ({:.3}\")",
                        source.id,
                        record.source_id,
                        separation_arcsec
                    );
                    combined.push(record);
                } else {
                    tracing::debug!(
                        "No match found: aperture {} vs catalog row {} ({:.3}\")",
                        source.id,
                        row.number(),
                        separation_arcsec
                    );
                }
                notices.push(MatchNotice {
                    photometry_id: source.id,
                    catalog_row: row.number(),
                    matched,
                });
            }
        }

        Ok((notices, combined))
    }
}

/// `flux > threshold` is visible; anything else, including NaN, is not.
pub fn classify(record: &CombinedRecord, threshold: f64) -> Classification {
    let visibility = if record.flux > threshold {
        Visibility::Visible
    } else {
        Visibility::NotVisible
    };
    Classification {
        source_id: record.source_id.clone(),
        flux: record.flux,
        visibility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[[&str; 3]]) -> CatalogTable {
        CatalogTable::new(
            vec!["objID".into(), "ra".into(), "dec".into()],
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    fn origin_source(flux: f64) -> (Vec<PhotometryRow>, Vec<SkyCoord>) {
        (
            vec![PhotometryRow {
                id: 1,
                xcenter: 0.0,
                ycenter: 0.0,
                aperture_sum: flux,
            }],
            vec![SkyCoord::new(0.0, 0.0)],
        )
    }

    #[test]
    fn test_exact_match_at_origin() {
        let (phot, sky) = origin_source(17.0);
        let catalog = table(&[["1237", "5.0", "5.0"], ["42", "0", "0"]]);

        let (notices, combined) = Matcher::new(MatchColumns::default(), 0.0)
            .match_sources(&phot, &sky, &catalog)
            .unwrap();

        assert_eq!(notices.len(), 2);
        assert!(!notices[0].matched);
        assert!(notices[1].matched);
        assert_eq!(notices[1].to_string(), "Match found");
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].source_id, "42");
        assert_eq!(combined[0].flux, 17.0);
        assert_eq!(combined[0].separation_arcsec, 0.0);
    }

    #[test]
    fn test_no_match_notice_per_row() {
        let (phot, sky) = origin_source(17.0);
        let catalog = table(&[["1", "0.1", "0"], ["2", "0", "-0.1"], ["3", "180", "45"]]);

        let (notices, combined) = Matcher::new(MatchColumns::default(), 0.0)
            .match_sources(&phot, &sky, &catalog)
            .unwrap();

        assert_eq!(notices.len(), 3);
        assert!(notices.iter().all(|n| !n.matched));
        assert!(notices.iter().all(|n| n.to_string() == "No match found"));
        assert!(combined.is_empty());
    }

    #[test]
    fn test_multiple_matches_accumulate() {
        let phot = vec![
            PhotometryRow {
                id: 1,
                xcenter: 10.0,
                ycenter: 10.0,
                aperture_sum: 5.0,
            },
            PhotometryRow {
                id: 2,
                xcenter: 20.0,
                ycenter: 20.0,
                aperture_sum: -1.0,
            },
        ];
        let sky = vec![SkyCoord::new(150.0, 2.0), SkyCoord::new(150.01, 2.01)];
        let catalog = table(&[
            ["a", "150.0001", "2.0"],
            ["b", "150.01", "2.0101"],
            ["c", "151", "3"],
        ]);

        let (notices, combined) = Matcher::new(MatchColumns::default(), 1.0)
            .match_sources(&phot, &sky, &catalog)
            .unwrap();

        assert_eq!(notices.len(), 6);
        let ids: Vec<&str> = combined.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(combined[1].flux, -1.0);
        assert!(combined[0].separation_arcsec > 0.0 && combined[0].separation_arcsec < 1.0);
    }

    #[test]
    fn test_empty_catalog_needs_no_columns() {
        let (phot, sky) = origin_source(1.0);
        let catalog = CatalogTable::new(vec![], vec![]).unwrap();
        let (notices, combined) = Matcher::new(MatchColumns::default(), 0.0)
            .match_sources(&phot, &sky, &catalog)
            .unwrap();
        assert!(notices.is_empty());
        assert!(combined.is_empty());
    }

    #[test]
    fn test_missing_column_and_bad_cell() {
        let (phot, sky) = origin_source(1.0);
        let catalog = CatalogTable::new(
            vec!["objID".into(), "ra".into()],
            vec![vec!["1".into(), "0".into()]],
        )
        .unwrap();
        let err = Matcher::new(MatchColumns::default(), 0.0)
            .match_sources(&phot, &sky, &catalog)
            .unwrap_err();
        assert!(matches!(err, StarMatchError::MissingColumnError { ref column } if column == "dec"));

        let catalog = table(&[["1", "null", "0"]]);
        let err = Matcher::new(MatchColumns::default(), 0.0)
            .match_sources(&phot, &sky, &catalog)
            .unwrap_err();
        assert!(matches!(err, StarMatchError::InvalidCellError { row: 1, .. }));
    }

    #[test]
    fn test_custom_columns() {
        let (phot, sky) = origin_source(3.0);
        let catalog = CatalogTable::new(
            vec!["source_id".into(), "RA_ICRS".into(), "DE_ICRS".into()],
            vec![vec!["g1".into(), "0".into(), "0".into()]],
        )
        .unwrap();
        let columns = MatchColumns {
            id: "source_id".into(),
            ra: "RA_ICRS".into(),
            dec: "DE_ICRS".into(),
        };
        let (_, combined) = Matcher::new(columns, 0.0)
            .match_sources(&phot, &sky, &catalog)
            .unwrap();
        assert_eq!(combined[0].source_id, "g1");
    }

    #[test]
    fn test_classify_threshold() {
        let record = CombinedRecord {
            source_id: "42".to_string(),
            flux: 12.0,
            xcenter: 0.0,
            ycenter: 0.0,
            ra: 0.0,
            dec: 0.0,
            separation_arcsec: 0.0,
        };
        assert_eq!(classify(&record, 0.0).visibility, Visibility::Visible);

        let zero = CombinedRecord {
            flux: 0.0,
            ..record.clone()
        };
        assert_eq!(classify(&zero, 0.0).visibility, Visibility::NotVisible);

        let negative = CombinedRecord {
            flux: -3.0,
            ..record.clone()
        };
        assert_eq!(classify(&negative, 0.0).visibility, Visibility::NotVisible);
        assert_eq!(classify(&record, 20.0).visibility, Visibility::NotVisible);
    }
}
