use crate::utils::error::{Result, StarMatchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One aperture measurement. `id` is the 1-based aperture index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryRow {
    pub id: usize,
    pub xcenter: f64,
    pub ycenter: f64,
    pub aperture_sum: f64,
}

/// Sky position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

impl SkyCoord {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }
}

/// RA/Dec search box substituted into the catalog query template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyBounds {
    pub min_ra: f64,
    pub max_ra: f64,
    pub min_dec: f64,
    pub max_dec: f64,
}

impl SkyBounds {
    /// Smallest box holding every valid coordinate, padded by `margin_deg` on
    /// each side. Dec is kept inside [-90, 90]. When the padded box crosses
    /// RA 0/360 or touches a pole, it spans the whole RA circle.
    /// Coordinates with |dec| > 90 are not sky positions and are left out;
    /// returns `None` when nothing is left.
    pub fn around(coords: &[SkyCoord], margin_deg: f64) -> Option<Self> {
        let mut valid = coords
            .iter()
            .filter(|c| c.ra.is_finite() && c.dec.is_finite() && c.dec.abs() <= 90.0)
            .map(|c| SkyCoord::new(c.ra.rem_euclid(360.0), c.dec));

        let first = valid.next()?;
        let mut bounds = Self {
            min_ra: first.ra,
            max_ra: first.ra,
            min_dec: first.dec,
            max_dec: first.dec,
        };
        for c in valid {
            bounds.min_ra = bounds.min_ra.min(c.ra);
            bounds.max_ra = bounds.max_ra.max(c.ra);
            bounds.min_dec = bounds.min_dec.min(c.dec);
            bounds.max_dec = bounds.max_dec.max(c.dec);
        }

        let min_dec = bounds.min_dec - margin_deg;
        let max_dec = bounds.max_dec + margin_deg;
        bounds.min_dec = min_dec.clamp(-90.0, 90.0);
        bounds.max_dec = max_dec.clamp(-90.0, 90.0);

        bounds.min_ra -= margin_deg;
        bounds.max_ra += margin_deg;
        if bounds.min_ra < 0.0 || bounds.max_ra > 360.0 || min_dec <= -90.0 || max_dec >= 90.0 {
            bounds.min_ra = 0.0;
            bounds.max_ra = 360.0;
        }
        Some(bounds)
    }
}

/// Tabular catalog response. Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CatalogTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != columns.len())
        {
            return Err(StarMatchError::RaggedRowError {
                row: row + 1,
                expected: columns.len(),
                found: cells.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| StarMatchError::MissingColumnError {
                column: name.to_string(),
            })
    }

    pub fn rows(&self) -> impl Iterator<Item = CatalogRow<'_>> {
        (0..self.rows.len()).map(move |index| CatalogRow { table: self, index })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogRow<'a> {
    table: &'a CatalogTable,
    index: usize,
}

impl<'a> CatalogRow<'a> {
    /// 1-based position in the table, used in error messages.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn get(&self, column: &str) -> Option<&'a str> {
        let col = self.table.columns.iter().position(|c| c == column)?;
        self.table.rows[self.index].get(col).map(String::as_str)
    }

    pub fn cell(&self, col: usize) -> &'a str {
        &self.table.rows[self.index][col]
    }

    pub fn numeric_cell(&self, col: usize) -> Result<f64> {
        let raw = self.cell(col).trim();
        raw.parse::<f64>()
            .map_err(|_| StarMatchError::InvalidCellError {
                row: self.number(),
                column: self.table.columns[col].clone(),
                value: raw.to_string(),
            })
    }
}

/// A photometry source joined to a catalog object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRecord {
    pub source_id: String,
    pub flux: f64,
    pub xcenter: f64,
    pub ycenter: f64,
    pub ra: f64,
    pub dec: f64,
    pub separation_arcsec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    NotVisible,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Visible => write!(f, "The star is visible"),
            Visibility::NotVisible => write!(f, "The star is not visible"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub source_id: String,
    pub flux: f64,
    pub visibility: Visibility,
}

impl Classification {
    /// Console lines for this classification.
    pub fn lines(&self) -> Vec<String> {
        match self.visibility {
            Visibility::Visible => vec![
                self.visibility.to_string(),
                format!("The star's ID is: {}", self.source_id),
                format!("The star's flux is: {}", self.flux),
            ],
            Visibility::NotVisible => vec![self.visibility.to_string()],
        }
    }
}

/// Output of the extract step.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub photometry: Vec<PhotometryRow>,
    /// Aperture centers after the pixel to sky transform, same order as `photometry`.
    pub sky_positions: Vec<SkyCoord>,
    pub catalog: Option<CatalogTable>,
}

/// Result of testing one photometry row against one catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchNotice {
    pub photometry_id: usize,
    pub catalog_row: usize,
    pub matched: bool,
}

impl fmt::Display for MatchNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matched {
            write!(f, "Match found")
        } else {
            write!(f, "No match found")
        }
    }
}

/// Output of the transform step.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub photometry: Vec<PhotometryRow>,
    pub catalog_rows: Option<usize>,
    pub notices: Vec<MatchNotice>,
    pub combined: Vec<CombinedRecord>,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub image: String,
    pub photometry: Vec<PhotometryRow>,
    /// `None` when the catalog query failed or was skipped.
    pub catalog_rows: Option<usize>,
    pub notices: Vec<MatchNotice>,
    pub matches: Vec<CombinedRecord>,
    pub classifications: Vec<Classification>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_catalog_table_rejects_ragged_rows() {
        let err = CatalogTable::new(
            strings(&["objID", "ra", "dec"]),
            vec![strings(&["1", "0", "0"]), strings(&["2", "1"])],
        )
        .unwrap_err();

        match err {
            StarMatchError::RaggedRowError {
                row,
                expected,
                found,
            } => {
                assert_eq!(row, 2);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_catalog_row_access() {
        let table = CatalogTable::new(
            strings(&["objID", "ra", "dec"]),
            vec![strings(&["1237", " 10.5", "abc"])],
        )
        .unwrap();

        let row = table.rows().next().unwrap();
        assert_eq!(row.get("objID"), Some("1237"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.numeric_cell(1).unwrap(), 10.5);
        assert!(matches!(
            row.numeric_cell(2),
            Err(StarMatchError::InvalidCellError { row: 1, .. })
        ));
        assert!(table.column_index("mag").is_err());
    }

    #[test]
    fn test_sky_bounds_pads_inside_the_sky() {
        let coords = [SkyCoord::new(10.0, 20.5), SkyCoord::new(12.0, 18.0)];
        let bounds = SkyBounds::around(&coords, 1.0).unwrap();
        assert_eq!(bounds.min_ra, 9.0);
        assert_eq!(bounds.max_ra, 13.0);
        assert_eq!(bounds.min_dec, 17.0);
        assert_eq!(bounds.max_dec, 21.5);
        assert!(SkyBounds::around(&[], 1.0).is_none());
    }

    #[test]
    fn test_sky_bounds_near_pole_spans_all_ra() {
        let coords = [SkyCoord::new(10.0, 89.5), SkyCoord::new(12.0, 88.0)];
        let bounds = SkyBounds::around(&coords, 1.0).unwrap();
        assert_eq!((bounds.min_ra, bounds.max_ra), (0.0, 360.0));
        assert_eq!((bounds.min_dec, bounds.max_dec), (87.0, 90.0));
    }

    #[test]
    fn test_sky_bounds_crossing_ra_zero_spans_all_ra() {
        let bounds = SkyBounds::around(&[SkyCoord::new(0.0, 0.0)], 0.1).unwrap();
        assert_eq!((bounds.min_ra, bounds.max_ra), (0.0, 360.0));
        assert!((bounds.min_dec + 0.1).abs() < 1e-12);
        assert!((bounds.max_dec - 0.1).abs() < 1e-12);

        // RA outside [0, 360) wraps first
        let wrapped = SkyBounds::around(&[SkyCoord::new(370.0, 5.0)], 0.5).unwrap();
        assert_eq!((wrapped.min_ra, wrapped.max_ra), (9.5, 10.5));
    }

    #[test]
    fn test_sky_bounds_skips_positions_off_the_sky() {
        // pixel y = 200 under the identity transform
        assert!(SkyBounds::around(&[SkyCoord::new(0.0, 200.0)], 0.1).is_none());

        let mixed = [SkyCoord::new(30.0, 200.0), SkyCoord::new(40.0, 10.0)];
        let bounds = SkyBounds::around(&mixed, 0.5).unwrap();
        assert_eq!((bounds.min_ra, bounds.max_ra), (39.5, 40.5));
        assert_eq!((bounds.min_dec, bounds.max_dec), (9.5, 10.5));
        assert!(bounds.min_dec <= bounds.max_dec);
    }

    #[test]
    fn test_classification_lines() {
        let visible = Classification {
            source_id: "42".to_string(),
            flux: 12.5,
            visibility: Visibility::Visible,
        };
        assert_eq!(
            visible.lines(),
            vec![
                "The star is visible",
                "The star's ID is: 42",
                "The star's flux is: 12.5"
            ]
        );

        let hidden = Classification {
            visibility: Visibility::NotVisible,
            ..visible
        };
        assert_eq!(hidden.lines(), vec!["The star is not visible"]);
    }
}
