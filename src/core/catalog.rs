use crate::config::CatalogConfig;
use crate::domain::model::{CatalogTable, SkyBounds};
use crate::domain::ports::CatalogSource;
use crate::utils::error::{Result, StarMatchError};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

/// SQL-over-HTTP catalog client (SDSS SkyServer style).
pub struct SkyServerClient {
    client: Client,
    config: CatalogConfig,
}

impl SkyServerClient {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }
}

#[async_trait]
impl CatalogSource for SkyServerClient {
    async fn query(&self, bounds: Option<&SkyBounds>) -> Result<CatalogTable> {
        let sql = build_query(&self.config.query, bounds);
        tracing::debug!("Making catalog request to: {}", self.config.endpoint);
        tracing::debug!("SQL: {}", sql);

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("cmd", sql.as_str()), ("format", self.config.format.as_str())])
            .header(USER_AGENT, &self.config.user_agent)
            .send()
            .await?;

        tracing::debug!("Catalog response status: {}", response.status());
        let body = response.error_for_status()?.text().await?;
        tracing::debug!("Catalog response body:\n{}", body);

        if is_html(&body, &self.config.html_marker) {
            return Err(StarMatchError::HtmlResponseError);
        }

        let table = parse_catalog_csv(&body, &CsvOptions::from(&self.config))?;
        tracing::info!(
            "📡 Catalog returned {} rows, columns {:?}",
            table.len(),
            table.columns()
        );
        Ok(table)
    }
}

/// Fills `{min_ra}`, `{max_ra}`, `{min_dec}`, `{max_dec}` in the SQL template.
/// Without bounds, and for any other text, the template is left as written.
pub fn build_query(template: &str, bounds: Option<&SkyBounds>) -> String {
    match bounds {
        None => template.to_string(),
        Some(b) => template
            .replace("{min_ra}", &b.min_ra.to_string())
            .replace("{max_ra}", &b.max_ra.to_string())
            .replace("{min_dec}", &b.min_dec.to_string())
            .replace("{max_dec}", &b.max_dec.to_string()),
    }
}

/// True when the body looks like an HTML page rather than CSV.
pub fn is_html(body: &str, marker: &str) -> bool {
    body.to_ascii_lowercase()
        .contains(&marker.to_ascii_lowercase())
}

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub pad_short_rows: bool,
    pub fill_value: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            pad_short_rows: true,
            fill_value: "0".to_string(),
        }
    }
}

impl From<&CatalogConfig> for CsvOptions {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            pad_short_rows: config.pad_short_rows,
            fill_value: config.fill_value.clone(),
        }
    }
}

/// Parses a CSV response into a table.
///
/// `#` lines (SkyServer's `#Table1` preamble) are skipped and the first record
/// is the header. Rows are made uniform before the table is built: short rows
/// are padded with `fill_value` when allowed, anything else is an error.
pub fn parse_catalog_csv(body: &str, options: &CsvOptions) -> Result<CatalogTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();

        if cells.len() < columns.len() && options.pad_short_rows {
            tracing::warn!(
                "⚠️ Catalog row {} has {} of {} cells, padding with '{}'",
                index + 1,
                cells.len(),
                columns.len(),
                options.fill_value
            );
            cells.resize(columns.len(), options.fill_value.clone());
        }
        if cells.len() != columns.len() {
            return Err(StarMatchError::RaggedRowError {
                row: index + 1,
                expected: columns.len(),
                found: cells.len(),
            });
        }
        rows.push(cells);
    }

    CatalogTable::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_fills_bounds() {
        let bounds = SkyBounds {
            min_ra: 9.5,
            max_ra: 10.5,
            min_dec: -1.0,
            max_dec: 1.0,
        };
        let sql = build_query(
            "SELECT objID FROM PhotoObj WHERE ra BETWEEN {min_ra} AND {max_ra} AND dec BETWEEN {min_dec} AND {max_dec}",
            Some(&bounds),
        );
        assert_eq!(
            sql,
            "SELECT objID FROM PhotoObj WHERE ra BETWEEN 9.5 AND 10.5 AND dec BETWEEN -1 AND 1"
        );
    }

    #[test]
    fn test_build_query_leaves_unknown_placeholders() {
        let legacy = "SELECT objID, ra, dec DROM PhotoObj WHERE ra BETWEEN min_ra AND max_ra";
        assert_eq!(build_query(legacy, None), legacy);
        assert_eq!(build_query("{min_ra} {other}", None), "{min_ra} {other}");
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("<!DOCTYPE html><html></html>", "DOCTYPE html"));
        assert!(is_html("<!doctype HTML>", "DOCTYPE html"));
        assert!(!is_html("objID,ra,dec\n1,0,0\n", "DOCTYPE html"));
    }

    #[test]
    fn test_parse_preserves_columns_and_rows() {
        let table = parse_catalog_csv(
            "objID,ra,dec\n1237645941824356443,0,0\n1237645941824356444,10.1,-0.5\n",
            &CsvOptions::default(),
        )
        .unwrap();

        assert_eq!(table.columns(), ["objID", "ra", "dec"]);
        assert_eq!(table.len(), 2);
        let second = table.rows().nth(1).unwrap();
        assert_eq!(second.get("objID"), Some("1237645941824356444"));
        assert_eq!(second.get("dec"), Some("-0.5"));
    }

    #[test]
    fn test_parse_skips_skyserver_preamble() {
        let table = parse_catalog_csv("#Table1\nobjID,ra,dec\n42, 1.5 ,2.5\n", &CsvOptions::default())
            .unwrap();
        assert_eq!(table.columns(), ["objID", "ra", "dec"]);
        assert_eq!(table.rows().next().unwrap().get("ra"), Some("1.5"));
    }

    #[test]
    fn test_parse_pads_short_rows() {
        let table = parse_catalog_csv("objID,ra,dec\n7,1.0\n", &CsvOptions::default()).unwrap();
        assert_eq!(table.rows().next().unwrap().get("dec"), Some("0"));
    }

    #[test]
    fn test_parse_rejects_short_rows_without_padding() {
        let options = CsvOptions {
            pad_short_rows: false,
            ..CsvOptions::default()
        };
        let err = parse_catalog_csv("objID,ra,dec\n7,1.0\n", &options).unwrap_err();
        assert!(matches!(
            err,
            StarMatchError::RaggedRowError {
                row: 1,
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_parse_rejects_long_rows() {
        let err =
            parse_catalog_csv("objID,ra,dec\n1,0,0\n2,0,0,extra\n", &CsvOptions::default())
                .unwrap_err();
        assert!(matches!(err, StarMatchError::RaggedRowError { row: 2, .. }));
    }

    #[test]
    fn test_parse_header_only() {
        let table = parse_catalog_csv("objID,ra,dec\n", &CsvOptions::default()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 3);
    }
}
