use crate::domain::model::RunReport;
use crate::utils::error::Result;
use std::fmt::Write;

/// Console rendering: photometry table, one notice per tested pair, then the
/// classification of every matched source.
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{:>3} {:>10} {:>10} {:>14}",
        "id", "xcenter", "ycenter", "aperture_sum"
    );
    let _ = writeln!(out, "{:->3} {:->10} {:->10} {:->14}", "", "", "", "");
    for row in &report.photometry {
        let _ = writeln!(
            out,
            "{:>3} {:>10.3} {:>10.3} {:>14.6}",
            row.id, row.xcenter, row.ycenter, row.aperture_sum
        );
    }

    match report.catalog_rows {
        Some(rows) => {
            let _ = writeln!(out, "Catalog rows: {}", rows);
        }
        None => {
            let _ = writeln!(out, "Catalog data unavailable");
        }
    }

    let mut matches = report.matches.iter();
    for notice in &report.notices {
        let _ = writeln!(out, "{}", notice);
        if notice.matched {
            if let Some(record) = matches.next() {
                let _ = writeln!(
                    out,
                    "Here is the combined data: source_id={} flux={}",
                    record.source_id, record.flux
                );
            }
        }
    }

    for classification in &report.classifications {
        for line in classification.lines() {
            let _ = writeln!(out, "{}", line);
        }
    }

    out
}

pub fn render_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        Classification, CombinedRecord, MatchNotice, PhotometryRow, Visibility,
    };
    use chrono::Utc;

    fn sample_report() -> RunReport {
        let record = CombinedRecord {
            source_id: "42".to_string(),
            flux: 17.0,
            xcenter: 0.0,
            ycenter: 0.0,
            ra: 0.0,
            dec: 0.0,
            separation_arcsec: 0.0,
        };
        RunReport {
            image: "ones.txt".to_string(),
            photometry: vec![PhotometryRow {
                id: 1,
                xcenter: 0.0,
                ycenter: 0.0,
                aperture_sum: 17.0,
            }],
            catalog_rows: Some(2),
            notices: vec![
                MatchNotice {
                    photometry_id: 1,
                    catalog_row: 1,
                    matched: false,
                },
                MatchNotice {
                    photometry_id: 1,
                    catalog_row: 2,
                    matched: true,
                },
            ],
            matches: vec![record],
            classifications: vec![Classification {
                source_id: "42".to_string(),
                flux: 17.0,
                visibility: Visibility::Visible,
            }],
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_text_lines() {
        let text = render_text(&sample_report());
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].contains("aperture_sum"));
        assert!(lines[2].trim_start().starts_with('1'));
        assert!(lines[2].ends_with("17.000000"));
        assert_eq!(lines[3], "Catalog rows: 2");
        assert_eq!(lines[4], "No match found");
        assert_eq!(lines[5], "Match found");
        assert_eq!(lines[6], "Here is the combined data: source_id=42 flux=17");
        assert_eq!(lines[7], "The star is visible");
        assert_eq!(lines[8], "The star's ID is: 42");
        assert_eq!(lines[9], "The star's flux is: 17");
    }

    #[test]
    fn test_render_text_without_catalog() {
        let mut report = sample_report();
        report.catalog_rows = None;
        report.notices.clear();
        report.matches.clear();
        report.classifications.clear();

        let text = render_text(&report);
        assert!(text.contains("Catalog data unavailable"));
        assert!(!text.contains("Match found"));
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["matches"][0]["source_id"], "42");
        assert_eq!(value["classifications"][0]["visibility"], "visible");
        assert_eq!(value["catalog_rows"], 2);
    }
}
