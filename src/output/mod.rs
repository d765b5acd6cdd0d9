//! Output writing: one JSON record file and one CSV file per article.
//!
//! Write failures propagate; a record that cannot be saved is a run
//! failure, unlike every extraction-stage failure before it.

pub mod csv;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::{ArticleRecord, CSV_HEADERS};

/// File stem for the output files: the resolved article identifier, or the
/// last path segment of the input URL when no identifier was extracted.
pub fn file_stem(record_id: &str, url: &str) -> String {
    if !record_id.is_empty() {
        return record_id.to_string();
    }
    let trimmed = url.trim_end_matches('/');
    let segment = match url::Url::parse(trimmed) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => trimmed.rsplit('/').next().unwrap_or_default().to_string(),
    };
    if segment.is_empty() {
        "article".to_string()
    } else {
        segment
    }
}

/// Serializes the finalized record into the output directory.
pub struct RecordWriter {
    out_dir: PathBuf,
}

impl RecordWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Write both output files, returning their paths.
    pub fn write(&self, record: &ArticleRecord, stem: &str) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("Failed to create output directory {:?}", self.out_dir)
        })?;

        let json_path = self.out_dir.join(format!("wipo-article-{stem}.json"));
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&json_path, json)
            .with_context(|| format!("Failed to write {:?}", json_path))?;

        let csv_path = self.out_dir.join(format!("wipo-article-{stem}.csv"));
        fs::write(&csv_path, render_csv(record))
            .with_context(|| format!("Failed to write {:?}", csv_path))?;

        info!("Wrote record for article {} to {:?}", stem, self.out_dir);
        Ok((json_path, csv_path))
    }
}

fn render_csv(record: &ArticleRecord) -> String {
    let mut out = String::new();
    let headers: Vec<String> = CSV_HEADERS.iter().map(|h| h.to_string()).collect();
    csv::write_row(&mut out, &headers);
    csv::write_row(&mut out, &record.csv_fields());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_prefers_record_id() {
        assert_eq!(
            file_stem("176426", "https://example.org/articles/99"),
            "176426"
        );
    }

    #[test]
    fn test_file_stem_falls_back_to_url_segment() {
        assert_eq!(
            file_stem("", "https://wipogreen.wipo.int/wipogreen-database/articles/176426"),
            "176426"
        );
        assert_eq!(file_stem("", "https://example.org/articles/42/"), "42");
    }

    #[test]
    fn test_written_csv_round_trips_scalar_fields() {
        let record = ArticleRecord {
            technology_name_en: "Example Turbine".to_string(),
            id: "176426".to_string(),
            benefits: "Greenhouse gases, Electricity".to_string(),
            benefits_description: "Reduces emissions\nImproves yield".to_string(),
            custom_labels: vec!["海上".to_string(), "风机".to_string()],
            ..Default::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let writer = RecordWriter::new(dir.path());
        let (json_path, csv_path) = writer.write(&record, "176426").unwrap();

        let back: ArticleRecord =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back, record);

        let rows = csv::parse_rows(&fs::read_to_string(&csv_path).unwrap());
        assert_eq!(rows.len(), 2);
        let header_count = rows[0].len();
        assert_eq!(rows[1].len(), header_count);
        for (header, value) in rows[0].iter().zip(rows[1].iter()) {
            match header.as_str() {
                "technologyNameEN" => assert_eq!(value, "Example Turbine"),
                "benefits" => assert_eq!(value, "Greenhouse gases, Electricity"),
                "benefitsDescription" => {
                    assert_eq!(value, "Reduces emissions\nImproves yield")
                }
                "customLabels" => {
                    let labels: Vec<&str> = value.split('|').collect();
                    assert_eq!(labels, vec!["海上", "风机"]);
                }
                _ => {}
            }
        }
    }
}
