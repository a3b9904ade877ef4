//! Report generation for analysis results
//!
//! This module provides output formatters for rendered analysis results:
//!
//! - **HTML**: Dashboard page drawing the precomputed chart geometry with D3.js
//! - **JSON**: Chart-ready structures plus export rows, for programmatic use
//! - **CSV**: The flat `path,value` export, no header row
//!
//! # Usage
//!
//! ```ignore
//! use smartscore::report;
//!
//! // Automatically picks format based on extension
//! report::generate("coriolan.html", &reports)?;  // HTML
//! report::generate("coriolan.json", &reports)?;  // JSON
//! report::generate("coriolan.csv", &reports)?;   // CSV
//! ```

pub mod csv;
pub mod flatten;
pub mod html;
pub mod json;

use crate::chart::{ChartRouter, ChartSpec, RenderedMetric};
use crate::layout::tree::RandomSource;
use crate::metric::{AnalysisResult, Category, Shape};
use serde::Serialize;
use std::io;
use std::path::Path;

pub use flatten::{flatten, scalar_summary, ExportRow};

/// Fallback export name when the result carries no source
pub const DEFAULT_EXPORT_STEM: &str = "metricas";

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, reports: &[AnalysisReport]) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "html" | "htm" => html::write(&mut file, reports),
        "json" => json::write(&mut file, reports),
        _ => csv::write(&mut file, reports),
    }
}

/// Export file name for a source: `<stem>.csv`, or `metricas.csv`
pub fn export_filename(source: Option<&str>) -> String {
    let stem = source
        .map(|s| s.rsplit(['/', '\\']).next().unwrap_or(s))
        .map(|name| match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        })
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or(DEFAULT_EXPORT_STEM);
    format!("{}.csv", stem)
}

/// Everything the writers need for one analysis result
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub generated_at: String,
    pub summary: Vec<ExportRow>,
    pub rows: Vec<ExportRow>,
    pub charts: Vec<RenderedMetric>,
}

impl AnalysisReport {
    pub fn build(result: &AnalysisResult, router: &ChartRouter<'_>, rng: &mut dyn RandomSource) -> Self {
        Self {
            source: result.source.clone(),
            category: None,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            summary: scalar_summary(result),
            rows: flatten::flatten_result(result),
            charts: router.render_result(result, rng),
        }
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn display_name(&self) -> &str {
        self.source.as_deref().unwrap_or(DEFAULT_EXPORT_STEM)
    }
}

/// Per-shape counts for a batch of reports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub results: usize,
    pub metrics: usize,
    pub charted: usize,
    pub no_data: usize,
    pub raw: usize,
    pub backend_errors: usize,
    pub rows: usize,
}

impl Summary {
    pub fn from_reports(reports: &[AnalysisReport]) -> Self {
        let mut summary = Self { results: reports.len(), ..Self::default() };

        for report in reports {
            summary.rows += report.rows.len();
            for chart in &report.charts {
                summary.metrics += 1;
                match &chart.chart {
                    ChartSpec::NoData => summary.no_data += 1,
                    ChartSpec::Raw { backend_error: true, .. } => {
                        summary.raw += 1;
                        summary.backend_errors += 1;
                    }
                    ChartSpec::Raw { .. } => summary.raw += 1,
                    _ => summary.charted += 1,
                }
            }
        }

        summary
    }
}

/// Count of top-level metrics per shape, in a fixed order
pub fn shape_counts(report: &AnalysisReport) -> Vec<(Shape, usize)> {
    const ORDER: [Shape; 7] = [
        Shape::Scalar,
        Shape::Distribution,
        Shape::PairwiseWeights,
        Shape::PerUnitSeries,
        Shape::Composite,
        Shape::SimilarityTree,
        Shape::Opaque,
    ];
    ORDER
        .iter()
        .map(|shape| (*shape, report.charts.iter().filter(|c| c.shape == *shape).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::layout::seating::SeatingTable;
    use crate::layout::tree::FixedSequence;
    use serde_json::json;

    fn build(value: serde_json::Value) -> AnalysisReport {
        let config = EngineConfig::default();
        let seating = SeatingTable::orchestra();
        let router = ChartRouter::new(&config, &seating);
        let result = AnalysisResult::from_response(value).unwrap();
        AnalysisReport::build(&result, &router, &mut FixedSequence::new(vec![0.5]))
    }

    // ==========================================================================
    // SUMMARY STATISTICS TESTS
    // ==========================================================================
    //
    // The Summary struct aggregates chart outcomes for a batch of results.
    // This is displayed at the top of reports to give an overview.
    // ==========================================================================

    #[test]
    fn test_summary_empty() {
        let summary = Summary::from_reports(&[]);
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_summary_mixed() {
        let report = build(json!({
            "archivo": "coriolan.mid",
            "metricas": {
                "entropia_melodica": 3.1,
                "variedad_tonal": {"C": 4, "G": 2},
                "vacio": {},
                "entropia_armonica": "[ERROR en entropia_armonica]: sin acordes",
                "tonalidad": "C major"
            }
        }));
        let summary = Summary::from_reports(&[report]);
        assert_eq!(summary.results, 1);
        assert_eq!(summary.metrics, 5);
        assert_eq!(summary.charted, 2);
        assert_eq!(summary.no_data, 1);
        assert_eq!(summary.raw, 2);
        assert_eq!(summary.backend_errors, 1);
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn test_shape_counts_skip_absent_shapes() {
        let report = build(json!({"a": 1, "b": 2, "c": {"X-Y": 1}}));
        assert_eq!(shape_counts(&report), vec![(Shape::Scalar, 2), (Shape::PairwiseWeights, 1)]);
    }

    // ==========================================================================
    // EXPORT FILENAME TESTS
    // ==========================================================================

    #[test]
    fn test_export_filename_from_source() {
        assert_eq!(export_filename(Some("coriolan.mid")), "coriolan.csv");
        assert_eq!(export_filename(Some("uploads/bolero.final.midi")), "bolero.final.csv");
        assert_eq!(export_filename(Some("sin_extension")), "sin_extension.csv");
    }

    #[test]
    fn test_export_filename_fallback() {
        assert_eq!(export_filename(None), "metricas.csv");
        assert_eq!(export_filename(Some("  ")), "metricas.csv");
    }

    // ==========================================================================
    // FORMAT DISPATCH TESTS
    // ==========================================================================

    #[test]
    fn test_generate_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let reports = vec![build(json!({"archivo": "x.mid", "metricas": {"a": 1.5}}))];

        let csv_path = dir.path().join("out.csv");
        generate(&csv_path, &reports).unwrap();
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), "a,1.5\n");

        let json_path = dir.path().join("out.json");
        generate(&json_path, &reports).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed["reports"][0]["source"], "x.mid");

        let html_path = dir.path().join("out.HTML");
        generate(&html_path, &reports).unwrap();
        assert!(std::fs::read_to_string(&html_path).unwrap().starts_with("<!DOCTYPE html>"));
    }
}
