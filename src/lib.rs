//! Smartscore - Turn musical-analysis metrics into charts
//!
//! Smartscore takes the metrics a score-analysis backend computes for an
//! uploaded MIDI/MusicXML file and turns them into chart-ready geometry and
//! a flat CSV export.
//!
//! # Overview
//!
//! Analysis results are loosely shaped JSON: a number here, a `{label: count}`
//! histogram there, `"Violin-Cello"` interaction weights, per-measure series,
//! nested groups of all of the above. Smartscore infers the shape of every
//! metric from its value alone, then lays it out:
//!
//! 1. **Classification**: Every value is tagged Scalar, Distribution,
//!    PairwiseWeights, PerUnitSeries, Composite, SimilarityTree or Opaque.
//!
//! 2. **Layout**: Pairwise weights become a chord diagram (or a seat network
//!    on the orchestra plan), similarity scores grow a fractal tree, and
//!    instrument distributions become density circles on the seating plan.
//!
//! 3. **Export**: Any result flattens to `path,value` rows.
//!
//! # Quick Start
//!
//! ```no_run
//! use smartscore::{AnalysisRequest, Category, DashboardSession};
//! use serde_json::json;
//!
//! let mut session = DashboardSession::default();
//! let ticket = session.begin(AnalysisRequest::new("coriolan.mid", Category::Interaction));
//!
//! let response = json!({
//!     "archivo": "coriolan.mid",
//!     "metricas": {"red_interaccion_musical": {"Violin-Cello": 3, "Viola-Cello": 1}}
//! });
//! session.complete_response(ticket, response)?;
//!
//! for metric in session.charts() {
//!     println!("{} [{}]", metric.name, metric.shape);
//! }
//! print!("{}", session.export_csv());
//! # Ok::<(), smartscore::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`metric`]: Result parsing and the shape classifier
//! - [`layout`]: Chord, tree, seating and spatial layout engines
//! - [`chart`]: Routes classified metrics to chart specs
//! - [`animation`]: Tick-driven animation state
//! - [`session`]: Requests, last-write-wins results, export
//! - [`report`]: Output formatters (HTML, JSON, CSV)

pub mod animation;
pub mod chart;
pub mod config;
pub mod error;
pub mod layout;
pub mod metric;
pub mod report;
pub mod session;

pub use chart::{ChartRouter, ChartSpec, RenderedMetric};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use metric::{AnalysisResult, Category, MetricValue, Mode, Shape};
pub use session::{AnalysisRequest, Completion, DashboardSession, Filters};

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // PUBLIC API TESTS
    // ==========================================================================
    //
    // These tests verify the public API surface is correct and documented.
    // ==========================================================================

    #[test]
    fn test_public_exports() {
        let _: Shape = Shape::Scalar;
        let _session = DashboardSession::default();
        let _config = EngineConfig::default();
    }

    #[test]
    fn test_classify_from_crate_root() {
        let value = metric::classify::classify_value(&serde_json::json!({"C": 1}));
        assert_eq!(value.shape(), Shape::Distribution);
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }
}
