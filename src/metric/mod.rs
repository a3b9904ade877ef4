//! Analysis metric values and host-facing result types
//!
//! The backend delivers one JSON mapping per request: metric name → value of
//! arbitrary shape. This module owns the typed view of those values:
//!
//! - [`MetricValue`]: the tagged union produced by the classifier
//! - [`Shape`]: the bare classification tag
//! - [`PairwiseWeights`]: `"A-B" → weight` records feeding the chord engine
//! - [`AnalysisResult`]: one delivered result (source name + metrics)
//! - [`Category`] / [`Mode`]: request dimensions
//!
//! Classification itself lives in [`classify`]; chart-style hints for known
//! metric names in [`style`].

pub mod classify;
pub mod style;

use crate::layout::tree::SimilarityTreeNode;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub use classify::{classify, Classified};

/// Default separator joining the two labels of a pairwise key
pub const PAIR_SEPARATOR: char = '-';

/// Classification tag of a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Scalar,
    Distribution,
    PairwiseWeights,
    PerUnitSeries,
    Composite,
    SimilarityTree,
    Opaque,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Scalar => "scalar",
            Shape::Distribution => "distribution",
            Shape::PairwiseWeights => "pairwise",
            Shape::PerUnitSeries => "series",
            Shape::Composite => "composite",
            Shape::SimilarityTree => "tree",
            Shape::Opaque => "opaque",
        };
        write!(f, "{}", name)
    }
}

/// One point of a per-measure series: `{"12": 3.5}` becomes
/// `SeriesPoint { key: "12", unit: 12.0, value: 3.5 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// The unit's own key, used verbatim as the export path suffix
    pub key: String,
    /// Numeric unit (measure number); falls back to the 1-based position
    pub unit: f64,
    pub value: f64,
}

/// Pairwise co-occurrence weights keyed `"source<sep>target"`, in delivery order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairwiseWeights {
    pub entries: Vec<(String, f64)>,
}

impl PairwiseWeights {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep the `k` highest-weight pairs. Ties keep delivery order.
    pub fn top_k(&self, k: usize) -> PairwiseWeights {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        sorted.truncate(k);
        PairwiseWeights { entries: sorted }
    }

    /// Split every key into `(source, target, weight)`.
    ///
    /// Fails on keys without exactly one separator, on self-pairs and on
    /// negative or non-finite weights.
    pub fn edges(&self, separator: char) -> Result<Vec<(String, String, f64)>> {
        let mut edges = Vec::with_capacity(self.entries.len());
        for (key, weight) in &self.entries {
            let (source, target) = split_pair_key(key, separator).ok_or_else(|| {
                Error::ShapeMismatch {
                    metric: key.clone(),
                    reason: format!("pair key has no single '{}' separator", separator),
                }
            })?;
            if source == target {
                return Err(Error::SelfPair(key.clone()));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::InvalidWeight { key: key.clone(), weight: *weight });
            }
            edges.push((source.to_string(), target.to_string(), *weight));
        }
        Ok(edges)
    }
}

/// Split `"A-B"` into `("A", "B")`; both sides must be non-empty and the
/// separator must occur exactly once.
pub fn split_pair_key(key: &str, separator: char) -> Option<(&str, &str)> {
    let mut parts = key.splitn(3, separator);
    let source = parts.next()?.trim();
    let target = parts.next()?.trim();
    if parts.next().is_some() || source.is_empty() || target.is_empty() {
        return None;
    }
    Some((source, target))
}

/// A classified metric value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum MetricValue {
    Scalar(f64),
    Distribution(Vec<(String, f64)>),
    PairwiseWeights(PairwiseWeights),
    PerUnitSeries(Vec<SeriesPoint>),
    Composite(Vec<(String, MetricValue)>),
    SimilarityTree(SimilarityTreeNode),
    /// Anything not chartable; shown as raw JSON
    Opaque(Value),
}

impl MetricValue {
    pub fn shape(&self) -> Shape {
        match self {
            MetricValue::Scalar(_) => Shape::Scalar,
            MetricValue::Distribution(_) => Shape::Distribution,
            MetricValue::PairwiseWeights(_) => Shape::PairwiseWeights,
            MetricValue::PerUnitSeries(_) => Shape::PerUnitSeries,
            MetricValue::Composite(_) => Shape::Composite,
            MetricValue::SimilarityTree(_) => Shape::SimilarityTree,
            MetricValue::Opaque(_) => Shape::Opaque,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

/// Analysis domain of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Instrumental,
    Melodic,
    Rhythmic,
    Harmonic,
    Textural,
    Formal,
    Interaction,
    Global,
    Comparative,
    Differentiating,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Instrumental,
        Category::Melodic,
        Category::Rhythmic,
        Category::Harmonic,
        Category::Textural,
        Category::Formal,
        Category::Interaction,
        Category::Global,
        Category::Comparative,
        Category::Differentiating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Instrumental => "instrumental",
            Category::Melodic => "melodic",
            Category::Rhythmic => "rhythmic",
            Category::Harmonic => "harmonic",
            Category::Textural => "textural",
            Category::Formal => "formal",
            Category::Interaction => "interaction",
            Category::Global => "global",
            Category::Comparative => "comparative",
            Category::Differentiating => "differentiating",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown category '{}'", s)))
    }
}

/// Temporal granularity of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Global,
    PerMeasure,
    Mixed,
    All,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Global => "global",
            Mode::PerMeasure => "per-measure",
            Mode::Mixed => "mixed",
            Mode::All => "all",
        };
        f.write_str(name)
    }
}

/// One analysis result as delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Source identifier (uploaded file name), if the host sent one
    pub source: Option<String>,
    /// Metric name → raw value, in delivery order
    pub metrics: Map<String, Value>,
}

impl AnalysisResult {
    pub fn new(source: Option<String>, metrics: Map<String, Value>) -> Self {
        Self { source, metrics }
    }

    /// Parse a backend response.
    ///
    /// Accepts `{"archivo": .., "metricas": {..}}` or a bare metrics mapping.
    /// A response carrying only `{"error": ".."}` is a fetch failure.
    pub fn from_response(response: Value) -> Result<Self> {
        let Value::Object(mut object) = response else {
            return Err(Error::InvalidInput("analysis response is not a JSON object".into()));
        };

        if !object.contains_key("metricas") {
            if let Some(Value::String(message)) = object.get("error") {
                return Err(Error::Fetch(message.clone()));
            }
        }

        let source = match object.get("archivo") {
            Some(Value::String(name)) => Some(name.clone()),
            _ => None,
        };

        match object.remove("metricas") {
            Some(Value::Object(metrics)) => Ok(Self { source, metrics }),
            Some(_) => Err(Error::InvalidInput("'metricas' is not a JSON object".into())),
            None => {
                object.remove("archivo");
                Ok(Self { source, metrics: object })
            }
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_response(value)
    }

    /// Classify every metric, in delivery order
    pub fn classify_all(&self) -> Vec<Classified> {
        self.classify_all_with(PAIR_SEPARATOR)
    }

    /// Classify every metric with pair keys split on `separator`
    pub fn classify_all_with(&self, separator: char) -> Vec<Classified> {
        self.metrics
            .iter()
            .map(|(name, value)| classify::classify_with(name, value, separator))
            .collect()
    }

    /// The whole result as one Composite value
    pub fn as_value(&self) -> Value {
        Value::Object(self.metrics.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==========================================================================
    // PAIR KEY TESTS
    // ==========================================================================

    #[test]
    fn test_split_pair_key() {
        assert_eq!(split_pair_key("Violin-Cello", '-'), Some(("Violin", "Cello")));
        assert_eq!(split_pair_key("Violin I-Violin II", '-'), Some(("Violin I", "Violin II")));
        assert_eq!(split_pair_key("Violin", '-'), None);
        assert_eq!(split_pair_key("-Cello", '-'), None);
        assert_eq!(split_pair_key("A-B-C", '-'), None);
    }

    #[test]
    fn test_edges_reject_self_pair() {
        let weights = PairwiseWeights::new(vec![("Violin-Violin".into(), 2.0)]);
        assert!(matches!(weights.edges('-'), Err(Error::SelfPair(_))));
    }

    #[test]
    fn test_edges_reject_negative_weight() {
        let weights = PairwiseWeights::new(vec![("A-B".into(), -1.0)]);
        assert!(matches!(weights.edges('-'), Err(Error::InvalidWeight { .. })));
    }

    #[test]
    fn test_edges_reject_missing_separator() {
        let weights = PairwiseWeights::new(vec![("AB".into(), 1.0)]);
        assert!(matches!(weights.edges('-'), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_top_k_keeps_heaviest_in_stable_order() {
        let weights = PairwiseWeights::new(vec![
            ("A-B".into(), 1.0),
            ("B-C".into(), 5.0),
            ("C-D".into(), 3.0),
            ("D-E".into(), 3.0),
        ]);
        let top = weights.top_k(3);
        let keys: Vec<&str> = top.entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["B-C", "C-D", "D-E"]);
    }

    // ==========================================================================
    // RESPONSE PARSING TESTS
    // ==========================================================================

    #[test]
    fn test_from_response_with_envelope() {
        let result = AnalysisResult::from_response(json!({
            "archivo": "coriolan.mid",
            "metricas": { "entropia_melodica": 3.2 }
        }))
        .unwrap();
        assert_eq!(result.source.as_deref(), Some("coriolan.mid"));
        assert_eq!(result.metrics.len(), 1);
    }

    #[test]
    fn test_from_response_bare_mapping() {
        let result = AnalysisResult::from_response(json!({ "a": 1, "b": { "x": 2 } })).unwrap();
        assert_eq!(result.source, None);
        let names: Vec<&String> = result.metrics.keys().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_from_response_error_is_fetch_failure() {
        let err = AnalysisResult::from_response(json!({ "error": "Archivo no encontrado" })).unwrap_err();
        assert!(matches!(err, Error::Fetch(msg) if msg == "Archivo no encontrado"));
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Harmonic".parse::<Category>().unwrap(), Category::Harmonic);
        assert!("painting".parse::<Category>().is_err());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::PerMeasure.to_string(), "per-measure");
        assert_eq!(Mode::default(), Mode::Global);
    }
}
