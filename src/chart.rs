//! Chart routing
//!
//! Turns classified metrics into chart-ready [`ChartSpec`]s:
//!
//! | shape            | chart                                             |
//! |------------------|---------------------------------------------------|
//! | Scalar           | value card                                        |
//! | Distribution     | bars / pie / doughnut / radar, or orchestra density |
//! | PairwiseWeights  | chord diagram, or seat network                    |
//! | PerUnitSeries    | line / bar, or heatmap cells                      |
//! | SimilarityTree   | generated tree                                    |
//! | Composite        | one chart per entry (recursive)                   |
//! | Opaque           | raw JSON                                          |
//!
//! Failures stay inside the metric that caused them: a malformed pairwise
//! key turns that one metric into a raw display with a notice, and every
//! other metric in the result renders normally. Empty inputs render as
//! [`ChartSpec::NoData`].

use crate::animation::{self, AnimationConfig, AnimationState};
use crate::config::EngineConfig;
use crate::layout::chord::{ChordConfig, ChordLayout};
use crate::layout::matrix::AdjacencyMatrix;
use crate::layout::seating::SeatingTable;
use crate::layout::spatial::{DensityMap, SeatNetwork};
use crate::layout::tree::{RandomSource, SimilarityTreeNode, TreeGenerator, TreeLayout};
use crate::metric::style::{self, ChartStyle};
use crate::metric::{AnalysisResult, Category, Classified, MetricValue, PairwiseWeights, SeriesPoint, Shape};
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Heatmap cells per row
pub const HEATMAP_COLUMNS: usize = 10;

/// Height of the tallest pulsing bar before the wave is added
pub const PULSE_BAR_HEIGHT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCell {
    pub col: usize,
    pub row: usize,
    pub key: String,
    pub value: f64,
    /// value / max, in [0, 1]
    pub normalized: f64,
    /// Animated brightness offset (0 until animated)
    pub offset: f64,
    /// Animated tile size factor (1 until animated)
    pub scale: f64,
}

/// Chart-ready structure for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    Scalar {
        value: f64,
    },
    Bars {
        style: ChartStyle,
        labels: Vec<String>,
        values: Vec<f64>,
        /// Pulsing bar heights; empty until animated
        #[serde(skip_serializing_if = "Vec::is_empty")]
        heights: Vec<f64>,
    },
    Series {
        style: ChartStyle,
        points: Vec<SeriesPoint>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        cells: Vec<HeatCell>,
        /// Units the repeating pattern has scrolled
        scroll: u64,
    },
    Chord {
        matrix: AdjacencyMatrix,
        layout: ChordLayout,
    },
    Network(SeatNetwork),
    Density(DensityMap),
    Tree(TreeLayout),
    Composite {
        children: Vec<RenderedMetric>,
    },
    Raw {
        value: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
        backend_error: bool,
    },
    NoData,
}

impl ChartSpec {
    pub fn is_no_data(&self) -> bool {
        matches!(self, ChartSpec::NoData)
    }

    /// Whether scheduler ticks change this chart's geometry
    pub fn is_animated(&self) -> bool {
        match self {
            ChartSpec::Chord { .. } | ChartSpec::Series { .. } => true,
            ChartSpec::Bars { style, .. } => *style == ChartStyle::Bar,
            ChartSpec::Composite { children } => children.iter().any(|c| c.chart.is_animated()),
            _ => false,
        }
    }

    /// Geometry at an animation state; static charts come back unchanged
    pub fn at(&self, state: &AnimationState, config: &AnimationConfig) -> ChartSpec {
        match self {
            ChartSpec::Chord { matrix, layout } => ChartSpec::Chord {
                matrix: matrix.clone(),
                layout: animation::rotate(layout, state),
            },
            ChartSpec::Bars { style: ChartStyle::Bar, labels, values, .. } => {
                let (base, variances) = pulse_inputs(values);
                ChartSpec::Bars {
                    style: ChartStyle::Bar,
                    labels: labels.clone(),
                    values: values.clone(),
                    heights: animation::pulse_heights(&base, &variances, state, config),
                }
            }
            ChartSpec::Series { style, points, cells, .. } => ChartSpec::Series {
                style: *style,
                points: points.clone(),
                cells: cells
                    .iter()
                    .map(|c| HeatCell {
                        offset: animation::mosaic_offset(c.col, c.row, state, config),
                        scale: animation::mosaic_tile_scale(c.col, c.row, state, config),
                        ..c.clone()
                    })
                    .collect(),
                scroll: animation::scroll_offset(state, points.len() as u64),
            },
            ChartSpec::Composite { children } => ChartSpec::Composite {
                children: children
                    .iter()
                    .map(|c| RenderedMetric { chart: c.chart.at(state, config), ..c.clone() })
                    .collect(),
            },
            other => other.clone(),
        }
    }
}

/// One metric with its chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMetric {
    pub name: String,
    /// Dotted path from the top of the result
    pub path: String,
    pub shape: Shape,
    pub style: ChartStyle,
    pub chart: ChartSpec,
    /// Instruments the seating table could not place
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unpositioned: Vec<String>,
}

impl RenderedMetric {
    /// Unpositioned instruments here and in every nested chart
    pub fn all_unpositioned(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.unpositioned.iter().map(String::as_str).collect();
        if let ChartSpec::Composite { children } = &self.chart {
            names.extend(children.iter().flat_map(RenderedMetric::all_unpositioned));
        }
        names
    }
}

/// Routes classified metrics to their layout engines
#[derive(Debug, Clone)]
pub struct ChartRouter<'a> {
    config: &'a EngineConfig,
    seating: &'a SeatingTable,
    category: Option<Category>,
}

impl<'a> ChartRouter<'a> {
    pub fn new(config: &'a EngineConfig, seating: &'a SeatingTable) -> Self {
        Self { config, seating, category: None }
    }

    /// Use this category's chart table for style hints
    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    /// Render every metric of a result, in delivery order
    pub fn render_result(&self, result: &AnalysisResult, rng: &mut dyn RandomSource) -> Vec<RenderedMetric> {
        result
            .classify_all_with(self.config.chord.separator)
            .iter()
            .map(|c| self.render_metric(c, rng))
            .collect()
    }

    pub fn render_metric(&self, classified: &Classified, rng: &mut dyn RandomSource) -> RenderedMetric {
        self.render_value(&classified.name, &classified.name, &classified.value, rng)
    }

    fn render_value(&self, name: &str, path: &str, value: &MetricValue, rng: &mut dyn RandomSource) -> RenderedMetric {
        let shape = value.shape();
        let style = style::resolve(self.category, name, shape);
        let mut unpositioned = Vec::new();

        let chart = match value {
            MetricValue::Scalar(v) => ChartSpec::Scalar { value: *v },
            MetricValue::Distribution(entries) => self.distribution(style, entries, &mut unpositioned),
            MetricValue::PairwiseWeights(weights) => {
                match self.pairwise(path, style, weights, &mut unpositioned) {
                    Ok(chart) => chart,
                    Err(e) => {
                        warn!(metric = path, error = %e, "pairwise layout failed, showing raw value");
                        ChartSpec::Raw {
                            value: pairs_to_json(weights),
                            notice: Some(e.to_string()),
                            backend_error: false,
                        }
                    }
                }
            }
            MetricValue::PerUnitSeries(points) => series(style, points),
            MetricValue::SimilarityTree(root) => self.tree(root, rng),
            MetricValue::Composite(entries) => {
                let children: Vec<RenderedMetric> = entries
                    .iter()
                    .map(|(key, v)| self.render_value(key, &format!("{}.{}", path, key), v, rng))
                    .collect();
                if children.is_empty() {
                    ChartSpec::NoData
                } else {
                    ChartSpec::Composite { children }
                }
            }
            MetricValue::Opaque(raw) => {
                let notice = match raw {
                    Value::String(s) if s.starts_with(crate::metric::classify::BACKEND_ERROR_PREFIX) => Some(s.clone()),
                    _ => None,
                };
                ChartSpec::Raw { value: raw.clone(), backend_error: notice.is_some(), notice }
            }
        };

        debug!(metric = path, %shape, ?style, "rendered metric");
        RenderedMetric {
            name: name.to_string(),
            path: path.to_string(),
            shape,
            style,
            chart,
            unpositioned,
        }
    }

    fn distribution(&self, style: ChartStyle, entries: &[(String, f64)], unpositioned: &mut Vec<String>) -> ChartSpec {
        if entries.is_empty() {
            return ChartSpec::NoData;
        }
        if style == ChartStyle::Orchestra {
            let map = DensityMap::build(self.seating, entries, &self.config.spatial);
            if !map.is_empty() {
                *unpositioned = map.unpositioned.clone();
                return ChartSpec::Density(map);
            }
        }
        let style = if style == ChartStyle::Orchestra { ChartStyle::Bar } else { style };
        ChartSpec::Bars {
            style,
            labels: entries.iter().map(|(l, _)| l.clone()).collect(),
            values: entries.iter().map(|(_, v)| *v).collect(),
            heights: Vec::new(),
        }
    }

    fn pairwise(
        &self,
        path: &str,
        style: ChartStyle,
        weights: &PairwiseWeights,
        unpositioned: &mut Vec<String>,
    ) -> Result<ChartSpec> {
        if weights.is_empty() {
            return Ok(ChartSpec::NoData);
        }
        let chord = ChordConfig { top_k: self.config.pair_cap(path), ..self.config.chord.clone() };
        let weights = match chord.top_k {
            Some(k) => weights.top_k(k),
            None => weights.clone(),
        };

        if style == ChartStyle::Orchestra {
            let network = SeatNetwork::build(self.seating, &weights, chord.separator, &self.config.spatial)?;
            *unpositioned = network.unpositioned.clone();
            return Ok(ChartSpec::Network(network));
        }

        let matrix = AdjacencyMatrix::from_pairs(&weights, chord.separator, chord.directed)?;
        let layout = ChordLayout::from_matrix(&matrix, &chord);
        if layout.is_empty() {
            return Ok(ChartSpec::NoData);
        }
        Ok(ChartSpec::Chord { matrix, layout })
    }

    fn tree(&self, root: &SimilarityTreeNode, rng: &mut dyn RandomSource) -> ChartSpec {
        let layout = TreeGenerator::new(self.config.tree.clone()).generate(root, rng);
        if layout.is_empty() {
            ChartSpec::NoData
        } else {
            ChartSpec::Tree(layout)
        }
    }
}

fn series(style: ChartStyle, points: &[SeriesPoint]) -> ChartSpec {
    if points.is_empty() {
        return ChartSpec::NoData;
    }
    let cells = if style == ChartStyle::Heatmap { heat_cells(points) } else { Vec::new() };
    ChartSpec::Series { style, points: points.to_vec(), cells, scroll: 0 }
}

/// Resting bar heights scaled to [`PULSE_BAR_HEIGHT`] and each bar's
/// distance from the mean as a fraction of the largest value
fn pulse_inputs(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return (vec![0.0; values.len()], vec![0.0; values.len()]);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let base = values.iter().map(|v| v / max * PULSE_BAR_HEIGHT).collect();
    let variances = values.iter().map(|v| (v - mean).abs() / max).collect();
    (base, variances)
}

/// Lay series points out row-major, [`HEATMAP_COLUMNS`] per row
pub fn heat_cells(points: &[SeriesPoint]) -> Vec<HeatCell> {
    let max = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    points
        .iter()
        .enumerate()
        .map(|(i, p)| HeatCell {
            col: i % HEATMAP_COLUMNS,
            row: i / HEATMAP_COLUMNS,
            key: p.key.clone(),
            value: p.value,
            normalized: if max > 0.0 { (p.value / max).clamp(0.0, 1.0) } else { 0.0 },
            offset: 0.0,
            scale: 1.0,
        })
        .collect()
}

fn pairs_to_json(weights: &PairwiseWeights) -> Value {
    Value::Object(
        weights
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::json!(v)))
            .collect(),
    )
}
