//! Chord / network layout
//!
//! Turns an [`AdjacencyMatrix`] into circular geometry:
//!
//! - **Groups**: one arc per label, sized by the label's outgoing + incoming
//!   weight, laid out in descending-weight order with a fixed padding angle
//!   between neighbours.
//! - **Ribbons**: one per connected pair (undirected) or per nonzero cell
//!   (directed), joining a segment of the source arc to a segment of the
//!   target arc. Segment width is proportional to the cell weight.
//!
//! # Angles
//!
//! Angles are radians measured clockwise from 12 o'clock, the convention of
//! d3's `arc`/`ribbon` generators the dashboard draws with. The arcs always
//! cover exactly `2π − n·pad`; padding fills the rest of the circle.
//!
//! ```text
//!        pad   group 0 (heaviest)   pad
//!     ──┤   ├────────────────────┤   ├──  group 1 ...
//!           [seg j1][seg j2][...]          segments sorted by weight
//! ```
//!
//! Labels whose weight is zero still get `min_arc` so they stay clickable.
//! Fewer than two labels produce an empty layout rather than a one-arc circle.

use super::matrix::AdjacencyMatrix;
use crate::metric::{PairwiseWeights, PAIR_SEPARATOR};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordConfig {
    /// Gap between neighbouring arcs (radians)
    pub pad_angle: f64,
    /// Arc given to labels with zero total weight (radians)
    pub min_arc: f64,
    /// Directed ribbons with a head marker at the target end
    pub directed: bool,
    pub separator: char,
    /// Keep only the K heaviest pairs before layout
    pub top_k: Option<usize>,
    /// Head marker size for the lightest ribbon
    pub head_base: f64,
    /// Extra head marker size for the heaviest ribbon
    pub head_scale: f64,
}

impl Default for ChordConfig {
    fn default() -> Self {
        Self {
            pad_angle: 0.05,
            min_arc: 0.02,
            directed: false,
            separator: PAIR_SEPARATOR,
            top_k: None,
            head_base: 10.0,
            head_scale: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordGroup {
    /// Matrix index of the label
    pub index: usize,
    pub label: String,
    /// Outgoing + incoming weight
    pub value: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl ChordGroup {
    pub fn arc(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn mid_angle(&self) -> f64 {
        (self.start_angle + self.end_angle) / 2.0
    }
}

/// One end of a ribbon: a segment of a group's arc
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RibbonEnd {
    pub index: usize,
    pub label: String,
    pub start_angle: f64,
    pub end_angle: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadMarker {
    /// Angle the head points at (middle of the target segment)
    pub angle: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ribbon {
    pub source: RibbonEnd,
    pub target: RibbonEnd,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<HeadMarker>,
}

/// Groups and ribbons for one matrix. Ribbons are in paint order, heaviest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChordLayout {
    pub groups: Vec<ChordGroup>,
    pub ribbons: Vec<Ribbon>,
    /// Padding actually used (clamped for very many labels)
    pub pad_angle: f64,
    pub directed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Out,
    In,
}

/// Key of a group segment: (group, other label, side)
type SegmentKey = (usize, usize, Side);

impl ChordLayout {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Build a layout straight from pairwise weights, honouring `top_k`
    pub fn from_pairs(weights: &PairwiseWeights, config: &ChordConfig) -> Result<Self> {
        let matrix = match config.top_k {
            Some(k) => AdjacencyMatrix::from_pairs(&weights.top_k(k), config.separator, config.directed)?,
            None => AdjacencyMatrix::from_pairs(weights, config.separator, config.directed)?,
        };
        Ok(Self::from_matrix(&matrix, config))
    }

    pub fn from_matrix(matrix: &AdjacencyMatrix, config: &ChordConfig) -> Self {
        let n = matrix.size();
        if n < 2 {
            return Self::empty();
        }

        let segments = collect_segments(matrix);
        let totals: Vec<f64> = (0..n)
            .map(|i| segments[i].iter().map(|(_, _, w)| w).sum())
            .collect();

        let pad = config.pad_angle.clamp(0.0, PI / n as f64);
        let available = TAU - pad * n as f64;
        let arcs = arc_lengths(&totals, available, config.min_arc);

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| totals[b].total_cmp(&totals[a]).then(a.cmp(&b)));

        let mut groups = Vec::with_capacity(n);
        let mut placed: BTreeMap<SegmentKey, (f64, f64)> = BTreeMap::new();
        let mut cursor = 0.0;
        for &i in &order {
            let start = cursor;
            let end = start + arcs[i];
            groups.push(ChordGroup {
                index: i,
                label: matrix.labels[i].clone(),
                value: totals[i],
                start_angle: start,
                end_angle: end,
            });

            let mut x = start;
            for &(other, side, weight) in &segments[i] {
                let width = if totals[i] > 0.0 { arcs[i] * weight / totals[i] } else { 0.0 };
                placed.insert((i, other, side), (x, x + width));
                x += width;
            }
            cursor = end + pad;
        }

        let ribbons = build_ribbons(matrix, &placed, config);
        Self { groups, ribbons, pad_angle: pad, directed: matrix.directed }
    }

    /// Sum of all group arcs
    pub fn total_arc(&self) -> f64 {
        self.groups.iter().map(ChordGroup::arc).sum()
    }

    pub fn group(&self, label: &str) -> Option<&ChordGroup> {
        self.groups.iter().find(|g| g.label == label)
    }

    /// A copy turned by `angle` radians; the layout itself is never mutated
    pub fn rotated(&self, angle: f64) -> ChordLayout {
        let mut turned = self.clone();
        for g in &mut turned.groups {
            g.start_angle += angle;
            g.end_angle += angle;
        }
        for r in &mut turned.ribbons {
            for end in [&mut r.source, &mut r.target] {
                end.start_angle += angle;
                end.end_angle += angle;
            }
            if let Some(head) = &mut r.head {
                head.angle += angle;
            }
        }
        turned
    }
}

/// Segments of every group, sorted by weight descending, then by the other
/// label's index, outgoing before incoming.
fn collect_segments(matrix: &AdjacencyMatrix) -> Vec<Vec<(usize, Side, f64)>> {
    let n = matrix.size();
    let mut all = Vec::with_capacity(n);
    for i in 0..n {
        let mut segs = Vec::new();
        for j in (0..n).filter(|&j| j != i) {
            if matrix.directed {
                if matrix.cells[i][j] > 0.0 {
                    segs.push((j, Side::Out, matrix.cells[i][j]));
                }
                if matrix.cells[j][i] > 0.0 {
                    segs.push((j, Side::In, matrix.cells[j][i]));
                }
            } else {
                // Folded cells: the pair occupies row and column share alike
                let w = matrix.cells[i][j] + matrix.cells[j][i];
                if w > 0.0 {
                    segs.push((j, Side::Out, w));
                }
            }
        }
        segs.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));
        all.push(segs);
    }
    all
}

fn arc_lengths(totals: &[f64], available: f64, min_arc: f64) -> Vec<f64> {
    let n = totals.len();
    let weighted: f64 = totals.iter().sum();
    if weighted <= 0.0 {
        return vec![available / n as f64; n];
    }
    let isolated = totals.iter().filter(|&&t| t <= 0.0).count();
    let min_arc = min_arc.clamp(0.0, available / n as f64);
    let spread = available - min_arc * isolated as f64;
    totals
        .iter()
        .map(|&t| if t <= 0.0 { min_arc } else { spread * t / weighted })
        .collect()
}

fn build_ribbons(
    matrix: &AdjacencyMatrix,
    placed: &BTreeMap<SegmentKey, (f64, f64)>,
    config: &ChordConfig,
) -> Vec<Ribbon> {
    let n = matrix.size();
    let end = |group: usize, other: usize, side: Side, value: f64| {
        let (start_angle, end_angle) = placed.get(&(group, other, side)).copied().unwrap_or((0.0, 0.0));
        RibbonEnd { index: group, label: matrix.labels[group].clone(), start_angle, end_angle, value }
    };

    let mut ribbons = Vec::new();
    if matrix.directed {
        let max = matrix.cells.iter().flatten().fold(0.0_f64, |m, &w| m.max(w));
        for i in 0..n {
            for j in (0..n).filter(|&j| j != i && matrix.cells[i][j] > 0.0) {
                let w = matrix.cells[i][j];
                let target = end(j, i, Side::In, w);
                let head = HeadMarker {
                    angle: (target.start_angle + target.end_angle) / 2.0,
                    size: config.head_base + config.head_scale * w / max,
                };
                ribbons.push(Ribbon { source: end(i, j, Side::Out, w), target, weight: w, head: Some(head) });
            }
        }
    } else {
        for i in 0..n {
            for j in (i + 1..n).filter(|&j| matrix.cells[i][j] > 0.0) {
                let w = matrix.cells[i][j];
                ribbons.push(Ribbon {
                    source: end(i, j, Side::Out, w),
                    target: end(j, i, Side::Out, matrix.cells[j][i]),
                    weight: w,
                    head: None,
                });
            }
        }
    }

    ribbons.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then(a.source.index.cmp(&b.source.index))
            .then(a.target.index.cmp(&b.target.index))
    });
    ribbons
}
