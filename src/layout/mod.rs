//! Layout engines
//!
//! Pure geometry: every engine takes typed metric data plus its config and
//! returns a fresh chart-ready structure. Nothing here mutates its input or
//! holds state between calls.

pub mod chord;
pub mod matrix;
pub mod seating;
pub mod spatial;
pub mod tree;

use serde::{Deserialize, Serialize};

pub use chord::{ChordConfig, ChordGroup, ChordLayout, Ribbon};
pub use matrix::AdjacencyMatrix;
pub use seating::{SeatingPosition, SeatingTable, Section};
pub use spatial::{DensityMap, SeatNetwork, SpatialConfig};
pub use tree::{RandomSource, SimilarityTreeNode, TreeConfig, TreeGenerator, TreeLayout};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
