//! Self-similarity tree generator
//!
//! Grows a branching tree from a root name and similarity score. Each node
//! spawns `floor(2 + 3·score)` children spread evenly over a fixed angular
//! window around its own direction; every child is shorter than its parent
//! and its score decays by a random factor in `[decay_min, decay_max]`.
//!
//! Growth stops at `max_depth`, or when a branch would be shorter than
//! `min_length`, or when a generated score falls under `min_score`.
//!
//! Children supplied by the backend replace generated ones at their node
//! (their scores are taken as given); generation resumes below supplied
//! leaves.
//!
//! Coordinates: root base at the origin, y grows upward, angles in radians
//! counter-clockwise from +x (the root grows straight up at π/2).

use super::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_3};

/// A node of a similarity tree as delivered (or expanded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTreeNode {
    pub name: String,
    /// Similarity to the parent motif, in [0, 1]
    pub similarity: f64,
    pub depth: u32,
    #[serde(default)]
    pub children: Vec<SimilarityTreeNode>,
}

impl SimilarityTreeNode {
    /// A childless root
    pub fn root(name: impl Into<String>, similarity: f64) -> Self {
        Self { name: name.into(), similarity: similarity.clamp(0.0, 1.0), depth: 0, children: Vec::new() }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SimilarityTreeNode::node_count).sum::<usize>()
    }

    /// Deepest depth found below (and including) this node
    pub fn max_depth(&self) -> u32 {
        self.children.iter().map(SimilarityTreeNode::max_depth).max().unwrap_or(self.depth)
    }
}

/// Source of uniform numbers in `[0, 1)` for score decay
pub trait RandomSource {
    fn next(&mut self) -> f64;
}

impl<F: FnMut() -> f64> RandomSource for F {
    fn next(&mut self) -> f64 {
        self()
    }
}

/// Unseeded thread-local generator; trees differ run to run
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next(&mut self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Seeded generator; the same seed always grows the same tree
#[derive(Debug, Clone)]
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Replays a fixed list of values, cycling; an empty list always yields 0
#[derive(Debug, Clone, Default)]
pub struct FixedSequence {
    values: Vec<f64>,
    position: usize,
}

impl FixedSequence {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, position: 0 }
    }
}

impl RandomSource for FixedSequence {
    fn next(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.position % self.values.len()];
        self.position += 1;
        v.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_depth: u32,
    pub root_length: f64,
    /// Branches shorter than this are not drawn
    pub min_length: f64,
    /// Generated children with a lower score are not drawn
    pub min_score: f64,
    /// Total angular window shared by siblings (radians)
    pub spread: f64,
    pub decay_min: f64,
    pub decay_max: f64,
    pub base_children: f64,
    pub children_per_score: f64,
    pub shrink_base: f64,
    pub shrink_per_score: f64,
    pub label_max_depth: u32,
    pub label_min_score: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            root_length: 80.0,
            min_length: 10.0,
            min_score: 0.05,
            spread: FRAC_PI_3,
            decay_min: 0.7,
            decay_max: 1.0,
            base_children: 2.0,
            children_per_score: 3.0,
            shrink_base: 0.6,
            shrink_per_score: 0.3,
            label_max_depth: 2,
            label_min_score: 0.3,
        }
    }
}

/// Colour band of a node, from its similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityBand {
    /// > 0.8
    VeryHigh,
    /// > 0.6
    High,
    /// > 0.4
    Medium,
    /// > 0.2
    Low,
    Minimal,
}

impl SimilarityBand {
    pub fn of(score: f64) -> Self {
        if score > 0.8 {
            SimilarityBand::VeryHigh
        } else if score > 0.6 {
            SimilarityBand::High
        } else if score > 0.4 {
            SimilarityBand::Medium
        } else if score > 0.2 {
            SimilarityBand::Low
        } else {
            SimilarityBand::Minimal
        }
    }
}

/// One drawn branch plus the node at its tip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNodeLayout {
    pub name: String,
    pub parent: Option<usize>,
    pub depth: u32,
    pub similarity: f64,
    /// Came from the backend rather than the generator
    pub supplied: bool,
    pub start: Point,
    pub end: Point,
    pub angle: f64,
    pub length: f64,
    pub line_width: f64,
    pub radius: f64,
    pub band: SimilarityBand,
    pub labeled: bool,
}

/// Flattened tree in depth-first pre-order; index 0 is the root
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TreeLayout {
    pub nodes: Vec<TreeNodeLayout>,
}

impl TreeLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn children_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.parent == Some(index))
            .map(|(i, _)| i)
    }

    /// Bounding box of every branch as `(min, max)`
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = self.nodes.first()?;
        let mut min = first.start;
        let mut max = first.start;
        for p in self.nodes.iter().flat_map(|n| [n.start, n.end]) {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        Some((min, max))
    }

    /// Rebuild the expanded node tree (generated children materialised)
    pub fn to_node_tree(&self) -> Option<SimilarityTreeNode> {
        if self.nodes.is_empty() {
            return None;
        }
        Some(self.subtree(0))
    }

    fn subtree(&self, index: usize) -> SimilarityTreeNode {
        let node = &self.nodes[index];
        SimilarityTreeNode {
            name: node.name.clone(),
            similarity: node.similarity,
            depth: node.depth,
            children: self.children_of(index).map(|c| self.subtree(c)).collect(),
        }
    }
}

/// Grows [`TreeLayout`]s from similarity roots
#[derive(Debug, Clone, Default)]
pub struct TreeGenerator {
    config: TreeConfig,
}

struct Branch<'n> {
    name: String,
    similarity: f64,
    depth: u32,
    start: Point,
    angle: f64,
    length: f64,
    supplied: Option<&'n [SimilarityTreeNode]>,
    parent: Option<usize>,
}

impl TreeGenerator {
    pub fn new(config: TreeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Grow the tree below `root`. Returns an empty layout when even the root
    /// branch falls under the length floor.
    pub fn generate(&self, root: &SimilarityTreeNode, rng: &mut dyn RandomSource) -> TreeLayout {
        let mut layout = TreeLayout::default();
        self.grow(
            Branch {
                name: root.name.clone(),
                similarity: root.similarity.clamp(0.0, 1.0),
                depth: 0,
                start: Point::new(0.0, 0.0),
                angle: FRAC_PI_2,
                length: self.config.root_length,
                supplied: Some(&root.children),
                parent: None,
            },
            rng,
            &mut layout,
        );
        layout
    }

    fn grow(&self, branch: Branch<'_>, rng: &mut dyn RandomSource, layout: &mut TreeLayout) {
        let cfg = &self.config;
        if branch.depth > cfg.max_depth || branch.length < cfg.min_length {
            return;
        }

        let sim = branch.similarity;
        let end = Point::new(
            branch.start.x + branch.angle.cos() * branch.length,
            branch.start.y + branch.angle.sin() * branch.length,
        );
        let index = layout.nodes.len();
        layout.nodes.push(TreeNodeLayout {
            name: branch.name.clone(),
            parent: branch.parent,
            depth: branch.depth,
            similarity: sim,
            supplied: branch.supplied.is_some(),
            start: branch.start,
            end,
            angle: branch.angle,
            length: branch.length,
            line_width: ((5.0 - branch.depth as f64) * sim * 2.0).max(1.0),
            radius: 3.0 + sim * 8.0,
            band: SimilarityBand::of(sim),
            labeled: branch.depth <= cfg.label_max_depth && sim > cfg.label_min_score,
        });

        if branch.depth >= cfg.max_depth {
            return;
        }

        let child_length = branch.length * (cfg.shrink_base + sim * cfg.shrink_per_score);
        match branch.supplied {
            Some(children) if !children.is_empty() => {
                for (i, child) in children.iter().enumerate() {
                    self.grow(
                        Branch {
                            name: child.name.clone(),
                            similarity: child.similarity.clamp(0.0, 1.0),
                            depth: branch.depth + 1,
                            start: end,
                            angle: branch.angle + self.offset(i, children.len()),
                            length: child_length,
                            supplied: Some(&child.children),
                            parent: Some(index),
                        },
                        rng,
                        layout,
                    );
                }
            }
            _ => {
                let count = (cfg.base_children + sim * cfg.children_per_score).floor().max(0.0) as usize;
                for i in 0..count {
                    let decay = cfg.decay_min + rng.next() * (cfg.decay_max - cfg.decay_min);
                    let child_sim = sim * decay;
                    if child_sim < cfg.min_score {
                        continue;
                    }
                    self.grow(
                        Branch {
                            name: format!("{}.{}", branch.name, i + 1),
                            similarity: child_sim,
                            depth: branch.depth + 1,
                            start: end,
                            angle: branch.angle + self.offset(i, count),
                            length: child_length,
                            supplied: None,
                            parent: Some(index),
                        },
                        rng,
                        layout,
                    );
                }
            }
        }
    }

    /// Angular offset of sibling `i` of `count`, evenly dividing the spread
    fn offset(&self, i: usize, count: usize) -> f64 {
        let steps = count.saturating_sub(1).max(1) as f64;
        self.config.spread * (i as f64 - (count as f64 - 1.0) / 2.0) / steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(similarity: f64, rng: &mut dyn RandomSource) -> TreeLayout {
        TreeGenerator::default().generate(&SimilarityTreeNode::root("M", similarity), rng)
    }

    // ==========================================================================
    // GROWTH RULE TESTS
    // ==========================================================================

    #[test]
    fn test_root_grows_straight_up() {
        let layout = generate(0.5, &mut FixedSequence::new(vec![1.0]));
        let root = &layout.nodes[0];
        assert_eq!(root.parent, None);
        assert!((root.end.x).abs() < 1e-9);
        assert!((root.end.y - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_child_count_scales_with_score() {
        // floor(2 + 3·1.0) = 5, floor(2 + 3·0.2) = 2
        let high = generate(1.0, &mut FixedSequence::new(vec![0.99]));
        assert_eq!(high.children_of(0).count(), 5);
        let low = generate(0.2, &mut FixedSequence::new(vec![0.99]));
        assert_eq!(low.children_of(0).count(), 2);
    }

    #[test]
    fn test_children_named_by_position() {
        let layout = generate(0.5, &mut FixedSequence::new(vec![0.5]));
        let names: Vec<&str> = layout.children_of(0).map(|i| layout.nodes[i].name.as_str()).collect();
        assert_eq!(names, vec!["M.1", "M.2", "M.3"]);
    }

    #[test]
    fn test_siblings_span_spread_window() {
        let layout = generate(0.5, &mut FixedSequence::new(vec![0.5]));
        let angles: Vec<f64> = layout.children_of(0).map(|i| layout.nodes[i].angle).collect();
        assert!((angles[0] - (FRAC_PI_2 - FRAC_PI_3 / 2.0)).abs() < 1e-12);
        assert!((angles[1] - FRAC_PI_2).abs() < 1e-12);
        assert!((angles[2] - (FRAC_PI_2 + FRAC_PI_3 / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_decay_uses_injected_source() {
        // r = 0 gives the lower bound 0.7, r = 1 the upper bound 1.0
        let generator = TreeGenerator::new(TreeConfig { max_depth: 1, ..TreeConfig::default() });
        let layout = generator.generate(
            &SimilarityTreeNode::root("M", 0.8),
            &mut FixedSequence::new(vec![0.0, 1.0]),
        );
        let kids: Vec<usize> = layout.children_of(0).collect();
        assert!((layout.nodes[kids[0]].similarity - 0.56).abs() < 1e-12);
        assert!((layout.nodes[kids[1]].similarity - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_depth_never_exceeds_max() {
        let layout = generate(1.0, &mut FixedSequence::new(vec![1.0]));
        assert_eq!(layout.max_depth(), 4);
        let shallow = TreeGenerator::new(TreeConfig { max_depth: 2, ..TreeConfig::default() })
            .generate(&SimilarityTreeNode::root("M", 1.0), &mut ThreadRandom);
        assert!(shallow.max_depth() <= 2);
    }

    #[test]
    fn test_length_floor_stops_growth() {
        // 15 → 11.25 → 8.4, under the floor of 10
        let generator = TreeGenerator::new(TreeConfig { root_length: 15.0, ..TreeConfig::default() });
        let layout = generator.generate(&SimilarityTreeNode::root("M", 0.5), &mut FixedSequence::new(vec![0.5]));
        assert_eq!(layout.max_depth(), 1);
    }

    #[test]
    fn test_score_floor_stops_growth() {
        let layout = generate(0.0, &mut FixedSequence::new(vec![0.5]));
        assert_eq!(layout.len(), 1);
    }

    // ==========================================================================
    // ATTRIBUTE TESTS
    // ==========================================================================

    #[test]
    fn test_labels_only_shallow_and_similar() {
        let layout = generate(0.9, &mut FixedSequence::new(vec![0.0]));
        for node in &layout.nodes {
            assert_eq!(node.labeled, node.depth <= 2 && node.similarity > 0.3, "{}", node.name);
        }
        assert!(layout.nodes.iter().any(|n| !n.labeled));
    }

    #[test]
    fn test_line_width_and_radius() {
        let layout = generate(0.5, &mut FixedSequence::new(vec![0.5]));
        let root = &layout.nodes[0];
        assert!((root.line_width - 5.0).abs() < 1e-12);
        assert!((root.radius - 7.0).abs() < 1e-12);
        assert_eq!(root.band, SimilarityBand::Medium);
    }

    #[test]
    fn test_similarity_bands() {
        assert_eq!(SimilarityBand::of(0.95), SimilarityBand::VeryHigh);
        assert_eq!(SimilarityBand::of(0.8), SimilarityBand::High);
        assert_eq!(SimilarityBand::of(0.3), SimilarityBand::Low);
        assert_eq!(SimilarityBand::of(0.1), SimilarityBand::Minimal);
    }

    // ==========================================================================
    // SUPPLIED CHILDREN & DETERMINISM TESTS
    // ==========================================================================

    #[test]
    fn test_supplied_children_replace_generated() {
        let mut root = SimilarityTreeNode::root("Tema", 0.9);
        root.children = vec![
            SimilarityTreeNode { name: "Var A".into(), similarity: 0.7, depth: 1, children: vec![] },
            SimilarityTreeNode { name: "Var B".into(), similarity: 0.4, depth: 1, children: vec![] },
        ];
        let layout = TreeGenerator::default().generate(&root, &mut FixedSequence::new(vec![0.5]));
        let kids: Vec<usize> = layout.children_of(0).collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(layout.nodes[kids[0]].name, "Var A");
        assert!(layout.nodes[kids[0]].supplied);
        assert_eq!(layout.nodes[kids[0]].similarity, 0.7);
        // Generation resumes below the supplied leaf
        let grand: Vec<usize> = layout.children_of(kids[0]).collect();
        assert!(!grand.is_empty());
        assert!(!layout.nodes[grand[0]].supplied);
        assert_eq!(layout.nodes[grand[0]].name, "Var A.1");
    }

    #[test]
    fn test_same_seed_same_tree() {
        let a = generate(0.85, &mut SeededRandom::new(7));
        let b = generate(0.85, &mut SeededRandom::new(7));
        assert_eq!(a, b);
        assert_eq!(a.to_node_tree().unwrap().node_count(), a.len());
    }

    #[test]
    fn test_closure_as_random_source() {
        let mut calls = 0;
        let mut source = || {
            calls += 1;
            0.5
        };
        let layout = generate(0.5, &mut source);
        assert!(layout.len() > 1);
        assert!(calls > 0);
    }

    #[test]
    fn test_empty_when_root_too_short() {
        let generator = TreeGenerator::new(TreeConfig { root_length: 5.0, ..TreeConfig::default() });
        let layout = generator.generate(&SimilarityTreeNode::root("M", 1.0), &mut ThreadRandom);
        assert!(layout.is_empty());
        assert!(layout.to_node_tree().is_none());
    }
}
