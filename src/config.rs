//! Engine configuration
//!
//! Every tuning constant the layout engines use lives here so the host can
//! override it. All sections deserialize with defaults, so a config file only
//! needs the keys it changes:
//!
//! ```json
//! { "chord": { "pad_angle": 0.08 }, "pair_caps": { "red_interaccion_musical": 20 } }
//! ```

use crate::animation::AnimationConfig;
use crate::layout::chord::ChordConfig;
use crate::layout::spatial::SpatialConfig;
use crate::layout::tree::TreeConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Dotted metric path of the harmonic progression table capped by default
pub const PROGRESSION_PAIRS_PATH: &str = "progresiones_armonicas.progresiones_2_acordes";

/// Number of pairs kept for capped pairwise metrics unless configured otherwise
pub const DEFAULT_PAIR_CAP: usize = 12;

/// Deepest similarity tree a config may ask for
pub const MAX_TREE_DEPTH: u32 = 8;

/// Most children a generated tree node may get
pub const MAX_TREE_CHILDREN: f64 = 8.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chord: ChordConfig,
    pub tree: TreeConfig,
    pub animation: AnimationConfig,
    pub spatial: SpatialConfig,
    /// Top-K cap per dotted metric path for pairwise metrics
    pub pair_caps: BTreeMap<String, usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut pair_caps = BTreeMap::new();
        pair_caps.insert(PROGRESSION_PAIRS_PATH.to_string(), DEFAULT_PAIR_CAP);
        Self {
            chord: ChordConfig::default(),
            tree: TreeConfig::default(),
            animation: AnimationConfig::default(),
            spatial: SpatialConfig::default(),
            pair_caps,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Cap every pairwise metric at `k` pairs
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.chord.top_k = Some(k);
        self
    }

    /// Cap one pairwise metric (by dotted path) at `k` pairs
    pub fn with_pair_cap(mut self, path: &str, k: usize) -> Self {
        self.pair_caps.insert(path.to_string(), k);
        self
    }

    pub fn with_directed(mut self, directed: bool) -> Self {
        self.chord.directed = directed;
        self
    }

    pub fn with_tree_max_depth(mut self, depth: u32) -> Self {
        self.tree.max_depth = depth;
        self
    }

    /// Cap that applies to the pairwise metric at `path`, if any
    pub fn pair_cap(&self, path: &str) -> Option<usize> {
        self.pair_caps.get(path).copied().or(self.chord.top_k)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.chord.pad_angle >= 0.0 && self.chord.pad_angle.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "chord.pad_angle must be a non-negative number, got {}",
                self.chord.pad_angle
            )));
        }
        if !(self.chord.min_arc >= 0.0 && self.chord.min_arc.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "chord.min_arc must be a non-negative number, got {}",
                self.chord.min_arc
            )));
        }
        let (lo, hi) = (self.tree.decay_min, self.tree.decay_max);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(Error::InvalidInput(format!(
                "tree decay bounds must satisfy 0 <= min <= max <= 1, got [{}, {}]",
                lo, hi
            )));
        }
        let tree = &self.tree;
        if tree.max_depth > MAX_TREE_DEPTH {
            return Err(Error::InvalidInput(format!(
                "tree.max_depth must be at most {}, got {}",
                MAX_TREE_DEPTH, tree.max_depth
            )));
        }
        if !(tree.root_length.is_finite() && tree.min_length.is_finite() && tree.min_length > 0.0) {
            return Err(Error::InvalidInput(format!(
                "tree lengths must be finite with min_length > 0, got root {} min {}",
                tree.root_length, tree.min_length
            )));
        }
        let (base, per_score) = (tree.base_children, tree.children_per_score);
        if !(base >= 0.0 && per_score >= 0.0 && base + per_score <= MAX_TREE_CHILDREN) {
            return Err(Error::InvalidInput(format!(
                "tree children must be non-negative and at most {} per node, got {} + {}",
                MAX_TREE_CHILDREN, base, per_score
            )));
        }
        let (base, per_score) = (tree.shrink_base, tree.shrink_per_score);
        if !(base >= 0.0 && per_score >= 0.0 && base + per_score < 1.0) {
            return Err(Error::InvalidInput(format!(
                "tree shrink factors must be non-negative with base + per_score < 1, got {} + {}",
                base, per_score
            )));
        }
        if self.animation.scroll_modulus == 0 {
            return Err(Error::InvalidInput("animation.scroll_modulus must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_caps_progressions() {
        let config = EngineConfig::default();
        assert_eq!(config.pair_cap(PROGRESSION_PAIRS_PATH), Some(12));
        assert_eq!(config.pair_cap("red_interaccion_musical"), None);
    }

    #[test]
    fn test_global_top_k_applies_to_uncapped_paths() {
        let config = EngineConfig::new().with_top_k(5);
        assert_eq!(config.pair_cap("red_interaccion_musical"), Some(5));
        // Explicit per-path caps win
        assert_eq!(config.pair_cap(PROGRESSION_PAIRS_PATH), Some(12));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unbounded_tree_growth_rejected() {
        let deep: EngineConfig =
            serde_json::from_str(r#"{"tree": {"max_depth": 9, "shrink_base": 0.5, "shrink_per_score": 0.2}}"#).unwrap();
        assert!(matches!(deep.validate(), Err(Error::InvalidInput(_))));

        let no_shrink: EngineConfig =
            serde_json::from_str(r#"{"tree": {"shrink_base": 1.0, "shrink_per_score": 0.0}}"#).unwrap();
        assert!(matches!(no_shrink.validate(), Err(Error::InvalidInput(_))));

        let mut bushy = EngineConfig::default();
        bushy.tree.children_per_score = 40.0;
        assert!(matches!(bushy.validate(), Err(Error::InvalidInput(_))));

        let mut zero_floor = EngineConfig::default();
        zero_floor.tree.min_length = 0.0;
        assert!(matches!(zero_floor.validate(), Err(Error::InvalidInput(_))));

        let mut at_cap = EngineConfig::default();
        at_cap.tree.max_depth = MAX_TREE_DEPTH;
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn test_inverted_decay_bounds_rejected() {
        let mut config = EngineConfig::default();
        config.tree.decay_min = 0.9;
        config.tree.decay_max = 0.5;
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_partial_json_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "chord": {{ "pad_angle": 0.1 }}, "tree": {{ "max_depth": 3 }} }}"#).unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert!((config.chord.pad_angle - 0.1).abs() < 1e-12);
        assert_eq!(config.tree.max_depth, 3);
        assert!((config.chord.min_arc - ChordConfig::default().min_arc).abs() < 1e-12);
        assert_eq!(config.pair_cap(PROGRESSION_PAIRS_PATH), Some(12));
    }
}
