//! Adjacency matrix built from pairwise weights
//!
//! Keys like `"Violin-Cello"` are split on the separator, the distinct labels
//! are sorted and indexed, and each weight is added to `[source][target]`.
//! In undirected mode the weight is also added to `[target][source]`, so
//! `"A-B"` and `"B-A"` fold into the same symmetric pair of cells.

use crate::metric::PairwiseWeights;
use crate::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjacencyMatrix {
    /// Distinct labels, sorted; position = matrix index
    pub labels: Vec<String>,
    /// Row-major N×N weights
    pub cells: Vec<Vec<f64>>,
    pub directed: bool,
}

impl AdjacencyMatrix {
    pub fn from_pairs(weights: &PairwiseWeights, separator: char, directed: bool) -> Result<Self> {
        let edges = weights.edges(separator)?;

        let labels: Vec<String> = edges
            .iter()
            .flat_map(|(s, t, _)| [s.clone(), t.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: BTreeMap<&str, usize> =
            labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();

        let n = labels.len();
        let mut cells = vec![vec![0.0; n]; n];
        for (source, target, weight) in &edges {
            let (i, j) = (index[source.as_str()], index[target.as_str()]);
            cells[i][j] += weight;
            if !directed {
                cells[j][i] += weight;
            }
        }

        Ok(Self { labels, cells, directed })
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.binary_search_by(|l| l.as_str().cmp(label)).ok()
    }

    /// Weight of `[source][target]` by label
    pub fn weight(&self, source: &str, target: &str) -> Option<f64> {
        let (i, j) = (self.index_of(source)?, self.index_of(target)?);
        Some(self.cells[i][j])
    }

    pub fn row_sum(&self, i: usize) -> f64 {
        self.cells[i].iter().sum()
    }

    pub fn column_sum(&self, j: usize) -> f64 {
        self.cells.iter().map(|row| row[j]).sum()
    }

    /// Outgoing plus incoming weight of one label
    pub fn total(&self, i: usize) -> f64 {
        self.row_sum(i) + self.column_sum(i)
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.size();
        (0..n).all(|i| (0..n).all(|j| self.cells[i][j] == self.cells[j][i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn weights(pairs: &[(&str, f64)]) -> PairwiseWeights {
        PairwiseWeights::new(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    #[test]
    fn test_labels_sorted_and_indexed() {
        let m = AdjacencyMatrix::from_pairs(
            &weights(&[("Violin-Cello", 5.0), ("Cello-Viola", 3.0)]),
            '-',
            false,
        )
        .unwrap();
        assert_eq!(m.labels, vec!["Cello", "Viola", "Violin"]);
        assert_eq!(m.index_of("Violin"), Some(2));
        assert_eq!(m.index_of("Flute"), None);
    }

    #[test]
    fn test_undirected_folds_both_directions() {
        let m = AdjacencyMatrix::from_pairs(&weights(&[("A-B", 2.0), ("B-A", 3.0)]), '-', false).unwrap();
        assert_eq!(m.weight("A", "B"), Some(5.0));
        assert_eq!(m.weight("B", "A"), Some(5.0));
        assert!(m.is_symmetric());
    }

    #[test]
    fn test_directed_keeps_direction() {
        let m = AdjacencyMatrix::from_pairs(&weights(&[("A-B", 2.0), ("B-A", 3.0)]), '-', true).unwrap();
        assert_eq!(m.weight("A", "B"), Some(2.0));
        assert_eq!(m.weight("B", "A"), Some(3.0));
        assert!(!m.is_symmetric());
        assert_eq!(m.total(0), 5.0);
    }

    #[test]
    fn test_self_pair_fails() {
        let result = AdjacencyMatrix::from_pairs(&weights(&[("A-A", 1.0)]), '-', false);
        assert!(matches!(result, Err(Error::SelfPair(_))));
    }

    #[test]
    fn test_empty_input_gives_empty_matrix() {
        let m = AdjacencyMatrix::from_pairs(&PairwiseWeights::default(), '-', false).unwrap();
        assert_eq!(m.size(), 0);
        assert!(m.cells.is_empty());
    }
}
