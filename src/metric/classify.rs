//! Metric shape classifier
//!
//! Inspects one `(name, value)` pair and tags it by shape alone. Rules run in
//! priority order and the first match wins:
//!
//! 1. mapping whose keys are all `"X-Y"` pairs with numeric values → pairwise
//! 2. sequence of single-field numeric mappings (`[{"1": 3}, {"2": 5}]`) → per-unit series
//! 3. mapping with every value numeric → distribution
//! 4. mapping with a root name and a similarity score → similarity tree
//! 5. mapping with at least one nested mapping/sequence → composite (recursive)
//! 6. bare number → scalar
//! 7. anything else → opaque
//!
//! Pairwise detection has to come before distribution detection: an
//! interaction network is also a mapping of numbers.
//!
//! Empty mappings classify as empty distributions and empty sequences as empty
//! series; both render as "no data".

use super::{split_pair_key, MetricValue, PairwiseWeights, SeriesPoint, Shape, PAIR_SEPARATOR};
use crate::layout::tree::SimilarityTreeNode;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Prefix the backend puts on metrics whose computation failed
pub const BACKEND_ERROR_PREFIX: &str = "[ERROR";

/// A metric after classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classified {
    pub name: String,
    pub tag: Shape,
    pub value: MetricValue,
}

impl Classified {
    /// Backend failure message, when the metric is an `[ERROR en ...]` string
    pub fn backend_error(&self) -> Option<&str> {
        match &self.value {
            MetricValue::Opaque(Value::String(s)) if s.starts_with(BACKEND_ERROR_PREFIX) => Some(s),
            _ => None,
        }
    }
}

/// Classify one named metric value, pair keys split on `-`
pub fn classify(name: &str, value: &Value) -> Classified {
    classify_with(name, value, PAIR_SEPARATOR)
}

/// Classify one named metric value with pair keys split on `separator`
pub fn classify_with(name: &str, value: &Value, separator: char) -> Classified {
    let value = classify_value_with(value, separator);
    let tag = value.shape();
    debug!(metric = name, shape = %tag, "classified metric");
    Classified { name: name.to_string(), tag, value }
}

/// Classify a raw value (no name needed; classification depends on shape only)
pub fn classify_value(value: &Value) -> MetricValue {
    classify_value_with(value, PAIR_SEPARATOR)
}

pub fn classify_value_with(value: &Value, separator: char) -> MetricValue {
    match value {
        Value::Object(map) => classify_mapping(map, separator),
        Value::Array(items) => classify_sequence(items),
        Value::Number(n) => match n.as_f64() {
            Some(v) => MetricValue::Scalar(v),
            None => MetricValue::Opaque(value.clone()),
        },
        _ => MetricValue::Opaque(value.clone()),
    }
}

fn classify_mapping(map: &Map<String, Value>, separator: char) -> MetricValue {
    if map.is_empty() {
        return MetricValue::Distribution(Vec::new());
    }

    if let Some(numbers) = numeric_entries(map) {
        let all_pairs = numbers
            .iter()
            .all(|(key, _)| split_pair_key(key, separator).is_some());
        if all_pairs {
            return MetricValue::PairwiseWeights(PairwiseWeights::new(numbers));
        }
        return MetricValue::Distribution(numbers);
    }

    if let Some(tree) = parse_tree(map, 0) {
        return MetricValue::SimilarityTree(tree);
    }

    let nested = map.values().any(|v| v.is_object() || v.is_array());
    if nested {
        let children = map
            .iter()
            .map(|(key, v)| (key.clone(), classify_value_with(v, separator)))
            .collect();
        return MetricValue::Composite(children);
    }

    MetricValue::Opaque(Value::Object(map.clone()))
}

fn classify_sequence(items: &[Value]) -> MetricValue {
    let mut points = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let Value::Object(entry) = item else {
            return MetricValue::Opaque(Value::Array(items.to_vec()));
        };
        if entry.len() != 1 {
            return MetricValue::Opaque(Value::Array(items.to_vec()));
        }
        let Some((key, v)) = entry.iter().next() else {
            return MetricValue::Opaque(Value::Array(items.to_vec()));
        };
        let Some(value) = v.as_f64() else {
            return MetricValue::Opaque(Value::Array(items.to_vec()));
        };
        let unit = key.trim().parse::<f64>().unwrap_or((position + 1) as f64);
        points.push(SeriesPoint { key: key.clone(), unit, value });
    }
    MetricValue::PerUnitSeries(points)
}

/// All values numeric → `(label, value)` pairs in delivery order
fn numeric_entries(map: &Map<String, Value>) -> Option<Vec<(String, f64)>> {
    map.iter()
        .map(|(key, v)| v.as_f64().map(|n| (key.clone(), n)))
        .collect()
}

/// `{"root": "A", "similarity": 0.8, "children": [{"name": .., "similarity": ..}]}`
fn parse_tree(map: &Map<String, Value>, depth: u32) -> Option<SimilarityTreeNode> {
    let name = map
        .get("root")
        .or_else(|| map.get("name"))
        .and_then(Value::as_str)?;
    let similarity = map
        .get("similarity")
        .or_else(|| map.get("similarityScore"))
        .and_then(Value::as_f64)?;

    let children = match map.get("children") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_object().and_then(|child| parse_tree(child, depth + 1)))
            .collect::<Option<Vec<_>>>()?,
        Some(_) => return None,
    };

    Some(SimilarityTreeNode {
        name: name.to_string(),
        similarity: similarity.clamp(0.0, 1.0),
        depth,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==========================================================================
    // PRIORITY ORDER TESTS
    // ==========================================================================
    //
    // The rules overlap: every pairwise mapping is also a numeric mapping, and
    // every tree is also a nested mapping. These tests pin the order.
    // ==========================================================================

    #[test]
    fn test_pairwise_before_distribution() {
        let c = classify("red_interaccion_musical", &json!({"Violin-Cello": 5, "Cello-Viola": 3}));
        assert_eq!(c.tag, Shape::PairwiseWeights);
        match c.value {
            MetricValue::PairwiseWeights(w) => assert_eq!(w.len(), 2),
            other => panic!("expected pairwise, got {:?}", other),
        }
    }

    #[test]
    fn test_one_plain_key_makes_distribution() {
        let c = classify("x", &json!({"Violin-Cello": 5, "Total": 3}));
        assert_eq!(c.tag, Shape::Distribution);
    }

    #[test]
    fn test_distribution_preserves_pairs_in_order() {
        let c = classify("firma_metrica", &json!({"4": 32, "3": 8}));
        assert_eq!(
            c.value,
            MetricValue::Distribution(vec![("4".into(), 32.0), ("3".into(), 8.0)])
        );
    }

    #[test]
    fn test_per_unit_series() {
        let c = classify(
            "cantidad_notas_por_compas",
            &json!([{"1": 4}, {"2": 7.5}, {"3": 0}]),
        );
        assert_eq!(c.tag, Shape::PerUnitSeries);
        let MetricValue::PerUnitSeries(points) = c.value else { panic!("not a series") };
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].key, "2");
        assert_eq!(points[1].unit, 2.0);
        assert_eq!(points[1].value, 7.5);
    }

    #[test]
    fn test_series_with_non_numeric_key_uses_position() {
        let c = classify("s", &json!([{"a": 1}, {"b": 2}]));
        let MetricValue::PerUnitSeries(points) = c.value else { panic!("not a series") };
        assert_eq!(points[0].unit, 1.0);
        assert_eq!(points[1].unit, 2.0);
    }

    #[test]
    fn test_multi_field_records_are_opaque() {
        let c = classify("partes_detectadas", &json!([{"nombre": "Violin", "notas": 120}]));
        assert_eq!(c.tag, Shape::Opaque);
    }

    #[test]
    fn test_tree_before_composite() {
        let c = classify(
            "fractalidad",
            &json!({"root": "A", "similarity": 0.9, "children": [{"name": "A1", "similarity": 0.7}]}),
        );
        assert_eq!(c.tag, Shape::SimilarityTree);
        let MetricValue::SimilarityTree(tree) = c.value else { panic!("not a tree") };
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].depth, 1);
    }

    #[test]
    fn test_composite_reclassifies_children() {
        let c = classify(
            "progresiones_armonicas",
            &json!({
                "acordes": {"C": 10, "G": 6},
                "progresiones_2_acordes": {"C-G": 4, "G-C": 3}
            }),
        );
        assert_eq!(c.tag, Shape::Composite);
        let MetricValue::Composite(children) = c.value else { panic!("not composite") };
        assert_eq!(children[0].1.shape(), Shape::Distribution);
        assert_eq!(children[1].1.shape(), Shape::PairwiseWeights);
    }

    #[test]
    fn test_mixed_flat_mapping_is_opaque() {
        let c = classify("x", &json!({"a": 1, "b": "text"}));
        assert_eq!(c.tag, Shape::Opaque);
    }

    #[test]
    fn test_scalar_and_opaque() {
        assert_eq!(classify("entropia", &json!(3.25)).tag, Shape::Scalar);
        assert_eq!(classify("nombre", &json!("Violin")).tag, Shape::Opaque);
        assert_eq!(classify("flag", &json!(true)).tag, Shape::Opaque);
        assert_eq!(classify("nums", &json!([1, 2, 3])).tag, Shape::Opaque);
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(classify("m", &json!({})).value, MetricValue::Distribution(vec![]));
        assert_eq!(classify("s", &json!([])).value, MetricValue::PerUnitSeries(vec![]));
    }

    #[test]
    fn test_backend_error_string() {
        let c = classify("entropia_armonica", &json!("[ERROR en entropia_armonica]: division by zero"));
        assert_eq!(c.tag, Shape::Opaque);
        assert!(c.backend_error().is_some());
        assert!(classify("n", &json!("Violin")).backend_error().is_none());
    }

    #[test]
    fn test_custom_separator_detects_pairs() {
        let value = json!({"Violin;Cello": 5, "Cello;Viola": 3});
        assert_eq!(classify_with("red", &value, ';').tag, Shape::PairwiseWeights);
        assert_eq!(classify("red", &value).tag, Shape::Distribution);

        let dashed = json!({"Violin-Cello": 5});
        assert_eq!(classify_with("red", &dashed, ';').tag, Shape::Distribution);

        let nested = json!({"total": 3, "pares": {"Violin;Cello": 5}});
        let MetricValue::Composite(children) = classify_with("n", &nested, ';').value else { panic!() };
        assert_eq!(children[1].1.shape(), Shape::PairwiseWeights);
    }

    #[test]
    fn test_classification_ignores_name() {
        let value = json!({"a": 1, "b": 2});
        assert_eq!(classify("red_interaccion_musical", &value).value, classify("other", &value).value);
    }
}
