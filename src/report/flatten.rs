//! Flatten nested analysis results into `path,value` rows
//!
//! Depth-first, insertion order preserved at every level:
//!
//! - number → `path,value`
//! - mapping (distribution, pairwise table, composite) → recurse with `path.key`,
//!   or `path[key]` when a nested key itself contains a `.`
//! - per-unit series (`[{"1": 4}, {"2": 7}]`) → `path.1`, `path.2`; a series
//!   that repeats a unit key falls back to `path[i]`
//! - any other sequence → recurse with `path[i]`
//! - strings, booleans and nulls carry no number and emit nothing
//!
//! Top-level keys are used verbatim. A path that still collides with an
//! earlier one gets a `#n` suffix, so every numeric leaf yields exactly one
//! row with a unique path and re-flattening the rows (as a one-level mapping
//! of `path → value`) gives the same rows back.

use crate::metric::classify::classify_value;
use crate::metric::{AnalysisResult, MetricValue, SeriesPoint};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub path: String,
    pub value: f64,
}

impl ExportRow {
    pub fn new(path: impl Into<String>, value: f64) -> Self {
        Self { path: path.into(), value }
    }
}

/// `path,value` with the number in its shortest decimal form
impl fmt::Display for ExportRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.path, self.value)
    }
}

/// Flatten a whole metrics mapping
pub fn flatten(metrics: &Map<String, Value>) -> Vec<ExportRow> {
    let mut rows = Vec::new();
    for (key, value) in metrics {
        walk(key, value, &mut rows);
    }
    disambiguate(&mut rows);
    rows
}

pub fn flatten_result(result: &AnalysisResult) -> Vec<ExportRow> {
    flatten(&result.metrics)
}

/// Rows as a one-level mapping, the inverse view used for re-flattening
pub fn rows_to_composite(rows: &[ExportRow]) -> Map<String, Value> {
    rows.iter()
        .map(|r| (r.path.clone(), serde_json::json!(r.value)))
        .collect()
}

fn walk(path: &str, value: &Value, rows: &mut Vec<ExportRow>) {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_f64() {
                rows.push(ExportRow::new(path, v));
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                walk(&child_path(path, key), child, rows);
            }
        }
        Value::Array(items) => match classify_value(value) {
            MetricValue::PerUnitSeries(points) if distinct_keys(&points) => {
                rows.extend(points.iter().map(|p| ExportRow::new(format!("{}.{}", path, p.key), p.value)));
            }
            _ => {
                for (i, item) in items.iter().enumerate() {
                    walk(&format!("{}[{}]", path, i), item, rows);
                }
            }
        },
        Value::String(_) | Value::Bool(_) | Value::Null => {}
    }
}

fn child_path(path: &str, key: &str) -> String {
    if key.contains('.') {
        format!("{}[{}]", path, key)
    } else {
        format!("{}.{}", path, key)
    }
}

fn distinct_keys(points: &[SeriesPoint]) -> bool {
    let mut seen = HashSet::with_capacity(points.len());
    points.iter().all(|p| seen.insert(p.key.as_str()))
}

/// Suffix repeated paths with `#2`, `#3`, .. skipping any spelling already in use
fn disambiguate(rows: &mut [ExportRow]) {
    let original: HashSet<String> = rows.iter().map(|r| r.path.clone()).collect();
    if original.len() == rows.len() {
        return;
    }
    let mut taken: HashSet<String> = HashSet::with_capacity(rows.len());
    for row in rows.iter_mut() {
        if taken.contains(&row.path) {
            let mut n = 2;
            let renamed = loop {
                let candidate = format!("{}#{}", row.path, n);
                if !taken.contains(&candidate) && !original.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            row.path = renamed;
        }
        taken.insert(row.path.clone());
    }
}

/// Headline numbers for the scalar cards.
///
/// Every top-level number, plus every top-level distribution whose labels
/// are all numbers (a time-signature histogram like `{"3": 8, "4": 32}`),
/// collapsed to its weighted average `Σ(label·count) / Σcount`.
pub fn scalar_summary(result: &AnalysisResult) -> Vec<ExportRow> {
    result
        .metrics
        .iter()
        .filter_map(|(name, value)| match classify_value(value) {
            MetricValue::Scalar(v) => Some(ExportRow::new(name.as_str(), v)),
            MetricValue::Distribution(entries) => weighted_average(&entries).map(|v| ExportRow::new(name.as_str(), v)),
            _ => None,
        })
        .collect()
}

/// `Σ(label·value) / Σvalue` over numeric labels; `None` when a label is not
/// a number or the total weight is not positive
pub fn weighted_average(entries: &[(String, f64)]) -> Option<f64> {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (label, value) in entries {
        let x: f64 = label.trim().parse().ok()?;
        weighted += x * value;
        total += value;
    }
    if total > 0.0 {
        Some(weighted / total)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn lines(rows: &[ExportRow]) -> Vec<String> {
        rows.iter().map(ToString::to_string).collect()
    }

    // ==========================================================================
    // FLATTEN RULE TESTS
    // ==========================================================================

    #[test]
    fn test_scalar_and_distribution_rows() {
        let rows = flatten(&metrics(json!({
            "entropia_melodica": 3.25,
            "variedad_tonal": {"C": 4, "G": 2}
        })));
        assert_eq!(lines(&rows), vec!["entropia_melodica,3.25", "variedad_tonal.C,4", "variedad_tonal.G,2"]);
    }

    #[test]
    fn test_series_uses_unit_keys() {
        let rows = flatten(&metrics(json!({"cantidad_notas_por_compas": [{"1": 4}, {"2": 7.5}]})));
        assert_eq!(lines(&rows), vec!["cantidad_notas_por_compas.1,4", "cantidad_notas_por_compas.2,7.5"]);
    }

    #[test]
    fn test_nested_composite_rows() {
        let rows = flatten(&metrics(json!({
            "cantidad_total_notas": {"total": 120, "por_nota": {"C": 30, "E": 20}},
            "progresiones_armonicas": {"progresiones_2_acordes": {"C-G": 4}}
        })));
        assert_eq!(
            lines(&rows),
            vec![
                "cantidad_total_notas.total,120",
                "cantidad_total_notas.por_nota.C,30",
                "cantidad_total_notas.por_nota.E,20",
                "progresiones_armonicas.progresiones_2_acordes.C-G,4",
            ]
        );
    }

    #[test]
    fn test_records_and_primitive_arrays() {
        let rows = flatten(&metrics(json!({
            "partes_detectadas": [{"nombre": "Violin", "notas": 120}],
            "duraciones": [0.5, 1, "x"]
        })));
        assert_eq!(
            lines(&rows),
            vec!["partes_detectadas[0].notas,120", "duraciones[0],0.5", "duraciones[1],1"]
        );
    }

    #[test]
    fn test_repeated_unit_keys_fall_back_to_positions() {
        let rows = flatten(&metrics(json!({"s": [{"1": 3}, {"1": 4}]})));
        assert_eq!(lines(&rows), vec!["s[0].1,3", "s[1].1,4"]);
    }

    #[test]
    fn test_dotted_keys_do_not_collide() {
        let rows = flatten(&metrics(json!({
            "s": [{"1": 3}, {"1": 4}],
            "a.b": 1,
            "a": {"b": 2, "c.d": 5},
            "x": {"y": 6},
            "x.y": 7
        })));
        assert_eq!(
            lines(&rows),
            vec!["s[0].1,3", "s[1].1,4", "a.b,1", "a.b#2,2", "a[c.d],5", "x.y,6", "x.y#2,7"]
        );
        assert_eq!(flatten(&rows_to_composite(&rows)), rows);
    }

    #[test]
    fn test_suffix_skips_spelling_in_use() {
        let rows = flatten(&metrics(json!({"a": {"b": 1}, "a.b": 2, "a.b#2": 3})));
        assert_eq!(lines(&rows), vec!["a.b,1", "a.b#3,2", "a.b#2,3"]);
    }

    #[test]
    fn test_text_values_emit_nothing() {
        let rows = flatten(&metrics(json!({"tonalidad": "C major", "error": null, "ok": true})));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_reflatten_is_identity() {
        let rows = flatten(&metrics(json!({
            "a": 1,
            "b": {"x": 2, "y": [{"1": 3}]},
            "c": [[4, 5]]
        })));
        assert_eq!(flatten(&rows_to_composite(&rows)), rows);
    }

    // ==========================================================================
    // SCALAR SUMMARY TESTS
    // ==========================================================================

    #[test]
    fn test_weighted_average_time_signature() {
        let result = AnalysisResult::new(None, metrics(json!({"firma_metrica": {"3": 8, "4": 32}})));
        let summary = scalar_summary(&result);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].path, "firma_metrica");
        assert!((summary[0].value - 3.8).abs() < 1e-12);
    }

    #[test]
    fn test_summary_skips_non_numeric_labels() {
        let result = AnalysisResult::new(
            None,
            metrics(json!({"seccion_aurea": 0.618, "variedad_tonal": {"C": 4}, "vacio": {"3": 0}})),
        );
        let summary = scalar_summary(&result);
        assert_eq!(lines(&summary), vec!["seccion_aurea,0.618"]);
    }
}
