//! Spatial charts on the orchestra seating plan
//!
//! - [`DensityMap`]: one circle per instrument at its seat, radius and
//!   opacity scaled by the instrument's min-max normalised value.
//! - [`SeatNetwork`]: pairwise weights drawn as arrows between seats, with
//!   every seat as a node sized by its number of connections.
//!
//! Instruments the seating table does not know are skipped and reported in
//! `unpositioned`; the rest of the chart is unaffected.

use super::seating::{SeatingTable, Section};
use super::Point;
use crate::metric::PairwiseWeights;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub base_radius: f64,
    pub radius_scale: f64,
    pub base_opacity: f64,
    pub opacity_scale: f64,
    pub base_line_width: f64,
    pub line_width_scale: f64,
    pub base_arrow_length: f64,
    pub arrow_length_scale: f64,
    /// Angle between the shaft and each arrow wing (radians)
    pub arrow_wing: f64,
    pub base_node_radius: f64,
    pub node_radius_per_link: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            base_radius: 8.0,
            radius_scale: 20.0,
            base_opacity: 0.3,
            opacity_scale: 0.7,
            base_line_width: 1.0,
            line_width_scale: 8.0,
            base_arrow_length: 10.0,
            arrow_length_scale: 5.0,
            arrow_wing: FRAC_PI_6,
            base_node_radius: 8.0,
            node_radius_per_link: 2.0,
        }
    }
}

/// Min-max normalisation; a flat input maps to 0.5 everywhere
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.5 })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatMark {
    pub instrument: String,
    pub section: Section,
    pub x: f64,
    pub y: f64,
    pub value: f64,
    /// Value after min-max normalisation
    pub normalized: f64,
    pub radius: f64,
    pub color_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DensityMap {
    pub marks: Vec<SeatMark>,
    pub unpositioned: Vec<String>,
}

impl DensityMap {
    /// Place `(instrument, value)` entries on their seats, in input order
    pub fn build(table: &SeatingTable, values: &[(String, f64)], config: &SpatialConfig) -> Self {
        let mut placed = Vec::new();
        let mut unpositioned = Vec::new();
        for (name, value) in values {
            match table.position(name) {
                Some(seat) => placed.push((seat, *value)),
                None => unpositioned.push(name.clone()),
            }
        }

        let raw: Vec<f64> = placed.iter().map(|(_, v)| *v).collect();
        let marks = placed
            .iter()
            .zip(normalize(&raw))
            .map(|((seat, value), n)| SeatMark {
                instrument: seat.instrument.clone(),
                section: seat.section,
                x: seat.x,
                y: seat.y,
                value: *value,
                normalized: n,
                radius: config.base_radius + n * config.radius_scale,
                color_weight: config.base_opacity + n * config.opacity_scale,
            })
            .collect();

        Self { marks, unpositioned }
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkNode {
    pub instrument: String,
    pub section: Section,
    pub x: f64,
    pub y: f64,
    /// Number of links touching this seat
    pub degree: usize,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrowHead {
    pub tip: Point,
    /// Direction of travel at the tip in plan coordinates (radians, from +x)
    pub heading: f64,
    pub length: f64,
    pub wing: f64,
}

impl ArrowHead {
    /// Heading once the plan is stretched to a `width`×`height` canvas
    pub fn heading_on(&self, width: f64, height: f64) -> f64 {
        (self.heading.sin() * height).atan2(self.heading.cos() * width)
    }

    /// The two wing ends, once coordinates are scaled to a `width`×`height` canvas
    pub fn wing_points(&self, width: f64, height: f64) -> [Point; 2] {
        let tip = Point::new(self.tip.x * width, self.tip.y * height);
        let heading = self.heading_on(width, height);
        [heading - self.wing, heading + self.wing]
            .map(|a| Point::new(tip.x - self.length * a.cos(), tip.y - self.length * a.sin()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkLink {
    pub source: String,
    pub target: String,
    pub from: Point,
    pub to: Point,
    pub weight: f64,
    /// Weight divided by the heaviest link
    pub normalized: f64,
    pub line_width: f64,
    pub arrow: ArrowHead,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SeatNetwork {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
    pub unpositioned: Vec<String>,
}

impl SeatNetwork {
    /// Draw `"A-B"` weights as arrows between seats; every seat becomes a node.
    ///
    /// Fails on malformed keys (see [`PairwiseWeights::edges`]).
    pub fn build(
        table: &SeatingTable,
        weights: &PairwiseWeights,
        separator: char,
        config: &SpatialConfig,
    ) -> Result<Self> {
        let edges = weights.edges(separator)?;
        let mut unpositioned: Vec<String> = Vec::new();
        let mut positioned = Vec::new();
        for (source, target, weight) in edges {
            match (table.position(&source), table.position(&target)) {
                (Some(s), Some(t)) => positioned.push((s, t, weight)),
                (s, t) => {
                    for (seat, name) in [(s, source), (t, target)] {
                        if seat.is_none() && !unpositioned.contains(&name) {
                            unpositioned.push(name);
                        }
                    }
                }
            }
        }

        let max = positioned.iter().map(|(_, _, w)| *w).fold(0.0_f64, f64::max);
        let links = positioned
            .iter()
            .map(|(s, t, w)| {
                let n = if max > 0.0 { w / max } else { 0.0 };
                let (from, to) = (s.point(), t.point());
                NetworkLink {
                    source: s.instrument.clone(),
                    target: t.instrument.clone(),
                    from,
                    to,
                    weight: *w,
                    normalized: n,
                    line_width: config.base_line_width + n * config.line_width_scale,
                    arrow: ArrowHead {
                        tip: to,
                        heading: (to.y - from.y).atan2(to.x - from.x),
                        length: config.base_arrow_length + n * config.arrow_length_scale,
                        wing: config.arrow_wing,
                    },
                }
            })
            .collect::<Vec<_>>();

        let nodes = table
            .iter()
            .map(|seat| {
                let degree = links
                    .iter()
                    .filter(|l| l.source == seat.instrument || l.target == seat.instrument)
                    .count();
                NetworkNode {
                    instrument: seat.instrument.clone(),
                    section: seat.section,
                    x: seat.x,
                    y: seat.y,
                    degree,
                    radius: config.base_node_radius + degree as f64 * config.node_radius_per_link,
                }
            })
            .collect();

        Ok(Self { nodes, links, unpositioned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_flat_input() {
        assert_eq!(normalize(&[3.0, 3.0]), vec![0.5, 0.5]);
        assert_eq!(normalize(&[1.0, 3.0, 2.0]), vec![0.0, 1.0, 0.5]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_density_skips_unknown_instrument() {
        let table = SeatingTable::orchestra();
        let values = vec![
            ("Violin I".to_string(), 10.0),
            ("Theremin".to_string(), 99.0),
            ("Tuba".to_string(), 2.0),
        ];
        let map = DensityMap::build(&table, &values, &SpatialConfig::default());
        assert_eq!(map.marks.len(), 2);
        assert_eq!(map.unpositioned, vec!["Theremin"]);

        let violin = &map.marks[0];
        assert_eq!(violin.radius, 28.0);
        assert!((violin.color_weight - 1.0).abs() < 1e-12);
        let tuba = &map.marks[1];
        assert_eq!(tuba.radius, 8.0);
        assert!((tuba.color_weight - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_network_links_and_degrees() {
        let table = SeatingTable::orchestra();
        let weights = PairwiseWeights::new(vec![
            ("Violin I-Cello".into(), 4.0),
            ("Cello-Tuba".into(), 2.0),
            ("Cello-Kazoo".into(), 1.0),
        ]);
        let net = SeatNetwork::build(&table, &weights, '-', &SpatialConfig::default()).unwrap();
        assert_eq!(net.links.len(), 2);
        assert_eq!(net.unpositioned, vec!["Kazoo"]);
        assert_eq!(net.nodes.len(), table.len());

        let cello = net.nodes.iter().find(|n| n.instrument == "Cello").unwrap();
        assert_eq!(cello.degree, 2);
        assert_eq!(cello.radius, 12.0);

        let heavy = &net.links[0];
        assert_eq!(heavy.line_width, 9.0);
        assert_eq!(heavy.arrow.length, 15.0);
        assert_eq!(heavy.arrow.tip, Point::new(0.7, 0.4));
    }

    #[test]
    fn test_arrow_wings_symmetric_about_shaft() {
        let head = ArrowHead { tip: Point::new(1.0, 0.0), heading: 0.0, length: 10.0, wing: FRAC_PI_6 };
        let [a, b] = head.wing_points(100.0, 100.0);
        assert!((a.x - b.x).abs() < 1e-9);
        assert!((a.y + b.y).abs() < 1e-9);
        assert!(a.x < 100.0);
    }

    #[test]
    fn test_arrow_wings_follow_stretched_shaft() {
        // shaft (0.2, 0.2) → (0.6, 0.6) on a 200×100 canvas runs along (2, 1)
        let from = Point::new(0.2, 0.2);
        let tip = Point::new(0.6, 0.6);
        let head = ArrowHead {
            tip,
            heading: (tip.y - from.y).atan2(tip.x - from.x),
            length: 10.0,
            wing: FRAC_PI_6,
        };
        let shaft = 1.0f64.atan2(2.0);
        assert!((head.heading_on(200.0, 100.0) - shaft).abs() < 1e-12);

        let scaled_tip = Point::new(120.0, 60.0);
        let [a, b] = head.wing_points(200.0, 100.0);
        let back = |p: Point| (scaled_tip.y - p.y).atan2(scaled_tip.x - p.x);
        assert!((back(a) - (shaft - FRAC_PI_6)).abs() < 1e-9);
        assert!((back(b) - (shaft + FRAC_PI_6)).abs() < 1e-9);
        for p in [a, b] {
            assert!(((scaled_tip.x - p.x).hypot(scaled_tip.y - p.y) - 10.0).abs() < 1e-9);
        }
    }
}
