//! Orchestra spatial table
//!
//! Canonical stage position of every orchestral instrument, normalised to
//! `[0, 1]` on both axes (x left→right as seen from the hall, y front→back).
//! Every spatial chart reads the same table; it is built once and passed to
//! the engines that need it.

use super::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Strings,
    Woodwinds,
    Brass,
    Percussion,
}

impl Section {
    pub const ALL: [Section; 4] = [Section::Strings, Section::Woodwinds, Section::Brass, Section::Percussion];
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Strings => "strings",
            Section::Woodwinds => "woodwinds",
            Section::Brass => "brass",
            Section::Percussion => "percussion",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatingPosition {
    pub instrument: String,
    pub x: f64,
    pub y: f64,
    pub section: Section,
}

impl SeatingPosition {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

const ORCHESTRA: &[(&str, f64, f64, Section)] = &[
    ("Violin I", 0.2, 0.8, Section::Strings),
    ("Violin II", 0.8, 0.8, Section::Strings),
    ("Viola", 0.9, 0.6, Section::Strings),
    ("Cello", 0.7, 0.4, Section::Strings),
    ("Double Bass", 0.9, 0.2, Section::Strings),
    ("Flute", 0.3, 0.6, Section::Woodwinds),
    ("Oboe", 0.4, 0.6, Section::Woodwinds),
    ("Clarinet", 0.5, 0.6, Section::Woodwinds),
    ("Bassoon", 0.6, 0.6, Section::Woodwinds),
    ("Horn", 0.3, 0.4, Section::Brass),
    ("Trumpet", 0.4, 0.4, Section::Brass),
    ("Trombone", 0.5, 0.4, Section::Brass),
    ("Tuba", 0.6, 0.4, Section::Brass),
    ("Timpani", 0.1, 0.2, Section::Percussion),
    ("Percussion", 0.2, 0.2, Section::Percussion),
];

/// Read-only instrument → seat lookup
#[derive(Debug, Clone, PartialEq)]
pub struct SeatingTable {
    seats: Vec<SeatingPosition>,
}

impl SeatingTable {
    /// The standard symphony-orchestra plan shared by every spatial chart
    pub fn orchestra() -> Self {
        let seats = ORCHESTRA
            .iter()
            .map(|&(name, x, y, section)| SeatingPosition { instrument: name.to_string(), x, y, section })
            .collect();
        Self { seats }
    }

    /// A custom plan; coordinates are clamped into `[0, 1]`
    pub fn from_positions(seats: Vec<SeatingPosition>) -> Self {
        let seats = seats
            .into_iter()
            .map(|s| SeatingPosition { x: s.x.clamp(0.0, 1.0), y: s.y.clamp(0.0, 1.0), ..s })
            .collect();
        Self { seats }
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeatingPosition> {
        self.seats.iter()
    }

    /// Seat of an instrument; `None` means "not positioned".
    ///
    /// Exact name first, then a case-insensitive match on the trimmed name.
    pub fn position(&self, instrument: &str) -> Option<&SeatingPosition> {
        self.seats.iter().find(|s| s.instrument == instrument).or_else(|| {
            let wanted = instrument.trim();
            self.seats.iter().find(|s| s.instrument.eq_ignore_ascii_case(wanted))
        })
    }

    pub fn is_positioned(&self, instrument: &str) -> bool {
        self.position(instrument).is_some()
    }

    pub fn section_members(&self, section: Section) -> impl Iterator<Item = &SeatingPosition> {
        self.seats.iter().filter(move |s| s.section == section)
    }

    /// Mean seat of a section; `None` for a section with no members
    pub fn centroid(&self, section: Section) -> Option<Point> {
        let (sum_x, sum_y, count) = self
            .section_members(section)
            .fold((0.0, 0.0, 0usize), |(x, y, n), s| (x + s.x, y + s.y, n + 1));
        if count == 0 {
            return None;
        }
        Some(Point::new(sum_x / count as f64, sum_y / count as f64))
    }
}

impl Default for SeatingTable {
    fn default() -> Self {
        Self::orchestra()
    }
}
