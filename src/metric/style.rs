//! Preferred chart styles for known metric names
//!
//! Classification never depends on these hints. They only pick between the
//! chart styles a shape supports (bar vs pie for a distribution, line vs
//! heatmap for a series), mirroring the dashboard's per-category chart table.

use super::{Category, Shape};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartStyle {
    Bar,
    Pie,
    Doughnut,
    Radar,
    Line,
    Heatmap,
    Chord,
    Tree,
    /// Density circles on the orchestra seating plan
    Orchestra,
    Card,
    Raw,
}

impl ChartStyle {
    /// Styles a shape can be drawn with; the first is the default
    pub fn supported(shape: Shape) -> &'static [ChartStyle] {
        match shape {
            Shape::Scalar => &[ChartStyle::Card],
            Shape::Distribution => &[
                ChartStyle::Bar,
                ChartStyle::Pie,
                ChartStyle::Doughnut,
                ChartStyle::Radar,
                ChartStyle::Orchestra,
            ],
            Shape::PairwiseWeights => &[ChartStyle::Chord, ChartStyle::Orchestra],
            Shape::PerUnitSeries => &[ChartStyle::Line, ChartStyle::Bar, ChartStyle::Heatmap],
            Shape::SimilarityTree => &[ChartStyle::Tree],
            Shape::Composite | Shape::Opaque => &[ChartStyle::Raw],
        }
    }

    pub fn default_for(shape: Shape) -> ChartStyle {
        Self::supported(shape)[0]
    }
}

// Per-category chart table for the metric names the backend emits.
const INSTRUMENTAL: &[(&str, ChartStyle)] = &[
    ("instrumentos_detectados", ChartStyle::Bar),
    ("cantidad_total_notas", ChartStyle::Doughnut),
    ("partes_detectadas", ChartStyle::Bar),
    ("porcentaje_participacion", ChartStyle::Pie),
    ("familias_instrumentales", ChartStyle::Bar),
    ("balance_dinamico", ChartStyle::Radar),
    ("compases_no_vacios_por_instrumento", ChartStyle::Bar),
    ("densidad_instrumental", ChartStyle::Orchestra),
];

const MELODIC: &[(&str, ChartStyle)] = &[
    ("entropia_melodica", ChartStyle::Line),
    ("intervalos_predominantes", ChartStyle::Bar),
    ("motivos_recurrentes", ChartStyle::Bar),
    ("variedad_tonal", ChartStyle::Pie),
    ("compacidad_melodica", ChartStyle::Radar),
    ("repetitividad_motívica", ChartStyle::Bar),
    ("promedio_notas_por_compas", ChartStyle::Bar),
    ("varianza_notas_por_compas", ChartStyle::Bar),
    ("compacidad_melodica_por_compas", ChartStyle::Line),
    ("repetitividad_motívica_por_compas", ChartStyle::Line),
    ("cantidad_notas_por_compas", ChartStyle::Line),
];

const RHYTHMIC: &[(&str, ChartStyle)] = &[
    ("entropia_ritmica", ChartStyle::Line),
    ("promedio_notas_por_compas", ChartStyle::Bar),
    ("varianza_notas_por_compas", ChartStyle::Bar),
];

const HARMONIC: &[(&str, ChartStyle)] = &[
    ("entropia_armonica", ChartStyle::Line),
    ("progresiones_armonicas", ChartStyle::Chord),
    ("densidad_armonica", ChartStyle::Bar),
    ("innovacion_estadistica", ChartStyle::Bar),
];

const TEXTURAL: &[(&str, ChartStyle)] = &[
    ("contrapunto_activo", ChartStyle::Radar),
    ("firma_fractal", ChartStyle::Line),
    ("complejidad_total", ChartStyle::Bar),
];

const FORMAL: &[(&str, ChartStyle)] = &[
    ("seccion_aurea", ChartStyle::Bar),
    ("compases_estimados", ChartStyle::Bar),
];

const INTERACTION: &[(&str, ChartStyle)] = &[
    ("entropia_interaccion", ChartStyle::Line),
    ("red_interaccion_musical", ChartStyle::Chord),
    ("sincronizacion_entrada", ChartStyle::Line),
    ("sincronizacion_entrada_por_compas", ChartStyle::Line),
    ("dispersion_temporal_por_compas", ChartStyle::Line),
    ("fractalidad", ChartStyle::Tree),
];

const COMPARATIVE: &[(&str, ChartStyle)] = &[
    ("tempo_promedio", ChartStyle::Bar),
    ("duracion_segundos", ChartStyle::Bar),
    ("promedio_rango_dinamico", ChartStyle::Line),
    ("promedio_rango_dinamico_por_compas", ChartStyle::Line),
];

const DIFFERENTIATING: &[(&str, ChartStyle)] = &[
    ("variabilidad_intervalica", ChartStyle::Bar),
    ("variabilidad_intervalica_por_compas", ChartStyle::Line),
];

fn table(category: Category) -> &'static [(&'static str, ChartStyle)] {
    match category {
        Category::Instrumental => INSTRUMENTAL,
        Category::Melodic => MELODIC,
        Category::Rhythmic => RHYTHMIC,
        Category::Harmonic => HARMONIC,
        Category::Textural => TEXTURAL,
        Category::Formal => FORMAL,
        Category::Interaction => INTERACTION,
        Category::Comparative => COMPARATIVE,
        Category::Differentiating => DIFFERENTIATING,
        Category::Global => &[],
    }
}

/// Preferred style for a known metric name.
///
/// With a category only that category's table is consulted; without one the
/// first table that knows the name wins.
pub fn hint(category: Option<Category>, name: &str) -> Option<ChartStyle> {
    let lookup = |entries: &[(&str, ChartStyle)]| {
        entries.iter().find(|(n, _)| *n == name).map(|(_, style)| *style)
    };
    match category {
        Some(category) => lookup(table(category)),
        None => Category::ALL.iter().find_map(|c| lookup(table(*c))),
    }
}

/// Style to draw a metric with: the hint if the shape supports it, otherwise
/// the shape default
pub fn resolve(category: Option<Category>, name: &str, shape: Shape) -> ChartStyle {
    match hint(category, name) {
        Some(style) if ChartStyle::supported(shape).contains(&style) => style,
        _ => ChartStyle::default_for(shape),
    }
}
