//! Error types for the mapping engine

use thiserror::Error;

/// Result type for smartscore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while mapping analysis results to chart inputs.
///
/// Shape errors are local to one metric: the chart router turns them into a
/// raw display of that metric and keeps rendering the rest of the result.
#[derive(Error, Debug)]
pub enum Error {
    /// A value tagged with one shape failed a downstream invariant
    #[error("Shape mismatch in '{metric}': {reason}")]
    ShapeMismatch { metric: String, reason: String },

    /// A pairwise key names the same label on both sides
    #[error("Self-pair '{0}' is not a valid edge")]
    SelfPair(String),

    /// A pairwise weight that is negative or not finite
    #[error("Invalid weight {weight} for pair '{key}'")]
    InvalidWeight { key: String, weight: f64 },

    /// Host-level fetch/transport failure, passed through unchanged
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Invalid caller input (bad config, bad request)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors the chart router recovers from by showing the raw value
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            Error::ShapeMismatch { .. } | Error::SelfPair(_) | Error::InvalidWeight { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_errors_are_recoverable() {
        assert!(Error::SelfPair("Violin-Violin".into()).is_shape_error());
        assert!(Error::InvalidWeight { key: "A-B".into(), weight: -1.0 }.is_shape_error());
        assert!(Error::ShapeMismatch { metric: "m".into(), reason: "r".into() }.is_shape_error());
        assert!(!Error::Fetch("timeout".into()).is_shape_error());
    }

    #[test]
    fn test_fetch_message_is_preserved() {
        let err = Error::Fetch("Archivo no encontrado".into());
        assert_eq!(err.to_string(), "Fetch failed: Archivo no encontrado");
    }
}
