//! Error types for panel composition.

use crate::traits::SeriesCapability;
use thiserror::Error;

/// Error type for every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// `transform` (or another fitted-only method) was called before `fit`.
    #[error("This {estimator} instance is not fitted yet. Call `fit` before using this method")]
    NotFitted { estimator: String },

    /// Invalid configuration: duplicate or reserved names, unknown sentinel or
    /// override strings, selectors that cannot be resolved, bad thresholds.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Shape mismatch between expected and actual dimensions.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: String, got: String },

    /// A transformer produced output that cannot be stacked as columns.
    #[error(
        "The output of the '{name}' transformer should be 2D (sparse matrix, array, or frame), got {ndim}D"
    )]
    NonTabularOutput { name: String, ndim: usize },

    /// The template transformer lacks the capability a broadcaster requires.
    #[error("transformer must be a {required} transformer")]
    TypeMismatch { required: SeriesCapability },

    /// The broadcaster variant could not be inferred from the template.
    #[error("transformer type not understood. Please specify `transformer_type`")]
    TypeResolution,

    /// Data that this conversion path cannot represent.
    #[error("Unsupported data: {0}")]
    UnsupportedData(String),

    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Feature dimension mismatch between fit and transform.
    #[error("Feature mismatch: expected {expected_features} features, got {got_features}")]
    FeatureMismatch {
        expected_features: usize,
        got_features: usize,
    },

    /// JSON parameter (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_fitted() {
        let err = ComposeError::NotFitted {
            estimator: "ColumnTransformer".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ColumnTransformer"));
        assert!(msg.contains("not fitted"));
    }

    #[test]
    fn test_error_display_invalid_shape() {
        let err = ComposeError::InvalidShape {
            expected: "(2, 3)".to_string(),
            got: "(3, 2)".to_string(),
        };
        assert!(err.to_string().contains("Invalid shape"));
    }

    #[test]
    fn test_error_display_non_tabular_output() {
        let err = ComposeError::NonTabularOutput {
            name: "scaler".to_string(),
            ndim: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("'scaler'"));
        assert!(msg.contains("1D"));
    }

    #[test]
    fn test_error_display_type_mismatch_names_capability() {
        let err = ComposeError::TypeMismatch {
            required: SeriesCapability::SeriesToPrimitives,
        };
        assert!(err.to_string().contains("series-to-primitives"));
    }

    #[test]
    fn test_error_display_feature_mismatch() {
        let err = ComposeError::FeatureMismatch {
            expected_features: 5,
            got_features: 3,
        };
        assert!(err.to_string().contains("Feature mismatch"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<f64>("not json").unwrap_err();
        let err: ComposeError = json_err.into();
        assert!(matches!(err, ComposeError::Serialization(_)));
    }

    #[test]
    fn test_error_is_std_error() {
        let err = ComposeError::TypeResolution;
        let _: &dyn std::error::Error = &err;
    }
}
