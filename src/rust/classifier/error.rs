use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::workspace::WorkspaceError;

/// Represents the different types of errors that can occur while encoding,
/// training or classifying.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// A label outside {positive, negative} was supplied for training
    #[error("Invalid label '{0}': expected 'positive' or 'negative'")]
    InvalidLabel(String),
    /// `classify` was called before a successful `build`
    #[error("Model has not been trained; call build() first")]
    UntrainedModel,
    /// `build` was called with no training examples
    #[error("Cannot train on an empty training set")]
    EmptyTrainingSet,
    /// A lookup missed and growth is not allowed
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Key '{key}' is already mapped to code {existing}")]
    DuplicateKey { key: String, existing: String },
    #[error("Code {code} is already mapped to key '{existing}'")]
    DuplicateCode { code: String, existing: String },
    /// The feature ID range is used up; fatal for the owning model
    #[error("Feature space exhausted after {0} features")]
    FeatureSpaceExhausted(usize),
    /// A data point built against one feature space was added to a collection of another
    #[error("Data point was encoded against a different feature space")]
    FeatureSpaceMismatch,
    #[error("Feature '{key}' has non-finite value {value}")]
    InvalidFeatureValue { key: String, value: f64 },
    /// Malformed sparse text
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    /// The text analyzer failed
    #[error("Analyzer error: {0}")]
    Analyzer(String),
    #[error("Training with '{program}' failed ({status}): {stderr}")]
    BackendTraining {
        program: PathBuf,
        status: String,
        stderr: String,
    },
    #[error("Prediction with '{program}' failed ({status}): {stderr}")]
    BackendPrediction {
        program: PathBuf,
        status: String,
        stderr: String,
    },
    #[error("'{program}' did not finish within {timeout:?}")]
    BackendTimeout { program: PathBuf, timeout: Duration },
    #[error("Feature selection failed: {0}")]
    FeatureSelection(String),
    /// The classifier could not be assembled from the builder's settings
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Working directory error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClassifierError {
    pub(crate) fn prediction(program: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ClassifierError::BackendPrediction {
            program: program.into(),
            status: "invalid results".to_string(),
            stderr: message.into(),
        }
    }

    /// True for failures of an external collaborator, which callers may retry.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendTraining { .. }
                | Self::BackendPrediction { .. }
                | Self::BackendTimeout { .. }
                | Self::FeatureSelection(_)
        )
    }
}
