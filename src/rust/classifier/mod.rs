use std::path::PathBuf;

mod analyzer;
mod backend;
mod bijection;
pub mod builder;
#[allow(clippy::module_inception)]
mod classifier;
mod collection;
mod data_point;
mod error;
mod feature_space;
mod label;

pub use analyzer::{Analyzer, TokenizerAnalyzer, WhitespaceAnalyzer};
pub use backend::{
    parse_selected_ids, read_predictions, Backend, FeatureSelector, PredictRequest, PredictionFormat,
    ProcessBackend, ProcessBackendConfig, ProcessFeatureSelector, TrainRequest,
};
pub use bijection::Bijection;
pub use builder::ClassifierBuilder;
pub use classifier::{ClassifierModel, ModelState, SelectedFeatures};
pub use collection::{LabeledPoint, VectorCollection, UNLABELED_CODE};
pub use data_point::{categorical_key, DataPoint, DataPointEncoder, Datum, TermWeighting};
pub use error::ClassifierError;
pub use feature_space::{
    FeatureIndex, FeatureSpace, FeatureSubset, FrozenFeatureSpace, OutOfVocabulary, SpaceId,
    CATEGORICAL_SEPARATOR,
};
pub use label::Label;

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Directory holding the backend's working files
    pub working_dir: PathBuf,
    /// Number of training examples added so far
    pub num_examples: usize,
    /// Number of features in the feature space
    pub num_features: usize,
    /// Whether a model artifact has been built
    pub trained: bool,
    pub weighting: TermWeighting,
    pub out_of_vocabulary: OutOfVocabulary,
}
