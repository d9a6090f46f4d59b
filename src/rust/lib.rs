//! A binary classifier front end that encodes feature maps and text into a
//! sparse vector space and drives an external SVM trainer and predictor.
//!
//! Features are assigned stable integer IDs the first time they are seen.
//! Training examples are written in the sparse text format
//! `<label> <id>:<value> ...` that libsvm and svm-light read, and predictions
//! are decoded back into [`Label`]s.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use vecspace::{ClassifierModel, Datum, Label, ProcessBackendConfig};
//!
//! let mut model = ClassifierModel::builder()
//!     .with_process_backend(ProcessBackendConfig::default())?
//!     .build()?;
//!
//! model.add(Datum::categorical("word", "cat"), "positive")?;
//! model.add(Datum::categorical("word", "dog"), "negative")?;
//! model.add("a friendly purring cat", "positive")?;
//! model.build(None)?;
//!
//! let label = model.classify(Datum::categorical("word", "cat"), None)?;
//! assert_eq!(label, Label::Positive);
//! # Ok(())
//! # }
//! ```
//!
//! # Encoding Without a Backend
//!
//! ```rust
//! use vecspace::{DataPointEncoder, Datum, FeatureSpace, VectorCollection};
//!
//! let mut space = FeatureSpace::new();
//! let encoder = DataPointEncoder::default();
//! let mut collection = VectorCollection::new(&space);
//!
//! let point = encoder.encode(&Datum::text("to be or not to be"), &mut space)?;
//! collection.add(point, Some(1))?;
//! assert_eq!(collection.serialize(None), "1 1:2 2:2 3:1 4:1\n");
//!
//! let parsed = VectorCollection::deserialize(&collection.serialize(None), &space)?;
//! assert_eq!(parsed.entries()[0].point.pairs(), collection.entries()[0].point.pairs());
//! # Ok::<(), vecspace::ClassifierError>(())
//! ```

pub mod classifier;
mod runtime;
pub mod workspace;

pub use classifier::{
    categorical_key, parse_selected_ids, read_predictions, Analyzer, Backend, Bijection, ClassifierBuilder,
    ClassifierError, ClassifierInfo, ClassifierModel, DataPoint, DataPointEncoder, Datum, FeatureIndex,
    FeatureSelector, FeatureSpace, FeatureSubset, FrozenFeatureSpace, Label, LabeledPoint, ModelState,
    OutOfVocabulary, PredictRequest, PredictionFormat, ProcessBackend, ProcessBackendConfig,
    ProcessFeatureSelector, SelectedFeatures, SpaceId, TermWeighting, TokenizerAnalyzer, TrainRequest,
    VectorCollection, WhitespaceAnalyzer, CATEGORICAL_SEPARATOR, UNLABELED_CODE,
};
pub use workspace::{CallFiles, WorkingDirectory, WorkspaceError, WORKDIR_ENV};

pub fn init_logger() {
    env_logger::init();
}
