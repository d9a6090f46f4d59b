use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::backend::{read_predictions, Backend, FeatureSelector, PredictRequest, TrainRequest};
use super::bijection::Bijection;
use super::collection::VectorCollection;
use super::data_point::{DataPointEncoder, Datum};
use super::error::ClassifierError;
use super::feature_space::{FeatureSpace, FeatureSubset, OutOfVocabulary};
use super::label::Label;
use crate::workspace::WorkingDirectory;

/// Where a model is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Untrained,
    /// A backend artifact exists at `artifact`
    Trained { artifact: PathBuf },
}

/// Features picked by a [`FeatureSelector`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFeatures {
    pub subset: FeatureSubset,
    /// Keys of the selected features, in ID order
    pub keys: Vec<String>,
}

/// A binary classifier that encodes data into a sparse vector space and
/// delegates learning to an external backend.
///
/// # Thread Safety
///
/// `add` and `build` take `&mut self`, so feature ID assignment can never race.
/// `classify` only reads the feature space and gives every call its own query
/// and results files, so a trained model can be shared across threads:
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use std::thread;
/// use vecspace::{ClassifierModel, Datum, ProcessBackendConfig};
///
/// let mut model = ClassifierModel::builder()
///     .with_process_backend(ProcessBackendConfig::default())?
///     .build()?;
/// model.add(Datum::categorical("word", "cat"), "positive")?;
/// model.add(Datum::categorical("word", "dog"), "negative")?;
/// model.build(None)?;
///
/// let model = Arc::new(model);
/// let shared = Arc::clone(&model);
/// thread::spawn(move || {
///     shared.classify(Datum::categorical("word", "cat"), None).unwrap();
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ClassifierModel {
    pub(crate) labels: Bijection<Label, i32>,
    pub(crate) features: FeatureSpace,
    pub(crate) training: VectorCollection,
    pub(crate) encoder: DataPointEncoder,
    pub(crate) out_of_vocabulary: OutOfVocabulary,
    pub(crate) backend: Box<dyn Backend>,
    pub(crate) selector: Option<Box<dyn FeatureSelector>>,
    pub(crate) workspace: WorkingDirectory,
    pub(crate) state: ModelState,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<ClassifierModel>();
    }
};

impl ClassifierModel {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        super::ClassifierInfo {
            working_dir: self.workspace.path().to_path_buf(),
            num_examples: self.training.len(),
            num_features: self.features.len(),
            trained: self.is_trained(),
            weighting: self.encoder.weighting(),
            out_of_vocabulary: self.out_of_vocabulary,
        }
    }

    /// Adds a training example.
    ///
    /// # Arguments
    /// * `datum` - A feature map or text
    /// * `label` - `"positive"` or `"negative"`, optionally written with a leading `:`
    ///
    /// # Errors
    /// - `InvalidLabel` for any other label; nothing is recorded in that case
    pub fn add(&mut self, datum: impl Into<Datum>, label: &str) -> Result<(), ClassifierError> {
        let label: Label = label.parse()?;
        self.add_labeled(datum, label)
    }

    /// Adds a training example with an already parsed label.
    pub fn add_labeled(&mut self, datum: impl Into<Datum>, label: Label) -> Result<(), ClassifierError> {
        if label == Label::Unknown {
            return Err(ClassifierError::InvalidLabel(label.to_string()));
        }
        let code = self.labels.code_of(&label)?;
        let point = self.encoder.encode(&datum.into(), &mut self.features)?;
        self.training.add(point, Some(code))
    }

    /// Trains the backend on every example added so far.
    ///
    /// Can be called again after more examples are added; the new artifact
    /// replaces the old one only once training succeeds.
    ///
    /// # Arguments
    /// * `subset` - Optional restriction of the features written to the training file
    ///
    /// # Errors
    /// - `EmptyTrainingSet` if no examples were added
    /// - `BackendTraining` / `BackendTimeout` if the trainer fails
    pub fn build(&mut self, subset: Option<&FeatureSubset>) -> Result<(), ClassifierError> {
        if self.training.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }

        let training_file = self.write_training_file(subset)?;
        let staging = self.workspace.staging_model_file();
        if staging.exists() {
            fs::remove_file(&staging)?;
        }

        info!(
            "Training on {} example(s) over {} feature(s)",
            self.training.len(),
            subset.map_or(self.features.len(), FeatureSubset::len)
        );
        self.backend.train(&TrainRequest {
            training_file: &training_file,
            model_file: &staging,
        })?;

        if !staging.exists() {
            return Err(ClassifierError::BackendTraining {
                program: self.backend.train_name(),
                status: "no model artifact".to_string(),
                stderr: format!("trainer did not write {:?}", staging),
            });
        }
        let artifact = self.workspace.promote_staged_model()?;
        info!("Model artifact written to {:?}", artifact);
        self.state = ModelState::Trained { artifact };
        Ok(())
    }

    /// Predicts the label of one datum.
    ///
    /// Features never seen during training are handled by the model's
    /// out-of-vocabulary policy; the feature space is never modified.
    ///
    /// # Errors
    /// - `UntrainedModel` before a successful `build`
    /// - `BackendPrediction` / `BackendTimeout` if the predictor fails
    pub fn classify(&self, datum: impl Into<Datum>, subset: Option<&FeatureSubset>) -> Result<Label, ClassifierError> {
        let labels = self.classify_batch(&[datum.into()], subset)?;
        labels
            .into_iter()
            .next()
            .ok_or_else(|| ClassifierError::prediction(self.backend.predict_name(), "no prediction returned"))
    }

    /// Predicts labels for many data in a single backend call, in input order.
    pub fn classify_batch(&self, data: &[Datum], subset: Option<&FeatureSubset>) -> Result<Vec<Label>, ClassifierError> {
        let artifact = match &self.state {
            ModelState::Trained { artifact } => artifact,
            ModelState::Untrained => return Err(ClassifierError::UntrainedModel),
        };
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let mut frozen = self.features.frozen(self.out_of_vocabulary);
        let mut queries = VectorCollection::new(&self.features);
        for datum in data {
            let point = self.encoder.encode(datum, &mut frozen)?;
            queries.add(point, None)?;
        }
        if !frozen.dropped().is_empty() {
            debug!("Dropped {} out-of-vocabulary feature(s)", frozen.dropped().len());
        }

        let files = self.workspace.call_files();
        queries.write_to(File::create(&files.query)?, subset)?;
        self.backend.predict(&PredictRequest {
            query_file: &files.query,
            model_file: artifact,
            results_file: &files.results,
        })?;

        let codes = read_predictions(
            &files.results,
            self.backend.prediction_format(),
            data.len(),
            &self.backend.predict_name(),
        )?;
        Ok(codes.into_iter().map(|code| self.decode(code)).collect())
    }

    /// Runs the configured feature selector over the full training set.
    ///
    /// # Errors
    /// - `Configuration` if no selector was configured
    /// - `EmptyTrainingSet` if no examples were added
    /// - `FeatureSelection` if the selector fails or returns unknown IDs
    pub fn select_features(&self) -> Result<SelectedFeatures, ClassifierError> {
        let selector = self
            .selector
            .as_ref()
            .ok_or_else(|| ClassifierError::Configuration("no feature selector configured".to_string()))?;
        if self.training.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }

        let training_file = self.write_training_file(None)?;
        let ids = selector.select(&training_file)?;
        let subset = self
            .features
            .selected_subset(ids)
            .map_err(|e| ClassifierError::FeatureSelection(e.to_string()))?;
        let keys = subset
            .iter()
            .map(|id| self.features.key_for(id).map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Selected {} of {} feature(s)", keys.len(), self.features.len());
        Ok(SelectedFeatures { subset, keys })
    }

    fn decode(&self, code: i32) -> Label {
        match self.labels.get_key(&code) {
            Some(label) => *label,
            None => {
                warn!("Backend returned unrecognized label code {}", code);
                Label::Unknown
            }
        }
    }

    fn write_training_file(&self, subset: Option<&FeatureSubset>) -> Result<PathBuf, ClassifierError> {
        let path = self.workspace.training_file();
        self.training.write_to(File::create(&path)?, subset)?;
        debug!("Wrote {} training line(s) to {:?}", self.training.len(), path);
        Ok(path)
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, ModelState::Trained { .. })
    }

    pub fn feature_space(&self) -> &FeatureSpace {
        &self.features
    }

    /// Mutable access, e.g. for naming features. IDs already assigned cannot change.
    pub fn feature_space_mut(&mut self) -> &mut FeatureSpace {
        &mut self.features
    }

    pub fn training_set(&self) -> &VectorCollection {
        &self.training
    }

    pub fn working_dir(&self) -> &Path {
        self.workspace.path()
    }

    /// The label ↔ code table handed to the backend
    pub fn label_codes(&self) -> &Bijection<Label, i32> {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Trains by copying the training file; predicts by writing fixed codes.
    #[derive(Debug, Default)]
    struct FixedBackend {
        codes: Vec<i32>,
        queries: Mutex<Vec<String>>,
    }

    impl Backend for FixedBackend {
        fn train(&self, request: &TrainRequest<'_>) -> Result<(), ClassifierError> {
            fs::copy(request.training_file, request.model_file)?;
            Ok(())
        }

        fn predict(&self, request: &PredictRequest<'_>) -> Result<(), ClassifierError> {
            let query = fs::read_to_string(request.query_file)?;
            let lines = query.lines().count();
            self.queries.lock().unwrap().push(query);
            let results: String = self.codes.iter().cycle().take(lines).map(|c| format!("{}\n", c)).collect();
            fs::write(request.results_file, results)?;
            Ok(())
        }
    }

    fn model_with(codes: Vec<i32>, name: &str) -> ClassifierModel {
        let dir = std::env::temp_dir()
            .join("vecspace-classifier-unit")
            .join(format!("{}-{}", name, std::process::id()));
        ClassifierModel::builder()
            .with_backend(FixedBackend { codes, ..Default::default() })
            .with_working_dir(dir)
            .build()
            .unwrap()
    }

    #[test]
    fn test_state_transitions() -> Result<(), ClassifierError> {
        let mut model = model_with(vec![1], "states");
        assert_eq!(model.state(), &ModelState::Untrained);
        model.add(Datum::categorical("word", "cat"), "positive")?;
        assert!(!model.is_trained());
        model.build(None)?;
        assert!(matches!(model.state(), ModelState::Trained { .. }));
        model.build(None)?;
        assert!(model.is_trained());
        model.workspace.remove()?;
        Ok(())
    }

    #[test]
    fn test_unknown_code_decodes_to_unknown() -> Result<(), ClassifierError> {
        let mut model = model_with(vec![7], "unknown-code");
        model.add(Datum::categorical("word", "cat"), "positive")?;
        model.build(None)?;
        assert_eq!(model.classify(Datum::categorical("word", "cat"), None)?, Label::Unknown);
        model.workspace.remove()?;
        Ok(())
    }

    #[test]
    fn test_unknown_label_rejected() {
        let mut model = model_with(vec![1], "unknown-label");
        let result = model.add_labeled(Datum::categorical("word", "cat"), Label::Unknown);
        assert!(matches!(result, Err(ClassifierError::InvalidLabel(_))));
        assert!(model.training_set().is_empty());
        assert!(model.feature_space().is_empty());
        model.workspace.remove().unwrap();
    }

    #[test]
    fn test_empty_training_set() {
        let mut model = model_with(vec![1], "empty");
        assert!(matches!(model.build(None), Err(ClassifierError::EmptyTrainingSet)));
        assert!(!model.is_trained());
        model.workspace.remove().unwrap();
    }

    #[test]
    fn test_select_features_without_selector() {
        let mut model = model_with(vec![1], "no-selector");
        model.add("some text", "positive").unwrap();
        assert!(matches!(
            model.select_features(),
            Err(ClassifierError::Configuration(_))
        ));
        model.workspace.remove().unwrap();
    }
}
