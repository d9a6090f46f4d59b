use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use super::analyzer::{Analyzer, TokenizerAnalyzer, WhitespaceAnalyzer};
use super::backend::{Backend, FeatureSelector, ProcessBackend, ProcessBackendConfig};
use super::classifier::{ClassifierModel, ModelState};
use super::collection::VectorCollection;
use super::data_point::{DataPointEncoder, TermWeighting};
use super::error::ClassifierError;
use super::feature_space::{FeatureSpace, OutOfVocabulary};
use super::label::Label;
use crate::workspace::WorkingDirectory;

/// A builder for constructing a ClassifierModel with a fluent interface.
#[derive(Default, Debug)]
pub struct ClassifierBuilder {
    backend: Option<Box<dyn Backend>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    selector: Option<Box<dyn FeatureSelector>>,
    feature_space: Option<FeatureSpace>,
    working_dir: Option<PathBuf>,
    weighting: TermWeighting,
    out_of_vocabulary: OutOfVocabulary,
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use vecspace::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend that trains and predicts
    pub fn with_backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Uses external trainer and predictor programs as the backend
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use vecspace::{ClassifierBuilder, ProcessBackendConfig};
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_process_backend(
    ///         ProcessBackendConfig::default().with_timeout(Duration::from_secs(60))
    ///     );
    /// assert!(builder.is_ok());
    /// ```
    pub fn with_process_backend(self, config: ProcessBackendConfig) -> Result<Self, ClassifierError> {
        Ok(self.with_backend(ProcessBackend::new(config)?))
    }

    /// Sets the analyzer used to split text data into terms
    pub fn with_analyzer(mut self, analyzer: impl Analyzer + 'static) -> Self {
        self.analyzer = Some(Arc::new(analyzer));
        self
    }

    /// Tokenizes text with a HuggingFace `tokenizer.json`
    pub fn with_tokenizer_file(self, path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        Ok(self.with_analyzer(TokenizerAnalyzer::from_file(path)?))
    }

    /// Chooses between term frequency (default) and presence values for text
    pub fn with_term_weighting(mut self, weighting: TermWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Chooses what classification does with features unseen in training
    pub fn with_out_of_vocabulary(mut self, policy: OutOfVocabulary) -> Self {
        self.out_of_vocabulary = policy;
        self
    }

    /// Keeps the backend files in `path` instead of a fresh directory under the default root
    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    pub fn with_feature_selector(mut self, selector: impl FeatureSelector + 'static) -> Self {
        self.selector = Some(Box::new(selector));
        self
    }

    /// Starts from an existing vocabulary, e.g. one restored with `FeatureSpace::load`
    pub fn with_feature_space(mut self, space: FeatureSpace) -> Self {
        self.feature_space = Some(space);
        self
    }

    /// Builds and returns the final ClassifierModel instance
    ///
    /// # Returns
    /// * `Result<ClassifierModel, ClassifierError>` - The untrained model, or an error if:
    ///   - No backend was set
    ///   - The working directory cannot be created
    pub fn build(self) -> Result<ClassifierModel, ClassifierError> {
        let backend = self
            .backend
            .ok_or_else(|| ClassifierError::Configuration("A backend must be set".to_string()))?;

        let workspace = match self.working_dir {
            Some(path) => WorkingDirectory::new(path)?,
            None => WorkingDirectory::new_default()?,
        };
        info!("Working directory: {:?}", workspace.path());

        let analyzer = self.analyzer.unwrap_or_else(|| Arc::new(WhitespaceAnalyzer));
        let features = self.feature_space.unwrap_or_default();
        let training = VectorCollection::new(&features);

        Ok(ClassifierModel {
            labels: Label::bijection()?,
            features,
            training,
            encoder: DataPointEncoder::new(analyzer, self.weighting),
            out_of_vocabulary: self.out_of_vocabulary,
            backend,
            selector: self.selector,
            workspace,
            state: ModelState::Untrained,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_required() {
        let result = ClassifierBuilder::new().build();
        assert!(matches!(result, Err(ClassifierError::Configuration(_))));
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let result = ClassifierBuilder::new().with_tokenizer_file("/nonexistent/tokenizer.json");
        assert!(matches!(result, Err(ClassifierError::Analyzer(_))));
    }

    #[test]
    fn test_configuration_is_applied() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        space.id_for("preloaded")?;

        let dir = std::env::temp_dir().join(format!("vecspace-builder-{}", std::process::id()));
        let model = ClassifierBuilder::new()
            .with_process_backend(ProcessBackendConfig::default())?
            .with_term_weighting(TermWeighting::Presence)
            .with_out_of_vocabulary(OutOfVocabulary::Error)
            .with_feature_space(space)
            .with_working_dir(&dir)
            .build()?;

        let info = model.info();
        assert_eq!(info.working_dir, dir);
        assert_eq!(info.num_features, 1);
        assert_eq!(info.num_examples, 0);
        assert!(!info.trained);
        assert_eq!(info.weighting, TermWeighting::Presence);
        assert_eq!(info.out_of_vocabulary, OutOfVocabulary::Error);
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
