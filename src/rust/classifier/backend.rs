use std::ffi::OsString;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use super::error::ClassifierError;
use crate::runtime::{create_runtime, run_program, ProgramOutput, RunFailure};

/// Files handed to the trainer.
#[derive(Debug, Clone, Copy)]
pub struct TrainRequest<'a> {
    /// Sparse text training file to read
    pub training_file: &'a Path,
    /// Where the model artifact must be written
    pub model_file: &'a Path,
}

/// Files handed to the predictor.
#[derive(Debug, Clone, Copy)]
pub struct PredictRequest<'a> {
    pub query_file: &'a Path,
    pub model_file: &'a Path,
    /// Where one prediction per query line must be written
    pub results_file: &'a Path,
}

/// How the predictor writes each line of its results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PredictionFormat {
    /// An integer label code per line (libsvm `svm-predict`)
    #[default]
    Label,
    /// A real-valued decision value per line (svm-light `svm_classify`);
    /// its sign is the label
    DecisionValue,
}

/// The external trainer/predictor.
///
/// Implementations only run the backend; writing the input files and reading
/// the results file is done by the caller.
pub trait Backend: Debug + Send + Sync {
    fn train(&self, request: &TrainRequest<'_>) -> Result<(), ClassifierError>;

    fn predict(&self, request: &PredictRequest<'_>) -> Result<(), ClassifierError>;

    fn prediction_format(&self) -> PredictionFormat {
        PredictionFormat::Label
    }

    /// Trainer name used in error reports
    fn train_name(&self) -> PathBuf {
        PathBuf::from("backend")
    }

    /// Predictor name used in error reports
    fn predict_name(&self) -> PathBuf {
        PathBuf::from("backend")
    }
}

/// Configuration for [`ProcessBackend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessBackendConfig {
    pub train_program: PathBuf,
    /// Arguments placed before `<training file> <model file>`
    pub train_args: Vec<String>,
    pub predict_program: PathBuf,
    /// Arguments placed before `<query file> <model file> <results file>`
    pub predict_args: Vec<String>,
    /// Kill the program and fail with `BackendTimeout` after this long
    pub timeout: Option<Duration>,
    pub prediction_format: PredictionFormat,
}

impl Default for ProcessBackendConfig {
    fn default() -> Self {
        Self {
            train_program: PathBuf::from("svm-train"),
            train_args: Vec::new(),
            predict_program: PathBuf::from("svm-predict"),
            predict_args: Vec::new(),
            timeout: None,
            prediction_format: PredictionFormat::Label,
        }
    }
}

impl ProcessBackendConfig {
    /// svm-light's `svm_learn` / `svm_classify`
    pub fn svm_light() -> Self {
        Self {
            train_program: PathBuf::from("svm_learn"),
            predict_program: PathBuf::from("svm_classify"),
            prediction_format: PredictionFormat::DecisionValue,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Runs the trainer and predictor as child processes:
///
/// ```text
/// <train_program> [train_args..] <training file> <model file>
/// <predict_program> [predict_args..] <query file> <model file> <results file>
/// ```
///
/// Calls block the current thread; they must not be made from inside an
/// async runtime.
#[derive(Debug)]
pub struct ProcessBackend {
    config: ProcessBackendConfig,
    runtime: Runtime,
}

impl ProcessBackend {
    pub fn new(config: ProcessBackendConfig) -> Result<Self, ClassifierError> {
        let runtime = create_runtime()?;
        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> &ProcessBackendConfig {
        &self.config
    }

    fn run(&self, program: &Path, args: &[String], files: &[&Path]) -> Result<ProgramOutput, RunFailure> {
        let argv: Vec<OsString> = args
            .iter()
            .map(OsString::from)
            .chain(files.iter().map(|f| f.as_os_str().to_owned()))
            .collect();
        run_program(&self.runtime, program, &argv, self.config.timeout)
    }
}

impl Backend for ProcessBackend {
    fn train(&self, request: &TrainRequest<'_>) -> Result<(), ClassifierError> {
        let program = &self.config.train_program;
        info!("Training with {:?} on {:?}", program, request.training_file);
        let result = self.run(
            program,
            &self.config.train_args,
            &[request.training_file, request.model_file],
        );
        check_exit(program, result, self.config.timeout, |program, status, stderr| {
            ClassifierError::BackendTraining { program, status, stderr }
        })
    }

    fn predict(&self, request: &PredictRequest<'_>) -> Result<(), ClassifierError> {
        let program = &self.config.predict_program;
        debug!("Predicting with {:?} on {:?}", program, request.query_file);
        let result = self.run(
            program,
            &self.config.predict_args,
            &[request.query_file, request.model_file, request.results_file],
        );
        check_exit(program, result, self.config.timeout, |program, status, stderr| {
            ClassifierError::BackendPrediction { program, status, stderr }
        })
    }

    fn prediction_format(&self) -> PredictionFormat {
        self.config.prediction_format
    }

    fn train_name(&self) -> PathBuf {
        self.config.train_program.clone()
    }

    fn predict_name(&self) -> PathBuf {
        self.config.predict_program.clone()
    }
}

fn check_exit(
    program: &Path,
    result: Result<ProgramOutput, RunFailure>,
    timeout: Option<Duration>,
    failure: impl FnOnce(PathBuf, String, String) -> ClassifierError,
) -> Result<(), ClassifierError> {
    let err = match result {
        Ok(output) if output.status.success() => return Ok(()),
        Ok(output) => failure(program.to_path_buf(), output.status.to_string(), output.stderr),
        Err(RunFailure::Io(e)) => failure(program.to_path_buf(), "failed to run".to_string(), e.to_string()),
        Err(RunFailure::TimedOut) => ClassifierError::BackendTimeout {
            program: program.to_path_buf(),
            timeout: timeout.unwrap_or_default(),
        },
    };
    error!("{}", err);
    Err(err)
}

/// Reads a results file written by the predictor.
///
/// Blank lines and a libsvm `labels ...` header are skipped; only the first
/// column of each line is used.
///
/// # Errors
/// - `BackendPrediction` if the file is missing, a line cannot be parsed, or
///   the number of predictions differs from `expected`
pub fn read_predictions(
    path: &Path,
    format: PredictionFormat,
    expected: usize,
    program: &Path,
) -> Result<Vec<i32>, ClassifierError> {
    let text = fs::read_to_string(path).map_err(|e| {
        ClassifierError::prediction(program, format!("cannot read results file {:?}: {}", path, e))
    })?;

    let mut codes = Vec::with_capacity(expected);
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("labels") {
            continue;
        }
        let code = parse_prediction(line, format).ok_or_else(|| {
            ClassifierError::prediction(
                program,
                format!("malformed prediction '{}' on line {} of {:?}", line, index + 1, path),
            )
        })?;
        codes.push(code);
    }

    if codes.len() != expected {
        return Err(ClassifierError::prediction(
            program,
            format!("expected {} prediction(s), found {} in {:?}", expected, codes.len(), path),
        ));
    }
    Ok(codes)
}

fn parse_prediction(line: &str, format: PredictionFormat) -> Option<i32> {
    let first = line.split_whitespace().next()?;
    match format {
        PredictionFormat::Label => first.parse::<i32>().ok().or_else(|| {
            let value: f64 = first.parse().ok()?;
            let integral = value.is_finite() && value.fract() == 0.0 && value.abs() <= i32::MAX as f64;
            integral.then_some(value as i32)
        }),
        PredictionFormat::DecisionValue => {
            let value: f64 = first.parse().ok()?;
            if !value.is_finite() {
                return None;
            }
            Some(if value > 0.0 {
                1
            } else if value < 0.0 {
                -1
            } else {
                0
            })
        }
    }
}

/// Picks a subset of features from a training file.
pub trait FeatureSelector: Debug + Send + Sync {
    /// Returns the selected feature IDs.
    fn select(&self, training_file: &Path) -> Result<Vec<u32>, ClassifierError>;
}

/// Runs `program [args..] <training file>` and reads the selected feature IDs
/// from its standard output as a bracketed list such as `[1, 4, 7]`.
#[derive(Debug)]
pub struct ProcessFeatureSelector {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
    runtime: Runtime,
}

impl ProcessFeatureSelector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Result<Self, ClassifierError> {
        Ok(Self {
            program: program.into(),
            args,
            timeout: None,
            runtime: create_runtime()?,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl FeatureSelector for ProcessFeatureSelector {
    fn select(&self, training_file: &Path) -> Result<Vec<u32>, ClassifierError> {
        let argv: Vec<OsString> = self
            .args
            .iter()
            .map(OsString::from)
            .chain(std::iter::once(training_file.as_os_str().to_owned()))
            .collect();
        info!("Selecting features with {:?}", self.program);

        let output = match run_program(&self.runtime, &self.program, &argv, self.timeout) {
            Ok(output) => output,
            Err(RunFailure::TimedOut) => {
                return Err(ClassifierError::BackendTimeout {
                    program: self.program.clone(),
                    timeout: self.timeout.unwrap_or_default(),
                })
            }
            Err(RunFailure::Io(e)) => {
                return Err(ClassifierError::FeatureSelection(format!(
                    "failed to run {:?}: {}",
                    self.program, e
                )))
            }
        };
        if !output.status.success() {
            return Err(ClassifierError::FeatureSelection(format!(
                "{:?} exited with {}: {}",
                self.program, output.status, output.stderr
            )));
        }
        parse_selected_ids(&output.stdout)
    }
}

/// Parses the last bracketed list in `output` as feature IDs.
pub fn parse_selected_ids(output: &str) -> Result<Vec<u32>, ClassifierError> {
    let list = output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('['))
        .last()
        .ok_or_else(|| ClassifierError::FeatureSelection("no feature list in output".to_string()))?;
    serde_json::from_str(list)
        .map_err(|e| ClassifierError::FeatureSelection(format!("invalid feature list '{}': {}", list, e)))
}
