use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use vecspace::{
    ClassifierModel, Datum, Label, ProcessBackendConfig, ProcessFeatureSelector, TermWeighting,
};

/// Train an external SVM on labeled text and classify new text with it
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Training data: one `<positive|negative><TAB><text>` per line
    #[arg(long)]
    train: PathBuf,

    /// Texts to classify, one per line
    #[arg(long)]
    classify: Option<PathBuf>,

    /// Trainer program, called as `<program> [args] <train file> <model file>`
    #[arg(long)]
    train_program: Option<PathBuf>,

    /// Extra argument for the trainer (repeatable)
    #[arg(long = "train-arg", allow_hyphen_values = true)]
    train_args: Vec<String>,

    /// Predictor program, called as `<program> [args] <query file> <model file> <results file>`
    #[arg(long)]
    predict_program: Option<PathBuf>,

    /// Extra argument for the predictor (repeatable)
    #[arg(long = "predict-arg", allow_hyphen_values = true)]
    predict_args: Vec<String>,

    /// Use svm-light defaults (svm_learn / svm_classify, decision-value output)
    #[arg(long)]
    svm_light: bool,

    /// Kill a backend call after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Use term presence instead of term frequency as the feature value
    #[arg(long)]
    presence: bool,

    /// Directory for the backend's working files
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Feature selection program; train on the features it selects
    #[arg(long)]
    select_features: Option<PathBuf>,

    /// Write the learned feature table as JSON
    #[arg(long)]
    save_features: Option<PathBuf>,
}

impl Args {
    fn backend_config(&self) -> ProcessBackendConfig {
        let mut config = if self.svm_light {
            ProcessBackendConfig::svm_light()
        } else {
            ProcessBackendConfig::default()
        };
        if let Some(program) = &self.train_program {
            config.train_program = program.clone();
        }
        if let Some(program) = &self.predict_program {
            config.predict_program = program.clone();
        }
        config.train_args = self.train_args.clone();
        config.predict_args = self.predict_args.clone();
        config.timeout = self.timeout_secs.map(Duration::from_secs);
        config
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("=== Starting vecspace ===");
    let start_time = Instant::now();

    let mut builder = ClassifierModel::builder()
        .with_process_backend(args.backend_config())
        .context("Failed to set up the backend")?;
    if args.presence {
        builder = builder.with_term_weighting(TermWeighting::Presence);
    }
    if let Some(dir) = &args.workdir {
        builder = builder.with_working_dir(dir);
    }
    if let Some(program) = &args.select_features {
        let selector = ProcessFeatureSelector::new(program, Vec::new())
            .context("Failed to set up the feature selector")?;
        builder = builder.with_feature_selector(selector);
    }
    let mut model = builder.build().context("Failed to create the classifier")?;

    let training = fs::read_to_string(&args.train)
        .with_context(|| format!("Failed to read {:?}", args.train))?;
    for (i, line) in training.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((label, text)) = line.split_once('\t') else {
            bail!("Line {} of {:?} has no tab between label and text", i + 1, args.train);
        };
        model
            .add(Datum::text(text), label)
            .with_context(|| format!("Line {} of {:?}", i + 1, args.train))?;
    }
    info!("Loaded {} training example(s)", model.info().num_examples);

    let selected = match &args.select_features {
        Some(_) => {
            let selected = model.select_features().context("Feature selection failed")?;
            info!("Selected features: {:?}", selected.keys);
            Some(selected.subset)
        }
        None => None,
    };

    model.build(selected.as_ref()).context("Training failed")?;
    let build_time = start_time.elapsed();
    info!("=== Model Built Successfully (took {:.2?}) ===", build_time);

    if let Some(path) = &args.save_features {
        model
            .feature_space()
            .save(path)
            .with_context(|| format!("Failed to write {:?}", path))?;
        info!("Feature table written to {:?}", path);
    }

    if let Some(path) = &args.classify {
        let queries = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let texts: Vec<&str> = queries.lines().filter(|l| !l.trim().is_empty()).collect();
        let data: Vec<Datum> = texts.iter().map(|t| Datum::text(*t)).collect();

        let classify_start = Instant::now();
        let labels = model
            .classify_batch(&data, selected.as_ref())
            .context("Classification failed")?;
        for (text, label) in texts.iter().zip(&labels) {
            println!("{}\t{}", label, text);
        }

        let unknown = labels.iter().filter(|l| **l == Label::Unknown).count();
        if unknown > 0 {
            eprintln!("{} prediction(s) could not be mapped to a class", unknown);
        }
        info!("Classification time: {:.2?}", classify_start.elapsed());
    }

    info!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}
