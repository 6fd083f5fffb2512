use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scholar_core::classifier::{decide, predict, train, ChainModel, TrainingSample};
use scholar_core::persist::{save_model, StorePaths};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "trainer")]
#[command(about = "Train the multi-label classifier chain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on a JSONL file of {"text": ..., "labels": [...]} records
    Train {
        /// Training set path
        #[arg(long)]
        input: String,
        /// Store directory the model artifact is written into
        #[arg(long, default_value = "./store")]
        store: String,
        /// Comma-separated chain order; defaults to the sorted label set of
        /// the training data
        #[arg(long)]
        labels: Option<String>,
        /// Laplace smoothing constant
        #[arg(long, default_value_t = 0.1)]
        alpha: f64,
        /// Vocabulary cap
        #[arg(long, default_value_t = 5000)]
        max_features: usize,
        /// Hold out every fifth sample and report evaluation metrics
        #[arg(long, default_value_t = false)]
        holdout: bool,
        /// Decision threshold used for holdout evaluation
        #[arg(long, default_value_t = 0.30)]
        threshold: f64,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train { input, store, labels, alpha, max_features, holdout, threshold } => {
            run_train(&input, &store, labels, alpha, max_features, holdout, threshold)
        }
    }
}

fn load_samples(path: &Path) -> Result<Vec<TrainingSample>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut samples = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        samples.push(serde_json::from_str(&line)?);
    }
    Ok(samples)
}

fn run_train(
    input: &str,
    store: &str,
    labels: Option<String>,
    alpha: f64,
    max_features: usize,
    holdout: bool,
    threshold: f64,
) -> Result<()> {
    let samples = load_samples(Path::new(input))?;
    if samples.is_empty() {
        bail!("training set {input} is empty");
    }

    let labels: Vec<String> = match labels {
        Some(csv) => csv.split(',').map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect(),
        None => {
            let set: BTreeSet<String> =
                samples.iter().flat_map(|s| s.labels.iter().cloned()).collect();
            set.into_iter().collect()
        }
    };
    for label in &labels {
        let count = samples.iter().filter(|s| s.labels.contains(label)).count();
        tracing::info!(label, count, "label distribution");
    }

    let (train_set, test_set): (Vec<TrainingSample>, Vec<TrainingSample>) = if holdout {
        let mut tr = Vec::new();
        let mut te = Vec::new();
        for (i, s) in samples.iter().enumerate() {
            if i % 5 == 4 {
                te.push(s.clone());
            } else {
                tr.push(s.clone());
            }
        }
        (tr, te)
    } else {
        (samples, Vec::new())
    };

    let model = train(&train_set, &labels, alpha, max_features)?;
    if !test_set.is_empty() {
        evaluate(&model, &test_set, threshold)?;
    }

    let paths = StorePaths::new(store);
    save_model(&paths, &model)?;
    tracing::info!(store, labels = model.labels.len(), "model saved");
    Ok(())
}

/// Subset accuracy, Hamming loss and micro precision/recall/F1 over the
/// holdout split.
fn evaluate(model: &ChainModel, test_set: &[TrainingSample], threshold: f64) -> Result<()> {
    let mut exact = 0usize;
    let mut hamming_errors = 0usize;
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fne = 0usize;

    for sample in test_set {
        let state = predict(model, &sample.text)?;
        let decision = decide(&state, threshold)?;
        let predicted: BTreeSet<&String> = decision.predicted_labels.iter().collect();
        let actual: BTreeSet<&String> =
            sample.labels.iter().filter(|l| model.labels.contains(l)).collect();

        if predicted == actual {
            exact += 1;
        }
        for label in &model.labels {
            let p = predicted.contains(label);
            let a = actual.contains(label);
            if p != a {
                hamming_errors += 1;
            }
            match (p, a) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fne += 1,
                (false, false) => {}
            }
        }
    }

    let n = test_set.len();
    let cells = n * model.labels.len();
    let precision = tp as f64 / (tp + fp).max(1) as f64;
    let recall = tp as f64 / (tp + fne).max(1) as f64;
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    tracing::info!(
        holdout = n,
        subset_accuracy = exact as f64 / n.max(1) as f64,
        hamming_loss = hamming_errors as f64 / cells.max(1) as f64,
        precision_micro = precision,
        recall_micro = recall,
        f1_micro = f1,
        "holdout evaluation"
    );
    Ok(())
}
