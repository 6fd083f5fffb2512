use crate::index::Field;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Per-field score multipliers, applied at ranking time rather than baked
/// into stored weights so they can change without an index rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMultipliers {
    pub title: f32,
    pub authors: f32,
    pub keywords: f32,
    pub year: f32,
    #[serde(rename = "abstract")]
    pub abstract_text: f32,
}

impl Default for FieldMultipliers {
    fn default() -> Self {
        Self { title: 3.0, authors: 2.5, keywords: 2.0, year: 1.5, abstract_text: 1.0 }
    }
}

impl FieldMultipliers {
    pub fn get(&self, field: Field) -> f32 {
        match field {
            Field::Title => self.title,
            Field::Authors => self.authors,
            Field::Keywords => self.keywords,
            Field::Year => self.year,
            Field::Abstract => self.abstract_text,
        }
    }
}

/// Tunables injected at construction into the ranker, the classifier chain
/// and the decision layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub multipliers: FieldMultipliers,
    /// Probability cutoff for including a label in the predicted set.
    pub label_threshold: f64,
    /// Laplace smoothing constant for Naive Bayes likelihoods.
    pub smoothing_alpha: f64,
    /// Vocabulary cap for classifier features.
    pub max_features: usize,
    /// Minimum delay between successive fetches to one host, milliseconds.
    pub politeness_delay_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            multipliers: FieldMultipliers::default(),
            label_threshold: 0.30,
            smoothing_alpha: 0.1,
            max_features: 5000,
            politeness_delay_ms: 2000,
        }
    }
}

impl CoreConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let f = File::open(path)?;
        let cfg = serde_json::from_reader(BufReader::new(f))?;
        Ok(cfg)
    }
}
