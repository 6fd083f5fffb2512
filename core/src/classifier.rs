use crate::error::{CoreError, Result};
use crate::text::normalize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One labelled training text. `labels` may be empty or carry several labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub text: String,
    pub labels: Vec<String>,
}

/// TF-IDF vectorizer over normalized lemmas, vocabulary capped at the
/// highest-corpus-frequency terms. Fitted once at train time; query-time
/// transforms reuse the fitted document frequencies, so unseen terms simply
/// drop out with zero weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vectorizer {
    pub vocabulary: HashMap<String, usize>,
    pub terms: Vec<String>,
    pub idf: Vec<f64>,
}

impl Vectorizer {
    pub fn fit(token_lists: &[Vec<String>], max_features: usize) -> Self {
        let mut corpus_freq: HashMap<&str, u64> = HashMap::new();
        let mut df: HashMap<&str, u32> = HashMap::new();
        for tokens in token_lists {
            let mut seen: BTreeSet<&str> = BTreeSet::new();
            for token in tokens {
                *corpus_freq.entry(token).or_insert(0) += 1;
                seen.insert(token);
            }
            for token in seen {
                *df.entry(token).or_insert(0) += 1;
            }
        }

        // Highest corpus frequency first; term order breaks ties so the fit
        // is deterministic.
        let mut ranked: Vec<(&str, u64)> = corpus_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);

        let n = token_lists.len().max(1) as f64;
        let mut vocabulary = HashMap::with_capacity(ranked.len());
        let mut terms = Vec::with_capacity(ranked.len());
        let mut idf = Vec::with_capacity(ranked.len());
        for (i, (term, _)) in ranked.iter().enumerate() {
            vocabulary.insert(term.to_string(), i);
            terms.push(term.to_string());
            idf.push((n / df.get(term).copied().unwrap_or(1).max(1) as f64).ln());
        }
        Self { vocabulary, terms, idf }
    }

    /// Sparse feature index -> tf * idf weight.
    pub fn transform(&self, tokens: &[String]) -> HashMap<usize, f64> {
        let mut tf: HashMap<usize, f64> = HashMap::new();
        for token in tokens {
            if let Some(&i) = self.vocabulary.get(token) {
                *tf.entry(i).or_insert(0.0) += 1.0;
            }
        }
        for (i, w) in tf.iter_mut() {
            *w *= self.idf[*i];
        }
        tf
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// One binary multinomial Naive Bayes estimator in the chain: log priors for
/// the negative/positive class and sparse smoothed log-likelihoods per
/// feature, with a stored default for features unseen in that class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelModel {
    pub label: String,
    pub log_prior: [f64; 2],
    pub feature_log_likelihood: [HashMap<usize, f64>; 2],
    pub default_log_likelihood: [f64; 2],
}

impl LabelModel {
    fn log_likelihood(&self, class: usize, feature: usize) -> f64 {
        self.feature_log_likelihood[class]
            .get(&feature)
            .copied()
            .unwrap_or(self.default_log_likelihood[class])
    }

    /// P(label = 1 | features) via the two-class log-sum-exp.
    fn positive_probability(&self, features: &HashMap<usize, f64>) -> f64 {
        let mut scores = [self.log_prior[0], self.log_prior[1]];
        for (&f, &x) in features {
            scores[0] += x * self.log_likelihood(0, f);
            scores[1] += x * self.log_likelihood(1, f);
        }
        let max = scores[0].max(scores[1]);
        let lse = max + ((scores[0] - max).exp() + (scores[1] - max).exp()).ln();
        (scores[1] - lse).exp()
    }
}

/// The trained chain: shared vectorizer plus one estimator per label, in
/// chain order. Immutable after training; loaded read-only by prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainModel {
    pub labels: Vec<String>,
    pub vectorizer: Vectorizer,
    pub estimators: Vec<LabelModel>,
    pub alpha: f64,
}

/// Per-label outcome of one chain evaluation. Transient, rebuilt per input.
#[derive(Debug, Clone, Serialize)]
pub struct LabelPrediction {
    pub label: String,
    pub probability: f64,
    pub predicted: bool,
}

pub type ChainState = Vec<LabelPrediction>;

/// Train one estimator per label in the given order. Each estimator sees the
/// TF-IDF features of the text concatenated with the ground-truth binary
/// indicators of every earlier label in the chain, which is what lets the
/// chain pick up label co-occurrence.
pub fn train(
    samples: &[TrainingSample],
    labels: &[String],
    alpha: f64,
    max_features: usize,
) -> Result<ChainModel> {
    if samples.is_empty() || labels.is_empty() {
        return Err(CoreError::EmptyTrainingSet);
    }

    let token_lists: Vec<Vec<String>> = samples.iter().map(|s| normalize(&s.text)).collect();
    let vectorizer = Vectorizer::fit(&token_lists, max_features);
    let text_features: Vec<HashMap<usize, f64>> =
        token_lists.iter().map(|t| vectorizer.transform(t)).collect();
    let truth: Vec<Vec<bool>> = samples
        .iter()
        .map(|s| labels.iter().map(|l| s.labels.contains(l)).collect())
        .collect();

    let vocab_len = vectorizer.len();
    let n = samples.len() as f64;
    let mut estimators = Vec::with_capacity(labels.len());

    for (pos, label) in labels.iter().enumerate() {
        let num_features = vocab_len + pos;
        let mut counts: [HashMap<usize, f64>; 2] = [HashMap::new(), HashMap::new()];
        let mut totals = [0.0f64; 2];
        let mut class_n = [0.0f64; 2];

        for (i, features) in text_features.iter().enumerate() {
            let class = truth[i][pos] as usize;
            class_n[class] += 1.0;
            for (&f, &x) in features {
                *counts[class].entry(f).or_insert(0.0) += x;
                totals[class] += x;
            }
            for j in 0..pos {
                if truth[i][j] {
                    *counts[class].entry(vocab_len + j).or_insert(0.0) += 1.0;
                    totals[class] += 1.0;
                }
            }
        }

        // +1/+2 keeps the prior finite when a label never (or always) occurs.
        let log_prior = [
            ((class_n[0] + 1.0) / (n + 2.0)).ln(),
            ((class_n[1] + 1.0) / (n + 2.0)).ln(),
        ];

        let mut feature_log_likelihood: [HashMap<usize, f64>; 2] = [HashMap::new(), HashMap::new()];
        let mut default_log_likelihood = [0.0f64; 2];
        for class in 0..2 {
            let denom = totals[class] + alpha * num_features as f64;
            default_log_likelihood[class] = (alpha / denom).ln();
            for (&f, &c) in &counts[class] {
                feature_log_likelihood[class].insert(f, ((c + alpha) / denom).ln());
            }
        }

        estimators.push(LabelModel {
            label: label.clone(),
            log_prior,
            feature_log_likelihood,
            default_log_likelihood,
        });
    }

    tracing::info!(
        labels = labels.len(),
        vocabulary = vocab_len,
        samples = samples.len(),
        "classifier chain trained"
    );
    Ok(ChainModel { labels: labels.to_vec(), vectorizer, estimators, alpha })
}

/// Evaluate the chain over one input. The text is normalized once; each
/// estimator's predicted binary outcome (ground truth being unavailable at
/// inference time) is fed forward as a feature to the estimators after it.
pub fn predict(model: &ChainModel, text: &str) -> Result<ChainState> {
    if model.estimators.is_empty() {
        return Err(CoreError::ModelNotTrained);
    }

    let tokens = normalize(text);
    let base = model.vectorizer.transform(&tokens);
    let vocab_len = model.vectorizer.len();

    let mut features = base;
    let mut state = ChainState::with_capacity(model.estimators.len());
    for (pos, estimator) in model.estimators.iter().enumerate() {
        let probability = estimator.positive_probability(&features);
        let predicted = probability >= 0.5;
        if predicted {
            features.insert(vocab_len + pos, 1.0);
        }
        state.push(LabelPrediction { label: estimator.label.clone(), probability, predicted });
    }
    Ok(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// The thresholded label set plus a confidence tier.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub predicted_labels: Vec<String>,
    pub confidence: Confidence,
}

/// Convert chain probabilities into a label set. A label is included iff its
/// probability clears the threshold; an empty set is a valid "uncertain"
/// outcome, never replaced by a best guess. Confidence comes from the mean
/// probability of the included labels.
pub fn decide(state: &ChainState, threshold: f64) -> Result<Decision> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CoreError::InvalidThreshold(threshold));
    }

    let predicted: Vec<&LabelPrediction> =
        state.iter().filter(|p| p.probability >= threshold).collect();
    if predicted.is_empty() {
        return Ok(Decision { predicted_labels: Vec::new(), confidence: Confidence::Low });
    }

    let mean =
        predicted.iter().map(|p| p.probability).sum::<f64>() / predicted.len() as f64;
    let confidence = if mean > 0.70 {
        Confidence::High
    } else if mean >= 0.40 {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    Ok(Decision {
        predicted_labels: predicted.iter().map(|p| p.label.clone()).collect(),
        confidence,
    })
}

/// A term and its contribution to the decision, for explainability.
#[derive(Debug, Clone, Serialize)]
pub struct TermWeight {
    pub term: String,
    pub score: f64,
}

/// Rank the input's terms by their summed contribution to the decided
/// labels' positive-class log-likelihood margin. When nothing cleared the
/// threshold the most probable label is explained instead, so the UI always
/// has something to show.
pub fn top_features(
    model: &ChainModel,
    text: &str,
    state: &ChainState,
    decision: &Decision,
    n: usize,
) -> Vec<TermWeight> {
    let tokens = normalize(text);
    let features = model.vectorizer.transform(&tokens);
    if features.is_empty() {
        return Vec::new();
    }

    let explained: Vec<usize> = if decision.predicted_labels.is_empty() {
        state
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.probability.total_cmp(&b.1.probability))
            .map(|(i, _)| vec![i])
            .unwrap_or_default()
    } else {
        state
            .iter()
            .enumerate()
            .filter(|(_, p)| decision.predicted_labels.contains(&p.label))
            .map(|(i, _)| i)
            .collect()
    };

    let mut ranked: Vec<TermWeight> = features
        .iter()
        .map(|(&f, &x)| {
            let margin: f64 = explained
                .iter()
                .map(|&i| {
                    let m = &model.estimators[i];
                    x * (m.log_likelihood(1, f) - m.log_likelihood(0, f))
                })
                .sum();
            TermWeight { term: model.vectorizer.terms[f].clone(), score: margin }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.term.cmp(&b.term)));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectorizer_caps_vocabulary() {
        let lists = vec![
            vec!["alpha".to_string(), "alpha".to_string(), "beta".to_string()],
            vec!["alpha".to_string(), "gamma".to_string()],
        ];
        let v = Vectorizer::fit(&lists, 2);
        assert_eq!(v.len(), 2);
        assert!(v.vocabulary.contains_key("alpha"));
    }

    #[test]
    fn unseen_terms_transform_to_nothing() {
        let lists = vec![vec!["alpha".to_string()]];
        let v = Vectorizer::fit(&lists, 10);
        let out = v.transform(&["omega".to_string()]);
        assert!(out.is_empty());
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let state: ChainState = vec![];
        assert!(matches!(decide(&state, 1.5), Err(CoreError::InvalidThreshold(_))));
        assert!(matches!(decide(&state, -0.1), Err(CoreError::InvalidThreshold(_))));
    }

    #[test]
    fn empty_prediction_is_low_confidence() {
        let state: ChainState = vec![LabelPrediction {
            label: "Business".into(),
            probability: 0.1,
            predicted: false,
        }];
        let d = decide(&state, 0.3).unwrap();
        assert!(d.predicted_labels.is_empty());
        assert_eq!(d.confidence, Confidence::Low);
    }
}
