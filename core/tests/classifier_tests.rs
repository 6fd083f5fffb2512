use scholar_core::classifier::{decide, predict, top_features, train, Confidence, TrainingSample};
use scholar_core::error::CoreError;

fn sample(text: &str, labels: &[&str]) -> TrainingSample {
    TrainingSample { text: text.into(), labels: labels.iter().map(|l| l.to_string()).collect() }
}

fn labels() -> Vec<String> {
    vec!["Business".into(), "Entertainment".into(), "Health".into()]
}

/// A small news-wire corpus with deliberate Business/Health co-occurrence.
fn training_set() -> Vec<TrainingSample> {
    vec![
        sample("stock market investors rally as shares climb", &["Business"]),
        sample("merger talks between the bank and its rival collapse", &["Business"]),
        sample("quarterly profit beats forecast, stocks surge", &["Business"]),
        sample("company ceo announces acquisition deal", &["Business"]),
        sample("hospital expands care for patients in rural areas", &["Health"]),
        sample("vaccine trial shows strong results in patients", &["Health"]),
        sample("doctors warn about seasonal virus spread", &["Health"]),
        sample("new drug treatment approved for chronic disease", &["Health"]),
        sample(
            "pharma company merger reshapes hospital supply deal",
            &["Business", "Health"],
        ),
        sample(
            "health insurer profit rises as ceo touts growth",
            &["Business", "Health"],
        ),
        sample("film festival opens with award winning premiere", &["Entertainment"]),
        sample("pop star concert tour sells out stadium shows", &["Entertainment"]),
        sample("actors celebrate as movie wins top award", &["Entertainment"]),
    ]
}

#[test]
fn empty_training_set_is_rejected() {
    assert!(matches!(
        train(&[], &labels(), 0.1, 5000),
        Err(CoreError::EmptyTrainingSet)
    ));
}

#[test]
fn stocks_is_labelled_business() {
    let model = train(&training_set(), &labels(), 0.1, 5000).unwrap();
    let state = predict(&model, "stocks").unwrap();
    let decision = decide(&state, 0.30).unwrap();
    assert!(decision.predicted_labels.contains(&"Business".to_string()));
    let business = state.iter().find(|p| p.label == "Business").unwrap();
    assert!(business.probability >= 0.30);
}

#[test]
fn ambiguous_text_spreads_mass_over_business_and_health() {
    let model = train(&training_set(), &labels(), 0.1, 5000).unwrap();
    let state = predict(&model, "hospital ceo merger").unwrap();
    let business = state.iter().find(|p| p.label == "Business").unwrap();
    let health = state.iter().find(|p| p.label == "Health").unwrap();
    assert!(business.probability > 0.05);
    assert!(health.probability > 0.05);
    let decision = decide(&state, 0.30).unwrap();
    assert!(!decision.predicted_labels.is_empty());
}

#[test]
fn raising_the_threshold_never_adds_labels() {
    let model = train(&training_set(), &labels(), 0.1, 5000).unwrap();
    for text in ["stocks", "hospital ceo merger", "film premiere", "vaccine trial"] {
        let state = predict(&model, text).unwrap();
        let low = decide(&state, 0.30).unwrap();
        let high = decide(&state, 0.60).unwrap();
        assert!(high.predicted_labels.len() <= low.predicted_labels.len());
        for label in &high.predicted_labels {
            assert!(low.predicted_labels.contains(label));
        }
    }
}

#[test]
fn chain_state_preserves_label_order() {
    let model = train(&training_set(), &labels(), 0.1, 5000).unwrap();
    let state = predict(&model, "vaccine trial results").unwrap();
    let order: Vec<&str> = state.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(order, vec!["Business", "Entertainment", "Health"]);
}

#[test]
fn vocabulary_miss_yields_uncertain_not_error() {
    let model = train(&training_set(), &labels(), 0.1, 5000).unwrap();
    // Every token is out of vocabulary; the chain must still answer.
    let state = predict(&model, "zyzzyva qwertyuiop").unwrap();
    assert_eq!(state.len(), 3);
    let decision = decide(&state, 0.99).unwrap();
    assert!(decision.predicted_labels.is_empty());
    assert_eq!(decision.confidence, Confidence::Low);
}

#[test]
fn top_features_surface_decisive_terms() {
    let model = train(&training_set(), &labels(), 0.1, 5000).unwrap();
    let text = "stock merger profit";
    let state = predict(&model, text).unwrap();
    let decision = decide(&state, 0.30).unwrap();
    let features = top_features(&model, text, &state, &decision, 10);
    assert!(!features.is_empty());
    let terms: Vec<&str> = features.iter().map(|f| f.term.as_str()).collect();
    assert!(terms.contains(&"stock") || terms.contains(&"merger") || terms.contains(&"profit"));
}

#[test]
fn model_survives_serialization() {
    let model = train(&training_set(), &labels(), 0.1, 5000).unwrap();
    let bytes = bincode::serialize(&model).unwrap();
    let restored: scholar_core::classifier::ChainModel = bincode::deserialize(&bytes).unwrap();
    let a = predict(&model, "stocks").unwrap();
    let b = predict(&restored, "stocks").unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert!((x.probability - y.probability).abs() < 1e-12);
    }
}
