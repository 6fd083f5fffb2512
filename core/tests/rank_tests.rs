use scholar_core::config::FieldMultipliers;
use scholar_core::index::{build_index, Document};
use scholar_core::rank::rank;

fn doc(id: &str, title: &str, keywords: &[&str], abstract_text: &str) -> Document {
    Document {
        id: id.into(),
        title: title.into(),
        authors: vec!["Jane Doe".into(), "John Smith".into()],
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        year: Some("2022".into()),
        abstract_text: abstract_text.into(),
        url: format!("https://example.org/{id}"),
        fetched_at: "2026-01-01T00:00:00Z".into(),
    }
}

fn corpus() -> Vec<Document> {
    vec![
        doc(
            "a",
            "Advances in Gas Turbine Design",
            &["turbine", "combustion"],
            "We study combustion stability in modern designs.",
        ),
        doc(
            "b",
            "Offshore Wind Energy Assessment",
            &["wind"],
            "A turbine survey across offshore sites.",
        ),
        doc(
            "c",
            "Deep Learning for Protein Folding",
            &["neural networks"],
            "Sequence models predict tertiary structure.",
        ),
    ]
}

#[test]
fn title_match_outranks_abstract_match() {
    let index = build_index(&corpus()).unwrap();
    let results = rank("Gas Turbine", &index, &FieldMultipliers::default(), 10);
    assert!(results.len() >= 2);
    let top = &index.docs[&results[0].doc_id];
    assert_eq!(top.id, "a");
    let second = &index.docs[&results[1].doc_id];
    assert_eq!(second.id, "b");
    assert!(results[0].score > results[1].score);
}

#[test]
fn zero_overlap_query_returns_empty() {
    let index = build_index(&corpus()).unwrap();
    let results = rank("quantum chromodynamics", &index, &FieldMultipliers::default(), 10);
    assert!(results.is_empty());
}

#[test]
fn empty_query_returns_empty() {
    let index = build_index(&corpus()).unwrap();
    let results = rank("the and of", &index, &FieldMultipliers::default(), 10);
    assert!(results.is_empty());
}

#[test]
fn rank_is_idempotent() {
    let index = build_index(&corpus()).unwrap();
    let first = rank("turbine design", &index, &FieldMultipliers::default(), 10);
    let second = rank("turbine design", &index, &FieldMultipliers::default(), 10);
    let ids_a: Vec<u32> = first.iter().map(|r| r.doc_id).collect();
    let ids_b: Vec<u32> = second.iter().map(|r| r.doc_id).collect();
    assert_eq!(ids_a, ids_b);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.score, b.score);
    }
}

#[test]
fn contributions_sum_to_one_hundred() {
    let index = build_index(&corpus()).unwrap();
    let results = rank("gas turbine combustion", &index, &FieldMultipliers::default(), 10);
    assert!(!results.is_empty());
    for result in &results {
        assert!(result.score > 0.0);
        let sum: f32 = result.contributions.iter().map(|c| c.percent).sum();
        assert!((sum - 100.0).abs() < 0.5, "contributions summed to {sum}");
    }
}

#[test]
fn top_k_truncates() {
    let index = build_index(&corpus()).unwrap();
    let results = rank("turbine", &index, &FieldMultipliers::default(), 1);
    assert_eq!(results.len(), 1);
}
