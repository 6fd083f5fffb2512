use crate::config::FieldMultipliers;
use crate::index::{DocId, Field, SearchIndex, TermId};
use crate::text::normalize;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One ranked hit: document, aggregate score, and the per-field share of the
/// score. Contributions sum to 100% for any non-zero score (all-zero when
/// the score is zero). Request-scoped; discarded after the response.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub doc_id: DocId,
    pub score: f32,
    pub contributions: Vec<FieldContribution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldContribution {
    pub field: &'static str,
    pub percent: f32,
}

/// Rank the corpus against a free-text query.
///
/// The query is normalized once through the shared pipeline, then scored per
/// field with cosine similarity against each candidate document, where the
/// candidates are the union of documents containing at least one query term
/// in any field. Terms unseen at index-build time contribute zero weight.
/// A query that normalizes to nothing, or overlaps no document, yields an
/// empty result set rather than an error. Idempotent over an unmodified
/// index; ties are broken by document id.
pub fn rank(
    query: &str,
    index: &SearchIndex,
    multipliers: &FieldMultipliers,
    top_k: usize,
) -> Vec<RankedResult> {
    let tokens = normalize(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut tf_query: HashMap<&str, u32> = HashMap::new();
    for token in &tokens {
        *tf_query.entry(token.as_str()).or_insert(0) += 1;
    }

    // Per-field cosine numerators, plus the candidate union.
    let mut field_dots: HashMap<Field, HashMap<DocId, f32>> = HashMap::new();
    let mut field_query_norms: HashMap<Field, f32> = HashMap::new();
    let mut candidates: HashSet<DocId> = HashSet::new();

    for field in Field::ALL {
        let Some(fp) = index.field(field) else { continue };

        let mut query_weights: HashMap<TermId, f32> = HashMap::new();
        for (term, &tf) in &tf_query {
            if let Some(&tid) = fp.dictionary.get(*term) {
                query_weights.insert(tid, tf as f32 * fp.idf(tid, index.num_docs));
            }
        }
        if query_weights.is_empty() {
            continue;
        }

        let qnorm = query_weights.values().map(|w| w * w).sum::<f32>().sqrt();
        field_query_norms.insert(field, qnorm);

        let dots = field_dots.entry(field).or_default();
        for (&tid, &qw) in &query_weights {
            let idf = fp.idf(tid, index.num_docs);
            if let Some(plist) = fp.postings.get(&tid) {
                for p in plist {
                    *dots.entry(p.doc_id).or_insert(0.0) += qw * (p.tf as f32 * idf);
                    candidates.insert(p.doc_id);
                }
            }
        }
    }

    if candidates.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<RankedResult> = Vec::with_capacity(candidates.len());
    for doc_id in candidates {
        let mut score = 0.0f32;
        let mut weighted: Vec<(Field, f32)> = Vec::new();

        for field in Field::ALL {
            let Some(dots) = field_dots.get(&field) else { continue };
            let Some(&dot) = dots.get(&doc_id) else { continue };
            let Some(fp) = index.field(field) else { continue };
            let qnorm = field_query_norms.get(&field).copied().unwrap_or(0.0);
            let dnorm = fp.norms.get(&doc_id).copied().unwrap_or(0.0);
            if qnorm == 0.0 || dnorm == 0.0 {
                continue;
            }
            let cosine = dot / (qnorm * dnorm);
            let contribution = multipliers.get(field) * cosine;
            if contribution > 0.0 {
                weighted.push((field, contribution));
                score += contribution;
            }
        }

        let contributions = if score > 0.0 {
            weighted
                .iter()
                .map(|(field, c)| FieldContribution {
                    field: field.as_str(),
                    percent: (c / score * 1000.0).round() / 10.0,
                })
                .collect()
        } else {
            Vec::new()
        };

        results.push(RankedResult { doc_id, score, contributions });
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    results.truncate(top_k);
    results
}
