use crate::error::{CoreError, Result};
use crate::text::normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;

/// Sparse term -> TF-IDF weight mapping for one field of one document.
/// Weights are non-negative; zero-frequency terms are omitted.
pub type FieldVector = HashMap<String, f32>;

/// The five indexed fields of a publication record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Title,
    Authors,
    Keywords,
    Year,
    Abstract,
}

impl Field {
    pub const ALL: [Field; 5] =
        [Field::Title, Field::Authors, Field::Keywords, Field::Year, Field::Abstract];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Authors => "authors",
            Field::Keywords => "keywords",
            Field::Year => "year",
            Field::Abstract => "abstract",
        }
    }
}

/// A crawled publication record. Immutable once stored; a re-crawl of the
/// same identifier replaces the record wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable hex SHA-1 of the canonical source URL.
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub year: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
    pub fetched_at: String,
}

impl Document {
    /// Raw text of one field, as fed to the normalizer.
    pub fn field_text(&self, field: Field) -> String {
        match field {
            Field::Title => self.title.clone(),
            Field::Authors => self.authors.join(" "),
            Field::Keywords => self.keywords.join(" "),
            Field::Year => self.year.clone().unwrap_or_default(),
            Field::Abstract => self.abstract_text.clone(),
        }
    }
}

/// One posting: a document containing a term in a given field, with its raw
/// term frequency. Exactly one entry exists per (document, term, field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingEntry {
    pub doc_id: DocId,
    pub tf: u32,
}

/// Per-field dictionary, document frequencies and postings. Document
/// frequency is counted within the field, independently of other fields.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FieldPostings {
    pub dictionary: HashMap<String, TermId>,
    pub df: Vec<u32>,
    /// Postings per term, sorted by doc_id.
    pub postings: HashMap<TermId, Vec<PostingEntry>>,
    /// Per-document euclidean norm of the field's TF-IDF vector.
    pub norms: HashMap<DocId, f32>,
}

impl FieldPostings {
    /// idf = ln(N / df), df floored at 1.
    pub fn idf(&self, term_id: TermId, num_docs: u32) -> f32 {
        let df = self.df.get(term_id as usize).copied().unwrap_or(0).max(1);
        ((num_docs.max(1) as f32) / (df as f32)).ln()
    }
}

/// The full field-weighted index: five per-field posting structures plus the
/// document table. Rebuilt from scratch on every build pass and swapped in
/// atomically by the persistence layer.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchIndex {
    pub fields: HashMap<Field, FieldPostings>,
    pub docs: HashMap<DocId, Document>,
    pub num_docs: u32,
}

impl SearchIndex {
    pub fn field(&self, field: Field) -> Option<&FieldPostings> {
        self.fields.get(&field)
    }

    /// Materialize the TF-IDF vector of one field of one document. Scoring
    /// works off postings directly; this exists for inspection and tests.
    pub fn field_vector(&self, doc_id: DocId, field: Field) -> FieldVector {
        let mut vector = FieldVector::new();
        let Some(fp) = self.fields.get(&field) else { return vector };
        for (term, &tid) in &fp.dictionary {
            if let Some(plist) = fp.postings.get(&tid) {
                if let Ok(i) = plist.binary_search_by_key(&doc_id, |p| p.doc_id) {
                    let weight = plist[i].tf as f32 * fp.idf(tid, self.num_docs);
                    if weight > 0.0 {
                        vector.insert(term.clone(), weight);
                    }
                }
            }
        }
        vector
    }
}

/// Build the index over the whole corpus. Internal doc ids are assigned in
/// sorted-external-id order, which keeps every downstream ordering
/// deterministic. Fails on an empty corpus rather than producing an index
/// that silently matches nothing.
pub fn build_index(documents: &[Document]) -> Result<SearchIndex> {
    if documents.is_empty() {
        return Err(CoreError::EmptyCorpus);
    }

    let mut sorted: Vec<&Document> = documents.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut index = SearchIndex { num_docs: sorted.len() as u32, ..Default::default() };
    for field in Field::ALL {
        index.fields.insert(field, FieldPostings::default());
    }

    for (i, doc) in sorted.iter().enumerate() {
        let doc_id = i as DocId;
        index.docs.insert(doc_id, (*doc).clone());

        for field in Field::ALL {
            let fp = index.fields.get_mut(&field).expect("field table populated above");
            let mut tf_counts: HashMap<TermId, u32> = HashMap::new();
            for term in normalize(&doc.field_text(field)) {
                let next_id = fp.dictionary.len() as TermId;
                let tid = *fp.dictionary.entry(term).or_insert(next_id);
                if fp.df.len() <= tid as usize {
                    fp.df.resize(tid as usize + 1, 0);
                }
                *tf_counts.entry(tid).or_insert(0) += 1;
            }
            for (tid, tf) in tf_counts {
                fp.df[tid as usize] += 1;
                fp.postings.entry(tid).or_default().push(PostingEntry { doc_id, tf });
            }
        }
    }

    // Postings sorted by doc_id, then per-doc norms now that df is final.
    let num_docs = index.num_docs;
    for fp in index.fields.values_mut() {
        for plist in fp.postings.values_mut() {
            plist.sort_by_key(|p| p.doc_id);
        }
        let mut norms: HashMap<DocId, f32> = HashMap::new();
        let idfs: Vec<(TermId, f32)> =
            fp.postings.keys().map(|&tid| (tid, fp.idf(tid, num_docs))).collect();
        for (tid, idf) in idfs {
            if let Some(plist) = fp.postings.get(&tid) {
                for p in plist {
                    let w = p.tf as f32 * idf;
                    *norms.entry(p.doc_id).or_insert(0.0) += w * w;
                }
            }
        }
        for n in norms.values_mut() {
            *n = n.sqrt();
        }
        fp.norms = norms;
    }

    let title_terms = index.field(Field::Title).map(|f| f.dictionary.len()).unwrap_or(0);
    tracing::info!(num_docs, title_terms, "index built");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, abstract_text: &str) -> Document {
        Document {
            id: id.into(),
            title: title.into(),
            authors: vec!["Jane Doe".into()],
            keywords: vec![],
            year: Some("2023".into()),
            abstract_text: abstract_text.into(),
            url: format!("https://example.org/{id}"),
            fetched_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert!(matches!(build_index(&[]), Err(CoreError::EmptyCorpus)));
    }

    #[test]
    fn field_vectors_are_sparse_and_non_negative() {
        let docs = vec![
            doc("a", "Gas turbine design", "thermal analysis of turbines"),
            doc("b", "Wind energy systems", "offshore wind measurements"),
        ];
        let index = build_index(&docs).unwrap();
        for doc_id in 0..index.num_docs {
            for field in Field::ALL {
                for (_, &w) in &index.field_vector(doc_id, field) {
                    assert!(w >= 0.0);
                }
            }
        }
        // "wind" never occurs in doc 0's title; it must be absent, not zero.
        let v = index.field_vector(0, Field::Title);
        assert!(!v.contains_key("wind"));
    }

    #[test]
    fn df_is_counted_per_field() {
        let docs = vec![
            doc("a", "turbine", "turbine turbine"),
            doc("b", "engine", "turbine"),
        ];
        let index = build_index(&docs).unwrap();
        let title = index.field(Field::Title).unwrap();
        let abs = index.field(Field::Abstract).unwrap();
        let t_tid = title.dictionary["turbine"];
        let a_tid = abs.dictionary["turbine"];
        assert_eq!(title.df[t_tid as usize], 1);
        assert_eq!(abs.df[a_tid as usize], 2);
    }
}
