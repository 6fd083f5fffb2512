use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}']*").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves",
            // Domain noise common in news-wire and publication listings.
            "said","says","according","report","reports","news","article",
            "monday","tuesday","wednesday","thursday","friday","saturday","sunday",
        ];
        words.iter().copied().collect()
    };
    static ref LEMMAS: HashMap<&'static str, &'static str> = {
        LEMMA_TABLE.iter().copied().collect()
    };
}

/// Inflected form -> dictionary base form. Tokens absent from the table pass
/// through unchanged.
static LEMMA_TABLE: &[(&str, &str)] = &[
    // irregular nouns
    ("analyses", "analysis"),
    ("children", "child"),
    ("criteria", "criterion"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("hypotheses", "hypothesis"),
    ("indices", "index"),
    ("matrices", "matrix"),
    ("men", "man"),
    ("mice", "mouse"),
    ("phenomena", "phenomenon"),
    ("teeth", "tooth"),
    ("theses", "thesis"),
    ("vertices", "vertex"),
    ("women", "woman"),
    // -ies plurals
    ("agencies", "agency"),
    ("bodies", "body"),
    ("celebrities", "celebrity"),
    ("companies", "company"),
    ("countries", "country"),
    ("economies", "economy"),
    ("energies", "energy"),
    ("industries", "industry"),
    ("methodologies", "methodology"),
    ("movies", "movie"),
    ("policies", "policy"),
    ("properties", "property"),
    ("strategies", "strategy"),
    ("studies", "study"),
    ("technologies", "technology"),
    ("therapies", "therapy"),
    ("universities", "university"),
    // -es plurals
    ("approaches", "approach"),
    ("batches", "batch"),
    ("branches", "branch"),
    ("businesses", "business"),
    ("gases", "gas"),
    ("indexes", "index"),
    ("losses", "loss"),
    ("processes", "process"),
    ("taxes", "tax"),
    ("viruses", "virus"),
    // regular plurals seen across publication and news text
    ("actors", "actor"),
    ("algorithms", "algorithm"),
    ("articles", "article"),
    ("authors", "author"),
    ("awards", "award"),
    ("banks", "bank"),
    ("concerts", "concert"),
    ("costs", "cost"),
    ("datasets", "dataset"),
    ("deals", "deal"),
    ("diseases", "disease"),
    ("doctors", "doctor"),
    ("drugs", "drug"),
    ("earnings", "earning"),
    ("engines", "engine"),
    ("experiments", "experiment"),
    ("films", "film"),
    ("hospitals", "hospital"),
    ("investors", "investor"),
    ("journals", "journal"),
    ("keywords", "keyword"),
    ("markets", "market"),
    ("measurements", "measurement"),
    ("mergers", "merger"),
    ("methods", "method"),
    ("models", "model"),
    ("networks", "network"),
    ("papers", "paper"),
    ("patients", "patient"),
    ("prices", "price"),
    ("profits", "profit"),
    ("publications", "publication"),
    ("researchers", "researcher"),
    ("results", "result"),
    ("sciences", "science"),
    ("sensors", "sensor"),
    ("shares", "share"),
    ("shows", "show"),
    ("signals", "signal"),
    ("simulations", "simulation"),
    ("songs", "song"),
    ("stocks", "stock"),
    ("students", "student"),
    ("systems", "system"),
    ("treatments", "treatment"),
    ("trials", "trial"),
    ("turbines", "turbine"),
    ("vaccines", "vaccine"),
    ("values", "value"),
];

const MIN_TOKEN_LEN: usize = 2;

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

fn lemmatize(token: &str) -> &str {
    LEMMAS.get(token).copied().unwrap_or(token)
}

/// Normalize text into its lemma sequence: NFKC fold, lowercase, alphanumeric
/// tokenization, stopword removal, dictionary lemmatization. Deterministic;
/// empty input yields an empty sequence.
///
/// Indexing, ranking and classification all run their text through this one
/// function so that build-time and query-time representations agree.
pub fn normalize(text: &str) -> Vec<String> {
    let folded = text.nfkc().collect::<String>().to_lowercase();
    let mut lemmas = Vec::new();
    for mat in RE.find_iter(&folded) {
        let token = mat.as_str();
        if token.len() < MIN_TOKEN_LEN || is_stopword(token) {
            continue;
        }
        lemmas.push(lemmatize(token).to_string());
    }
    lemmas
}

/// One named intermediate output of the normalization pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutput {
    pub stage: &'static str,
    pub output: String,
}

/// The per-stage view of [`normalize`], for UI display of how a piece of text
/// was reduced to its lemmas.
pub fn preprocessing_steps(text: &str) -> Vec<StageOutput> {
    let folded = text.nfkc().collect::<String>().to_lowercase();

    let mut tokenized = Vec::new();
    for mat in RE.find_iter(&folded) {
        let token = mat.as_str();
        if token.len() < MIN_TOKEN_LEN || is_stopword(token) {
            continue;
        }
        tokenized.push(token.to_string());
    }
    let lemmatized: Vec<&str> = tokenized.iter().map(|t| lemmatize(t)).collect();

    vec![
        StageOutput { stage: "original", output: text.to_string() },
        StageOutput { stage: "lowercased", output: folded.clone() },
        StageOutput { stage: "tokenized", output: tokenized.join(" ") },
        StageOutput { stage: "lemmatized", output: lemmatized.join(" ") },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_lemmatization() {
        let lemmas = normalize("Turbines and companies");
        assert_eq!(lemmas, vec!["turbine", "company"]);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(normalize("").is_empty());
        assert!(normalize("   .,;!").is_empty());
    }

    #[test]
    fn numbers_survive_tokenization() {
        let lemmas = normalize("published in 2023");
        assert!(lemmas.contains(&"2023".to_string()));
    }
}
