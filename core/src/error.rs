use thiserror::Error;

/// Typed failures of the core library. Fetch failures during crawling are
/// per-URL skip outcomes, not errors; a query or input term missing from a
/// trained vocabulary contributes zero weight and is never surfaced.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An index-build pass was invoked over zero documents. Building an
    /// empty-but-"successful" index would poison every later search, so the
    /// pass fails instead.
    #[error("cannot build an index from an empty corpus")]
    EmptyCorpus,

    /// A training pass was invoked over zero samples.
    #[error("cannot train a classifier on an empty training set")]
    EmptyTrainingSet,

    /// Prediction was requested before any training pass completed.
    #[error("no trained classifier model is available")]
    ModelNotTrained,

    /// Ranking was requested before any index-build pass completed.
    #[error("no search index has been built")]
    IndexNotBuilt,

    /// A decision threshold outside [0, 1] was rejected at the boundary.
    #[error("threshold {0} is outside the valid range [0, 1]")]
    InvalidThreshold(f64),
}

pub type Result<T> = std::result::Result<T, CoreError>;
