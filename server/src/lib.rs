use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use scholar_core::classifier::{decide, predict, top_features, ChainModel, TermWeight};
use scholar_core::config::CoreConfig;
use scholar_core::error::CoreError;
use scholar_core::index::SearchIndex;
use scholar_core::persist::{load_index, load_model, StorePaths};
use scholar_core::rank::{rank, FieldContribution};
use scholar_core::text::{preprocessing_steps, StageOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

const TOP_FEATURES: usize = 10;
const SNIPPET_WINDOW: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<String>,
    pub url: String,
    pub score: f32,
    pub contributions: Vec<FieldContribution>,
    pub snippet: Option<String>,
}

#[derive(Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
    pub threshold: Option<f64>,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    pub predicted_labels: Vec<String>,
    pub all_probabilities: BTreeMap<String, f64>,
    pub confidence_level: &'static str,
    pub top_features: Vec<TermWeight>,
    pub preprocessing_steps: Vec<StageOutput>,
}

/// Shared read state. Artifacts are loaded whole and swapped behind the
/// locks, so concurrent requests never observe a half-built index or model.
#[derive(Clone)]
pub struct AppState {
    pub store_root: PathBuf,
    pub index: Arc<RwLock<Option<Arc<SearchIndex>>>>,
    pub model: Arc<RwLock<Option<Arc<ChainModel>>>>,
    pub config: CoreConfig,
    pub admin_token: Option<String>,
}

pub fn build_app(store_root: String) -> Result<Router> {
    let paths = StorePaths::new(&store_root);
    let index = match load_index(&paths) {
        Ok(index) => Some(Arc::new(index)),
        Err(e) => {
            tracing::warn!(error = %e, "no search index loaded; /search will answer 503");
            None
        }
    };
    let model = match load_model(&paths) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            tracing::warn!(error = %e, "no classifier model loaded; /classify will answer 503");
            None
        }
    };

    let state = AppState {
        store_root: PathBuf::from(&store_root),
        index: Arc::new(RwLock::new(index)),
        model: Arc::new(RwLock::new(model)),
        config: CoreConfig::default(),
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/classify", post(classify_handler))
        .route("/doc/:id", get(doc_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(state)
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> std::result::Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let index = state
        .index
        .read()
        .clone()
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, CoreError::IndexNotBuilt.to_string()))?;

    let k = params.k.max(1).min(100);
    let ranked = rank(&params.q, &index, &state.config.multipliers, k);

    let raw_terms: Vec<String> = params.q.split_whitespace().map(|s| s.to_string()).collect();
    let mut results = Vec::with_capacity(ranked.len());
    for r in ranked {
        if let Some(doc) = index.docs.get(&r.doc_id) {
            results.push(SearchHit {
                id: doc.id.clone(),
                title: doc.title.clone(),
                authors: doc.authors.clone(),
                year: doc.year.clone(),
                url: doc.url.clone(),
                score: r.score,
                contributions: r.contributions,
                snippet: snippet_from_abstract(&doc.abstract_text, &raw_terms),
            });
        }
    }

    Ok(Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn classify_handler(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> std::result::Result<Json<ClassifyResponse>, (StatusCode, String)> {
    let model = state
        .model
        .read()
        .clone()
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, CoreError::ModelNotTrained.to_string()))?;

    let threshold = req.threshold.unwrap_or(state.config.label_threshold);
    let chain_state = predict(&model, &req.text)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    let decision = decide(&chain_state, threshold).map_err(|e| match e {
        CoreError::InvalidThreshold(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    let features = top_features(&model, &req.text, &chain_state, &decision, TOP_FEATURES);
    let all_probabilities: BTreeMap<String, f64> =
        chain_state.iter().map(|p| (p.label.clone(), p.probability)).collect();

    Ok(Json(ClassifyResponse {
        predicted_labels: decision.predicted_labels,
        all_probabilities,
        confidence_level: decision.confidence.as_str(),
        top_features: features,
        preprocessing_steps: preprocessing_steps(&req.text),
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<serde_json::Value>, (StatusCode, String)> {
    let index = state
        .index
        .read()
        .clone()
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, CoreError::IndexNotBuilt.to_string()))?;
    let doc = index
        .docs
        .values()
        .find(|d| d.id == id)
        .ok_or((StatusCode::NOT_FOUND, "document not found".to_string()))?;
    Ok(Json(serde_json::to_value(doc).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?))
}

/// Re-read the index and model artifacts and swap them into the running
/// state. Pairs with the offline build passes: they write whole artifacts,
/// this makes them visible atomically.
pub async fn reload_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> std::result::Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let paths = StorePaths::new(&state.store_root);

    let index_loaded = match load_index(&paths) {
        Ok(index) => {
            *state.index.write() = Some(Arc::new(index));
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "index reload failed");
            false
        }
    };
    let model_loaded = match load_model(&paths) {
        Ok(model) => {
            *state.model.write() = Some(Arc::new(model));
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "model reload failed");
            false
        }
    };

    Ok(Json(serde_json::json!({ "index": index_loaded, "model": model_loaded })))
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> std::result::Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

/// Keyword-in-context snippet: a window around the first case-insensitive
/// occurrence of any raw query term, falling back to the abstract's head.
fn snippet_from_abstract(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();
    let first = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .filter_map(|t| lowered.find(&t.to_lowercase()))
        .min();

    let snippet = match first {
        Some(idx) => {
            let start = char_floor(text, idx.saturating_sub(SNIPPET_WINDOW));
            let end = char_floor(text, (idx + 2 * SNIPPET_WINDOW).min(text.len()));
            text[start..end].to_string()
        }
        None => text.chars().take(2 * SNIPPET_WINDOW).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

/// Largest char boundary at or below `i`.
fn char_floor(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() {
            continue;
        }
        if let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build()
        {
            s = pat
                .replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0]))
                .to_string();
        }
    }
    s
}
