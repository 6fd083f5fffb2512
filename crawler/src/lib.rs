pub mod extract;
pub mod robots;

use anyhow::{anyhow, Context, Result};
use extract::{PublicationStub, Selectors};
use reqwest::{header, Client};
use robots::RobotsCache;
use scholar_core::index::Document;
use scholar_core::persist::{documents_exist, load_documents, save_documents, StorePaths, VisitedSet};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use tokio::time::sleep;
use url::Url;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Organisation listing page the traversal starts from.
    pub seed: String,
    /// Store directory holding documents and the durable visited set.
    pub store: PathBuf,
    pub max_profiles: usize,
    pub max_pubs_per_profile: usize,
    /// Hard lower bound between successive fetches to one host, milliseconds.
    /// A robots.txt Crawl-delay can raise it, never lower it.
    pub delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Why a frontier URL ended in the Skipped state instead of being stored.
#[derive(Debug, Clone, Serialize)]
pub enum SkipReason {
    AlreadyVisited,
    RobotsDisallowed,
    HttpStatus(u16),
    NotHtml,
    TooLarge,
    Fetch(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyVisited => write!(f, "already visited"),
            SkipReason::RobotsDisallowed => write!(f, "disallowed by robots.txt"),
            SkipReason::HttpStatus(code) => write!(f, "http status {code}"),
            SkipReason::NotHtml => write!(f, "not an html response"),
            SkipReason::TooLarge => write!(f, "response body too large"),
            SkipReason::Fetch(e) => write!(f, "fetch failed: {e}"),
        }
    }
}

/// Outcome of one crawl run. Skips are per-URL and never abort the
/// traversal.
#[derive(Debug, Default, Serialize)]
pub struct CrawlReport {
    pub profiles_visited: usize,
    pub pages_fetched: usize,
    pub documents_stored: usize,
    pub skipped: Vec<SkippedUrl>,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedUrl {
    pub url: String,
    pub reason: SkipReason,
}

/// One unit of frontier work. Each variant fetches exactly one page; its
/// children are enqueued one BFS level below it.
enum CrawlTask {
    /// The seed listing page: discovers author profiles.
    Seed(Url),
    /// An author profile page, or one of its pagination continuations.
    /// `collected` counts stubs gathered for the profile so far.
    ProfilePage { url: Url, author: Option<String>, collected: usize },
    /// A publication detail page; completes and stores the stub.
    Publication { url: Url, stub: PublicationStub },
}

/// Owned traversal state threaded through every BFS step, persisted via the
/// store rather than kept as ambient globals.
struct CrawlState {
    frontier: Vec<CrawlTask>,
    next_level: Vec<CrawlTask>,
    depth: usize,
    seen_this_run: HashSet<String>,
    documents: HashMap<String, Document>,
    report: CrawlReport,
}

pub struct Crawler {
    cfg: CrawlConfig,
    client: Client,
    robots: RobotsCache,
    selectors: Selectors,
    last_fetch: HashMap<String, Instant>,
}

/// Canonical form of a URL for hashing and deduplication: the fragment is
/// presentation-only and is stripped.
pub fn canonicalize(url: &Url) -> String {
    let mut u = url.clone();
    u.set_fragment(None);
    u.to_string()
}

pub fn url_hash(canonical: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

impl Crawler {
    pub fn new(cfg: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            cfg,
            client,
            robots: RobotsCache::default(),
            selectors: Selectors::new(),
            last_fetch: HashMap::new(),
        })
    }

    /// Wait out the remaining politeness interval for this host. The robots
    /// Crawl-delay only ever raises the configured floor.
    async fn polite_wait(&mut self, host: &str) {
        let delay_ms = self.cfg.delay_ms.max(self.robots.crawl_delay_ms(host).unwrap_or(0));
        if let Some(last) = self.last_fetch.get(host) {
            let delay = Duration::from_millis(delay_ms);
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed).await;
            }
        }
        self.last_fetch.insert(host.to_string(), Instant::now());
    }

    /// Discovered -> Fetched, or Skipped with a reason. Never panics the
    /// run; every failure is a per-URL outcome.
    async fn fetch_html(&mut self, url: &Url) -> std::result::Result<String, SkipReason> {
        if !self.robots.allowed(&self.client, url, &self.cfg.user_agent).await {
            return Err(SkipReason::RobotsDisallowed);
        }
        let host = url.host_str().unwrap_or_default().to_string();
        self.polite_wait(&host).await;

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SkipReason::Fetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SkipReason::HttpStatus(resp.status().as_u16()));
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
            if let Ok(v) = ct.to_str() {
                if !v.starts_with("text/html") {
                    return Err(SkipReason::NotHtml);
                }
            }
        }
        let bytes = resp.bytes().await.map_err(|e| SkipReason::Fetch(e.to_string()))?;
        if bytes.len() > MAX_BODY_BYTES {
            return Err(SkipReason::TooLarge);
        }
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }
}

/// One incremental BFS crawl over the portal. Re-entrant-safe: publication
/// pages whose URL hash is already in the durable visited set are skipped,
/// so a second run over an unchanged site stores nothing new.
pub async fn run_crawl(cfg: CrawlConfig) -> Result<CrawlReport> {
    let seed = Url::parse(&cfg.seed).with_context(|| format!("invalid seed url {}", cfg.seed))?;
    let paths = StorePaths::new(&cfg.store);
    let visited = VisitedSet::open(&paths)?;

    let documents: HashMap<String, Document> = if documents_exist(&paths) {
        load_documents(&paths)?.into_iter().map(|d| (d.id.clone(), d)).collect()
    } else {
        HashMap::new()
    };

    let mut crawler = Crawler::new(cfg.clone())?;
    let mut state = CrawlState {
        frontier: vec![CrawlTask::Seed(seed)],
        next_level: Vec::new(),
        depth: 0,
        seen_this_run: HashSet::new(),
        documents,
        report: CrawlReport { started_at: now_rfc3339(), ..Default::default() },
    };

    tracing::info!(
        seed = %cfg.seed,
        max_profiles = cfg.max_profiles,
        max_pubs_per_profile = cfg.max_pubs_per_profile,
        delay_ms = cfg.delay_ms,
        "crawl starting"
    );

    // Strict BFS: a level drains completely before its children run.
    while !state.frontier.is_empty() {
        let level: Vec<CrawlTask> = std::mem::take(&mut state.frontier);
        for task in level {
            step(&mut crawler, &mut state, &visited, task).await;
        }
        state.frontier = std::mem::take(&mut state.next_level);
        state.depth += 1;
        tracing::debug!(depth = state.depth, frontier = state.frontier.len(), "level drained");
    }

    let mut all: Vec<Document> = state.documents.into_values().collect();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    save_documents(&paths, &all)?;
    visited.flush()?;

    state.report.finished_at = now_rfc3339();
    if state.report.documents_stored == 0 && state.report.pages_fetched == 0 {
        return Err(anyhow!("crawl fetched no pages; seed may be unreachable"));
    }
    tracing::info!(
        profiles = state.report.profiles_visited,
        fetched = state.report.pages_fetched,
        stored = state.report.documents_stored,
        skipped = state.report.skipped.len(),
        "crawl complete"
    );
    Ok(state.report)
}

/// Process one frontier task, enqueuing children one level below.
async fn step(crawler: &mut Crawler, state: &mut CrawlState, visited: &VisitedSet, task: CrawlTask) {
    match task {
        CrawlTask::Seed(url) => {
            let Some(body) = fetch_tracked(crawler, state, &url).await else { return };
            let links = extract::profile_links(&body, &url, &crawler.selectors);
            let capped = links.into_iter().take(crawler.cfg.max_profiles);
            for link in capped {
                state.next_level.push(CrawlTask::ProfilePage {
                    url: link,
                    author: None,
                    collected: 0,
                });
            }
        }
        CrawlTask::ProfilePage { url, author, collected } => {
            let Some(body) = fetch_tracked(crawler, state, &url).await else { return };
            let is_first_page = author.is_none();
            let author =
                author.unwrap_or_else(|| extract::author_name(&body, &crawler.selectors));
            if is_first_page {
                state.report.profiles_visited += 1;
            }

            let remaining = crawler.cfg.max_pubs_per_profile.saturating_sub(collected);
            let stubs = extract::publication_stubs(&body, &url, &author, &crawler.selectors);
            let taken = stubs.len().min(remaining);
            for stub in stubs.into_iter().take(remaining) {
                state.next_level.push(CrawlTask::Publication { url: stub.url.clone(), stub });
            }

            // Pagination continues one level below its listing page.
            if taken < remaining {
                if let Some(next) = extract::next_page(&body, &url, &crawler.selectors) {
                    state.next_level.push(CrawlTask::ProfilePage {
                        url: next,
                        author: Some(author),
                        collected: collected + taken,
                    });
                }
            }
        }
        CrawlTask::Publication { url, stub } => {
            let canonical = canonicalize(&url);
            let hash = url_hash(&canonical);
            let already = state.seen_this_run.contains(&canonical)
                || visited.contains(&hash).unwrap_or(false);
            if already {
                skip(state, &canonical, SkipReason::AlreadyVisited);
                return;
            }
            let Some(body) = fetch_tracked(crawler, state, &url).await else { return };
            let details = extract::publication_details(&body, &crawler.selectors);

            let doc = Document {
                id: hash.clone(),
                title: stub.title,
                authors: stub.authors,
                keywords: details.keywords,
                year: stub.year,
                abstract_text: details.abstract_text,
                url: canonical,
                fetched_at: now_rfc3339(),
            };
            // Parsed -> Stored: replace wholesale on re-crawl of the same id.
            state.documents.insert(hash.clone(), doc);
            state.report.documents_stored += 1;
            if let Err(e) = visited.insert(&hash) {
                tracing::warn!(error = %e, "visited set insert failed");
            }
        }
    }
}

/// Fetch with per-run dedup and skip bookkeeping. Returns None when the URL
/// ends in the Skipped state.
async fn fetch_tracked(
    crawler: &mut Crawler,
    state: &mut CrawlState,
    url: &Url,
) -> Option<String> {
    let canonical = canonicalize(url);
    if !state.seen_this_run.insert(canonical.clone()) {
        skip(state, &canonical, SkipReason::AlreadyVisited);
        return None;
    }
    match crawler.fetch_html(url).await {
        Ok(body) => {
            state.report.pages_fetched += 1;
            Some(body)
        }
        Err(reason) => {
            skip(state, &canonical, reason);
            None
        }
    }
}

fn skip(state: &mut CrawlState, url: &str, reason: SkipReason) {
    tracing::debug!(url, %reason, "skipped");
    state.report.skipped.push(SkippedUrl { url: url.to_string(), reason });
}
