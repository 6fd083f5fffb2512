use anyhow::Result;
use clap::Parser;
use scholar_crawler::{run_crawl, CrawlConfig};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Incremental BFS crawl of a publications portal, respecting robots.txt")]
struct Cli {
    /// Organisation listing page to start from
    #[arg(long)]
    seed: String,
    /// Store directory (documents + visited set)
    #[arg(long, default_value = "./store")]
    store: String,
    /// Maximum author profiles to visit per run
    #[arg(long, default_value_t = 10)]
    max_profiles: usize,
    /// Maximum publications to collect per profile
    #[arg(long, default_value_t = 50)]
    max_pubs: usize,
    /// Minimum delay between fetches to one host, milliseconds
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,
    /// Request timeout seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// User-Agent for robots.txt and page fetches
    #[arg(long, default_value = "scholar-search-bot/0.1 (+https://example.com/bot)")]
    user_agent: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let report = run_crawl(CrawlConfig {
        seed: args.seed,
        store: args.store.into(),
        max_profiles: args.max_profiles,
        max_pubs_per_profile: args.max_pubs,
        delay_ms: args.delay_ms,
        timeout_secs: args.timeout_secs,
        user_agent: args.user_agent,
    })
    .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
