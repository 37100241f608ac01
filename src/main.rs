use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use songseed::config::Config;
use songseed::database::DatabaseManager;
use songseed::gemini::GeminiClient;
use songseed::metrics::ApiMetrics;
use songseed::recommendations::{
    PageRequest, RecommendationCache, RecommendationEngine, RecommendationGenerator, SeedKey,
    TimeRange,
};
use songseed::seeds;
use songseed::store::{MemoryStore, SqliteStore, TtlStore};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "songseed")]
#[command(about = "Song recommendations seeded from a playlist or a user's top tracks")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/songseed/config.json)
    #[arg(long, global = true, env = "SONGSEED_CONFIG")]
    config: Option<PathBuf>,

    /// Cache database, overriding the config file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Keep the cache in memory for this run only
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one page of recommendations as JSON
    Recommend(RecommendArgs),
    /// Forget the accumulated list for one seed
    Clear(ClearArgs),
    /// Forget every cached list and steering instruction
    ClearAll,
    /// Drop expired cache entries
    Evict,
}

#[derive(Args, Debug)]
struct SeedArgs {
    /// Catalog playlist id
    #[arg(long, conflicts_with = "user")]
    playlist: Option<String>,

    /// User id, for recommendations seeded from top tracks
    #[arg(long, requires = "time_range")]
    user: Option<String>,

    /// short_term, medium_term or long_term
    #[arg(long)]
    time_range: Option<TimeRange>,
}

impl SeedArgs {
    fn seed_key(&self) -> Result<SeedKey> {
        match (&self.playlist, &self.user, self.time_range) {
            (Some(id), None, _) => Ok(SeedKey::playlist(id.as_str())),
            (None, Some(user), Some(range)) => Ok(SeedKey::top_tracks(user, range)),
            _ => bail!("Pass either --playlist or --user with --time-range"),
        }
    }
}

#[derive(Args, Debug)]
struct ClearArgs {
    #[command(flatten)]
    seed: SeedArgs,

    /// Also forget the steering instruction
    #[arg(long)]
    with_steering: bool,
}

#[derive(Args, Debug)]
struct RecommendArgs {
    #[command(flatten)]
    seed: SeedArgs,

    /// Seed tracks, one "title by artist" per line ("-" reads stdin)
    #[arg(long, conflicts_with = "catalog_json")]
    tracks: Option<PathBuf>,

    /// Catalog playlist or top-tracks JSON to take seed tracks from
    #[arg(long)]
    catalog_json: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    limit: usize,

    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Free-text instruction for the generator, e.g. "focus on 90s tracks"
    #[arg(long)]
    steering: Option<String>,

    /// Start over from an empty list (only at offset 0)
    #[arg(long)]
    clear_cache: bool,
}

impl RecommendArgs {
    fn seed_tracks(&self) -> Result<Vec<String>> {
        if let Some(path) = &self.catalog_json {
            let json: serde_json::Value = serde_json::from_str(&read_input(path)?)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            return Ok(if self.seed.playlist.is_some() {
                seeds::descriptions_from_playlist(&json)
            } else {
                seeds::descriptions_from_top_tracks(&json)
            });
        }

        let Some(path) = &self.tracks else {
            bail!("Pass --tracks or --catalog-json");
        };
        Ok(read_input(path)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

async fn open_store(cli: &Cli, config: &Config) -> Result<Arc<dyn TtlStore>> {
    if cli.memory {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = DatabaseManager::open(&config.database_path)
        .await
        .map_err(anyhow::Error::msg)
        .context("Failed to open cache database")?;
    Ok(Arc::new(SqliteStore::new(db.pool)))
}

fn build_engine(
    config: &Config,
    store: Arc<dyn TtlStore>,
    metrics: Arc<ApiMetrics>,
    cancel: CancellationToken,
) -> Result<RecommendationEngine> {
    let client = GeminiClient::from_config(config).context("Failed to build Gemini client")?;
    if config.gemini_api_key.is_none() {
        log::warn!("No Gemini API key configured, recommendations will come from the fallback");
    }

    let generator = RecommendationGenerator::from_config(Arc::new(client), config)
        .with_cancellation(cancel)
        .with_metrics(metrics.clone());

    Ok(
        RecommendationEngine::new(RecommendationCache::new(store, config.cache_ttl()), generator)
            .with_desired_count(config.desired_count)
            .with_metrics(metrics),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    if let Some(path) = &cli.database {
        config.database_path = path.clone();
    }

    let store = open_store(&cli, &config).await?;
    let metrics = Arc::new(ApiMetrics::new());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, skipping remaining retry delays");
            on_interrupt.cancel();
        }
    });

    let engine = build_engine(&config, store, metrics.clone(), cancel)?;

    match &cli.command {
        Command::Recommend(args) => {
            let request = PageRequest::new(args.seed.seed_key()?, args.seed_tracks()?)
                .with_page(args.offset, args.limit)
                .with_steering(args.steering.clone())
                .with_force_clear(args.clear_cache);

            let page = engine
                .get_page(&request)
                .await
                .map_err(|e| anyhow::anyhow!("{} ({:?})", e, e.class()))?;
            log::info!(
                "Page {}..{} of {} recommendations",
                page.offset,
                page.offset + page.len(),
                page.total
            );
            println!("{}", serde_json::to_string_pretty(&page.entries)?);
        }
        Command::Clear(args) => {
            let seed = args.seed.seed_key()?;
            if args.with_steering {
                engine.clear_seed_data(&seed).await?;
            } else {
                engine.clear_recommendations(&seed).await?;
            }
        }
        Command::ClearAll => {
            let removed = engine.clear_all_caches().await?;
            println!("{}", serde_json::json!({ "removed": removed }));
        }
        Command::Evict => {
            let removed = engine.evict_expired().await?;
            println!("{}", serde_json::json!({ "evicted": removed }));
        }
    }

    log::debug!(
        "Metrics: {}",
        serde_json::to_string(&metrics.snapshot()).unwrap_or_default()
    );
    Ok(())
}
