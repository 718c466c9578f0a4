//! Process entry point: loads configuration, wires the cache, provider,
//! orchestrator, and decision layers described in §4, then drives either the
//! `run` or `pending` CLI subcommand (§6).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Datelike;
use clap::Parser;

use year_reconciler::batch::{AlbumOutcome, BatchProcessor, BatchProcessorConfig, OutcomeKind};
use year_reconciler::cache::CacheOrchestrator;
use year_reconciler::cli::{Cli, Command};
use year_reconciler::decision::{Determinator, YearFallbackHandler};
use year_reconciler::http::HttpRequestExecutor;
use year_reconciler::library::{DryRunLibraryClient, JsonFileLibraryClient, LibraryClient};
use year_reconciler::orchestrator::ApiOrchestrator;
use year_reconciler::pending::PendingVerificationStore;
use year_reconciler::providers::discogs::DiscogsClient;
use year_reconciler::providers::itunes::ITunesClient;
use year_reconciler::providers::lastfm::LastFmClient;
use year_reconciler::providers::musicbrainz::MusicBrainzClient;
use year_reconciler::providers::ProviderClient;
use year_reconciler::rate_limiter::RateLimiter;
use year_reconciler::scoring::{scoring_fn_from_config, YearScoreResolver};
use year_reconciler::snapshot::LibrarySnapshot;
use year_reconciler::utils::config::{get_config, Config};
use year_reconciler::utils::debug_flags::DebugFlags;

fn init_logging(config: &Config) {
    let level = match config.logging.level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    env_logger::Builder::new().filter_level(level).format_timestamp_millis().init();
}

fn build_rate_limiters(config: &Config) -> Result<HashMap<String, Arc<RateLimiter>>, Box<dyn std::error::Error>> {
    let limits = &config.year_retrieval.rate_limits;
    let mut limiters = HashMap::new();
    limiters.insert(
        "musicbrainz".to_string(),
        Arc::new(RateLimiter::new(1, 1.0 / limits.musicbrainz_requests_per_second.max(0.001))?),
    );
    limiters.insert(
        "discogs".to_string(),
        Arc::new(RateLimiter::new(limits.discogs_requests_per_minute, 60.0)?),
    );
    limiters.insert(
        "lastfm".to_string(),
        Arc::new(RateLimiter::new(1, 1.0 / limits.lastfm_requests_per_second.max(0.001))?),
    );
    limiters.insert(
        "itunes".to_string(),
        Arc::new(RateLimiter::new(1, 1.0 / limits.itunes_requests_per_second.max(0.001))?),
    );
    Ok(limiters)
}

fn build_providers(
    http: Arc<HttpRequestExecutor>,
    config: &Config,
    current_year: i32,
) -> (HashMap<String, Arc<dyn ProviderClient>>, Arc<MusicBrainzClient>) {
    let scoring_fn = scoring_fn_from_config(config.year_retrieval.scoring.clone(), config.year_retrieval.logic.major_market_codes.clone());
    let reissue_keywords = config.year_retrieval.reissue_detection.reissue_keywords.clone();

    let musicbrainz = Arc::new(MusicBrainzClient::new(http.clone(), scoring_fn.clone(), current_year));
    let discogs = Arc::new(DiscogsClient::new(http.clone(), scoring_fn.clone(), current_year, reissue_keywords.clone()));
    let itunes = Arc::new(ITunesClient::new(http.clone(), scoring_fn.clone(), current_year, "US".to_string()));

    let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
    providers.insert("musicbrainz".to_string(), musicbrainz.clone());
    providers.insert("discogs".to_string(), discogs);
    providers.insert("itunes".to_string(), itunes);

    if config.year_retrieval.api_auth.use_lastfm {
        if let Some(api_key) = config.year_retrieval.api_auth.lastfm_api_key.clone() {
            let lastfm = Arc::new(LastFmClient::new(http.clone(), scoring_fn.clone(), current_year, api_key, reissue_keywords));
            providers.insert("lastfm".to_string(), lastfm);
        } else {
            log::warn!("year_retrieval.api_auth.use_lastfm is set but no lastfm_api_key is configured; skipping Last.fm");
        }
    }

    (providers, musicbrainz)
}

async fn run_pipeline<C: LibraryClient + 'static>(
    determinator: Arc<Determinator>,
    library: Arc<C>,
    config: &Config,
    force: bool,
    test_artist: Option<String>,
) -> Result<Vec<AlbumOutcome>, Box<dyn std::error::Error>> {
    let snapshot_cfg = &config.caching.library_snapshot;
    let tracks = if snapshot_cfg.enabled {
        let snapshot = LibrarySnapshot::new(
            snapshot_cfg.cache_file.clone(),
            snapshot_cfg.max_age_hours,
            snapshot_cfg.delta_enabled,
            snapshot_cfg.compress,
        );
        snapshot.get_tracks(library.as_ref()).await?
    } else {
        library.fetch_tracks(test_artist.as_deref(), None, None, None).await?
    };

    let tracks = if snapshot_cfg.enabled {
        match &test_artist {
            Some(artist) => tracks.into_iter().filter(|t| t.artist().eq_ignore_ascii_case(artist)).collect(),
            None => tracks,
        }
    } else {
        tracks
    };

    log::info!("fetched {} tracks for reconciliation", tracks.len());

    let processor_config = BatchProcessorConfig {
        batch_size: config.year_retrieval.processing.batch_size,
        delay_between_batches: config.year_retrieval.processing.delay_between_batches,
        adaptive_delay: config.year_retrieval.processing.adaptive_delay,
        library_concurrency: config.library_concurrency,
        concurrent_api_calls: config.year_retrieval.rate_limits.concurrent_api_calls,
        track_retry_attempts: config.year_retrieval.processing.track_retry_attempts,
        track_retry_delay: config.year_retrieval.processing.track_retry_delay,
        force,
    };

    let processor = BatchProcessor::new(determinator, library, config.logging.change_log_path.clone(), processor_config);
    Ok(processor.run(tracks).await?)
}

fn print_summary(outcomes: &[AlbumOutcome]) {
    let mut updated = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for outcome in outcomes {
        match &outcome.decision {
            OutcomeKind::Updated { year, tracks_changed } => {
                updated += 1;
                println!("updated: {} - {} -> {year} ({tracks_changed} tracks)", outcome.artist, outcome.album);
            }
            OutcomeKind::Skipped => skipped += 1,
            OutcomeKind::Failed(reason) => {
                failed += 1;
                println!("failed: {} - {}: {reason}", outcome.artist, outcome.album);
            }
        }
    }
    println!("\n{updated} updated, {skipped} skipped, {failed} failed ({} albums total)", outcomes.len());
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_config()?;
    init_logging(config);

    let cli = Cli::parse();
    let debug = DebugFlags::from_env();

    let cache = Arc::new(CacheOrchestrator::new(
        config.album_years_cache_file.clone(),
        config.caching.api_result_cache_path.clone(),
        "data/generic_cache.json",
        config.caching.max_generic_entries,
        config.caching.default_ttl_seconds,
        config.caching.negative_result_ttl,
    ));
    cache.load_from_disk().await?;

    let current_year = chrono::Utc::now().year();
    let client = reqwest::Client::new();
    let rate_limiters = build_rate_limiters(config)?;
    let http = Arc::new(HttpRequestExecutor::new(
        client,
        cache.clone(),
        rate_limiters,
        Vec::new(),
        config.max_retries,
        config.retry_delay_seconds,
        config.year_retrieval.processing.cache_ttl_days,
        debug,
    ));

    let (providers, musicbrainz) = build_providers(http, config, current_year);

    let pending = Arc::new(PendingVerificationStore::new(
        "data/pending_verification.csv",
        config.year_retrieval.processing.pending_verification_interval_days,
        config.pending_verification.auto_verify_days,
    ));
    pending.load().await?;

    let resolver = YearScoreResolver::new(
        config.year_retrieval.logic.min_valid_year,
        current_year,
        config.year_retrieval.logic.definitive_score_threshold,
        config.year_retrieval.logic.definitive_score_diff,
    );

    let orchestrator = Arc::new(ApiOrchestrator::new(providers, musicbrainz, resolver, pending.clone(), config, current_year));

    let fallback = YearFallbackHandler::new(
        pending.clone(),
        config.album_type_detection.clone(),
        config.year_retrieval.fallback.enabled,
        config.year_retrieval.logic.absurd_year_threshold,
        config.year_retrieval.fallback.year_difference_threshold,
    );

    let determinator = Arc::new(Determinator::new(
        cache.clone(),
        orchestrator,
        fallback,
        pending.clone(),
        current_year,
        config.year_retrieval.processing.future_year_threshold,
        config.year_retrieval.processing.prerelease_recheck_days,
    ));

    match cli.command {
        Command::Run { force, dry_run, test_artist } => {
            let outcomes = if dry_run {
                let library = Arc::new(DryRunLibraryClient::new(JsonFileLibraryClient::new(config.music_library_path.clone())));
                run_pipeline(determinator, library, config, force, test_artist).await?
            } else {
                let library = Arc::new(JsonFileLibraryClient::new(config.music_library_path.clone()));
                run_pipeline(determinator, library, config, force, test_artist).await?
            };
            print_summary(&outcomes);
        }
        Command::Pending => {
            let count = pending
                .generate_problematic_albums_report(&config.reporting.problematic_albums_path, config.reporting.min_attempts_for_report)
                .await?;
            println!("{count} albums awaiting manual verification written to {}", config.reporting.problematic_albums_path.display());
        }
    }

    cache.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("year-reconciler: {err}");
        std::process::exit(1);
    }
}
