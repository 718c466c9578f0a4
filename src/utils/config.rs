//! Top-level configuration. A single YAML file is loaded once at startup
//! and memoized behind a `OnceLock`, mirroring the teacher's
//! `utils/config.rs::get_config()` pattern — only the parser changed (YAML
//! instead of TOML) because this system's config format is YAML per spec §6.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigLoadingError {
    #[error("Failed to read the config ({0}): {1}")]
    FailedToReadConfig(String, String),

    #[error("Failed to parse the config: {0}")]
    FailedToParseConfig(String),

    #[error("Required config section missing or invalid: {0}")]
    MissingSection(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub music_library_path: PathBuf,
    #[serde(default)]
    pub logs_base_dir: Option<PathBuf>,
    #[serde(default)]
    pub dry_run: bool,

    pub library_concurrency: usize,
    #[serde(default)]
    pub library_timeouts: LibraryTimeouts,
    #[serde(default)]
    pub library_rate_limit: LibraryRateLimit,
    #[serde(default)]
    pub library_retry: LibraryRetry,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,

    pub batch_processing: BatchProcessingConfig,
    pub year_retrieval: YearRetrievalConfig,
    pub caching: CachingConfig,
    #[serde(default)]
    pub pending_verification: PendingVerificationConfig,
    #[serde(default)]
    pub album_type_detection: AlbumTypeDetectionConfig,
    pub album_years_cache_file: PathBuf,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryTimeouts {
    #[serde(default = "default_timeout")]
    pub default: u64,
    #[serde(default = "default_full_fetch_timeout")]
    pub full_library_fetch: u64,
    #[serde(default = "default_timeout")]
    pub single_artist_fetch: u64,
    #[serde(default = "default_timeout")]
    pub batch_update: u64,
    #[serde(default = "default_timeout")]
    pub ids_batch_fetch: u64,
}

fn default_timeout() -> u64 {
    30
}
fn default_full_fetch_timeout() -> u64 {
    300
}

impl Default for LibraryTimeouts {
    fn default() -> Self {
        Self {
            default: default_timeout(),
            full_library_fetch: default_full_fetch_timeout(),
            single_artist_fetch: default_timeout(),
            batch_update: default_timeout(),
            ids_batch_fetch: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryRateLimit {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_size_seconds: f64,
}

fn default_requests_per_window() -> u32 {
    10
}
fn default_window_seconds() -> f64 {
    1.0
}

impl Default for LibraryRateLimit {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_window: default_requests_per_window(),
            window_size_seconds: default_window_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryRetry {
    #[serde(default = "default_max_retries_u32")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub base_delay_seconds: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,
    #[serde(default = "default_jitter")]
    pub jitter_range: f64,
    #[serde(default = "default_timeout")]
    pub operation_timeout_seconds: u64,
}

fn default_max_retries_u32() -> u32 {
    3
}
fn default_max_delay() -> f64 {
    10.0
}
fn default_jitter() -> f64 {
    0.2
}

impl Default for LibraryRetry {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries_u32(),
            base_delay_seconds: default_retry_delay(),
            max_delay_seconds: default_max_delay(),
            jitter_range: default_jitter(),
            operation_timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchProcessingConfig {
    #[serde(default = "default_ids_batch_size")]
    pub ids_batch_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_ids_batch_size() -> usize {
    200
}
fn default_batch_size() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct YearRetrievalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub preferred_api: String,
    #[serde(default)]
    pub api_auth: ApiAuthConfig,
    pub rate_limits: RateLimitsConfig,
    pub processing: ProcessingConfig,
    pub logic: LogicConfig,
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub reissue_detection: ReissueDetectionConfig,
    #[serde(default)]
    pub script_api_priorities: HashMap<String, ScriptApiPriority>,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiAuthConfig {
    pub discogs_token: Option<String>,
    pub musicbrainz_app_name: Option<String>,
    pub contact_email: Option<String>,
    pub lastfm_api_key: Option<String>,
    #[serde(default)]
    pub use_lastfm: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(default = "default_discogs_rpm")]
    pub discogs_requests_per_minute: u32,
    #[serde(default = "default_mb_rps")]
    pub musicbrainz_requests_per_second: f64,
    #[serde(default = "default_lastfm_rps")]
    pub lastfm_requests_per_second: f64,
    #[serde(default = "default_itunes_rps")]
    pub itunes_requests_per_second: f64,
    #[serde(default = "default_concurrent_calls")]
    pub concurrent_api_calls: usize,
}

fn default_discogs_rpm() -> u32 {
    60
}
fn default_mb_rps() -> f64 {
    1.0
}
fn default_lastfm_rps() -> f64 {
    5.0
}
fn default_itunes_rps() -> f64 {
    20.0
}
fn default_concurrent_calls() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub delay_between_batches: f64,
    #[serde(default)]
    pub adaptive_delay: bool,
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u64,
    #[serde(default = "default_pending_interval")]
    pub pending_verification_interval_days: u32,
    #[serde(default = "default_true")]
    pub skip_prerelease: bool,
    #[serde(default = "default_future_threshold")]
    pub future_year_threshold: i32,
    #[serde(default = "default_prerelease_recheck")]
    pub prerelease_recheck_days: u32,
    #[serde(default = "default_track_retry_attempts")]
    pub track_retry_attempts: u32,
    #[serde(default = "default_track_retry_delay")]
    pub track_retry_delay: f64,
}

fn default_cache_ttl_days() -> u64 {
    30
}
fn default_pending_interval() -> u32 {
    7
}
fn default_future_threshold() -> i32 {
    1
}
fn default_prerelease_recheck() -> u32 {
    14
}
fn default_track_retry_attempts() -> u32 {
    3
}
fn default_track_retry_delay() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogicConfig {
    #[serde(default = "default_min_valid_year")]
    pub min_valid_year: i32,
    #[serde(default = "default_absurd_year")]
    pub absurd_year_threshold: i32,
    #[serde(default = "default_suspicion_threshold")]
    pub suspicion_threshold_years: i32,
    #[serde(default = "default_definitive_threshold")]
    pub definitive_score_threshold: i32,
    #[serde(default = "default_definitive_diff")]
    pub definitive_score_diff: i32,
    #[serde(default)]
    pub min_confidence_for_new_year: i32,
    #[serde(default)]
    pub preferred_countries: Vec<String>,
    #[serde(default)]
    pub major_market_codes: Vec<String>,
}

fn default_min_valid_year() -> i32 {
    1900
}
fn default_absurd_year() -> i32 {
    1970
}
fn default_suspicion_threshold() -> i32 {
    5
}
fn default_definitive_threshold() -> i32 {
    70
}
fn default_definitive_diff() -> i32 {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub base_score: HashMap<String, i32>,
    #[serde(default = "default_artist_match_bonus")]
    pub artist_exact_match_bonus: i32,
    #[serde(default = "default_album_match_bonus")]
    pub album_exact_match_bonus: i32,
    #[serde(default = "default_perfect_match_bonus")]
    pub perfect_match_bonus: i32,
    #[serde(default)]
    pub album_variation_bonus: i32,
    #[serde(default)]
    pub album_substring_penalty: i32,
    #[serde(default)]
    pub album_unrelated_penalty: i32,
    #[serde(default)]
    pub release_group_match_bonus: i32,
    #[serde(default)]
    pub album_type_bonus: i32,
    #[serde(default)]
    pub ep_single_penalty: i32,
    #[serde(default)]
    pub compilation_live_penalty: i32,
    #[serde(default)]
    pub status_official_bonus: i32,
    #[serde(default)]
    pub status_bootleg_promo_penalty: i32,
    #[serde(default)]
    pub reissue_penalty: i32,
    #[serde(default)]
    pub year_diff_penalty_scale: i32,
    #[serde(default)]
    pub year_diff_penalty_cap: i32,
    #[serde(default)]
    pub year_before_activity_penalty: i32,
    #[serde(default)]
    pub year_after_activity_penalty: i32,
    #[serde(default)]
    pub year_near_activity_start_bonus: i32,
    #[serde(default)]
    pub artist_region_match_bonus: i32,
    #[serde(default)]
    pub major_market_bonus: i32,
    #[serde(default)]
    pub musicbrainz_source_bonus: i32,
    #[serde(default)]
    pub discogs_source_bonus: i32,
    #[serde(default)]
    pub itunes_source_bonus: i32,
    #[serde(default)]
    pub future_year_penalty: i32,
    #[serde(default)]
    pub cross_script_artist_penalty: i32,
    #[serde(default)]
    pub soundtrack_compensation: i32,
}

fn default_artist_match_bonus() -> i32 {
    20
}
fn default_album_match_bonus() -> i32 {
    20
}
fn default_perfect_match_bonus() -> i32 {
    15
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReissueDetectionConfig {
    #[serde(default = "default_reissue_keywords")]
    pub reissue_keywords: Vec<String>,
}

fn default_reissue_keywords() -> Vec<String> {
    vec![
        "remaster".into(),
        "remastered".into(),
        "reissue".into(),
        "anniversary".into(),
        "deluxe".into(),
        "expanded".into(),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptApiPriority {
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub fallback: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_year_diff_threshold")]
    pub year_difference_threshold: i32,
    #[serde(default)]
    pub trust_api_score_threshold: i32,
}

fn default_year_diff_threshold() -> i32 {
    5
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            year_difference_threshold: default_year_diff_threshold(),
            trust_api_score_threshold: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CachingConfig {
    #[serde(default = "default_generic_ttl")]
    pub default_ttl_seconds: u64,
    #[serde(default = "default_sync_interval")]
    pub album_cache_sync_interval: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    #[serde(default = "default_negative_ttl")]
    pub negative_result_ttl: u64,
    pub api_result_cache_path: PathBuf,
    #[serde(default)]
    pub library_snapshot: LibrarySnapshotConfig,
    #[serde(default = "default_max_generic_entries")]
    pub max_generic_entries: usize,
}

fn default_generic_ttl() -> u64 {
    3600
}
fn default_sync_interval() -> u64 {
    300
}
fn default_cleanup_interval() -> u64 {
    600
}
fn default_negative_ttl() -> u64 {
    30 * 86400
}
fn default_max_generic_entries() -> usize {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySnapshotConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub delta_enabled: bool,
    pub cache_file: PathBuf,
    #[serde(default = "default_snapshot_max_age")]
    pub max_age_hours: u64,
    #[serde(default)]
    pub compress: bool,
    #[serde(default = "default_compress_level")]
    pub compress_level: u32,
}

fn default_snapshot_max_age() -> u64 {
    24
}
fn default_compress_level() -> u32 {
    6
}

impl Default for LibrarySnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delta_enabled: false,
            cache_file: PathBuf::from("data/snapshot.json"),
            max_age_hours: default_snapshot_max_age(),
            compress: false,
            compress_level: default_compress_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PendingVerificationConfig {
    #[serde(default = "default_auto_verify_days")]
    pub auto_verify_days: u32,
}

fn default_auto_verify_days() -> u32 {
    14
}

impl Default for PendingVerificationConfig {
    fn default() -> Self {
        Self {
            auto_verify_days: default_auto_verify_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlbumTypeDetectionConfig {
    #[serde(default)]
    pub special_patterns: Vec<String>,
    #[serde(default)]
    pub compilation_patterns: Vec<String>,
    #[serde(default)]
    pub reissue_patterns: Vec<String>,
    #[serde(default)]
    pub soundtrack_patterns: Vec<String>,
    #[serde(default)]
    pub various_artists_names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_problematic_path")]
    pub problematic_albums_path: PathBuf,
    #[serde(default = "default_min_attempts")]
    pub min_attempts_for_report: u32,
    #[serde(default)]
    pub change_display_mode: String,
}

fn default_problematic_path() -> PathBuf {
    PathBuf::from("data/problematic_albums.csv")
}
fn default_min_attempts() -> u32 {
    3
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            problematic_albums_path: default_problematic_path(),
            min_attempts_for_report: default_min_attempts(),
            change_display_mode: "summary".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_change_log_path")]
    pub change_log_path: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_change_log_path() -> PathBuf {
    PathBuf::from("data/change_log.jsonl")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            change_log_path: default_change_log_path(),
        }
    }
}

/// Replaces `${VAR}` placeholders with the corresponding environment
/// variable, leaving the placeholder untouched when the variable is unset
/// (letting the eventual YAML value be an empty or literal `${VAR}` string
/// that downstream validation can reject).
fn substitute_env_placeholders(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    let bytes = raw.as_bytes();

    let mut i = 0;
    while i < raw.len() {
        if bytes[i] == b'$' && i + 1 < raw.len() && bytes[i + 1] == b'{' {
            if let Some(end) = raw[i + 2..].find('}') {
                let var_name = &raw[i + 2..i + 2 + end];
                match std::env::var(var_name) {
                    Ok(val) => result.push_str(&val),
                    Err(_) => result.push_str(&raw[i..i + 2 + end + 1]),
                }
                i += 2 + end + 1;
                continue;
            }
        }
        let ch = raw[i..].chars().next().unwrap();
        result.push(ch);
        i += ch.len_utf8();
    }
    let _ = &mut chars;
    result
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadingError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ConfigLoadingError::FailedToReadConfig(path.display().to_string(), err.to_string()))?;
        let substituted = substitute_env_placeholders(&raw);
        let config: Config = serde_yaml::from_str(&substituted)
            .map_err(|err| ConfigLoadingError::FailedToParseConfig(err.to_string()))?;

        Ok(config)
    }

    pub fn load() -> Result<Self, ConfigLoadingError> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from(Path::new(&path))
    }
}

pub fn get_config() -> Result<&'static Config, ConfigLoadingError> {
    static CONFIG: OnceLock<Result<Config, ConfigLoadingError>> = OnceLock::new();

    let result = CONFIG.get_or_init(Config::load);

    match result {
        Ok(config) => Ok(config),
        Err(err) => Err(err.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_env_var() {
        unsafe { std::env::set_var("TEST_YEAR_RECONCILER_TOKEN", "secret123") };
        let rendered = substitute_env_placeholders("token: ${TEST_YEAR_RECONCILER_TOKEN}");
        assert_eq!(rendered, "token: secret123");
        unsafe { std::env::remove_var("TEST_YEAR_RECONCILER_TOKEN") };
    }

    #[test]
    fn leaves_unset_placeholder_untouched() {
        let rendered = substitute_env_placeholders("token: ${DEFINITELY_UNSET_VAR_XYZ}");
        assert_eq!(rendered, "token: ${DEFINITELY_UNSET_VAR_XYZ}");
    }
}
