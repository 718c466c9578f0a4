//! Transport + retry/backoff + response cache + JSON decode (§4.2).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use tokio::time::sleep;

use crate::cache::{CacheOrchestrator, CachePolicy};
use crate::rate_limiter::RateLimiter;
use crate::utils::debug_flags::DebugFlags;
use crate::utils::hashing::hash_generic_key;

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpExecutorError {
    #[error("no rate limiter configured for api '{0}'")]
    UnknownApi(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("exhausted {0} retries for api '{1}'")]
    RetriesExhausted(u32, String),
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub extra_headers: Vec<(String, String)>,
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: Vec::new(),
            extra_headers: Vec::new(),
            max_retries: None,
            timeout: None,
        }
    }
}

fn build_cache_key(api_name: &str, url: &str, params: &[(String, String)]) -> String {
    let mut sorted = params.to_vec();
    sorted.sort();
    let normalized = serde_json::json!(["api_request", api_name, url, sorted]);
    hash_generic_key(&normalized.to_string())
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_json_like_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains("application/json") || ct.contains("text/javascript")
}

pub struct HttpRequestExecutor {
    client: Client,
    cache: Arc<CacheOrchestrator>,
    rate_limiters: HashMap<String, Arc<RateLimiter>>,
    default_headers: Vec<(String, String)>,
    default_max_retries: u32,
    default_retry_delay: f64,
    cache_ttl_days: u64,
    debug: DebugFlags,
}

impl HttpRequestExecutor {
    pub fn new(
        client: Client,
        cache: Arc<CacheOrchestrator>,
        rate_limiters: HashMap<String, Arc<RateLimiter>>,
        default_headers: Vec<(String, String)>,
        default_max_retries: u32,
        default_retry_delay: f64,
        cache_ttl_days: u64,
        debug: DebugFlags,
    ) -> Self {
        Self {
            client,
            cache,
            rate_limiters,
            default_headers,
            default_max_retries,
            default_retry_delay,
            cache_ttl_days,
            debug,
        }
    }

    pub async fn get_json(
        &self,
        api_name: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Option<serde_json::Value>, HttpExecutorError> {
        let cache_key = build_cache_key(api_name, url, &options.query);

        if let Some(cached) = self.cache.generic_get(&cache_key).await {
            return Ok(match cached {
                serde_json::Value::Object(map) if map.is_empty() => None,
                serde_json::Value::Object(_) => Some(cached),
                _ => None,
            });
        }

        let limiter = self
            .rate_limiters
            .get(api_name)
            .ok_or_else(|| HttpExecutorError::UnknownApi(api_name.to_string()))?;

        let max_retries = options.max_retries.unwrap_or(self.default_max_retries);
        let mut attempt = 0u32;

        loop {
            limiter.acquire().await;

            if self.debug.api_enabled() {
                log::debug!("GET {url} (api={api_name}, attempt={attempt})");
            }

            let mut request = self.client.get(url).query(&options.query);
            for (name, value) in self.default_headers.iter().chain(options.extra_headers.iter()) {
                request = request.header(name, value);
            }
            if let Some(timeout) = options.timeout {
                request = request.timeout(timeout);
            }

            let outcome = request.send().await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let content_type = response
                            .headers()
                            .get(reqwest::header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();

                        let body = response
                            .text()
                            .await
                            .map_err(|e| HttpExecutorError::Transport(e.to_string()))?;

                        if !is_json_like_content_type(&content_type) {
                            self.cache_negative(&cache_key).await;
                            return Ok(None);
                        }

                        match serde_json::from_str::<serde_json::Value>(&body) {
                            Ok(value @ serde_json::Value::Object(_)) => {
                                self.cache_success(&cache_key, &value).await;
                                return Ok(Some(value));
                            }
                            _ => {
                                self.cache_negative(&cache_key).await;
                                return Ok(None);
                            }
                        }
                    } else if is_retryable_status(status) {
                        if attempt >= max_retries {
                            log::warn!("api '{api_name}' exhausted retries at status {status}");
                            return Err(HttpExecutorError::RetriesExhausted(max_retries, api_name.to_string()));
                        }
                        self.backoff_sleep(attempt).await;
                        attempt += 1;
                        continue;
                    } else {
                        // Permanent remote failure: caller receives nil, no retry.
                        self.cache_negative(&cache_key).await;
                        return Ok(None);
                    }
                }
                Err(err) => {
                    let retryable = err.is_timeout() || err.is_connect() || err.is_request();
                    if !retryable || attempt >= max_retries {
                        log::warn!("transport failure for api '{api_name}': {err}");
                        return Ok(None);
                    }
                    self.backoff_sleep(attempt).await;
                    attempt += 1;
                    continue;
                }
            }
        }
    }

    async fn cache_success(&self, key: &str, value: &serde_json::Value) {
        let _ = self.cache_ttl_days;
        self.cache.generic_set(key, value.clone(), CachePolicy::SuccessfulApiMetadata).await;
    }

    async fn cache_negative(&self, key: &str) {
        self.cache
            .generic_set(key, serde_json::json!({}), CachePolicy::FailedApiLookup)
            .await;
    }

    async fn backoff_sleep(&self, attempt: u32) {
        let base = self.default_retry_delay;
        let exp = base * 2f64.powi(attempt as i32);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        let delay = (exp * jitter).min(120.0);
        if delay > 15.0 {
            log::warn!("long retry delay: {delay:.1}s (attempt {attempt})");
        }
        sleep(Duration::from_secs_f64(delay)).await;
    }
}
