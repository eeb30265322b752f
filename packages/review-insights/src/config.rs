use anyhow::{Context, Result};
use dotenvy::dotenv;
use openai_client::{OpenAIClient, OPENROUTER_BASE_URL};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::analyst::{AnswerConfig, DEFAULT_MODEL};
use crate::chunking::DEFAULT_MAX_TOKENS_PER_CHUNK;
use crate::invoker::{RateLimiter, RetryPolicy};
use crate::loader::{BrowserOptions, LoadConfig, DEFAULT_SCROLL_PAUSE, DEFAULT_SCROLL_TIMES};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Needed only for question answering
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_requests_per_minute: u32,
    pub llm_max_retries: u32,
    pub llm_retry_base: Duration,
    pub max_tokens_per_chunk: usize,
    pub browser_headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub scroll_times: u32,
    pub scroll_pause: Duration,
    pub initial_wait: Duration,
    pub snapshot_path: Option<PathBuf>,
    pub google_places_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(Self {
            llm_api_key: var("LLM_API_KEY")
                .or_else(|| var("OPENROUTER_API_KEY"))
                .or_else(|| var("OPENAI_API_KEY")),
            llm_base_url: var("LLM_BASE_URL").unwrap_or_else(|| OPENROUTER_BASE_URL.to_string()),
            llm_model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_requests_per_minute: parse_or(var("LLM_REQUESTS_PER_MINUTE"), "LLM_REQUESTS_PER_MINUTE", 3)?,
            llm_max_retries: parse_or(var("LLM_MAX_RETRIES"), "LLM_MAX_RETRIES", 5)?,
            llm_retry_base: Duration::from_millis(parse_or(
                var("LLM_RETRY_BASE_MS"),
                "LLM_RETRY_BASE_MS",
                1000,
            )?),
            max_tokens_per_chunk: parse_or(
                var("MAX_TOKENS_PER_CHUNK"),
                "MAX_TOKENS_PER_CHUNK",
                DEFAULT_MAX_TOKENS_PER_CHUNK,
            )?,
            browser_headless: parse_or(var("BROWSER_HEADLESS"), "BROWSER_HEADLESS", true)?,
            chrome_executable: var("CHROME_EXECUTABLE").map(PathBuf::from),
            scroll_times: parse_or(var("SCROLL_TIMES"), "SCROLL_TIMES", DEFAULT_SCROLL_TIMES)?,
            scroll_pause: Duration::from_millis(parse_or(
                var("SCROLL_PAUSE_MS"),
                "SCROLL_PAUSE_MS",
                DEFAULT_SCROLL_PAUSE.as_millis() as u64,
            )?),
            initial_wait: Duration::from_secs(parse_or(var("INITIAL_WAIT_SECS"), "INITIAL_WAIT_SECS", 20)?),
            snapshot_path: var("SNAPSHOT_PATH").map(PathBuf::from),
            google_places_api_key: var("GOOGLE_PLACES_API_KEY"),
        })
    }

    pub fn load_config(&self) -> LoadConfig {
        let config = LoadConfig::new(self.scroll_times, self.scroll_pause);
        match &self.snapshot_path {
            Some(path) => config.with_snapshot_path(path.clone()),
            None => config,
        }
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            headless: self.browser_headless,
            chrome_executable: self.chrome_executable.clone(),
            initial_wait: self.initial_wait,
            ..Default::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.llm_max_retries, self.llm_retry_base)
    }

    /// One limiter per credential; share it across every invoker.
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::per_minute(self.llm_requests_per_minute))
    }

    pub fn answer_config(&self) -> AnswerConfig {
        AnswerConfig {
            model: self.llm_model.clone(),
            max_tokens_per_chunk: self.max_tokens_per_chunk,
            ..Default::default()
        }
    }

    pub fn openai_client(&self) -> Result<OpenAIClient> {
        let api_key = self
            .llm_api_key
            .clone()
            .context("LLM_API_KEY (or OPENROUTER_API_KEY / OPENAI_API_KEY) must be set")?;
        Ok(OpenAIClient::new(api_key).with_base_url(&self.llm_base_url))
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid {}", name, std::any::type_name::<T>())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[]).unwrap();

        assert_eq!(config.llm_api_key, None);
        assert_eq!(config.llm_base_url, OPENROUTER_BASE_URL);
        assert_eq!(config.llm_model, DEFAULT_MODEL);
        assert_eq!(config.rate_limiter().min_interval(), Duration::from_secs(20));
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.retry_policy().base_delay, Duration::from_secs(1));
        assert_eq!(config.max_tokens_per_chunk, 1000);
        assert!(config.browser_headless);
        assert_eq!(config.load_config().scroll_times, 15);
        assert_eq!(config.load_config().scroll_pause, Duration::from_millis(1500));
        assert_eq!(config.browser_options().initial_wait, Duration::from_secs(20));
        assert!(config.openai_client().is_err());
    }

    #[test]
    fn test_api_key_fallback_order() {
        let config =
            from_vars(&[("OPENAI_API_KEY", "sk-openai"), ("OPENROUTER_API_KEY", "sk-or")]).unwrap();
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-or"));

        let config =
            from_vars(&[("LLM_API_KEY", "sk-primary"), ("OPENROUTER_API_KEY", "sk-or")]).unwrap();
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-primary"));

        let config = from_vars(&[("LLM_API_KEY", "  ")]).unwrap();
        assert_eq!(config.llm_api_key, None);
    }

    #[test]
    fn test_overrides() {
        let config = from_vars(&[
            ("LLM_REQUESTS_PER_MINUTE", "60"),
            ("SCROLL_TIMES", "3"),
            ("SCROLL_PAUSE_MS", "250"),
            ("BROWSER_HEADLESS", "false"),
            ("SNAPSHOT_PATH", "debug_final.html"),
        ])
        .unwrap();

        assert_eq!(config.rate_limiter().min_interval(), Duration::from_secs(1));
        assert!(!config.browser_headless);
        let load = config.load_config();
        assert_eq!(load.scroll_times, 3);
        assert_eq!(load.scroll_pause, Duration::from_millis(250));
        assert_eq!(load.snapshot_path, Some(PathBuf::from("debug_final.html")));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = from_vars(&[("SCROLL_TIMES", "many")]).unwrap_err();
        assert!(err.to_string().contains("SCROLL_TIMES"));
    }
}
