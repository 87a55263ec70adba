use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_POPULAR_PAGES: u32 = 5;
pub const DEFAULT_RATINGS_FILE: &str = "cinerate_ratings.json";

/// Variables that must be present before anything talks to TMDB.
pub const REQUIRED_VARS: [&str; 1] = ["TMDB_API_KEY"];

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub image_base_url: String,
    pub language: String,
    pub guest_session_id: Option<String>,
    pub debounce: Duration,
    pub popular_pages: u32,
    pub ratings_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        let base_url = get("TMDB_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let image_base_url = get("TMDB_IMAGE_BASE_URL")
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let language = get("TMDB_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let debounce_ms = match get("CINERATE_DEBOUNCE_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("CINERATE_DEBOUNCE_MS must be milliseconds, got '{raw}'"))?,
            None => DEFAULT_DEBOUNCE_MS,
        };
        let popular_pages = match get("CINERATE_POPULAR_PAGES") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .with_context(|| {
                    format!("CINERATE_POPULAR_PAGES must be a positive integer, got '{raw}'")
                })?,
            None => DEFAULT_POPULAR_PAGES,
        };
        let ratings_file = get("CINERATE_RATINGS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RATINGS_FILE));

        Ok(Self {
            api_key,
            base_url,
            image_base_url,
            language,
            guest_session_id: get("TMDB_GUEST_SESSION_ID"),
            debounce: Duration::from_millis(debounce_ms),
            popular_pages,
            ratings_file,
        })
    }
}
