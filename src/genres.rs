use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::models::Genre;
use crate::tmdb::MovieApi;

pub const UNKNOWN_GENRE: &str = "N/A";

struct GenreCache {
    genres: Arc<[Genre]>,
    by_id: HashMap<i64, String>,
}

/// Session-wide genre id -> name cache. Loaded once, never refreshed.
#[derive(Default)]
pub struct GenreDirectory {
    cache: OnceCell<GenreCache>,
    notice: Mutex<Option<String>>,
}

impl GenreDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the genre list on first call; later and concurrent calls share that result.
    /// A failed fetch caches an empty list and records a notice.
    pub async fn load(&self, api: &dyn MovieApi) -> Arc<[Genre]> {
        let cache = self
            .cache
            .get_or_init(|| async {
                let genres = match api.fetch_genres().await {
                    Ok(genres) => {
                        info!("Loaded {} genres", genres.len());
                        genres
                    }
                    Err(e) => {
                        warn!("Failed to load genres: {}", e);
                        *self
                            .notice
                            .lock()
                            .unwrap_or_else(|p| p.into_inner()) = Some(e.to_string());
                        Vec::new()
                    }
                };
                GenreCache::build(genres)
            })
            .await;
        cache.genres.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.initialized()
    }

    /// Error text from a failed load, if any.
    pub fn notice(&self) -> Option<String> {
        self.notice
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn genres(&self) -> Arc<[Genre]> {
        self.cache
            .get()
            .map(|c| c.genres.clone())
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Names for the ids that are known; unknown ids are left out.
    pub fn resolve(&self, genre_ids: &[i64]) -> Vec<String> {
        let Some(cache) = self.cache.get() else {
            return Vec::new();
        };
        genre_ids
            .iter()
            .filter_map(|id| cache.by_id.get(id).cloned())
            .collect()
    }

    /// One label per id for display, `"N/A"` where the id is unknown or genres are not loaded.
    pub fn labels(&self, genre_ids: &[i64]) -> Vec<String> {
        let cache = self.cache.get();
        genre_ids
            .iter()
            .map(|id| {
                cache
                    .and_then(|c| c.by_id.get(id).cloned())
                    .unwrap_or_else(|| UNKNOWN_GENRE.to_string())
            })
            .collect()
    }
}

impl GenreCache {
    fn build(genres: Vec<Genre>) -> Self {
        let by_id = genres.iter().map(|g| (g.id, g.name.clone())).collect();
        Self {
            genres: Arc::from(genres),
            by_id,
        }
    }
}
