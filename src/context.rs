use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ApiError, RatingError};
use crate::genres::GenreDirectory;
use crate::listing::PopularFeed;
use crate::models::{Genre, Movie, MoviePage};
use crate::ratings::{FileStore, RatingStore};
use crate::search::SearchCoordinator;
use crate::tmdb::{MovieApi, TmdbClient};

/// Services shared by every view: API client, genre cache, rating store and config.
#[derive(Clone)]
pub struct AppContext {
    api: Arc<dyn MovieApi>,
    genres: Arc<GenreDirectory>,
    ratings: RatingStore,
    config: Arc<Config>,
    genre_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppContext {
    /// Wires the real client and file-backed ratings, then starts loading genres.
    pub fn init(config: Config) -> Result<Self> {
        let api: Arc<dyn MovieApi> =
            Arc::new(TmdbClient::from_config(&config).context("Failed to build TMDB client")?);
        let ratings = RatingStore::new(Arc::new(FileStore::new(config.ratings_file.clone())));
        info!("Ratings stored in {}", config.ratings_file.display());

        let ctx = Self::with_parts(config, api, ratings);
        ctx.spawn_genre_load();
        Ok(ctx)
    }

    pub fn with_parts(config: Config, api: Arc<dyn MovieApi>, ratings: RatingStore) -> Self {
        Self {
            api,
            genres: Arc::new(GenreDirectory::new()),
            ratings,
            config: Arc::new(config),
            genre_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn api(&self) -> &Arc<dyn MovieApi> {
        &self.api
    }

    pub fn genres(&self) -> &GenreDirectory {
        &self.genres
    }

    pub fn ratings(&self) -> &RatingStore {
        &self.ratings
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn spawn_genre_load(&self) {
        let api = self.api.clone();
        let genres = self.genres.clone();
        let task = tokio::spawn(async move {
            genres.load(api.as_ref()).await;
        });
        let mut slot = self.genre_task.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Waits for the genre list, fetching it now if no load has started.
    pub async fn load_genres(&self) -> Arc<[Genre]> {
        self.genres.load(self.api.as_ref()).await
    }

    pub fn search_coordinator(&self) -> SearchCoordinator {
        SearchCoordinator::new(
            self.api.clone(),
            self.ratings.clone(),
            self.config.debounce,
        )
    }

    pub async fn load_popular(&self) -> Result<PopularFeed, ApiError> {
        PopularFeed::load(self.api.as_ref(), self.config.popular_pages).await
    }

    /// Stores the rating locally and, when a guest session is configured, submits it
    /// to TMDB as well. Remote failures are logged and do not undo the local write.
    pub async fn rate_movie(&self, movie: &Movie, rating: f32) -> Result<(), RatingError> {
        self.ratings.set(movie.id, movie, rating)?;

        let Some(session) = self.config.guest_session_id.as_deref() else {
            return Ok(());
        };
        if rating == 0.0 {
            return Ok(());
        }
        match self.api.submit_rating(session, movie.id, rating).await {
            Ok(ack) if ack.success => info!("Submitted rating for movie {} to TMDB", movie.id),
            Ok(ack) => warn!(
                "TMDB did not accept rating for movie {}: {}",
                movie.id, ack.status_message
            ),
            Err(e) => warn!("Failed to submit rating for movie {}: {}", movie.id, e),
        }
        Ok(())
    }

    /// Ratings recorded on TMDB for the configured guest session.
    pub async fn remote_rated(&self, page: u32) -> Result<MoviePage> {
        let session = self
            .config
            .guest_session_id
            .as_deref()
            .context("TMDB_GUEST_SESSION_ID not set")?;
        Ok(self.api.fetch_rated_movies(session, page).await?)
    }

    pub fn shutdown(&self) {
        let task = self
            .genre_task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
        info!("Shut down");
    }
}
