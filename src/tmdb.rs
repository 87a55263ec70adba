use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, DEFAULT_LANGUAGE};
use crate::error::ApiError;
use crate::models::{Genre, GuestSession, Movie, MoviePage, Paged, RatedMovieRecord, RatingAck};

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
    language: String,
}

/// Remote movie-data API as seen by the rest of the application.
///
/// Every call is independent: no retries, no ordering between concurrent calls.
#[async_trait]
pub trait MovieApi: Send + Sync {
    async fn search(&self, query: &str, page: u32) -> Result<MoviePage, ApiError>;
    async fn fetch_popular(&self, page: u32) -> Result<MoviePage, ApiError>;
    async fn fetch_genres(&self) -> Result<Vec<Genre>, ApiError>;
    async fn fetch_movie(&self, movie_id: i64) -> Result<Movie, ApiError>;
    async fn create_guest_session(&self) -> Result<GuestSession, ApiError>;
    /// Movies rated in a guest session; `user_rating` carries the remote rating.
    async fn fetch_rated_movies(&self, session_id: &str, page: u32)
        -> Result<MoviePage, ApiError>;
    async fn submit_rating(
        &self,
        session_id: &str,
        movie_id: i64,
        rating: f32,
    ) -> Result<RatingAck, ApiError>;
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let user_agent = format!("cinerate/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(&config.api_key, &config.base_url)?.with_language(&config.language))
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{}/{path}?api_key={}&language={}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.language)
        );
        for (name, value) in params {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        debug!(endpoint = path, ?params, "TMDB GET");
        let res = self
            .client
            .get(self.url(path, params))
            .send()
            .await
            .map_err(ApiError::Network)?;
        decode(path, res).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        debug!(endpoint = path, ?params, "TMDB POST");
        let res = self
            .client
            .post(self.url(path, params))
            .json(&body)
            .send()
            .await
            .map_err(ApiError::Network)?;
        decode(path, res).await
    }
}

#[async_trait]
impl MovieApi for TmdbClient {
    async fn search(&self, query: &str, page: u32) -> Result<MoviePage, ApiError> {
        self.get_json(
            "search/movie",
            &[("query", query.to_string()), ("page", page.to_string())],
        )
        .await
    }

    async fn fetch_popular(&self, page: u32) -> Result<MoviePage, ApiError> {
        self.get_json("movie/popular", &[("page", page.to_string())])
            .await
    }

    async fn fetch_genres(&self) -> Result<Vec<Genre>, ApiError> {
        #[derive(Deserialize)]
        struct GenreList {
            #[serde(default)]
            genres: Vec<Genre>,
        }

        let list: GenreList = self.get_json("genre/movie/list", &[]).await?;
        Ok(list.genres)
    }

    async fn fetch_movie(&self, movie_id: i64) -> Result<Movie, ApiError> {
        // Details carry `genres` objects instead of `genre_ids`.
        #[derive(Deserialize)]
        struct MovieDetails {
            #[serde(flatten)]
            movie: Movie,
            #[serde(default)]
            genres: Vec<Genre>,
        }

        let details: MovieDetails = self.get_json(&format!("movie/{movie_id}"), &[]).await?;
        let mut movie = details.movie;
        if movie.genre_ids.is_empty() {
            movie.genre_ids = details.genres.iter().map(|g| g.id).collect();
        }
        Ok(movie)
    }

    async fn create_guest_session(&self) -> Result<GuestSession, ApiError> {
        self.get_json("authentication/guest_session/new", &[])
            .await
    }

    async fn fetch_rated_movies(
        &self,
        session_id: &str,
        page: u32,
    ) -> Result<MoviePage, ApiError> {
        let path = format!(
            "guest_session/{}/rated/movies",
            urlencoding::encode(session_id)
        );
        let rated: Paged<RatedMovieRecord> = self
            .get_json(&path, &[("page", page.to_string())])
            .await?;
        Ok(Paged {
            page: rated.page,
            total_results: rated.total_results,
            total_pages: rated.total_pages,
            results: rated
                .results
                .into_iter()
                .map(RatedMovieRecord::into_movie)
                .collect(),
        })
    }

    async fn submit_rating(
        &self,
        session_id: &str,
        movie_id: i64,
        rating: f32,
    ) -> Result<RatingAck, ApiError> {
        let path = format!("movie/{movie_id}/rating");
        self.post_json(
            &path,
            &[("guest_session_id", session_id.to_string())],
            json!({ "value": rating }),
        )
        .await
    }
}

async fn decode<T: DeserializeOwned>(endpoint: &str, res: Response) -> Result<T, ApiError> {
    #[derive(Deserialize)]
    struct ErrorBody {
        status_message: Option<String>,
    }

    let status = res.status();
    let text = res.text().await.map_err(ApiError::Network)?;
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.status_message);
        return Err(ApiError::RemoteService {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_str(&text).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}
