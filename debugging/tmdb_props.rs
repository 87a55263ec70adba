//! Fetch a movie from TMDB and print how cinerate maps and renders it.
//! Usage:
//!   cargo run --bin tmdb_props -- <tmdb_id>
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use cinerate::config::Config;
use cinerate::genres::GenreDirectory;
use cinerate::render;
use cinerate::tmdb::{MovieApi, TmdbClient};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let movie_id: i64 = env::args()
        .nth(1)
        .context("usage: tmdb_props <tmdb_id>")?
        .parse()
        .context("tmdb_id must be a number")?;

    let config = Config::from_env()?;
    let client = TmdbClient::from_config(&config)?;
    let genres = GenreDirectory::new();
    genres.load(&client).await;

    let movie = client
        .fetch_movie(movie_id)
        .await
        .with_context(|| format!("Failed to fetch movie {movie_id}"))?;

    println!("{}", serde_json::to_string_pretty(&movie)?);
    println!("genres: {:?}", genres.resolve(&movie.genre_ids));
    println!();
    print!(
        "{}",
        render::movie_card(&movie, &genres, &config.image_base_url)
    );
    Ok(())
}
