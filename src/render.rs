//! Plain-text views of movie listings for the terminal.

use crate::genres::GenreDirectory;
use crate::listing::ListingPage;
use crate::models::Movie;
use crate::search::{SearchPhase, SearchState};
use crate::text::{format_release_date, format_vote, poster_url, truncate, OVERVIEW_LIMIT};

pub const NO_RESULTS: &str = "No movies found";
pub const NO_POPULAR: &str = "No popular movies available";
pub const NO_RATED: &str = "You have not rated any movies yet";
pub const OFFLINE: &str = "No Internet Connection: please check your network settings";

pub fn movie_card(movie: &Movie, genres: &GenreDirectory, image_base_url: &str) -> String {
    let mut lines = vec![format!(
        "[{}] {}  ({})  ★ {}",
        movie.id,
        movie.title,
        format_release_date(movie.release_date),
        format_vote(Some(movie.vote_average))
    )];
    let labels = genres.labels(&movie.genre_ids);
    if !labels.is_empty() {
        lines.push(format!("    {}", labels.join(" | ")));
    }
    if !movie.overview.is_empty() {
        lines.push(format!("    {}", truncate(&movie.overview, OVERVIEW_LIMIT)));
    }
    lines.push(match movie.user_rating {
        Some(rating) => format!("    Your rating: {}", format_vote(Some(rating))),
        None => "    Not rated".to_string(),
    });
    lines.push(format!(
        "    {}",
        poster_url(image_base_url, movie.poster_path.as_deref())
    ));

    let mut card = lines.join("\n");
    card.push('\n');
    card
}

pub fn movie_list(movies: &[Movie], genres: &GenreDirectory, image_base_url: &str) -> String {
    movies
        .iter()
        .map(|m| movie_card(m, genres, image_base_url))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn page_footer(page: u32, page_count: u32, total: u64) -> String {
    format!("Page {page} of {} ({total} total)", page_count.max(1))
}

/// A client-side listing page, or `empty_message` when there is nothing to show.
pub fn listing_page(
    listing: &ListingPage,
    genres: &GenreDirectory,
    image_base_url: &str,
    empty_message: &str,
) -> String {
    if listing.movies.is_empty() {
        return format!("{empty_message}\n");
    }
    format!(
        "{}\n{}\n",
        movie_list(&listing.movies, genres, image_base_url),
        page_footer(listing.page, listing.page_count, listing.total_items)
    )
}

/// Status line for the search view. `None` when there are results to show.
pub fn search_status(state: &SearchState) -> Option<String> {
    match state.phase {
        SearchPhase::Debouncing | SearchPhase::Fetching => Some("Loading...".to_string()),
        SearchPhase::Error if state.offline => Some(OFFLINE.to_string()),
        SearchPhase::Error => Some(format!(
            "Error: {}",
            state.error.as_deref().unwrap_or("request failed")
        )),
        SearchPhase::Ready if state.results.is_empty() => Some(NO_RESULTS.to_string()),
        SearchPhase::Idle => Some("Enter a movie title to search".to_string()),
        SearchPhase::Ready => None,
    }
}

pub fn search_view(state: &SearchState, genres: &GenreDirectory, image_base_url: &str) -> String {
    if let Some(status) = search_status(state) {
        return format!("{status}\n");
    }
    format!(
        "Results for '{}'\n{}\n{}\n",
        state.query,
        movie_list(&state.results, genres, image_base_url),
        page_footer(state.page, state.page_count(), state.total_results)
    )
}

/// Shown once when the genre list failed to load.
pub fn genre_notice(genres: &GenreDirectory) -> Option<String> {
    genres
        .notice()
        .map(|e| format!("Genres unavailable ({e}); showing N/A"))
}
