//! Page math, rating merge, and the two client-side listings (popular feed, rated list).

use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::models::Movie;
use crate::ratings::RatingStore;
use crate::tmdb::MovieApi;

pub const PAGE_SIZE: usize = 20;

/// TMDB refuses `page` values above this.
pub const MAX_REMOTE_PAGE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSource {
    Search,
    Popular,
    Rated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// The whole sequence is in memory and sliced locally.
    ClientSide,
    /// Each page is fetched fresh from the API.
    ServerSide,
}

impl ListingSource {
    pub fn pagination(self) -> PaginationMode {
        match self {
            ListingSource::Search => PaginationMode::ServerSide,
            ListingSource::Popular | ListingSource::Rated => PaginationMode::ClientSide,
        }
    }
}

pub fn page_count(total_items: u64) -> u32 {
    let pages = total_items.div_ceil(PAGE_SIZE as u64);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Page count for a listing, capped for server-side sources.
pub fn page_count_for(source: ListingSource, total_items: u64) -> u32 {
    let pages = page_count(total_items);
    match source.pagination() {
        PaginationMode::ServerSide => pages.min(MAX_REMOTE_PAGE),
        PaginationMode::ClientSide => pages,
    }
}

/// Clamps `page` into `1..=max(page_count, 1)`.
pub fn clamp_page(page: u32, page_count: u32) -> u32 {
    page.clamp(1, page_count.max(1))
}

/// `items[(page-1)*20 .. page*20]`, clipped. Page 0 is treated as page 1.
pub fn paginate<T>(items: &[T], page: u32) -> &[T] {
    let page = page.max(1) as usize;
    let start = (page - 1).saturating_mul(PAGE_SIZE);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(PAGE_SIZE).min(items.len());
    &items[start..end]
}

/// Attaches the stored rating of each movie (or clears it when unrated).
pub fn merge_ratings(movies: &[Movie], ratings: &RatingStore) -> Vec<Movie> {
    let stored: std::collections::HashMap<i64, f32> = ratings
        .list_all()
        .into_iter()
        .map(|r| (r.movie.id, r.rating))
        .collect();
    movies
        .iter()
        .map(|m| Movie {
            user_rating: stored.get(&m.id).copied(),
            ..m.clone()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub page: u32,
    pub page_count: u32,
    pub total_items: u64,
    pub movies: Vec<Movie>,
}

/// Popular movies gathered from several upstream pages and paginated locally.
#[derive(Debug, Clone, Default)]
pub struct PopularFeed {
    movies: Vec<Movie>,
}

impl PopularFeed {
    /// Fetches upstream pages `1..=pages` concurrently and concatenates them in page order.
    /// Pages that fail are skipped; the call fails only if every page fails.
    pub async fn load(api: &dyn MovieApi, pages: u32) -> Result<Self, ApiError> {
        let pages = pages.clamp(1, MAX_REMOTE_PAGE);
        let responses = join_all((1..=pages).map(|page| api.fetch_popular(page))).await;

        let mut seen = HashSet::new();
        let mut movies = Vec::new();
        let mut first_error = None;
        let mut loaded = 0;
        for (idx, response) in responses.into_iter().enumerate() {
            match response {
                Ok(page) => {
                    loaded += 1;
                    movies.extend(page.results.into_iter().filter(|m| seen.insert(m.id)));
                }
                Err(e) => {
                    warn!("Popular page {} failed: {}", idx + 1, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if loaded == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        debug!("Popular feed holds {} movies from {} pages", movies.len(), loaded);
        Ok(Self { movies })
    }

    pub fn from_movies(movies: Vec<Movie>) -> Self {
        Self { movies }
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn page(&self, page: u32, ratings: &RatingStore) -> ListingPage {
        client_side_page(&self.movies, page, ratings, ListingSource::Popular)
    }
}

/// The locally rated movies in storage order, paginated locally.
pub fn rated_page(ratings: &RatingStore, page: u32) -> ListingPage {
    let movies: Vec<Movie> = ratings
        .list_all()
        .into_iter()
        .map(|r| r.into_movie())
        .collect();
    let total = movies.len() as u64;
    let page_count = page_count_for(ListingSource::Rated, total);
    let page = clamp_page(page, page_count);
    ListingPage {
        page,
        page_count,
        total_items: total,
        movies: paginate(&movies, page).to_vec(),
    }
}

fn client_side_page(
    movies: &[Movie],
    page: u32,
    ratings: &RatingStore,
    source: ListingSource,
) -> ListingPage {
    let total = movies.len() as u64;
    let page_count = page_count_for(source, total);
    let page = clamp_page(page, page_count);
    ListingPage {
        page,
        page_count,
        total_items: total,
        movies: merge_ratings(paginate(movies, page), ratings),
    }
}
