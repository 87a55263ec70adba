use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Movie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default, with = "release_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    /// Local rating, merged in from the rating store. Never sent by TMDB.
    #[serde(skip)]
    pub user_rating: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// A movie snapshot together with the rating the user gave it.
///
/// This is both the persisted shape (`{ ..movie, rating }`) and the shape TMDB
/// uses for the guest session "rated movies" listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RatedMovieRecord {
    #[serde(flatten)]
    pub movie: Movie,
    pub rating: f32,
}

impl RatedMovieRecord {
    pub fn into_movie(self) -> Movie {
        Movie {
            user_rating: Some(self.rating),
            ..self.movie
        }
    }
}

/// One page of a paginated TMDB listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Paged<T> {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub total_pages: u32,
}

pub type MoviePage = Paged<Movie>;

fn first_page() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GuestSession {
    #[serde(default)]
    pub success: bool,
    pub guest_session_id: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RatingAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status_code: i32,
    #[serde(default)]
    pub status_message: String,
}

/// TMDB writes unknown release dates as `""`, so those decode to `None`.
mod release_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| NaiveDate::parse_from_str(s, FORMAT).ok()))
    }
}
