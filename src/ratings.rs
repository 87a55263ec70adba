//! Locally persisted movie ratings.
//!
//! Ratings live under a single key of a [`KeyValueStore`] as one JSON object
//! mapping the movie id (as a string) to `{ ..movie fields, rating }`. The whole
//! document is read, mutated and written back on every change.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{RatingError, StoreError};
use crate::models::{Movie, RatedMovieRecord};

pub const RATINGS_KEY: &str = "ratedMovies";
pub const MAX_RATING: f32 = 10.0;

/// String key-value storage with local-storage semantics.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// All keys in one JSON file, re-read on every access.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Reads the file for a write; an unreadable document is replaced rather than kept.
    fn read_for_write(&self) -> Result<Map<String, Value>, StoreError> {
        match self.read_all() {
            Ok(map) => Ok(map),
            Err(StoreError::Malformed(e)) => {
                warn!("Replacing malformed store file {:?}: {}", self.path, e);
                Ok(Map::new())
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let encoded = serde_json::to_string_pretty(map)?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, encoded).map_err(|e| self.io_err(e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.read_all()?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let mut map = self.read_for_write()?;
        map.insert(key.to_string(), Value::String(value));
        self.write_all(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let map = self.read_for_write()?;
        if !map.contains_key(key) {
            return Ok(());
        }
        let kept: Map<String, Value> = map.into_iter().filter(|(k, _)| k != key).collect();
        self.write_all(&kept)
    }
}

/// Sole writer of persisted ratings.
#[derive(Clone)]
pub struct RatingStore {
    store: Arc<dyn KeyValueStore>,
}

impl RatingStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn get(&self, movie_id: i64) -> Option<f32> {
        self.load_document()
            .get(&movie_id.to_string())
            .and_then(decode_record)
            .map(|r| r.rating)
    }

    /// Stores the snapshot with its rating. A rating of 0 removes the entry.
    pub fn set(&self, movie_id: i64, movie: &Movie, rating: f32) -> Result<(), RatingError> {
        if !(0.0..=MAX_RATING).contains(&rating) {
            return Err(RatingError::OutOfRange(rating));
        }
        if rating == 0.0 {
            return self.delete(movie_id);
        }

        let record = RatedMovieRecord {
            movie: Movie {
                id: movie_id,
                user_rating: None,
                ..movie.clone()
            },
            rating,
        };
        let value = serde_json::to_value(&record).map_err(StoreError::from)?;
        let mut doc = self.load_document();
        doc.insert(movie_id.to_string(), value);
        self.save_document(&doc)?;
        info!("Rated movie {} ({}) {}", movie_id, record.movie.title, rating);
        Ok(())
    }

    pub fn delete(&self, movie_id: i64) -> Result<(), RatingError> {
        let key = movie_id.to_string();
        let doc = self.load_document();
        if !doc.contains_key(&key) {
            return Ok(());
        }
        let kept: Map<String, Value> = doc.into_iter().filter(|(k, _)| *k != key).collect();
        self.save_document(&kept)?;
        info!("Removed rating for movie {}", movie_id);
        Ok(())
    }

    /// Every stored record, in document order. Entries that do not decode are skipped.
    pub fn list_all(&self) -> Vec<RatedMovieRecord> {
        self.load_document()
            .values()
            .filter_map(decode_record)
            .collect()
    }

    fn load_document(&self) -> Map<String, Value> {
        let raw = match self.store.get(RATINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Map::new(),
            Err(e) => {
                warn!("Could not read stored ratings, treating as empty: {}", e);
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!("Stored ratings are not an object ({}), treating as empty", kind(&other));
                Map::new()
            }
            Err(e) => {
                warn!("Stored ratings are malformed, treating as empty: {}", e);
                Map::new()
            }
        }
    }

    fn save_document(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(doc)?;
        self.store.set(RATINGS_KEY, encoded)
    }
}

fn decode_record(value: &Value) -> Option<RatedMovieRecord> {
    match serde_json::from_value::<RatedMovieRecord>(value.clone()) {
        Ok(record) if record.rating.is_finite() => Some(record),
        Ok(_) => None,
        Err(e) => {
            debug!("Skipping non-conforming rating entry: {}", e);
            None
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movie(id: i64, title: &str) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            overview: "overview".to_string(),
            poster_path: Some(format!("/{id}.jpg")),
            release_date: None,
            vote_average: 6.4,
            genre_ids: vec![18],
            user_rating: None,
        }
    }

    #[test]
    fn set_get_and_zero_deletes() {
        let ratings = RatingStore::in_memory();
        ratings.set(42, &movie(42, "Heat"), 7.5).unwrap();
        assert_eq!(ratings.get(42), Some(7.5));

        ratings.set(42, &movie(42, "Heat"), 0.0).unwrap();
        assert_eq!(ratings.get(42), None);
        assert!(ratings.list_all().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let ratings = RatingStore::in_memory();
        ratings.delete(7).unwrap();
        ratings.set(7, &movie(7, "Se7en"), 9.0).unwrap();
        ratings.delete(7).unwrap();
        ratings.delete(7).unwrap();
        assert_eq!(ratings.get(7), None);
    }

    #[test]
    fn rejects_out_of_range_without_writing() {
        let ratings = RatingStore::in_memory();
        assert!(matches!(
            ratings.set(1, &movie(1, "A"), 10.5),
            Err(RatingError::OutOfRange(_))
        ));
        assert!(ratings.set(1, &movie(1, "A"), -1.0).is_err());
        assert!(ratings.set(1, &movie(1, "A"), f32::NAN).is_err());
        assert!(ratings.list_all().is_empty());
    }

    #[test]
    fn list_keeps_insertion_order_across_rerating() {
        let ratings = RatingStore::in_memory();
        ratings.set(30, &movie(30, "C"), 3.0).unwrap();
        ratings.set(10, &movie(10, "A"), 1.0).unwrap();
        ratings.set(20, &movie(20, "B"), 2.0).unwrap();
        ratings.set(10, &movie(10, "A"), 4.5).unwrap();
        ratings.delete(30).unwrap();
        ratings.set(5, &movie(5, "D"), 5.0).unwrap();

        let ids: Vec<(i64, f32)> = ratings
            .list_all()
            .iter()
            .map(|r| (r.movie.id, r.rating))
            .collect();
        assert_eq!(ids, vec![(10, 4.5), (20, 2.0), (5, 5.0)]);
    }

    #[test]
    fn corrupted_document_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(RATINGS_KEY, "{not json".to_string()).unwrap();
        let ratings = RatingStore::new(store.clone());
        assert_eq!(ratings.get(1), None);
        assert!(ratings.list_all().is_empty());

        store.set(RATINGS_KEY, "[1,2,3]".to_string()).unwrap();
        assert!(ratings.list_all().is_empty());

        ratings.set(1, &movie(1, "A"), 6.0).unwrap();
        assert_eq!(ratings.get(1), Some(6.0));
    }

    #[test]
    fn skips_non_conforming_entries() {
        let store = Arc::new(MemoryStore::new());
        let doc = json!({
            "1": { "id": 1, "title": "Good", "rating": 8 },
            "2": { "title": "No id", "rating": 5 },
            "3": "just a string",
            "4": { "id": 4, "title": "No rating" }
        });
        store.set(RATINGS_KEY, doc.to_string()).unwrap();
        let ratings = RatingStore::new(store);

        let all = ratings.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].movie.title, "Good");
        assert_eq!(ratings.get(2), None);
        assert_eq!(ratings.get(4), None);
    }

    #[test]
    fn stores_full_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let ratings = RatingStore::new(store.clone());
        ratings.set(42, &movie(42, "Heat"), 7.5).unwrap();

        let raw = store.get(RATINGS_KEY).unwrap().unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["42"]["title"], "Heat");
        assert_eq!(doc["42"]["poster_path"], "/42.jpg");
        assert_eq!(doc["42"]["rating"], 7.5);
    }

    #[test]
    fn file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ratings.json");

        let first = RatingStore::new(Arc::new(FileStore::new(&path)));
        first.set(550, &movie(550, "Fight Club"), 9.0).unwrap();

        let second = RatingStore::new(Arc::new(FileStore::new(&path)));
        assert_eq!(second.get(550), Some(9.0));
        assert_eq!(second.list_all()[0].movie.title, "Fight Club");
    }

    #[test]
    fn file_store_tolerates_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.json");
        fs::write(&path, "garbage").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get(RATINGS_KEY), Err(StoreError::Malformed(_))));

        let ratings = RatingStore::new(Arc::new(FileStore::new(&path)));
        assert!(ratings.list_all().is_empty());
        ratings.set(1, &movie(1, "A"), 2.5).unwrap();
        assert_eq!(ratings.get(1), Some(2.5));
    }

    #[test]
    fn file_store_remove_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("kv.json"));
        store.set("a", "1".to_string()).unwrap();
        store.set("b", "2".to_string()).unwrap();
        store.remove("a").unwrap();
        store.remove("missing").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }
}
