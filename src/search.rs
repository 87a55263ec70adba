//! Debounced search with page state and a stale-response guard.
//!
//! Each query change restarts the debounce window; only the query present when the
//! window elapses is fetched. Every issued request is stamped with a generation and
//! only the response of the latest generation may touch state. Superseded timers and
//! in-flight requests are aborted as well.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::listing::{clamp_page, merge_ratings, page_count_for, ListingSource};
use crate::models::{Movie, MoviePage};
use crate::ratings::RatingStore;
use crate::tmdb::MovieApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Debouncing,
    Fetching,
    Ready,
    Error,
}

impl SearchPhase {
    /// Nothing is pending: no timer running and no request in flight.
    pub fn is_settled(self) -> bool {
        matches!(self, SearchPhase::Idle | SearchPhase::Ready | SearchPhase::Error)
    }
}

/// Which listing the user is looking at. Chosen by whether the query is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Popular,
    Search,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub page: u32,
    pub total_results: u64,
    pub results: Vec<Movie>,
    pub phase: SearchPhase,
    pub error: Option<String>,
    /// The last failure never reached TMDB (no connection).
    pub offline: bool,
    pub view: View,
}

impl SearchState {
    fn initial() -> Self {
        Self {
            query: String::new(),
            page: 1,
            total_results: 0,
            results: Vec::new(),
            phase: SearchPhase::Idle,
            error: None,
            offline: false,
            view: View::Popular,
        }
    }

    pub fn page_count(&self) -> u32 {
        page_count_for(ListingSource::Search, self.total_results)
    }

    fn clear_results(&mut self) {
        self.results.clear();
        self.total_results = 0;
    }
}

struct Inner {
    state: SearchState,
    generation: u64,
    debounce_task: Option<JoinHandle<()>>,
    fetch_task: Option<JoinHandle<()>>,
}

impl Inner {
    fn abort_pending(&mut self) {
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
    }
}

/// Sole writer of [`SearchState`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SearchCoordinator {
    api: Arc<dyn MovieApi>,
    ratings: RatingStore,
    debounce: Duration,
    inner: Arc<Mutex<Inner>>,
    updates: Arc<watch::Sender<SearchState>>,
}

impl SearchCoordinator {
    pub fn new(api: Arc<dyn MovieApi>, ratings: RatingStore, debounce: Duration) -> Self {
        let state = SearchState::initial();
        let (tx, _rx) = watch::channel(state.clone());
        Self {
            api,
            ratings,
            debounce,
            inner: Arc::new(Mutex::new(Inner {
                state,
                generation: 0,
                debounce_task: None,
                fetch_task: None,
            })),
            updates: Arc::new(tx),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn snapshot(&self) -> SearchState {
        self.lock().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.updates.subscribe()
    }

    /// Records a query change (one keystroke). Must be called within a Tokio runtime.
    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        let mut inner = self.lock();
        inner.generation += 1;
        inner.abort_pending();
        inner.state.query = query.clone();
        inner.state.page = 1;
        inner.state.error = None;
        inner.state.offline = false;

        if query.trim().is_empty() {
            inner.state.clear_results();
            inner.state.phase = SearchPhase::Idle;
            inner.state.view = View::Popular;
            debug!("Query cleared, showing popular movies");
            self.publish(&inner);
            return;
        }

        inner.state.view = View::Search;
        inner.state.phase = SearchPhase::Debouncing;
        let generation = inner.generation;
        let this = self.clone();
        let window = self.debounce;
        inner.debounce_task = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            this.start_fetch(generation, query, 1);
        }));
        self.publish(&inner);
    }

    /// Jumps to `page` of the current search without debouncing. Returns the page
    /// actually requested after clamping to the known page count.
    ///
    /// Only a settled search can be paged; while a query change is pending the page
    /// count belongs to the previous query, so the current page is returned unchanged.
    pub fn go_to_page(&self, page: u32) -> u32 {
        let mut inner = self.lock();
        let pageable = matches!(inner.state.phase, SearchPhase::Ready | SearchPhase::Error);
        if inner.state.view != View::Search || !pageable {
            return inner.state.page;
        }
        let page = clamp_page(page, inner.state.page_count());
        inner.generation += 1;
        inner.abort_pending();
        let generation = inner.generation;
        let query = inner.state.query.clone();
        self.spawn_fetch(&mut inner, generation, query, page);
        page
    }

    /// Re-attaches stored ratings to the shown results, e.g. after the user rated one.
    pub fn refresh_ratings(&self) {
        let mut inner = self.lock();
        if inner.state.results.is_empty() {
            return;
        }
        inner.state.results = merge_ratings(&inner.state.results, &self.ratings);
        self.publish(&inner);
    }

    /// Resolves once nothing is pending and returns that state.
    pub async fn settled(&self) -> SearchState {
        let mut rx = self.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            if state.phase.is_settled() {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    /// Cancels any pending timer or request. Later responses are ignored.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.abort_pending();
        if !inner.state.phase.is_settled() {
            inner.state.phase = SearchPhase::Idle;
            self.publish(&inner);
        }
    }

    fn start_fetch(&self, generation: u64, query: String, page: u32) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        // The timer that called us is finishing on its own.
        inner.debounce_task = None;
        self.spawn_fetch(&mut inner, generation, query, page);
    }

    fn spawn_fetch(&self, inner: &mut Inner, generation: u64, query: String, page: u32) {
        inner.state.page = page;
        inner.state.phase = SearchPhase::Fetching;
        info!("Searching '{}' page {}", query, page);

        let this = self.clone();
        inner.fetch_task = Some(tokio::spawn(async move {
            let result = this.api.search(&query, page).await;
            this.finish(generation, page, result);
        }));
        self.publish(inner);
    }

    fn finish(&self, generation: u64, page: u32, result: Result<MoviePage, ApiError>) {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(
                generation,
                latest = inner.generation,
                "Dropping stale search response"
            );
            return;
        }
        inner.fetch_task = None;
        match result {
            Ok(found) => {
                inner.state.page = page;
                inner.state.total_results = found.total_results;
                inner.state.results = merge_ratings(&found.results, &self.ratings);
                inner.state.phase = SearchPhase::Ready;
                inner.state.error = None;
                inner.state.offline = false;
            }
            Err(e) => {
                warn!("Search for '{}' failed: {}", inner.state.query, e);
                inner.state.clear_results();
                inner.state.phase = SearchPhase::Error;
                inner.state.error = Some(e.to_string());
                inner.state.offline = e.is_network();
            }
        }
        self.publish(&inner);
    }

    fn publish(&self, inner: &Inner) {
        self.updates.send_replace(inner.state.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Genre, GuestSession, Paged, RatingAck};
    use async_trait::async_trait;

    struct CountingApi {
        calls: Mutex<Vec<(String, u32)>>,
        total: u64,
    }

    #[async_trait]
    impl MovieApi for CountingApi {
        async fn search(&self, query: &str, page: u32) -> Result<MoviePage, ApiError> {
            self.calls.lock().unwrap().push((query.to_string(), page));
            Ok(Paged {
                page,
                results: Vec::new(),
                total_results: self.total,
                total_pages: 0,
            })
        }
        async fn fetch_popular(&self, _page: u32) -> Result<MoviePage, ApiError> {
            unimplemented!()
        }
        async fn fetch_genres(&self) -> Result<Vec<Genre>, ApiError> {
            unimplemented!()
        }
        async fn fetch_movie(&self, _movie_id: i64) -> Result<Movie, ApiError> {
            unimplemented!()
        }
        async fn create_guest_session(&self) -> Result<GuestSession, ApiError> {
            unimplemented!()
        }
        async fn fetch_rated_movies(
            &self,
            _session_id: &str,
            _page: u32,
        ) -> Result<MoviePage, ApiError> {
            unimplemented!()
        }
        async fn submit_rating(
            &self,
            _session_id: &str,
            _movie_id: i64,
            _rating: f32,
        ) -> Result<RatingAck, ApiError> {
            unimplemented!()
        }
    }

    fn coordinator(total: u64) -> (SearchCoordinator, Arc<CountingApi>) {
        let api = Arc::new(CountingApi {
            calls: Mutex::new(Vec::new()),
            total,
        });
        (
            SearchCoordinator::new(
                api.clone(),
                RatingStore::in_memory(),
                Duration::from_millis(500),
            ),
            api,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_cannot_overwrite_state() {
        let (search, _api) = coordinator(10);
        search.set_query("new");
        let current = search.lock().generation;

        search.finish(
            current - 1,
            1,
            Ok(Paged {
                page: 1,
                results: Vec::new(),
                total_results: 999,
                total_pages: 50,
            }),
        );
        let state = search.snapshot();
        assert_eq!(state.total_results, 0);
        assert_eq!(state.phase, SearchPhase::Debouncing);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_query_switches_to_popular_without_fetching() {
        let (search, api) = coordinator(10);
        search.set_query("heat");
        search.set_query("   ");
        tokio::time::sleep(Duration::from_secs(2)).await;

        let state = search.snapshot();
        assert_eq!(state.view, View::Popular);
        assert_eq!(state.phase, SearchPhase::Idle);
        assert!(api.calls.lock().unwrap().is_empty());
        assert_eq!(search.go_to_page(3), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_sets_error_and_clears() {
        struct Failing;
        #[async_trait]
        impl MovieApi for Failing {
            async fn search(&self, _q: &str, _p: u32) -> Result<MoviePage, ApiError> {
                Err(ApiError::RemoteService {
                    status: 500,
                    message: None,
                })
            }
            async fn fetch_popular(&self, _page: u32) -> Result<MoviePage, ApiError> {
                unimplemented!()
            }
            async fn fetch_genres(&self) -> Result<Vec<Genre>, ApiError> {
                unimplemented!()
            }
            async fn fetch_movie(&self, _movie_id: i64) -> Result<Movie, ApiError> {
                unimplemented!()
            }
            async fn create_guest_session(&self) -> Result<GuestSession, ApiError> {
                unimplemented!()
            }
            async fn fetch_rated_movies(
                &self,
                _session_id: &str,
                _page: u32,
            ) -> Result<MoviePage, ApiError> {
                unimplemented!()
            }
            async fn submit_rating(
                &self,
                _session_id: &str,
                _movie_id: i64,
                _rating: f32,
            ) -> Result<RatingAck, ApiError> {
                unimplemented!()
            }
        }

        let search = SearchCoordinator::new(
            Arc::new(Failing),
            RatingStore::in_memory(),
            Duration::from_millis(500),
        );
        search.set_query("anything");
        let state = search.settled().await;
        assert_eq!(state.phase, SearchPhase::Error);
        assert_eq!(state.error.as_deref(), Some("HTTP error! status: 500"));
        assert!(!state.offline);
        assert!(state.results.is_empty());
        assert_eq!(state.total_results, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paging_waits_for_pending_query_change() {
        let (search, api) = coordinator(234);
        search.set_query("batman");
        assert_eq!(search.settled().await.page_count(), 12);

        search.set_query("batman returns");
        assert_eq!(search.go_to_page(12), 1);
        let state = search.settled().await;
        assert_eq!(state.page, 1);
        assert_eq!(
            api.calls.lock().unwrap().last(),
            Some(&("batman returns".to_string(), 1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_debounce() {
        let (search, api) = coordinator(10);
        search.set_query("heat");
        search.shutdown();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(api.calls.lock().unwrap().is_empty());
        assert_eq!(search.snapshot().phase, SearchPhase::Idle);
    }
}
