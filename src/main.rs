use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cinerate::config::{Config, REQUIRED_VARS};
use cinerate::context::AppContext;
use cinerate::listing::{rated_page, PopularFeed};
use cinerate::models::Movie;
use cinerate::render;
use cinerate::search::{SearchCoordinator, View};

#[derive(Parser)]
#[command(name = "cinerate", version, about = "Search, browse and rate movies from TMDB")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search movies by title
    Search {
        query: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Show the popular movies feed
    Popular {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// List the genre names TMDB knows about
    Genres,
    /// Rate a movie from 0.5 to 10 (0 removes the rating)
    Rate { movie_id: i64, rating: f32 },
    /// Remove a local rating
    Unrate { movie_id: i64 },
    /// Show the movies you rated
    Rated {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Read the ratings of the configured guest session from TMDB instead
        #[arg(long)]
        remote: bool,
    },
    /// Create a TMDB guest session for remote ratings
    GuestSession,
    /// Interactive mode: every line is a query, `:help` lists commands
    Browse,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn check_env() -> Result<()> {
    for key in REQUIRED_VARS {
        if env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true) {
            anyhow::bail!("Missing required environment variable: {}", key);
        }
    }
    info!("All required environment variables are set");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv_result = dotenv();
    init_tracing();
    match dotenv_result {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
    check_env()?;

    let config = Config::from_env()?;
    let ctx = AppContext::init(config)?;
    let result = run(&ctx, cli.command).await;
    ctx.shutdown();
    result
}

async fn run(ctx: &AppContext, command: Command) -> Result<()> {
    let image_base = ctx.config().image_base_url.clone();
    match command {
        Command::Search { query, page } => {
            ctx.load_genres().await;
            let search = ctx.search_coordinator();
            search.set_query(query);
            let mut state = search.settled().await;
            if page > 1 && state.view == View::Search {
                search.go_to_page(page);
                state = search.settled().await;
            }
            print_notice(ctx);
            print!("{}", render::search_view(&state, ctx.genres(), &image_base));
        }
        Command::Popular { page } => {
            let (feed, _) = tokio::join!(ctx.load_popular(), ctx.load_genres());
            let feed = feed.context("Failed to load popular movies")?;
            print_notice(ctx);
            let listing = feed.page(page, ctx.ratings());
            print!(
                "{}",
                render::listing_page(&listing, ctx.genres(), &image_base, render::NO_POPULAR)
            );
        }
        Command::Genres => {
            let genres = ctx.load_genres().await;
            print_notice(ctx);
            for genre in genres.iter() {
                println!("{:>6}  {}", genre.id, genre.name);
            }
        }
        Command::Rate { movie_id, rating } => {
            let movie = lookup_movie(ctx, movie_id, &[]).await?;
            ctx.rate_movie(&movie, rating).await?;
            if rating == 0.0 {
                println!("Removed rating for '{}'", movie.title);
            } else {
                println!("Rated '{}' {}", movie.title, rating);
            }
        }
        Command::Unrate { movie_id } => {
            ctx.ratings().delete(movie_id)?;
            println!("Removed rating for {movie_id}");
        }
        Command::Rated { page, remote } => {
            ctx.load_genres().await;
            if remote {
                let rated = ctx.remote_rated(page).await?;
                print!(
                    "{}",
                    render::movie_list(&rated.results, ctx.genres(), &image_base)
                );
                println!(
                    "{}",
                    render::page_footer(rated.page, rated.total_pages, rated.total_results)
                );
            } else {
                let listing = rated_page(ctx.ratings(), page);
                print!(
                    "{}",
                    render::listing_page(&listing, ctx.genres(), &image_base, render::NO_RATED)
                );
            }
        }
        Command::GuestSession => {
            let session = ctx
                .api()
                .create_guest_session()
                .await
                .context("Failed to create guest session")?;
            println!("{}", session.guest_session_id);
            if let Some(expires) = session.expires_at {
                println!("Expires {expires}. Set TMDB_GUEST_SESSION_ID to use it.");
            }
        }
        Command::Browse => browse(ctx).await?,
    }
    Ok(())
}

fn print_notice(ctx: &AppContext) {
    if let Some(notice) = render::genre_notice(ctx.genres()) {
        eprintln!("{notice}");
    }
}

/// Finds a movie among `shown` or the stored ratings before asking TMDB.
async fn lookup_movie(ctx: &AppContext, movie_id: i64, shown: &[Movie]) -> Result<Movie> {
    if let Some(movie) = shown.iter().find(|m| m.id == movie_id) {
        return Ok(movie.clone());
    }
    if let Some(record) = ctx
        .ratings()
        .list_all()
        .into_iter()
        .find(|r| r.movie.id == movie_id)
    {
        return Ok(record.movie);
    }
    ctx.api()
        .fetch_movie(movie_id)
        .await
        .with_context(|| format!("Movie {movie_id} not found"))
}

const BROWSE_HELP: &str = "\
Type to search; an empty line shows popular movies.
  :page N      go to page N
  :rate ID R   rate a movie (0 removes the rating)
  :rated       list your rated movies
  :help        this text
  :quit        leave";

struct Browser<'a> {
    ctx: &'a AppContext,
    search: SearchCoordinator,
    feed: Option<PopularFeed>,
    popular_page: u32,
}

impl<'a> Browser<'a> {
    fn image_base(&self) -> &str {
        &self.ctx.config().image_base_url
    }

    fn shown(&self) -> Vec<Movie> {
        let state = self.search.snapshot();
        match state.view {
            View::Search => state.results,
            View::Popular => self
                .feed
                .as_ref()
                .map(|f| f.page(self.popular_page, self.ctx.ratings()).movies)
                .unwrap_or_default(),
        }
    }

    async fn show_popular(&mut self) {
        if self.feed.is_none() {
            match self.ctx.load_popular().await {
                Ok(feed) => self.feed = Some(feed),
                Err(e) => {
                    println!("Error: {e}");
                    return;
                }
            }
        }
        if let Some(feed) = &self.feed {
            let listing = feed.page(self.popular_page, self.ctx.ratings());
            self.popular_page = listing.page;
            print!(
                "{}",
                render::listing_page(&listing, self.ctx.genres(), self.image_base(), render::NO_POPULAR)
            );
        }
    }

    /// Returns false when the user asked to quit.
    async fn handle(&mut self, line: &str) -> bool {
        let Some(command) = line.trim().strip_prefix(':') else {
            self.search.set_query(line.trim());
            if line.trim().is_empty() {
                self.popular_page = 1;
                self.show_popular().await;
            }
            return true;
        };

        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("quit" | "q"), _, _) => return false,
            (Some("help"), _, _) => println!("{BROWSE_HELP}"),
            (Some("page"), Some(n), _) => match n.parse::<u32>() {
                Ok(page) if self.search.snapshot().view == View::Search => {
                    self.search.go_to_page(page);
                }
                Ok(page) => {
                    self.popular_page = page;
                    self.show_popular().await;
                }
                Err(_) => println!("Not a page number: {n}"),
            },
            (Some("rate"), Some(id), Some(rating)) => {
                match (id.parse::<i64>(), rating.parse::<f32>()) {
                    (Ok(id), Ok(rating)) => self.rate(id, rating).await,
                    _ => println!("Usage: :rate ID RATING"),
                }
            }
            (Some("rated"), page, _) => {
                let page = page.and_then(|p| p.parse().ok()).unwrap_or(1);
                let listing = rated_page(self.ctx.ratings(), page);
                print!(
                    "{}",
                    render::listing_page(&listing, self.ctx.genres(), self.image_base(), render::NO_RATED)
                );
            }
            _ => println!("Unknown command. {BROWSE_HELP}"),
        }
        true
    }

    async fn rate(&mut self, id: i64, rating: f32) {
        let shown = self.shown();
        let movie = match lookup_movie(self.ctx, id, &shown).await {
            Ok(movie) => movie,
            Err(e) => {
                println!("Error: {e:#}");
                return;
            }
        };
        match self.ctx.rate_movie(&movie, rating).await {
            Ok(()) if rating == 0.0 => println!("Removed rating for '{}'", movie.title),
            Ok(()) => println!("Rated '{}' {}", movie.title, rating),
            Err(e) => println!("Error: {e}"),
        }
        self.search.refresh_ratings();
    }
}

async fn browse(ctx: &AppContext) -> Result<()> {
    let mut browser = Browser {
        ctx,
        search: ctx.search_coordinator(),
        feed: None,
        popular_page: 1,
    };
    let mut updates = browser.search.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{BROWSE_HELP}\n");
    ctx.load_genres().await;
    print_notice(ctx);
    browser.show_popular().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                if !browser.handle(&line).await {
                    break;
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.view == View::Search && state.phase.is_settled() {
                    print!("{}", render::search_view(&state, ctx.genres(), browser.image_base()));
                }
            }
            _ = shutdown_signal() => break,
        }
    }
    browser.search.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received (Ctrl+C)");
}
