pub mod config;
pub mod context;
pub mod error;
pub mod genres;
pub mod listing;
pub mod models;
pub mod ratings;
pub mod render;
pub mod search;
pub mod text;
pub mod tmdb;
