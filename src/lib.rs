//! rss-merger library
//!
//! Merges an article feed and a podcast feed into one podcast feed whose
//! items carry the article text and the matching episode audio.

pub mod config;
pub mod feed;
pub mod merge;
pub mod server;

pub use config::{Config, ConfigError};
pub use server::{build_router, AppState};
