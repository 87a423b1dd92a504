//! Feed merging: match text items to audio items and compose one podcast feed.
//!
//! - [`matcher`] - title normalization and prefix matching
//! - [`composer`] - output feed model, date/duration conversion, validation
//! - [`writer`] - RSS 2.0 serialization with `atom` and `itunes` extensions
//!
//! [`merge_feeds`] runs the whole pipeline for one request:
//! fetch both feeds, match, compose, serialize.

mod composer;
mod matcher;
mod writer;

pub use composer::{
    compose, duration_millis, parse_pub_date, parse_updated, ComposeError, Composition, ItemError,
    OutputEnclosure, OutputFeed, OutputItem, RejectedItem, DEFAULT_LANGUAGE, MP3_MEDIA_TYPE,
};
pub use matcher::{match_items, normalize_title, titles_match, DuplicateMatches, MatchedPair};
pub use writer::WriteError;

use crate::feed::{fetch_pair, FeedPair, PairFetchError, SourceFeed};
use std::time::Duration;
use thiserror::Error;

/// Everything one merge run needs to know.
#[derive(Debug, Clone)]
pub struct MergeSettings {
    pub text_feed_url: String,
    pub audio_feed_url: String,
    /// Shared deadline for fetching both feeds.
    pub fetch_timeout: Duration,
    pub language: String,
    pub duplicate_matches: DuplicateMatches,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Fetch(#[from] PairFetchError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("Error to compose RSS: {0}")]
    Write(#[from] WriteError),
}

/// A serialized merged feed plus what was left out of it.
#[derive(Debug, Clone)]
pub struct MergedFeed {
    pub document: String,
    pub item_count: usize,
    pub rejected: Vec<RejectedItem>,
}

/// Fetches both feeds and merges them into one podcast document.
pub async fn merge_feeds(
    client: &reqwest::Client,
    settings: &MergeSettings,
) -> Result<MergedFeed, MergeError> {
    let FeedPair { text, audio } = fetch_pair(
        client,
        &settings.text_feed_url,
        &settings.audio_feed_url,
        settings.fetch_timeout,
    )
    .await?;

    merge_sources(&text, &audio, &settings.language, settings.duplicate_matches)
}

/// Merges two already-parsed feeds.
pub fn merge_sources(
    text: &SourceFeed,
    audio: &SourceFeed,
    language: &str,
    duplicates: DuplicateMatches,
) -> Result<MergedFeed, MergeError> {
    let pairs = match_items(&text.items, &audio.items, duplicates);
    let Composition { feed, rejected } = compose(text, audio, &pairs, language)?;
    let document = feed.to_xml()?;

    tracing::info!(
        text_items = text.items.len(),
        audio_items = audio.items.len(),
        matched = pairs.len(),
        emitted = feed.items.len(),
        rejected = rejected.len(),
        "Merged feeds"
    );

    Ok(MergedFeed {
        document,
        item_count: feed.items.len(),
        rejected,
    })
}
