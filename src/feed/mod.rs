//! Source feed retrieval and parsing.
//!
//! - [`parser`] - RSS 2.0 / RSS 1.0 / Atom 1.0 parsing into [`SourceFeed`],
//!   keeping raw date and duration strings
//! - [`fetcher`] - HTTP retrieval of the text and audio feeds under one
//!   shared deadline
//!
//! # Example
//!
//! ```ignore
//! use rss_merger::feed::fetch_pair;
//!
//! let pair = fetch_pair(&client, text_url, audio_url, Duration::from_secs(5)).await?;
//! println!("{} text items, {} audio items", pair.text.items.len(), pair.audio.items.len());
//! ```

mod fetcher;
mod parser;

pub use fetcher::{fetch_feed, fetch_pair, FeedPair, FeedRole, FetchError, PairFetchError};
pub use parser::{parse_feed, Enclosure, ParseError, SourceFeed, SourceItem};
