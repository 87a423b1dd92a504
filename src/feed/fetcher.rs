use crate::feed::parser::{parse_feed, ParseError, SourceFeed};
use futures::StreamExt;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a single feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Which side of the merge a feed supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedRole {
    /// Article titles and descriptions.
    Text,
    /// Audio enclosures, durations and the cover image.
    Audio,
}

impl fmt::Display for FeedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedRole::Text => f.write_str("text"),
            FeedRole::Audio => f.write_str("audio"),
        }
    }
}

/// Errors from fetching the text and audio feeds together.
#[derive(Debug, Error)]
pub enum PairFetchError {
    /// One of the two feeds failed on its own.
    #[error("Error to fetch {role} feed: {source}")]
    Feed {
        role: FeedRole,
        #[source]
        source: FetchError,
    },
    /// The shared deadline elapsed before both feeds were parsed.
    #[error("Error to fetch feeds: no response within {0:?}")]
    Deadline(Duration),
}

/// Both source feeds of one merge.
#[derive(Debug, Clone)]
pub struct FeedPair {
    pub text: SourceFeed,
    pub audio: SourceFeed,
}

/// Fetches the text and audio feeds concurrently under one deadline.
///
/// Both requests start together and are joined before `deadline`, so a slow
/// source only consumes its own share of the budget. When the deadline
/// elapses the in-flight requests are dropped, which cancels them.
///
/// # Errors
///
/// - [`PairFetchError::Deadline`] - the deadline elapsed first
/// - [`PairFetchError::Feed`] - a feed failed; the text feed is reported
///   when both did
pub async fn fetch_pair(
    client: &reqwest::Client,
    text_url: &str,
    audio_url: &str,
    deadline: Duration,
) -> Result<FeedPair, PairFetchError> {
    let both = async {
        let (text, audio) = tokio::join!(fetch_feed(client, text_url), fetch_feed(client, audio_url));
        let text = text.map_err(|source| PairFetchError::Feed {
            role: FeedRole::Text,
            source,
        })?;
        let audio = audio.map_err(|source| PairFetchError::Feed {
            role: FeedRole::Audio,
            source,
        })?;
        Ok::<_, PairFetchError>(FeedPair { text, audio })
    };

    match tokio::time::timeout(deadline, both).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                text = %text_url,
                audio = %audio_url,
                deadline_ms = deadline.as_millis() as u64,
                "Feed fetch deadline elapsed"
            );
            Err(PairFetchError::Deadline(deadline))
        }
    }
}

/// Fetches and parses one feed. No retries.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<SourceFeed, FetchError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        tracing::warn!(feed = %url, status = %response.status(), "Feed request failed");
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    let feed = parse_feed(&bytes)?;

    tracing::debug!(
        feed = %url,
        bytes = bytes.len(),
        items = feed.items.len(),
        "Fetched feed"
    );

    Ok(feed)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
