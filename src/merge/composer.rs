use crate::feed::SourceFeed;
use crate::merge::matcher::MatchedPair;
use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};
use thiserror::Error;

/// RFC 1123 with a numeric zone, used for every date the feed writes.
pub(crate) const RFC1123_LAYOUT: &str = "%a, %d %b %Y %H:%M:%S %z";
/// Text feed's last-updated field after the weekday. The zone is the literal `+0000`.
const UPDATED_LAYOUT: &str = "%d %b %Y %H:%M:%S +0000";
const PUB_DATE_LAYOUT: &str = "%d %b %Y %H:%M:%S %z";
const CLOCK_LAYOUT: &str = "%H:%M:%S";

pub const MP3_MEDIA_TYPE: &str = "audio/mpeg";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Errors that abort composition. No feed is produced.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The text feed's last-updated value is not `Mon, 02 Jan 2006 15:04:05 +0000` shaped.
    #[error("Error to parse updated time")]
    UpdatedTime { value: String },
}

/// Why a matched pair could not become an output item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("item title is empty")]
    MissingTitle,
    #[error("item description is empty")]
    MissingDescription,
    #[error("audio item has no enclosure")]
    MissingEnclosure,
}

/// A matched pair left out of the output feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedItem {
    pub title: String,
    pub reason: ItemError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEnclosure {
    pub url: String,
    pub media_type: String,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputItem {
    /// The enclosure URL; stable across rebuilds of the feed.
    pub guid: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub enclosure: OutputEnclosure,
    /// Whole milliseconds; zero when the source duration was unusable.
    pub duration_ms: i64,
    /// Unset when the source date was unusable.
    pub pub_date: Option<DateTime<FixedOffset>>,
}

/// The merged podcast feed, ready for [`OutputFeed::to_xml`](crate::merge::OutputFeed::to_xml).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub generator: String,
    pub language: String,
    pub pub_date: DateTime<Utc>,
    pub last_build_date: DateTime<Utc>,
    pub atom_link: Option<String>,
    pub image_url: Option<String>,
    pub items: Vec<OutputItem>,
}

impl OutputFeed {
    pub fn new(title: &str, link: &str, description: &str, updated: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            link: link.to_string(),
            description: description.to_string(),
            generator: format!("rss-merger v{}", env!("CARGO_PKG_VERSION")),
            language: DEFAULT_LANGUAGE.to_string(),
            pub_date: updated,
            last_build_date: updated,
            atom_link: None,
            image_url: None,
            items: Vec::new(),
        }
    }

    /// Appends an item after checking the fields every podcast item needs.
    pub fn add_item(&mut self, item: OutputItem) -> Result<(), ItemError> {
        if item.title.trim().is_empty() {
            return Err(ItemError::MissingTitle);
        }
        if item.description.trim().is_empty() {
            return Err(ItemError::MissingDescription);
        }
        if item.enclosure.url.is_empty() {
            return Err(ItemError::MissingEnclosure);
        }
        self.items.push(item);
        Ok(())
    }
}

/// Result of a successful composition.
#[derive(Debug, Clone)]
pub struct Composition {
    pub feed: OutputFeed,
    /// Matched pairs that failed validation, in pair order.
    pub rejected: Vec<RejectedItem>,
}

/// Builds the merged feed from the text feed's channel and the matched pairs.
///
/// Channel metadata and dates come from the text feed, the cover image from
/// the audio feed. Pairs that fail validation are collected in
/// [`Composition::rejected`] instead of failing the whole feed.
///
/// # Errors
///
/// [`ComposeError::UpdatedTime`] when the text feed's last-updated value
/// cannot be parsed.
pub fn compose(
    text: &SourceFeed,
    audio: &SourceFeed,
    pairs: &[MatchedPair<'_>],
    language: &str,
) -> Result<Composition, ComposeError> {
    let updated = parse_updated(&text.updated).ok_or_else(|| ComposeError::UpdatedTime {
        value: text.updated.clone(),
    })?;

    let mut feed = OutputFeed::new(&text.title, &text.link, &text.description, updated);
    feed.language = language.to_string();
    if !text.link.is_empty() {
        feed.atom_link = Some(text.link.clone());
    }
    feed.image_url = audio.image_url.clone();

    let mut rejected = Vec::new();
    for pair in pairs {
        if let Err(reason) = build_item(pair).and_then(|item| feed.add_item(item)) {
            tracing::warn!(
                title = %pair.text.title,
                audio_title = %pair.audio.title,
                reason = %reason,
                "Skipping merged item"
            );
            rejected.push(RejectedItem {
                title: pair.text.title.clone(),
                reason,
            });
        }
    }

    Ok(Composition { feed, rejected })
}

fn build_item(pair: &MatchedPair<'_>) -> Result<OutputItem, ItemError> {
    let enclosure = pair
        .audio
        .enclosures
        .first()
        .ok_or(ItemError::MissingEnclosure)?;

    Ok(OutputItem {
        guid: enclosure.url.clone(),
        title: pair.text.title.clone(),
        description: pair.text.description.clone(),
        link: pair.audio.link.clone(),
        enclosure: OutputEnclosure {
            url: enclosure.url.clone(),
            media_type: MP3_MEDIA_TYPE.to_string(),
            length: 0,
        },
        duration_ms: pair.audio.duration.as_deref().map_or(0, duration_millis),
        pub_date: parse_pub_date(&pair.audio.published),
    })
}

/// Parses the text feed's last-updated value, e.g. `Mon, 02 Jan 2006 15:04:05 +0000`.
///
/// The weekday must be a three-letter day name but is not checked against the date.
pub fn parse_updated(value: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(value)?;
    NaiveDateTime::parse_from_str(rest, UPDATED_LAYOUT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses an RFC 1123 date with a numeric zone, e.g. `Tue, 10 Oct 2023 14:30:00 -0400`.
///
/// Same weekday leniency as [`parse_updated`].
pub fn parse_pub_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let rest = strip_weekday(value)?;
    DateTime::parse_from_str(rest, PUB_DATE_LAYOUT).ok()
}

/// Splits off a leading `Www, ` day name. Hand-built feeds often carry a
/// weekday that disagrees with the date, so only its shape is checked.
fn strip_weekday(value: &str) -> Option<&str> {
    let (day, rest) = value.split_once(", ")?;
    (day.len() == 3 && day.parse::<Weekday>().is_ok()).then_some(rest)
}

/// Converts an `HH:MM:SS` clock value to whole milliseconds, 0 if it does not parse.
pub fn duration_millis(clock: &str) -> i64 {
    match NaiveTime::parse_from_str(clock, CLOCK_LAYOUT) {
        Ok(time) => i64::from(time.num_seconds_from_midnight()) * 1000,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Enclosure, SourceItem};
    use crate::merge::matcher::{match_items, DuplicateMatches};
    use chrono::TimeZone;

    fn text_feed(updated: &str, items: Vec<SourceItem>) -> SourceFeed {
        SourceFeed {
            title: "Learning English".to_string(),
            link: "https://example.com/".to_string(),
            description: "Lessons".to_string(),
            updated: updated.to_string(),
            image_url: None,
            items,
        }
    }

    fn audio_feed(items: Vec<SourceItem>) -> SourceFeed {
        SourceFeed {
            image_url: Some("https://example.com/cover.jpg".to_string()),
            items,
            ..Default::default()
        }
    }

    fn text_item(title: &str, description: &str) -> SourceItem {
        SourceItem {
            title: title.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    fn audio_item(title: &str, url: &str) -> SourceItem {
        SourceItem {
            title: title.to_string(),
            link: format!("https://example.com/{}", title),
            published: "Tue, 10 Oct 2023 14:30:00 -0400".to_string(),
            duration: Some("00:05:30".to_string()),
            enclosures: vec![Enclosure {
                url: url.to_string(),
                media_type: "audio/mp3".to_string(),
                length: Some(1234),
            }],
            ..Default::default()
        }
    }

    const UPDATED: &str = "Fri, 13 Oct 2023 08:00:00 +0000";

    #[test]
    fn test_duration_millis() {
        assert_eq!(duration_millis("00:05:30"), 330_000);
        assert_eq!(duration_millis("01:00:00"), 3_600_000);
        assert_eq!(duration_millis("23:59:59"), 86_399_000);
    }

    #[test]
    fn test_duration_millis_unparsable_is_zero() {
        assert_eq!(duration_millis("not a duration"), 0);
        assert_eq!(duration_millis(""), 0);
        assert_eq!(duration_millis("05:30"), 0);
        assert_eq!(duration_millis("25:00:00"), 0);
    }

    #[test]
    fn test_parse_updated_fixed_layout() {
        let parsed = parse_updated("Mon, 02 Jan 2006 15:04:05 +0000").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_parse_updated_rejects_other_layouts() {
        assert!(parse_updated("Mon, 02 Jan 2006 15:04:05 GMT").is_none());
        assert!(parse_updated("2006-01-02T15:04:05Z").is_none());
        assert!(parse_updated("").is_none());
    }

    #[test]
    fn test_parse_updated_ignores_wrong_weekday() {
        // 13 Oct 2023 was a Friday
        let parsed = parse_updated("Mon, 13 Oct 2023 08:00:00 +0000").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 10, 13, 8, 0, 0).unwrap());

        assert!(parse_updated("Xyz, 13 Oct 2023 08:00:00 +0000").is_none());
        assert!(parse_updated("Monday, 13 Oct 2023 08:00:00 +0000").is_none());
        assert!(parse_updated("13 Oct 2023 08:00:00 +0000").is_none());
    }

    #[test]
    fn test_parse_pub_date_ignores_wrong_weekday() {
        let parsed = parse_pub_date("Mon, 13 Oct 2023 08:00:00 +0000").unwrap();
        assert_eq!(
            parsed.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2023, 10, 13, 8, 0, 0).unwrap()
        );
        assert!(parse_pub_date("Xyz, 13 Oct 2023 08:00:00 +0000").is_none());
    }

    #[test]
    fn test_compose_accepts_mismatched_weekday() {
        let text = text_feed(
            "Mon, 13 Oct 2023 08:00:00 +0000",
            vec![text_item("Ep1", "desc")],
        );
        let mut audio_ep = audio_item("Ep1", "A");
        audio_ep.published = "Sun, 10 Oct 2023 14:30:00 -0400".to_string();
        let audio = audio_feed(vec![audio_ep]);
        let pairs = match_items(&text.items, &audio.items, DuplicateMatches::Keep);

        let feed = compose(&text, &audio, &pairs, "en").unwrap().feed;
        assert_eq!(
            feed.last_build_date,
            Utc.with_ymd_and_hms(2023, 10, 13, 8, 0, 0).unwrap()
        );
        assert!(feed.items[0].pub_date.is_some());
    }

    #[test]
    fn test_parse_pub_date_numeric_zone() {
        let parsed = parse_pub_date("Tue, 10 Oct 2023 14:30:00 -0400").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), -4 * 3600);
        assert_eq!(
            parsed.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2023, 10, 10, 18, 30, 0).unwrap()
        );
        assert!(parse_pub_date("yesterday").is_none());
    }

    #[test]
    fn test_compose_scenario_skips_empty_description() {
        let text = text_feed(
            UPDATED,
            vec![text_item("Ep1", "desc1"), text_item("Ep2", "")],
        );
        let audio = audio_feed(vec![audio_item("Ep1", "A"), audio_item("Ep2", "B")]);
        let pairs = match_items(&text.items, &audio.items, DuplicateMatches::Keep);

        let composition = compose(&text, &audio, &pairs, "en").unwrap();
        let items = &composition.feed.items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Ep1");
        assert_eq!(items[0].enclosure.url, "A");
        assert!(composition.rejected.is_empty());
    }

    #[test]
    fn test_compose_item_fields() {
        let text = text_feed(UPDATED, vec![text_item("Ep1: Long title", "Body")]);
        let audio = audio_feed(vec![audio_item("Ep1", "https://cdn.example.com/ep1.mp3")]);
        let pairs = match_items(&text.items, &audio.items, DuplicateMatches::Keep);

        let feed = compose(&text, &audio, &pairs, "en").unwrap().feed;
        let item = &feed.items[0];
        assert_eq!(item.title, "Ep1: Long title");
        assert_eq!(item.description, "Body");
        assert_eq!(item.link, "https://example.com/Ep1");
        assert_eq!(item.guid, "https://cdn.example.com/ep1.mp3");
        assert_eq!(item.enclosure.media_type, MP3_MEDIA_TYPE);
        assert_eq!(item.enclosure.length, 0);
        assert_eq!(item.duration_ms, 330_000);
        assert!(item.pub_date.is_some());
    }

    #[test]
    fn test_compose_channel_fields() {
        let text = text_feed(UPDATED, Vec::new());
        let audio = audio_feed(Vec::new());

        let feed = compose(&text, &audio, &[], "en").unwrap().feed;
        assert_eq!(feed.title, "Learning English");
        assert_eq!(feed.link, "https://example.com/");
        assert_eq!(feed.description, "Lessons");
        assert_eq!(feed.language, "en");
        assert_eq!(feed.atom_link.as_deref(), Some("https://example.com/"));
        assert_eq!(
            feed.image_url.as_deref(),
            Some("https://example.com/cover.jpg")
        );
        let expected = Utc.with_ymd_and_hms(2023, 10, 13, 8, 0, 0).unwrap();
        assert_eq!(feed.pub_date, expected);
        assert_eq!(feed.last_build_date, expected);
        assert!(feed.items.is_empty());
    }

    #[test]
    fn test_compose_malformed_updated_is_error() {
        let text = text_feed("13/10/2023", vec![text_item("Ep1", "desc")]);
        let audio = audio_feed(vec![audio_item("Ep1", "A")]);
        let pairs = match_items(&text.items, &audio.items, DuplicateMatches::Keep);

        let err = compose(&text, &audio, &pairs, "en").unwrap_err();
        assert_eq!(err.to_string(), "Error to parse updated time");
        assert!(matches!(err, ComposeError::UpdatedTime { ref value } if value == "13/10/2023"));
    }

    #[test]
    fn test_compose_duplicate_matches_emit_two_items() {
        let text = text_feed(UPDATED, vec![text_item("Ep1: Part One", "desc")]);
        let audio = audio_feed(vec![audio_item("Ep1", "A"), audio_item("Ep1: Part", "B")]);
        let pairs = match_items(&text.items, &audio.items, DuplicateMatches::Keep);

        let feed = compose(&text, &audio, &pairs, "en").unwrap().feed;
        let urls: Vec<&str> = feed.items.iter().map(|i| i.enclosure.url.as_str()).collect();
        assert_eq!(urls, vec!["A", "B"]);
        assert!(feed.items.iter().all(|i| i.title == "Ep1: Part One"));
    }

    #[test]
    fn test_compose_degrades_bad_item_fields() {
        let text = text_feed(UPDATED, vec![text_item("Ep1", "desc")]);
        let mut audio_ep = audio_item("Ep1", "A");
        audio_ep.duration = Some("5 minutes".to_string());
        audio_ep.published = "last Tuesday".to_string();
        let audio = audio_feed(vec![audio_ep]);
        let pairs = match_items(&text.items, &audio.items, DuplicateMatches::Keep);

        let feed = compose(&text, &audio, &pairs, "en").unwrap().feed;
        assert_eq!(feed.items[0].duration_ms, 0);
        assert_eq!(feed.items[0].pub_date, None);
    }

    #[test]
    fn test_compose_rejects_audio_without_enclosure() {
        let text = text_feed(UPDATED, vec![text_item("Ep1", "desc")]);
        let mut audio_ep = audio_item("Ep1", "A");
        audio_ep.enclosures.clear();
        let audio = audio_feed(vec![audio_ep]);
        let pairs = match_items(&text.items, &audio.items, DuplicateMatches::Keep);

        let composition = compose(&text, &audio, &pairs, "en").unwrap();
        assert!(composition.feed.items.is_empty());
        assert_eq!(
            composition.rejected,
            vec![RejectedItem {
                title: "Ep1".to_string(),
                reason: ItemError::MissingEnclosure,
            }]
        );
    }

    #[test]
    fn test_add_item_validation() {
        let mut feed = OutputFeed::new("T", "L", "D", Utc::now());
        let item = OutputItem {
            guid: "g".to_string(),
            title: "Title".to_string(),
            description: "   ".to_string(),
            link: String::new(),
            enclosure: OutputEnclosure {
                url: "https://cdn.example.com/a.mp3".to_string(),
                media_type: MP3_MEDIA_TYPE.to_string(),
                length: 0,
            },
            duration_ms: 0,
            pub_date: None,
        };
        assert_eq!(
            feed.add_item(item.clone()),
            Err(ItemError::MissingDescription)
        );

        let untitled = OutputItem {
            title: String::new(),
            ..item.clone()
        };
        assert_eq!(feed.add_item(untitled), Err(ItemError::MissingTitle));

        let valid = OutputItem {
            description: "Body".to_string(),
            ..item
        };
        assert_eq!(feed.add_item(valid), Ok(()));
        assert_eq!(feed.items.len(), 1);
    }
}
