use crate::feed::SourceItem;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashSet;

/// U+2019, the typographic apostrophe some feeds use in titles.
const RIGHT_SINGLE_QUOTE: char = '\u{2019}';

/// What to do when several audio items match the same text item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateMatches {
    /// Emit one output item per match.
    #[default]
    Keep,
    /// Drop a match whose enclosure URL was already emitted.
    UniqueEnclosure,
}

/// A text item paired with an audio item whose title it extends.
#[derive(Debug, Clone, Copy)]
pub struct MatchedPair<'a> {
    pub text: &'a SourceItem,
    pub audio: &'a SourceItem,
}

/// Replaces typographic apostrophes with ASCII ones.
pub fn normalize_title(title: &str) -> Cow<'_, str> {
    if title.contains(RIGHT_SINGLE_QUOTE) {
        Cow::Owned(title.replace(RIGHT_SINGLE_QUOTE, "'"))
    } else {
        Cow::Borrowed(title)
    }
}

/// True when the normalized audio title is a prefix of the normalized text title.
///
/// Audio feeds often truncate titles, so `"Title"` matches `"Title: Extra"`
/// but not the other way round. An empty audio title never matches.
pub fn titles_match(audio_title: &str, text_title: &str) -> bool {
    let audio = normalize_title(audio_title);
    !audio.is_empty() && normalize_title(text_title).starts_with(&*audio)
}

/// Pairs text items with the audio items that match them.
///
/// Text items with an empty description are audio-only entries and are
/// skipped. Pairs come out grouped by text item, then in audio feed order.
pub fn match_items<'a>(
    text_items: &'a [SourceItem],
    audio_items: &'a [SourceItem],
    duplicates: DuplicateMatches,
) -> Vec<MatchedPair<'a>> {
    let audio_titles: Vec<Cow<'a, str>> = audio_items
        .iter()
        .map(|item| normalize_title(&item.title))
        .collect();
    let mut emitted: HashSet<&'a str> = HashSet::new();
    let mut pairs = Vec::new();

    for text in text_items {
        if text.description.is_empty() {
            continue;
        }
        let text_title = normalize_title(&text.title);

        for (audio, audio_title) in audio_items.iter().zip(&audio_titles) {
            if audio_title.is_empty() || !text_title.starts_with(&**audio_title) {
                continue;
            }

            if duplicates == DuplicateMatches::UniqueEnclosure {
                if let Some(enclosure) = audio.enclosures.first() {
                    if !emitted.insert(enclosure.url.as_str()) {
                        tracing::debug!(
                            title = %text.title,
                            enclosure = %enclosure.url,
                            "Dropping duplicate enclosure match"
                        );
                        continue;
                    }
                }
            }

            pairs.push(MatchedPair { text, audio });
        }
    }

    pairs
}
