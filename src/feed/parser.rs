use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors that can occur while parsing a fetched feed document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The root element is not `<rss>`, `<rdf:RDF>` or `<feed>`.
    #[error("Document is not an RSS or Atom feed")]
    NotAFeed,
}

/// A media attachment of a feed item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub media_type: String,
    pub length: Option<u64>,
}

/// A single `<item>` or `<entry>` of a source feed.
///
/// Date and duration fields are kept as the raw strings found in the
/// document; the composer decides how strictly to interpret them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceItem {
    pub title: String,
    /// Empty when the item carries neither a description nor content.
    pub description: String,
    pub link: String,
    pub published: String,
    pub enclosures: Vec<Enclosure>,
    /// Raw `itunes:duration` value, usually `HH:MM:SS`.
    pub duration: Option<String>,
}

/// A parsed RSS or Atom document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw last-updated value (`lastBuildDate`, `dc:date` or Atom `updated`).
    pub updated: String,
    pub image_url: Option<String>,
    pub items: Vec<SourceItem>,
}

#[derive(Default)]
struct ChannelDraft {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    updated: Option<String>,
    updated_fallback: Option<String>,
    image: Option<String>,
    image_fallback: Option<String>,
}

impl ChannelDraft {
    fn assign(&mut self, name: &str, value: String) {
        match name {
            "title" => set_once(&mut self.title, value),
            "link" => set_once(&mut self.link, value),
            "description" | "subtitle" => set_once(&mut self.description, value),
            "lastBuildDate" | "updated" => set_once(&mut self.updated, value),
            "dc:date" => set_once(&mut self.updated_fallback, value),
            "logo" => set_once(&mut self.image, value),
            "icon" => set_once(&mut self.image_fallback, value),
            _ => {}
        }
    }

    fn finish(self, items: Vec<SourceItem>) -> SourceFeed {
        SourceFeed {
            title: self.title.unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            updated: self.updated.or(self.updated_fallback).unwrap_or_default(),
            image_url: self.image.or(self.image_fallback),
            items,
        }
    }
}

#[derive(Default)]
struct ItemDraft {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    link: Option<String>,
    published: Option<String>,
    published_fallback: Option<String>,
    enclosures: Vec<Enclosure>,
    duration: Option<String>,
}

impl ItemDraft {
    fn assign(&mut self, name: &str, value: String) {
        match name {
            "title" => set_once(&mut self.title, value),
            "description" | "summary" => set_once(&mut self.description, value),
            "content:encoded" | "content" => set_once(&mut self.content, value),
            "link" => set_once(&mut self.link, value),
            "pubDate" | "published" => set_once(&mut self.published, value),
            "dc:date" | "updated" => set_once(&mut self.published_fallback, value),
            "itunes:duration" => set_once(&mut self.duration, value),
            _ => {}
        }
    }

    fn finish(self) -> SourceItem {
        SourceItem {
            title: self.title.unwrap_or_default(),
            description: self.description.or(self.content).unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            published: self.published.or(self.published_fallback).unwrap_or_default(),
            enclosures: self.enclosures,
            duration: self.duration,
        }
    }
}

/// First value wins; empty values never fill a slot.
fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value);
    }
}

fn is_root_element(name: &str) -> bool {
    matches!(name, "rss" | "rdf:RDF" | "feed")
}

fn is_channel_element(name: &str) -> bool {
    matches!(name, "channel" | "feed")
}

fn is_item_element(name: &str) -> bool {
    matches!(name, "item" | "entry")
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Parses an RSS 2.0, RSS 1.0 or Atom 1.0 document.
///
/// Only the fields needed to merge feeds are extracted. Elements nested
/// inside `<image>` or extension blocks never leak into channel fields.
///
/// # Security
///
/// SEC-002: quick-xml (0.37) never expands `<!ENTITY>` declarations, so
/// external entity payloads in upstream documents are inert.
pub fn parse_feed(bytes: &[u8]) -> Result<SourceFeed, ParseError> {
    let content = String::from_utf8_lossy(bytes);
    let mut reader = Reader::from_str(&content);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut channel = ChannelDraft::default();
    let mut item: Option<ItemDraft> = None;
    let mut items = Vec::new();
    let mut saw_root = false;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                if stack.is_empty() {
                    if !is_root_element(&name) {
                        return Err(ParseError::NotAFeed);
                    }
                    saw_root = true;
                }
                if is_item_element(&name) {
                    item = Some(ItemDraft::default());
                } else {
                    read_attributes(&e, &reader, &name, &stack, &mut channel, item.as_mut());
                }
                stack.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e);
                if stack.is_empty() {
                    return Err(ParseError::NotAFeed);
                }
                read_attributes(&e, &reader, &name, &stack, &mut channel, item.as_mut());
            }
            Ok(Event::Text(t)) => match t.unescape() {
                Ok(s) => text.push_str(&s),
                Err(e) => {
                    // Undeclared HTML entities such as &nbsp; are kept verbatim
                    tracing::debug!(error = %e, "Keeping text with unknown entity unescaped");
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            },
            Ok(Event::CData(c)) => text.push_str(&String::from_utf8_lossy(&c)),
            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                let value = text.trim().to_string();
                text.clear();

                if is_item_element(&name) {
                    if let Some(done) = item.take() {
                        items.push(done.finish());
                    }
                    continue;
                }

                let parent = stack.last().map(String::as_str).unwrap_or("");
                if is_item_element(parent) {
                    if let Some(draft) = item.as_mut() {
                        draft.assign(&name, value);
                    }
                } else if is_channel_element(parent) {
                    channel.assign(&name, value);
                } else if parent == "image" && name == "url" {
                    let grandparent = stack.iter().rev().nth(1).map(String::as_str);
                    // RSS 1.0 puts <image> beside <channel> under <rdf:RDF>
                    if grandparent.is_some_and(|g| is_channel_element(g) || g == "rdf:RDF") {
                        set_once(&mut channel.image, value);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            _ => {}
        }
    }

    if !saw_root {
        return Err(ParseError::NotAFeed);
    }

    Ok(channel.finish(items))
}

/// Handles the attribute-carrying elements: RSS `<enclosure>`,
/// `<itunes:image>` and Atom `<link>`.
fn read_attributes(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    name: &str,
    stack: &[String],
    channel: &mut ChannelDraft,
    item: Option<&mut ItemDraft>,
) {
    if !matches!(name, "enclosure" | "link" | "itunes:image") {
        return;
    }

    let mut href = None;
    let mut url = None;
    let mut rel = None;
    let mut media_type = None;
    let mut length = None;

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, element = name, "Skipping malformed feed attribute");
                continue;
            }
        };
        let value = match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(v) => v.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, element = name, "Skipping undecodable feed attribute");
                continue;
            }
        };
        match attr.key.as_ref() {
            b"href" => href = Some(value),
            b"url" => url = Some(value),
            b"rel" => rel = Some(value),
            b"type" => media_type = Some(value),
            b"length" => length = value.parse::<u64>().ok(),
            _ => {}
        }
    }

    let parent = stack.last().map(String::as_str).unwrap_or("");

    if is_item_element(parent) {
        let Some(item) = item else {
            return;
        };
        match (name, rel.as_deref().unwrap_or("alternate")) {
            ("enclosure", _) => {
                if let Some(url) = url.filter(|u| !u.is_empty()) {
                    item.enclosures.push(Enclosure {
                        url,
                        media_type: media_type.unwrap_or_default(),
                        length,
                    });
                }
            }
            ("link", "enclosure") => {
                if let Some(url) = href.filter(|u| !u.is_empty()) {
                    item.enclosures.push(Enclosure {
                        url,
                        media_type: media_type.unwrap_or_default(),
                        length,
                    });
                }
            }
            ("link", "alternate") => {
                if let Some(href) = href {
                    set_once(&mut item.link, href);
                }
            }
            _ => {}
        }
    } else if is_channel_element(parent) {
        match (name, rel.as_deref().unwrap_or("alternate")) {
            ("link", "alternate") => {
                if let Some(href) = href {
                    set_once(&mut channel.link, href);
                }
            }
            ("itunes:image", _) => {
                if let Some(href) = href {
                    set_once(&mut channel.image_fallback, href);
                }
            }
            _ => {}
        }
    }
}
