use crate::merge::composer::{OutputFeed, OutputItem, RFC1123_LAYOUT};
use chrono::{DateTime, TimeZone};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt::Display;
use std::io::{self, Cursor, Write};
use thiserror::Error;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write feed XML: {0}")]
    Io(#[from] io::Error),

    #[error("Generated feed contains invalid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl OutputFeed {
    /// Serializes the feed as a podcast RSS 2.0 document.
    pub fn to_xml(&self) -> Result<String, WriteError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:atom", ATOM_NS));
        rss.push_attribute(("xmlns:itunes", ITUNES_NS));
        writer.write_event(Event::Start(rss))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;

        text_element(&mut writer, "title", &self.title)?;
        text_element(&mut writer, "link", &self.link)?;
        text_element(&mut writer, "description", &self.description)?;
        text_element(&mut writer, "generator", &self.generator)?;
        text_element(&mut writer, "language", &self.language)?;
        text_element(&mut writer, "lastBuildDate", &rfc1123(&self.last_build_date))?;
        text_element(&mut writer, "pubDate", &rfc1123(&self.pub_date))?;

        if let Some(ref image_url) = self.image_url {
            writer.write_event(Event::Start(BytesStart::new("image")))?;
            text_element(&mut writer, "url", image_url)?;
            text_element(&mut writer, "title", &self.title)?;
            text_element(&mut writer, "link", &self.link)?;
            writer.write_event(Event::End(BytesEnd::new("image")))?;
        }

        if let Some(ref href) = self.atom_link {
            let mut atom_link = BytesStart::new("atom:link");
            atom_link.push_attribute(("href", href.as_str()));
            atom_link.push_attribute(("rel", "self"));
            atom_link.push_attribute(("type", "application/rss+xml"));
            writer.write_event(Event::Empty(atom_link))?;
        }

        text_element(&mut writer, "itunes:summary", &self.description)?;

        if let Some(ref image_url) = self.image_url {
            let mut itunes_image = BytesStart::new("itunes:image");
            itunes_image.push_attribute(("href", image_url.as_str()));
            writer.write_event(Event::Empty(itunes_image))?;
        }

        for item in &self.items {
            write_item(&mut writer, item)?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        let bytes = writer.into_inner().into_inner();
        Ok(String::from_utf8(bytes)?)
    }
}

fn write_item<W: Write>(writer: &mut Writer<W>, item: &OutputItem) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    text_element(writer, "guid", &item.guid)?;
    text_element(writer, "title", &item.title)?;
    if !item.link.is_empty() {
        text_element(writer, "link", &item.link)?;
    }
    text_element(writer, "description", &item.description)?;
    if let Some(ref pub_date) = item.pub_date {
        text_element(writer, "pubDate", &rfc1123(pub_date))?;
    }

    let length = item.enclosure.length.to_string();
    let mut enclosure = BytesStart::new("enclosure");
    enclosure.push_attribute(("url", item.enclosure.url.as_str()));
    enclosure.push_attribute(("length", length.as_str()));
    enclosure.push_attribute(("type", item.enclosure.media_type.as_str()));
    writer.write_event(Event::Empty(enclosure))?;

    text_element(writer, "itunes:summary", &item.description)?;
    if item.duration_ms > 0 {
        text_element(writer, "itunes:duration", &format_duration(item.duration_ms))?;
    }

    writer.write_event(Event::End(BytesEnd::new("item")))
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn rfc1123<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    date.format(RFC1123_LAYOUT).to_string()
}

/// Renders whole seconds as `H:MM:SS`, or `M:SS` under an hour.
fn format_duration(millis: i64) -> String {
    let total = millis / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
