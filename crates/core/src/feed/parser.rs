//! RSS 2.0 and Atom parsing on top of the quick-xml event reader.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{Feed, FeedError, FeedItem};

/// Parse a feed document, auto-detecting the dialect from the root element.
pub fn parse_feed(xml: &str) -> Result<Feed, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                return match name.as_str() {
                    "rss" => parse_rss(&mut reader),
                    "feed" => parse_atom(&mut reader),
                    _ => Err(FeedError::UnsupportedFormat),
                };
            }
            Ok(Event::Eof) => return Err(FeedError::UnsupportedFormat),
            Err(e) => {
                return Err(FeedError::Parse(format!(
                    "position {}: {:?}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }
}

fn parse_rss(reader: &mut Reader<&[u8]>) -> Result<Feed, FeedError> {
    let mut feed = Feed::default();
    let mut buf = Vec::new();

    let mut current_item: Option<FeedItem> = None;
    let mut current_element: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                match name.as_str() {
                    "item" => {
                        current_item = Some(FeedItem::default());
                        current_element = None;
                    }
                    "enclosure" => {
                        if let Some(item) = &mut current_item {
                            item.enclosure_url = attribute_value(e, b"url");
                        }
                    }
                    _ => {
                        current_element = Some(name);
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                // Enclosures are typically self-closing.
                if name == "enclosure" {
                    if let Some(item) = &mut current_item {
                        item.enclosure_url = attribute_value(e, b"url");
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                if name == "item" {
                    if let Some(item) = current_item.take() {
                        feed.items.push(item);
                    }
                }
                current_element = None;
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if !text.is_empty() {
                    route_rss_text(&mut feed, &mut current_item, &current_element, &text);
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                if !text.is_empty() {
                    route_rss_text(&mut feed, &mut current_item, &current_element, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FeedError::Parse(format!(
                    "position {}: {:?}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(feed)
}

fn route_rss_text(
    feed: &mut Feed,
    current_item: &mut Option<FeedItem>,
    current_element: &Option<String>,
    text: &str,
) {
    let Some(element) = current_element else {
        return;
    };

    match current_item {
        Some(item) => match element.as_str() {
            "title" => append(&mut item.title, text),
            "link" => append(&mut item.link, text),
            "description" => append(&mut item.description, text),
            "pubDate" => append(&mut item.published, text),
            _ => {}
        },
        // Only the channel title before the first item matters here.
        None => {
            if element == "title" && feed.title.is_none() {
                feed.title = Some(text.to_string());
            }
        }
    }
}

fn parse_atom(reader: &mut Reader<&[u8]>) -> Result<Feed, FeedError> {
    let mut feed = Feed::default();
    let mut buf = Vec::new();

    let mut current_item: Option<FeedItem> = None;
    let mut current_element: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                match name.as_str() {
                    "entry" => {
                        current_item = Some(FeedItem::default());
                        current_element = None;
                    }
                    "link" => {
                        if let Some(item) = &mut current_item {
                            assign_atom_link(item, e);
                        }
                    }
                    _ => {
                        current_element = Some(name);
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                if name == "link" {
                    if let Some(item) = &mut current_item {
                        assign_atom_link(item, e);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                if name == "entry" {
                    if let Some(item) = current_item.take() {
                        feed.items.push(item);
                    }
                }
                current_element = None;
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if !text.is_empty() {
                    route_atom_text(&mut feed, &mut current_item, &current_element, &text);
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                if !text.is_empty() {
                    route_atom_text(&mut feed, &mut current_item, &current_element, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FeedError::Parse(format!(
                    "position {}: {:?}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(feed)
}

fn route_atom_text(
    feed: &mut Feed,
    current_item: &mut Option<FeedItem>,
    current_element: &Option<String>,
    text: &str,
) {
    let Some(element) = current_element else {
        return;
    };

    match current_item {
        Some(item) => match element.as_str() {
            "title" => append(&mut item.title, text),
            "content" => append(&mut item.description, text),
            "summary" => {
                if item.description.is_none() {
                    item.description = Some(text.to_string());
                }
            }
            "updated" => append(&mut item.published, text),
            _ => {}
        },
        None => {
            if element == "title" && feed.title.is_none() {
                feed.title = Some(text.to_string());
            }
        }
    }
}

fn assign_atom_link(item: &mut FeedItem, e: &quick_xml::events::BytesStart) {
    let rel = attribute_value(e, b"rel");
    let usable = matches!(rel.as_deref(), None | Some("alternate") | Some("enclosure"));
    if usable && item.link.is_none() {
        item.link = attribute_value(e, b"href");
    }
}

fn attribute_value(e: &quick_xml::events::BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            if let Ok(value) = attr.unescape_value() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn append(slot: &mut Option<String>, text: &str) {
    match slot {
        Some(existing) => existing.push_str(text),
        None => *slot = Some(text.to_string()),
    }
}
