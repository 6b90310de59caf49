//! RSS document parsing and text normalization.
//!
//! Structural parsing goes through quick-xml's serde deserializer, which
//! resolves XML-level entities once. Upstream feeds routinely double-encode
//! entities (`&amp;amp;`), so every text field then gets exactly one more
//! unescape pass before anything downstream sees it.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// Document is not well-formed XML (or not an RSS document at all)
    #[error("Malformed XML: {0}")]
    MalformedXml(String),
    /// Document parsed but lacks a required element
    #[error("Missing required element: {0}")]
    MissingField(&'static str),
}

/// A parsed feed document. Transient: produced here, consumed by the
/// ingestion service, then discarded.
#[derive(Debug)]
pub struct RawFeed {
    pub title: String,
    pub description: String,
    /// Items in document order.
    pub items: Vec<RawItem>,
}

#[derive(Debug)]
pub struct RawItem {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    /// The document's pubDate string, untouched. The ingestion layer decides
    /// what an unparseable date means.
    pub published_at_raw: Option<String>,
}

// Serde mirror of the RSS 2.0 document shape. Unknown elements are ignored.

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: Option<RssChannel>,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Parse raw feed bytes into a [`RawFeed`].
///
/// Fails with [`ParseError::MalformedXml`] when the bytes are not
/// well-formed XML and [`ParseError::MissingField`] when the document has
/// no `channel` or the channel has no `title`.
pub fn parse(bytes: &[u8]) -> Result<RawFeed, ParseError> {
    let doc: RssDocument =
        quick_xml::de::from_reader(bytes).map_err(|e| ParseError::MalformedXml(e.to_string()))?;

    let channel = doc.channel.ok_or(ParseError::MissingField("channel"))?;
    let title = channel
        .title
        .ok_or(ParseError::MissingField("channel/title"))?;

    let items = channel
        .items
        .into_iter()
        .map(|item| RawItem {
            title: unescape_once(&item.title.unwrap_or_default()),
            description: item.description.as_deref().map(unescape_once),
            link: item.link,
            published_at_raw: item.pub_date,
        })
        .collect();

    Ok(RawFeed {
        title: unescape_once(&title),
        description: unescape_once(&channel.description.unwrap_or_default()),
        items,
    })
}

/// An entity reference name never gets longer than a hex char reference
/// (`#x10FFFF`); anything past this is ordinary text with a stray `&`.
const MAX_ENTITY_NAME_LEN: usize = 10;

/// Apply one entity-unescape pass to already-parsed text.
///
/// The pass is per-entity, not per-field: each recognized `&...;` sequence
/// is resolved individually and everything else, including bare ampersands,
/// passes through untouched. A field like `A & B &amp; C` (one entity
/// singly encoded, one doubly) must come out as `A & B & C`, so a
/// whole-field unescape that rejects the bare `&` would be wrong here.
fn unescape_once(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let resolved = rest[1..]
            .find(';')
            .filter(|end| (1..=MAX_ENTITY_NAME_LEN).contains(end))
            .and_then(|end| Some((resolve_entity(&rest[1..=end])?, end + 2)));

        match resolved {
            Some((ch, consumed)) => {
                out.push_str(&ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve one entity name (the text between `&` and `;`): the five XML
/// builtins via quick-xml's escape layer, plus decimal and hex character
/// references.
fn resolve_entity(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        let code = u32::from_str_radix(hex, 16).ok()?;
        return char::from_u32(code).map(String::from);
    }
    if let Some(dec) = name.strip_prefix('#') {
        let code: u32 = dec.parse().ok()?;
        return char::from_u32(code).map(String::from);
    }
    quick_xml::escape::resolve_predefined_entity(name).map(str::to_string)
}
