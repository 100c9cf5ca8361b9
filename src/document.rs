//! Defines the display-independent post types ([`PostSummary`],
//! [`PostDetail`], [`ContentBlock`]) and the mapping from
//! [`RawDocument`]s into them. Mapping selects a fixed set of fields and
//! discards the rest of the CMS metadata; a document missing a required
//! field fails with [`Error::MalformedDocument`] instead of leaking a
//! half-built post into a page.

use crate::error::{Error, Result};
use crate::gateway::RawDocument;
use crate::richtext::RichTextSpan;
use crate::routes::is_segment;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A post as it appears in the post list.
#[derive(Clone, Debug, PartialEq)]
pub struct PostSummary {
    pub id: String,

    /// The post's uid, used in its URL.
    pub slug: String,

    /// `None` for documents that were never published (e.g., in preview).
    pub published_at: Option<DateTime<Utc>>,

    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A full post, as rendered on its own page.
#[derive(Clone, Debug, PartialEq)]
pub struct PostDetail {
    pub id: String,
    pub slug: String,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: String,
    pub content: Vec<ContentBlock>,
}

/// A section of a post body. Headings double as the section's key and
/// anchor, so they are expected to be unique within a post.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextSpan>,
}

impl PostSummary {
    /// Maps a list-query result into a [`PostSummary`].
    pub fn from_document(doc: &RawDocument) -> Result<PostSummary> {
        Ok(PostSummary {
            id: doc.id.clone(),
            slug: slug(doc)?,
            published_at: timestamp(
                doc,
                "first_publication_date",
                doc.first_publication_date.as_deref(),
            )?,
            title: required_text(doc, "title")?,
            subtitle: optional_text(doc, "subtitle")?,
            author: required_text(doc, "author")?,
        })
    }
}

impl PostDetail {
    /// Maps a full document into a [`PostDetail`]. Block order is kept
    /// exactly as the CMS returned it.
    pub fn from_document(doc: &RawDocument) -> Result<PostDetail> {
        let content = content(doc)?;

        let mut seen = HashSet::new();
        for block in &content {
            if !seen.insert(block.heading.as_str()) {
                tracing::warn!(
                    document = %doc.id,
                    heading = %block.heading,
                    "duplicate section heading"
                );
            }
        }

        Ok(PostDetail {
            id: doc.id.clone(),
            slug: slug(doc)?,
            published_at: timestamp(
                doc,
                "first_publication_date",
                doc.first_publication_date.as_deref(),
            )?,
            updated_at: timestamp(
                doc,
                "last_publication_date",
                doc.last_publication_date.as_deref(),
            )?,
            title: required_text(doc, "title")?,
            subtitle: optional_text(doc, "subtitle")?,
            author: required_text(doc, "author")?,
            banner_url: banner_url(doc)?,
            content,
        })
    }
}

/// Parses a CMS timestamp. Both RFC 3339 (`2023-03-15T00:00:00Z`) and the
/// CMS's own offset form (`2021-03-15T19:25:28+0000`) are accepted.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn timestamp(
    doc: &RawDocument,
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(value) => match parse_timestamp(value) {
            Some(t) => Ok(Some(t)),
            None => Err(Error::InvalidTimestamp {
                document: doc.id.clone(),
                field: field.to_owned(),
                value: value.to_owned(),
            }),
        },
    }
}

/// A document's uid, which names its page and its output directory.
pub(crate) fn slug(doc: &RawDocument) -> Result<String> {
    match &doc.uid {
        Some(uid) if is_segment(uid) => Ok(uid.clone()),
        Some(uid) if !uid.is_empty() => Err(Error::malformed(
            &doc.id,
            "uid",
            format!("`{}` is not a single path segment", uid),
        )),
        _ => Err(Error::malformed(&doc.id, "uid", "missing")),
    }
}

pub(crate) fn required_text(doc: &RawDocument, field: &str) -> Result<String> {
    match doc.data.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        None | Some(Value::Null) => {
            Err(Error::malformed(&doc.id, field, "missing"))
        }
        Some(other) => Err(Error::malformed(
            &doc.id,
            field,
            format!("expected text, found {}", kind(other)),
        )),
    }
}

fn optional_text(doc: &RawDocument, field: &str) -> Result<String> {
    match doc.data.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        _ => required_text(doc, field),
    }
}

// An empty image field comes back as `{}`.
fn banner_url(doc: &RawDocument) -> Result<String> {
    match doc.data.get("banner") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::Object(banner)) => match banner.get("url") {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(url)) => Ok(url.clone()),
            Some(other) => Err(Error::malformed(
                &doc.id,
                "banner.url",
                format!("expected text, found {}", kind(other)),
            )),
        },
        Some(other) => Err(Error::malformed(
            &doc.id,
            "banner",
            format!("expected image, found {}", kind(other)),
        )),
    }
}

fn content(doc: &RawDocument) -> Result<Vec<ContentBlock>> {
    let blocks = match doc.data.get("content") {
        Some(Value::Array(blocks)) => blocks,
        None | Some(Value::Null) => {
            return Err(Error::malformed(&doc.id, "content", "missing"))
        }
        Some(other) => {
            return Err(Error::malformed(
                &doc.id,
                "content",
                format!("expected group, found {}", kind(other)),
            ))
        }
    };

    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| match block {
            Value::Object(block) => content_block(doc, i, block),
            other => Err(Error::malformed(
                &doc.id,
                format!("content[{}]", i),
                format!("expected group item, found {}", kind(other)),
            )),
        })
        .collect()
}

fn content_block(
    doc: &RawDocument,
    i: usize,
    block: &Map<String, Value>,
) -> Result<ContentBlock> {
    let heading = match block.get("heading") {
        Some(Value::String(heading)) => heading.clone(),
        None | Some(Value::Null) => {
            return Err(Error::malformed(
                &doc.id,
                format!("content[{}].heading", i),
                "missing",
            ))
        }
        Some(other) => {
            return Err(Error::malformed(
                &doc.id,
                format!("content[{}].heading", i),
                format!("expected text, found {}", kind(other)),
            ))
        }
    };

    let body = match block.get("body") {
        Some(Value::Array(body)) => body,
        None | Some(Value::Null) => {
            return Err(Error::malformed(
                &doc.id,
                format!("content[{}].body", i),
                "missing",
            ))
        }
        Some(other) => {
            return Err(Error::malformed(
                &doc.id,
                format!("content[{}].body", i),
                format!("expected rich text, found {}", kind(other)),
            ))
        }
    };

    let body = body
        .iter()
        .enumerate()
        .map(|(j, span)| {
            RichTextSpan::deserialize(span).map_err(|e| {
                Error::malformed(
                    &doc.id,
                    format!("content[{}].body[{}]", i, j),
                    e.to_string(),
                )
            })
        })
        .collect::<Result<Vec<RichTextSpan>>>()?;

    Ok(ContentBlock { heading, body })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
