//! Renders CMS structured text ([`RichTextSpan`]s) to HTML.
//!
//! The [`RichTextRenderer`] trait is the trust boundary for post bodies: its
//! output is injected into pages verbatim, so an implementation is
//! responsible for escaping every piece of text and every attribute it
//! writes. [`HtmlSerializer`] escapes text, URLs and attributes; the one
//! exception is the `html` of embed blocks, which is oEmbed markup produced
//! by the CMS itself and is passed through as trusted output.

use crate::link::LinkResolver;
use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;

/// A block of structured text as returned by the CMS: a paragraph, heading,
/// list item, image, embed, etc. Apart from `text` (used for word counts),
/// the block is opaque to everything but the renderer.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RichTextSpan {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub text: String,

    /// Inline formatting over `text`.
    #[serde(default)]
    pub spans: Vec<InlineSpan>,

    /// Block-specific fields (`url` and `alt` for images, `oembed` for
    /// embeds, and so on).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RichTextSpan {
    /// A paragraph of plain text.
    pub fn paragraph(text: &str) -> RichTextSpan {
        RichTextSpan {
            kind: String::from("paragraph"),
            text: text.to_owned(),
            spans: Vec::new(),
            fields: Map::new(),
        }
    }
}

/// Inline formatting over a range of a block's text. `start` and `end` are
/// offsets in UTF-16 code units, as the CMS counts them.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct InlineSpan {
    pub start: usize,
    pub end: usize,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: Option<Value>,
}

/// Converts a sequence of rich-text blocks to markup. Implementations own
/// the sanitization of their output (see the module docs).
pub trait RichTextRenderer: Sync {
    fn render(&self, out: &mut String, body: &[RichTextSpan]) -> io::Result<()>;
}

/// Renders rich text the way the CMS's reference HTML serializer does.
pub struct HtmlSerializer<'a> {
    /// Resolves hyperlink spans and image links.
    links: &'a LinkResolver,
}

impl<'a> HtmlSerializer<'a> {
    pub fn new(links: &'a LinkResolver) -> HtmlSerializer<'a> {
        HtmlSerializer { links }
    }

    fn on_blocks<W: StrWrite>(
        &self,
        w: &mut W,
        body: &[RichTextSpan],
    ) -> io::Result<()> {
        let mut i = 0;
        while i < body.len() {
            let block = &body[i];
            match block.kind.as_str() {
                // Consecutive list items are grouped into a single list.
                kind @ ("list-item" | "o-list-item") => {
                    let (open, close) = match kind {
                        "list-item" => ("<ul>", "</ul>"),
                        _ => ("<ol>", "</ol>"),
                    };
                    w.write_str(open)?;
                    while i < body.len() && body[i].kind == kind {
                        w.write_str("<li>")?;
                        self.on_inline(w, &body[i])?;
                        w.write_str("</li>")?;
                        i += 1;
                    }
                    w.write_str(close)?;
                    continue;
                }
                _ => self.on_block(w, block)?,
            }
            i += 1;
        }
        Ok(())
    }

    fn on_block<W: StrWrite>(
        &self,
        w: &mut W,
        block: &RichTextSpan,
    ) -> io::Result<()> {
        match block.kind.as_str() {
            "paragraph" => self.wrap(w, "<p>", block, "</p>"),
            "preformatted" => self.wrap(w, "<pre>", block, "</pre>"),
            "heading1" => self.wrap(w, "<h1>", block, "</h1>"),
            "heading2" => self.wrap(w, "<h2>", block, "</h2>"),
            "heading3" => self.wrap(w, "<h3>", block, "</h3>"),
            "heading4" => self.wrap(w, "<h4>", block, "</h4>"),
            "heading5" => self.wrap(w, "<h5>", block, "</h5>"),
            "heading6" => self.wrap(w, "<h6>", block, "</h6>"),
            "image" => self.on_image(w, block),
            "embed" => self.on_embed(w, block),
            other => {
                tracing::debug!(
                    kind = other,
                    "skipping unknown rich-text block"
                );
                Ok(())
            }
        }
    }

    fn wrap<W: StrWrite>(
        &self,
        w: &mut W,
        open: &str,
        block: &RichTextSpan,
        close: &str,
    ) -> io::Result<()> {
        w.write_str(open)?;
        self.on_inline(w, block)?;
        w.write_str(close)
    }

    fn on_image<W: StrWrite>(
        &self,
        w: &mut W,
        block: &RichTextSpan,
    ) -> io::Result<()> {
        let field = |name: &str| {
            block.fields.get(name).and_then(Value::as_str).unwrap_or("")
        };
        let link = block
            .fields
            .get("linkTo")
            .and_then(|link| self.links.resolve(link));

        w.write_str(r#"<p class="block-img">"#)?;
        if let Some(href) = &link {
            w.write_str(r#"<a href=""#)?;
            escape_href(&mut *w, href)?;
            w.write_str(r#"">"#)?;
        }
        w.write_str(r#"<img src=""#)?;
        escape_href(&mut *w, field("url"))?;
        w.write_str(r#"" alt=""#)?;
        escape_html(&mut *w, field("alt"))?;
        w.write_str(r#"" />"#)?;
        if link.is_some() {
            w.write_str("</a>")?;
        }
        w.write_str("</p>")
    }

    fn on_embed<W: StrWrite>(
        &self,
        w: &mut W,
        block: &RichTextSpan,
    ) -> io::Result<()> {
        let oembed = block.fields.get("oembed");
        let field = |name: &str| {
            oembed
                .and_then(|o| o.get(name))
                .and_then(Value::as_str)
                .unwrap_or("")
        };

        w.write_str(r#"<div data-oembed=""#)?;
        escape_href(&mut *w, field("embed_url"))?;
        w.write_str(r#"" data-oembed-type=""#)?;
        escape_html(&mut *w, field("type"))?;
        w.write_str(r#"" data-oembed-provider=""#)?;
        escape_html(&mut *w, &field("provider_name").to_lowercase())?;
        w.write_str(r#"">"#)?;
        w.write_str(field("html"))?;
        w.write_str("</div>")
    }

    /// Writes a block's text with its inline spans. Overlapping spans are
    /// split so that the output is always properly nested: when a span ends
    /// while spans opened after it are still open, those are closed and then
    /// reopened.
    fn on_inline<W: StrWrite>(
        &self,
        w: &mut W,
        block: &RichTextSpan,
    ) -> io::Result<()> {
        let text = block.text.as_str();
        let offsets = Utf16Offsets::new(text);
        let len = offsets.len();

        let spans: Vec<&InlineSpan> = block
            .spans
            .iter()
            .filter(|s| s.start < s.end && s.start < len)
            .collect();

        let mut boundaries: Vec<usize> = vec![0, len];
        for span in &spans {
            boundaries.push(span.start);
            boundaries.push(clamped_end(span, len));
        }
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut open: Vec<&InlineSpan> = Vec::new();
        for (k, &at) in boundaries.iter().enumerate() {
            // close everything ending here, reopening anything that was
            // opened later but hasn't ended yet
            if open.iter().any(|s| clamped_end(s, len) == at) {
                let mut reopen = Vec::new();
                while let Some(span) = open.pop() {
                    self.close_span(w, span)?;
                    if clamped_end(span, len) > at {
                        reopen.push(span);
                    }
                    if !open.iter().any(|s| clamped_end(s, len) == at) {
                        break;
                    }
                }
                for span in reopen.into_iter().rev() {
                    self.open_span(w, span)?;
                    open.push(span);
                }
            }

            let mut starting: Vec<&InlineSpan> =
                spans.iter().copied().filter(|s| s.start == at).collect();
            // longest first, so shorter spans nest inside
            starting.sort_by(|a, b| {
                clamped_end(b, len).cmp(&clamped_end(a, len))
            });
            for span in starting {
                self.open_span(w, span)?;
                open.push(span);
            }

            if let Some(&next) = boundaries.get(k + 1) {
                on_text(w, &text[offsets.byte(at)..offsets.byte(next)])?;
            }
        }

        while let Some(span) = open.pop() {
            self.close_span(w, span)?;
        }
        Ok(())
    }

    fn open_span<W: StrWrite>(
        &self,
        w: &mut W,
        span: &InlineSpan,
    ) -> io::Result<()> {
        match span.kind.as_str() {
            "strong" => w.write_str("<strong>"),
            "em" => w.write_str("<em>"),
            "hyperlink" => {
                let data = span.data.as_ref();
                match data.and_then(|d| self.links.resolve(d)) {
                    Some(href) => {
                        w.write_str(r#"<a href=""#)?;
                        escape_href(&mut *w, &href)?;
                        w.write_str(r#"""#)?;
                        let target = data
                            .and_then(|d| d.get("target"))
                            .and_then(Value::as_str)
                            .filter(|t| !t.is_empty());
                        if let Some(target) = target {
                            w.write_str(r#" target=""#)?;
                            escape_html(&mut *w, target)?;
                            w.write_str(r#"" rel="noopener""#)?;
                        }
                        w.write_str(">")
                    }
                    None => w.write_str("<span>"),
                }
            }
            "label" => {
                let label = span
                    .data
                    .as_ref()
                    .and_then(|d| d.get("label"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                w.write_str(r#"<span class=""#)?;
                escape_html(&mut *w, label)?;
                w.write_str(r#"">"#)
            }
            _ => w.write_str("<span>"),
        }
    }

    fn close_span<W: StrWrite>(
        &self,
        w: &mut W,
        span: &InlineSpan,
    ) -> io::Result<()> {
        match span.kind.as_str() {
            "strong" => w.write_str("</strong>"),
            "em" => w.write_str("</em>"),
            "hyperlink" => match span
                .data
                .as_ref()
                .and_then(|d| self.links.resolve(d))
            {
                Some(_) => w.write_str("</a>"),
                None => w.write_str("</span>"),
            },
            _ => w.write_str("</span>"),
        }
    }
}

impl RichTextRenderer for HtmlSerializer<'_> {
    fn render(
        &self,
        out: &mut String,
        body: &[RichTextSpan],
    ) -> io::Result<()> {
        self.on_blocks(out, body)
    }
}

fn clamped_end(span: &InlineSpan, len: usize) -> usize {
    span.end.min(len)
}

/// Escapes text, turning line breaks into `<br />`.
fn on_text<W: StrWrite>(w: &mut W, text: &str) -> io::Result<()> {
    let mut lines = text.split('\n');
    if let Some(first) = lines.next() {
        escape_html(&mut *w, first)?;
    }
    for line in lines {
        w.write_str("<br />")?;
        escape_html(&mut *w, line)?;
    }
    Ok(())
}

/// Maps UTF-16 offsets onto byte offsets of a string. Offsets that fall
/// inside a surrogate pair resolve to the start of that character.
struct Utf16Offsets {
    /// `bytes[i]` is the byte offset of UTF-16 offset `i`.
    bytes: Vec<usize>,
}

impl Utf16Offsets {
    fn new(text: &str) -> Utf16Offsets {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        for (byte, c) in text.char_indices() {
            for _ in 0..c.len_utf16() {
                bytes.push(byte);
            }
        }
        bytes.push(text.len());
        Utf16Offsets { bytes }
    }

    /// The length of the text in UTF-16 code units.
    fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    fn byte(&self, utf16: usize) -> usize {
        self.bytes[utf16.min(self.len())]
    }
}
