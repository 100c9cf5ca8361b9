//! Converts view data ([`crate::view`]) into template [`Value`]s.
//!
//! Templates print values verbatim, so every piece of text is HTML-escaped
//! here and every URL is escaped for use in an attribute. The one exception
//! is a rendered block's `html`, which is the rich-text renderer's output
//! and is already safe to inject.

use crate::view::{NavLink, PostList, PostListItem, PostPage, RenderedBlock};
use gtmpl_value::Value;
use pulldown_cmark::escape::{escape_href, escape_html};
use std::collections::HashMap;
use url::Url;

/// Escapes `s` for use as HTML text.
pub fn text(s: &str) -> Value {
    let mut out = String::with_capacity(s.len());
    // writing to a String can't fail
    let _ = escape_html(&mut out, s);
    Value::String(out)
}

/// Escapes `url` for use in an `href` or `src` attribute.
pub fn url(url: &Url) -> Value {
    let mut out = String::with_capacity(url.as_str().len());
    let _ = escape_href(&mut out, url.as_str());
    Value::String(out)
}

fn optional<T>(opt: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
    match opt {
        Some(x) => f(x),
        None => Value::Nil,
    }
}

fn number(n: usize) -> Value {
    Value::String(n.to_string())
}

impl From<&PostListItem> for Value {
    fn from(item: &PostListItem) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), text(&item.summary.title));
        m.insert("subtitle".to_owned(), text(&item.summary.subtitle));
        m.insert("author".to_owned(), text(&item.summary.author));
        m.insert("published".to_owned(), text(&item.published));
        m.insert("url".to_owned(), url(&item.url));
        Value::Object(m)
    }
}

impl From<&PostList> for Value {
    /// Converts a [`PostList`] into a [`Value::Object`] with fields `posts`,
    /// `page`, `total_pages`, `prev`, `next` and `preview`.
    fn from(list: &PostList) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert(
            "posts".to_owned(),
            Value::Array(list.posts.iter().map(Value::from).collect()),
        );
        m.insert("page".to_owned(), number(list.page));
        m.insert("total_pages".to_owned(), number(list.total_pages));
        m.insert("prev".to_owned(), optional(list.prev.as_ref(), url));
        m.insert("next".to_owned(), optional(list.next.as_ref(), url));
        m.insert("preview".to_owned(), Value::Bool(list.preview));
        Value::Object(m)
    }
}

impl From<&RenderedBlock> for Value {
    fn from(block: &RenderedBlock) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("heading".to_owned(), text(&block.heading));
        m.insert("anchor".to_owned(), text(&block.anchor));
        m.insert("html".to_owned(), Value::String(block.html.clone()));
        Value::Object(m)
    }
}

impl From<&NavLink> for Value {
    fn from(link: &NavLink) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), text(&link.title));
        m.insert("url".to_owned(), url(&link.url));
        Value::Object(m)
    }
}

impl From<&PostPage> for Value {
    /// Converts a [`PostPage`] into a [`Value::Object`]. `edited`,
    /// `previous` and `next` are nil when absent.
    fn from(page: &PostPage) -> Value {
        let post = &page.post;
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), text(&post.title));
        m.insert("subtitle".to_owned(), text(&post.subtitle));
        m.insert("author".to_owned(), text(&post.author));
        m.insert(
            "banner_url".to_owned(),
            match Url::parse(&post.banner_url) {
                Ok(banner) => url(&banner),
                Err(_) => Value::Nil,
            },
        );
        m.insert("url".to_owned(), url(&page.url));
        m.insert("published".to_owned(), text(&page.published));
        m.insert("edited".to_owned(), optional(page.edited.as_deref(), text));
        m.insert("words".to_owned(), number(page.words));
        m.insert("reading_time".to_owned(), number(page.reading_time));
        m.insert(
            "blocks".to_owned(),
            Value::Array(page.blocks.iter().map(Value::from).collect()),
        );
        m.insert(
            "previous".to_owned(),
            optional(page.previous.as_ref(), Value::from),
        );
        m.insert(
            "next".to_owned(),
            optional(page.next.as_ref(), Value::from),
        );
        m.insert("preview".to_owned(), Value::Bool(page.preview));
        Value::Object(m)
    }
}

/// The value for a status page: loading, not found or error.
pub fn status(code: u16, message: &str, loading: bool) -> Value {
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("status".to_owned(), number(code as usize));
    m.insert("message".to_owned(), text(message));
    m.insert("loading".to_owned(), Value::Bool(loading));
    Value::Object(m)
}
