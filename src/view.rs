//! Builds display-ready data for the two pages of the site: the post list
//! ([`PostList`]) and the post page ([`PostPage`]). A [`Loader`] asks the
//! gateway for documents, maps them ([`crate::document`]) and derives the
//! presentation fields: formatted dates ([`crate::date`]), reading time
//! ([`crate::metrics`]), rendered body markup ([`crate::richtext`]) and
//! navigation ([`crate::adjacent`]).

use crate::adjacent::{self, Adjacency, AdjacentPosts};
use crate::date::DateFormatter;
use crate::document::{PostDetail, PostSummary};
use crate::error::{Error, Result};
use crate::gateway::{
    Gateway, GetOptions, Predicate, QueryOptions, POSTS_TYPE,
};
use crate::link::LinkResolver;
use crate::metrics;
use crate::richtext::RichTextRenderer;
use url::Url;

/// The cookie carrying the preview ref.
pub const PREVIEW_COOKIE: &str = "io.prismic.preview";

/// The page size used when walking every post.
const LISTING_PAGE_SIZE: usize = 100;

/// Per-request settings. Preview mode lives here rather than in global
/// state so that every query of a request sees the same content.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestContext {
    /// The content ref to preview, if any. `None` means published content.
    pub preview: Option<String>,
}

impl RequestContext {
    pub fn published() -> RequestContext {
        RequestContext { preview: None }
    }

    pub fn preview(reference: &str) -> RequestContext {
        RequestContext {
            preview: Some(reference.to_owned()),
        }
    }

    /// Reads the preview ref from a `Cookie` header value.
    pub fn from_cookie_header(header: &str) -> RequestContext {
        let preview = header
            .split(';')
            .filter_map(|pair| {
                let mut kv = pair.trim().splitn(2, '=');
                match (kv.next(), kv.next()) {
                    (Some(PREVIEW_COOKIE), Some(value))
                        if !value.is_empty() =>
                    {
                        Some(decode_cookie_value(value))
                    }
                    _ => None,
                }
            })
            .next();
        RequestContext { preview }
    }

    pub fn is_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn reference(&self) -> Option<&str> {
        self.preview.as_deref()
    }
}

/// Percent-encodes a cookie value.
pub fn encode_cookie_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn decode_cookie_value(value: &str) -> String {
    url::form_urlencoded::parse(format!("v={}", value).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// The state a page is rendered in. Pages never render partial data: until
/// the data is complete the page is `Loading`.
#[derive(Debug)]
pub enum RenderState<T> {
    /// Data is still being generated; only a loading indicator is shown.
    Loading,
    Ready(T),
    NotFound,
    Error(Error),
}

impl<T> RenderState<T> {
    /// The HTTP status a page in this state is served with.
    pub fn status(&self) -> u16 {
        match self {
            RenderState::Loading | RenderState::Ready(_) => 200,
            RenderState::NotFound => 404,
            RenderState::Error(_) => 500,
        }
    }
}

impl<T> From<Result<T>> for RenderState<T> {
    /// Missing content becomes [`RenderState::NotFound`]; any other error
    /// becomes [`RenderState::Error`].
    fn from(result: Result<T>) -> RenderState<T> {
        match result {
            Ok(value) => RenderState::Ready(value),
            Err(err) if err.is_not_found() => RenderState::NotFound,
            Err(err) => RenderState::Error(err),
        }
    }
}

/// A post as shown in the post list.
#[derive(Clone, Debug, PartialEq)]
pub struct PostListItem {
    pub summary: PostSummary,
    pub url: Url,

    /// The formatted publication date; empty for unpublished documents.
    pub published: String,
}

/// One page of the post list.
#[derive(Clone, Debug, PartialEq)]
pub struct PostList {
    pub posts: Vec<PostListItem>,

    /// The 1-based page number.
    pub page: usize,
    pub total_pages: usize,
    pub prev: Option<Url>,
    pub next: Option<Url>,

    /// Where the CMS serves the next page of results, if any.
    pub next_page: Option<String>,
    pub preview: bool,
}

/// A section of a post with its body rendered to markup.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedBlock {
    pub heading: String,

    /// A URL fragment derived from the heading.
    pub anchor: String,

    /// Trusted output of the rich-text renderer.
    pub html: String,
}

/// A neighbouring post with its URL.
#[derive(Clone, Debug, PartialEq)]
pub struct NavLink {
    pub title: String,
    pub url: Url,
}

/// A full post, ready for its page template.
#[derive(Clone, Debug, PartialEq)]
pub struct PostPage {
    pub post: PostDetail,
    pub url: Url,
    pub published: String,

    /// The "last edited" line, present when the post was republished after
    /// its first publication.
    pub edited: Option<String>,
    pub words: usize,
    pub reading_time: usize,
    pub blocks: Vec<RenderedBlock>,
    pub previous: Option<NavLink>,
    pub next: Option<NavLink>,
    pub preview: bool,
}

/// Presentation settings shared by every page.
#[derive(Clone, Debug)]
pub struct Settings {
    pub links: LinkResolver,
    pub dates: DateFormatter,
    pub publish_date_pattern: String,
    pub edited_date_pattern: String,
    pub index_page_size: usize,
    pub adjacency: Adjacency,
}

/// Loads page data from a [`Gateway`].
pub struct Loader<'a> {
    pub gateway: &'a dyn Gateway,
    pub settings: &'a Settings,
    pub renderer: &'a dyn RichTextRenderer,
}

impl<'a> Loader<'a> {
    /// Loads the 1-based list page `page`.
    pub fn list(&self, page: usize, ctx: &RequestContext) -> Result<PostList> {
        let page = page.max(1);
        let response = self.gateway.query(
            &[Predicate::document_type(POSTS_TYPE)],
            &QueryOptions {
                fetch: ["title", "subtitle", "author"]
                    .iter()
                    .map(|f| format!("{}.{}", POSTS_TYPE, f))
                    .collect(),
                page_size: Some(self.settings.index_page_size),
                page: Some(page),
                reference: ctx.preview.clone(),
                ..QueryOptions::default()
            },
        )?;

        // Pages past the end don't exist, but an empty first page is just
        // an empty blog.
        if page > 1 && response.results.is_empty() {
            return Err(Error::NotFound {
                document_type: POSTS_TYPE.to_owned(),
                uid: format!("page {}", page),
            });
        }

        let posts = response
            .results
            .iter()
            .map(|doc| {
                let summary = PostSummary::from_document(doc)?;
                Ok(PostListItem {
                    url: self.post_url(&summary.slug)?,
                    published: self.settings.dates.format_optional(
                        summary.published_at.as_ref(),
                        &self.settings.publish_date_pattern,
                    )?,
                    summary,
                })
            })
            .collect::<Result<Vec<PostListItem>>>()?;

        let total_pages = response.total_pages.max(1);
        Ok(PostList {
            posts,
            page,
            total_pages,
            prev: match page {
                1 => None,
                _ => Some(self.list_url(page - 1)?),
            },
            next: match page < total_pages {
                true => Some(self.list_url(page + 1)?),
                false => None,
            },
            next_page: response.next_page,
            preview: ctx.is_preview(),
        })
    }

    /// Loads the post whose uid is `slug`.
    pub fn detail(&self, slug: &str, ctx: &RequestContext) -> Result<PostPage> {
        let doc = self.gateway.get_by_uid(
            POSTS_TYPE,
            slug,
            &GetOptions {
                reference: ctx.preview.clone(),
            },
        )?;
        let post = PostDetail::from_document(&doc)?;

        let adjacent = adjacent::resolve(
            self.gateway,
            &post.id,
            &self.settings.adjacency,
            ctx.reference(),
        )?;

        let blocks = post
            .content
            .iter()
            .map(|block| {
                let mut html = String::new();
                self.renderer.render(&mut html, &block.body)?;
                Ok(RenderedBlock {
                    heading: block.heading.clone(),
                    anchor: slug::slugify(&block.heading),
                    html,
                })
            })
            .collect::<Result<Vec<RenderedBlock>>>()?;

        let words = metrics::word_count(&post.content);
        let AdjacentPosts { previous, next } = adjacent;
        Ok(PostPage {
            url: self.post_url(&post.slug)?,
            published: self.settings.dates.format_optional(
                post.published_at.as_ref(),
                &self.settings.publish_date_pattern,
            )?,
            edited: match (&post.updated_at, &post.published_at) {
                (Some(updated), published)
                    if Some(updated) != published.as_ref() =>
                {
                    Some(self.settings.dates.format(
                        updated,
                        &self.settings.edited_date_pattern,
                    )?)
                }
                _ => None,
            },
            words,
            reading_time: metrics::minutes(words),
            blocks,
            previous: self.nav_link(previous)?,
            next: self.nav_link(next)?,
            preview: ctx.is_preview(),
            post,
        })
    }

    /// Counts the pages of the post list. No post is mapped, so a malformed
    /// post fails only the list page it is on.
    pub fn total_pages(&self, ctx: &RequestContext) -> Result<usize> {
        let response = self.gateway.query(
            &[Predicate::document_type(POSTS_TYPE)],
            &QueryOptions {
                fetch: vec![format!("{}.title", POSTS_TYPE)],
                page_size: Some(self.settings.index_page_size),
                page: Some(1),
                reference: ctx.preview.clone(),
                ..QueryOptions::default()
            },
        )?;
        Ok(response.total_pages.max(1))
    }

    /// Lists the uid of every post, walking all result pages. Uids are
    /// returned as stored; an unusable one fails when its post is loaded.
    /// Posts without a uid have no page and are skipped.
    pub fn slugs(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        let mut slugs = Vec::new();
        let mut page = 1;
        loop {
            let response = self.gateway.query(
                &[Predicate::document_type(POSTS_TYPE)],
                &QueryOptions {
                    fetch: vec![format!("{}.title", POSTS_TYPE)],
                    page_size: Some(LISTING_PAGE_SIZE),
                    page: Some(page),
                    reference: ctx.preview.clone(),
                    ..QueryOptions::default()
                },
            )?;
            for doc in &response.results {
                match &doc.uid {
                    Some(uid) if !uid.is_empty() => slugs.push(uid.clone()),
                    _ => tracing::warn!(document = %doc.id, "post has no uid"),
                }
            }
            if response.next_page.is_none() || response.results.is_empty() {
                return Ok(slugs);
            }
            page += 1;
        }
    }

    /// Finds the uid of the document with id `id`, used to send previews to
    /// the right page.
    pub fn slug_for_id(
        &self,
        id: &str,
        ctx: &RequestContext,
    ) -> Result<String> {
        let response = self.gateway.query(
            &[Predicate::at("document.id", id)],
            &QueryOptions {
                page_size: Some(1),
                reference: ctx.preview.clone(),
                ..QueryOptions::default()
            },
        )?;
        match response.results.first() {
            Some(doc) => crate::document::slug(doc),
            None => Err(Error::NotFound {
                document_type: String::from("document"),
                uid: id.to_owned(),
            }),
        }
    }

    fn post_url(&self, slug: &str) -> Result<Url> {
        self.settings.links.post(slug).map_err(|e| {
            Error::malformed(slug, "uid", format!("not usable in a URL: {}", e))
        })
    }

    fn list_url(&self, page: usize) -> Result<Url> {
        self.settings.links.list_page(page).map_err(|e| {
            Error::Template(format!("building list page URL: {}", e))
        })
    }

    fn nav_link(
        &self,
        post: Option<adjacent::PostRef>,
    ) -> Result<Option<NavLink>> {
        match post {
            None => Ok(None),
            Some(post) => Ok(Some(NavLink {
                url: self.post_url(&post.slug)?,
                title: post.title,
            })),
        }
    }
}
