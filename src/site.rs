//! Answers [`Route`]s with [`Response`]s.
//!
//! Serving a page happens in two steps so that the slow part can run on
//! worker threads: [`load`] queries the gateway and builds the view data
//! (thread-safe), then [`Site::respond`] applies the templates.

use crate::error::Error;
use crate::gateway::Gateway;
use crate::richtext::HtmlSerializer;
use crate::routes::{Response, Route};
use crate::view::{
    encode_cookie_value, Loader, PostList, PostPage, RenderState,
    RequestContext, Settings, PREVIEW_COOKIE,
};
use crate::write::{self, Writer};

const NOT_FOUND_MESSAGE: &str = "Página não encontrada";
const ERROR_MESSAGE: &str = "Não foi possível carregar esta página";

/// The data loaded for a page route.
#[derive(Debug)]
pub enum Loaded {
    List(RenderState<PostList>),
    Post(RenderState<PostPage>),
}

/// Loads the data for `route`. Returns `None` for routes that aren't pages.
pub fn load(
    loader: &Loader,
    route: &Route,
    ctx: &RequestContext,
) -> Option<Loaded> {
    match route {
        Route::Home => Some(Loaded::List(loader.list(1, ctx).into())),
        Route::ListPage(n) => Some(Loaded::List(loader.list(*n, ctx).into())),
        Route::Post(slug) => {
            Some(Loaded::Post(loader.detail(slug, ctx).into()))
        }
        Route::Preview { .. } | Route::ExitPreview => None,
    }
}

/// The site: a gateway, its presentation settings and the templates.
pub struct Site<'a> {
    gateway: &'a dyn Gateway,
    settings: &'a Settings,
    renderer: HtmlSerializer<'a>,
    writer: Writer<'a>,
}

impl<'a> Site<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        settings: &'a Settings,
        writer: Writer<'a>,
    ) -> Site<'a> {
        Site {
            gateway,
            settings,
            renderer: HtmlSerializer::new(&settings.links),
            writer,
        }
    }

    /// A [`Loader`] over this site's gateway and settings. Loaders can be
    /// shared between threads.
    pub fn loader(&self) -> Loader<'_> {
        Loader {
            gateway: self.gateway,
            settings: self.settings,
            renderer: &self.renderer,
        }
    }

    /// Answers a request for `path_and_query`.
    pub fn handle(
        &self,
        path_and_query: &str,
        ctx: &RequestContext,
    ) -> Response {
        match Route::parse(path_and_query) {
            Some(route) => self.render(&route, ctx),
            None => self.not_found(),
        }
    }

    pub fn render(&self, route: &Route, ctx: &RequestContext) -> Response {
        match route {
            Route::Preview { token, document_id } => {
                self.enter_preview(route, token, document_id)
            }
            Route::ExitPreview => {
                Response::redirect(&self.settings.links.home()).with_header(
                    "Set-Cookie",
                    format!("{}=; Path=/; Max-Age=0", PREVIEW_COOKIE),
                )
            }
            _ => match load(&self.loader(), route, ctx) {
                Some(loaded) => self.respond(route, loaded),
                None => self.not_found(),
            },
        }
    }

    /// Applies the templates to loaded data.
    pub fn respond(&self, route: &Route, loaded: Loaded) -> Response {
        match loaded {
            Loaded::List(state) => {
                self.page(route, state, |l| self.writer.list(l))
            }
            Loaded::Post(state) => {
                self.page(route, state, |p| self.writer.post(p))
            }
        }
    }

    /// The page shown while a page's data is still being generated.
    pub fn fallback(&self) -> Response {
        self.status_page(200, "", true)
    }

    pub fn not_found(&self) -> Response {
        self.status_page(404, NOT_FOUND_MESSAGE, false)
    }

    fn page<T>(
        &self,
        route: &Route,
        state: RenderState<T>,
        template: impl FnOnce(&T) -> write::Result<String>,
    ) -> Response {
        match state {
            RenderState::Ready(data) => match template(&data) {
                Ok(body) => Response::html(200, body),
                Err(err) => {
                    tracing::error!(route = %route.path(), "{}", err);
                    self.status_page(500, ERROR_MESSAGE, false)
                }
            },
            RenderState::Loading => self.fallback(),
            RenderState::NotFound => {
                tracing::debug!(route = %route.path(), "not found");
                self.not_found()
            }
            RenderState::Error(err) => self.error(route, &err),
        }
    }

    fn enter_preview(
        &self,
        route: &Route,
        token: &str,
        document_id: &str,
    ) -> Response {
        let ctx = RequestContext::preview(token);
        let target = self.loader().slug_for_id(document_id, &ctx).and_then(
            |slug| {
                self.settings.links.post(&slug).map_err(|e| {
                    Error::malformed(document_id, "uid", e.to_string())
                })
            },
        );
        match target {
            Ok(url) => Response::redirect(&url).with_header(
                "Set-Cookie",
                format!(
                    "{}={}; Path=/; SameSite=Lax",
                    PREVIEW_COOKIE,
                    encode_cookie_value(token)
                ),
            ),
            Err(err) if err.is_not_found() => self.not_found(),
            Err(err) => self.error(route, &err),
        }
    }

    fn error(&self, route: &Route, err: &Error) -> Response {
        tracing::error!(route = %route.path(), "{}", err);
        self.status_page(500, ERROR_MESSAGE, false)
    }

    fn status_page(
        &self,
        status: u16,
        message: &str,
        loading: bool,
    ) -> Response {
        match self.writer.status(status, message, loading) {
            Ok(body) => Response::html(status, body),
            Err(err) => {
                tracing::error!(status, "rendering status page: {}", err);
                Response {
                    status,
                    headers: vec![(
                        String::from("Content-Type"),
                        String::from("text/plain; charset=utf-8"),
                    )],
                    body: message.to_owned(),
                }
            }
        }
    }
}
