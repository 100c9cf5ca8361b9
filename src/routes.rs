//! The site's routes and the responses served for them.

use std::path::{Component, Path, PathBuf};
use url::Url;

/// A page or endpoint of the site. Paths are relative to the site root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// `/`, the first page of the post list.
    Home,

    /// `/page/{n}`, a later page of the post list (`n` > 1).
    ListPage(usize),

    /// `/post/{slug}`
    Post(String),

    /// `/api/preview?token={token}&documentId={document_id}`
    Preview { token: String, document_id: String },

    /// `/api/exit-preview`
    ExitPreview,
}

impl Route {
    /// Parses a path with an optional query string. Returns `None` for paths
    /// the site doesn't serve, including preview requests without their
    /// parameters.
    pub fn parse(path_and_query: &str) -> Option<Route> {
        let base = Url::parse("http://localhost/").ok()?;
        let url = base.join(path_and_query).ok()?;
        let segments: Vec<&str> = url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Some(Route::Home),
            ["page", n] => match n.parse::<usize>().ok()? {
                0 => None,
                1 => Some(Route::Home),
                n => Some(Route::ListPage(n)),
            },
            ["post", slug] => {
                let slug = percent_decode(slug);
                match slug.is_empty() {
                    true => None,
                    false => Some(Route::Post(slug)),
                }
            }
            ["api", "preview"] => {
                let param = |name: &str| {
                    url.query_pairs()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.into_owned())
                        .filter(|v| !v.is_empty())
                };
                Some(Route::Preview {
                    token: param("token")?,
                    document_id: param("documentId")?,
                })
            }
            ["api", "exit-preview"] => Some(Route::ExitPreview),
            _ => None,
        }
    }

    /// The route's path, relative to the site root.
    pub fn path(&self) -> String {
        match self {
            Route::Home => String::from("/"),
            Route::ListPage(n) => format!("/page/{}", n),
            Route::Post(slug) => format!("/post/{}", slug),
            Route::Preview { .. } => String::from("/api/preview"),
            Route::ExitPreview => String::from("/api/exit-preview"),
        }
    }

    /// Where a static build writes the route's page, relative to the output
    /// directory. The API routes have no static counterpart, and neither
    /// does a post whose slug isn't a single path segment.
    pub fn output_path(&self) -> Option<PathBuf> {
        match self {
            Route::Home => Some(PathBuf::from("index.html")),
            Route::ListPage(n) => Some(
                PathBuf::from("page").join(n.to_string()).join("index.html"),
            ),
            Route::Post(slug) if is_segment(slug) => {
                Some(PathBuf::from("post").join(slug).join("index.html"))
            }
            Route::Post(_) => None,
            Route::Preview { .. } | Route::ExitPreview => None,
        }
    }
}

/// Reports whether `s` names exactly one file in a directory: not empty, no
/// separators and not `.` or `..`.
pub fn is_segment(s: &str) -> bool {
    if s.contains(|c: char| c == '/' || c == '\\') {
        return false;
    }
    let mut components = Path::new(s).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

// Path segments keep `+` literal, unlike form data.
fn percent_decode(segment: &str) -> String {
    let segment = segment.replace('+', "%2B");
    url::form_urlencoded::parse(format!("s={}", segment).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// What the site answers for a route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn html(status: u16, body: String) -> Response {
        Response {
            status,
            headers: vec![(
                String::from("Content-Type"),
                String::from("text/html; charset=utf-8"),
            )],
            body,
        }
    }

    /// A temporary redirect that keeps the request method.
    pub fn redirect(location: &Url) -> Response {
        Response {
            status: 307,
            headers: vec![(String::from("Location"), location.to_string())],
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: String) -> Response {
        self.headers.push((name.to_owned(), value));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Some(Route::Home), Route::parse("/"));
        assert_eq!(Some(Route::Home), Route::parse(""));
        assert_eq!(Some(Route::Home), Route::parse("/page/1"));
        assert_eq!(Some(Route::ListPage(3)), Route::parse("/page/3/"));
        assert_eq!(
            Some(Route::Post(String::from("como-utilizar-hooks"))),
            Route::parse("/post/como-utilizar-hooks")
        );
        assert_eq!(Some(Route::ExitPreview), Route::parse("/api/exit-preview"));
        assert_eq!(None, Route::parse("/page/zero"));
        assert_eq!(None, Route::parse("/page/0"));
        assert_eq!(None, Route::parse("/post/"));
        assert_eq!(None, Route::parse("/about"));
    }

    #[test]
    fn test_parse_preview() {
        assert_eq!(
            Some(Route::Preview {
                token: String::from("https://x.prismic.io/previews/abc?id=1"),
                document_id: String::from("YEX1"),
            }),
            Route::parse(concat!(
                "/api/preview?token=https%3A%2F%2Fx.prismic.io",
                "%2Fpreviews%2Fabc%3Fid%3D1&documentId=YEX1"
            ))
        );
        assert_eq!(None, Route::parse("/api/preview?token=abc"));
        assert_eq!(None, Route::parse("/api/preview?token=&documentId=YEX1"));
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            Some(PathBuf::from("index.html")),
            Route::Home.output_path()
        );
        assert_eq!(
            Some(PathBuf::from("page/2/index.html")),
            Route::ListPage(2).output_path()
        );
        assert_eq!(
            Some(PathBuf::from("post/hooks/index.html")),
            Route::Post(String::from("hooks")).output_path()
        );
        assert_eq!(None, Route::ExitPreview.output_path());
    }

    #[test]
    fn test_output_path_stays_in_post_directory() {
        for slug in &["..", ".", "../../escaped", "a/b", "a\\b", "/etc", ""] {
            assert_eq!(
                None,
                Route::Post(slug.to_string()).output_path(),
                "slug {:?}",
                slug
            );
        }
    }

    #[test]
    fn test_is_segment() {
        assert!(is_segment("como-utilizar-hooks"));
        assert!(is_segment("a.b"));
        assert!(!is_segment(".."));
        assert!(!is_segment("a/."));
        assert!(!is_segment("a\\b"));
    }

    #[test]
    fn test_path_round_trips() {
        for route in &[
            Route::Home,
            Route::ListPage(4),
            Route::Post(String::from("hooks")),
            Route::ExitPreview,
        ] {
            assert_eq!(Some(route.clone()), Route::parse(&route.path()));
        }
    }
}
