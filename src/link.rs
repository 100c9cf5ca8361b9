//! Maps site routes and CMS link fields to URLs under the site root.

use serde_json::Value;
use url::{ParseError, Url};

/// Resolves site routes and CMS link fields to absolute URLs under the site
/// root.
#[derive(Clone, Debug)]
pub struct LinkResolver {
    site_root: Url,
}

impl LinkResolver {
    /// Constructs a new `LinkResolver`.
    ///
    /// # Arguments
    ///
    /// * `site_root` - the URL the site is served from. A trailing slash is
    ///   added if it is missing so that [`Url::join`] treats it as a
    ///   directory.
    pub fn new(site_root: &Url) -> LinkResolver {
        let mut site_root = site_root.clone();
        if !site_root.path().ends_with('/') {
            let path = format!("{}/", site_root.path());
            site_root.set_path(&path);
        }
        LinkResolver { site_root }
    }

    pub fn home(&self) -> Url {
        self.site_root.clone()
    }

    /// The URL of the 1-based list page `page`. The first page is the home
    /// page.
    pub fn list_page(&self, page: usize) -> Result<Url> {
        match page {
            0 | 1 => Ok(self.home()),
            _ => self.site_root.join(&format!("page/{}/", page)),
        }
    }

    pub fn post(&self, uid: &str) -> Result<Url> {
        self.site_root.join(&format!("post/{}/", uid))
    }

    pub fn exit_preview(&self) -> Result<Url> {
        self.site_root.join("api/exit-preview")
    }

    /// Resolves a CMS link field (e.g., the `data` of a hyperlink span).
    /// Web and media links keep their URL, document links to posts resolve
    /// to the post page, and anything else resolves to `None`.
    pub fn resolve(&self, link: &Value) -> Option<String> {
        match link.get("link_type").and_then(Value::as_str) {
            Some("Document") => {
                let uid = link.get("uid").and_then(Value::as_str)?;
                match link.get("type").and_then(Value::as_str) {
                    Some(crate::gateway::POSTS_TYPE) => {
                        self.post(uid).ok().map(String::from)
                    }
                    _ => None,
                }
            }
            Some("Web") | Some("Media") | None => link
                .get("url")
                .and_then(Value::as_str)
                .map(|url| self.absolute(url)),
            Some(_) => None,
        }
    }

    // Relative URLs are taken relative to the site root. Anything that
    // doesn't parse is passed through untouched and escaped at render time.
    fn absolute(&self, url: &str) -> String {
        match Url::parse(url) {
            Ok(absolute) => absolute.to_string(),
            Err(ParseError::RelativeUrlWithoutBase) => {
                match self.site_root.join(url) {
                    Ok(joined) => joined.to_string(),
                    Err(_) => url.to_owned(),
                }
            }
            Err(_) => url.to_owned(),
        }
    }
}

type Result<T> = std::result::Result<T, ParseError>;
