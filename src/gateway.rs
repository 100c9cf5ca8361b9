//! Defines the [`Gateway`] trait, the only way content enters the site, along
//! with its query vocabulary ([`Predicate`], [`OrderBy`], [`QueryOptions`])
//! and the [`RawDocument`] envelope every gateway returns. Two
//! implementations ship with the crate: [`crate::prismic::PrismicGateway`]
//! talks to a live repository, [`crate::snapshot::SnapshotGateway`] serves a
//! fixed set of documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::io;
use std::path::PathBuf;

/// The custom type under which blog posts are stored.
pub const POSTS_TYPE: &str = "posts";

/// A document as returned by the CMS. The envelope fields are typed; the
/// custom fields under `data` are validated later by
/// [`crate::document`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RawDocument {
    pub id: String,

    #[serde(default)]
    pub uid: Option<String>,

    #[serde(rename = "type")]
    pub document_type: String,

    #[serde(default)]
    pub first_publication_date: Option<String>,

    #[serde(default)]
    pub last_publication_date: Option<String>,

    #[serde(default)]
    pub data: Map<String, Value>,
}

impl RawDocument {
    /// Looks up a predicate path on this document. Supports the
    /// `document.id`, `document.type` and `document.uid` paths as well as
    /// `my.{type}.{field}` for text fields (including `my.{type}.uid`).
    pub fn field(&self, path: &str) -> Option<&str> {
        match path {
            "document.id" => Some(&self.id),
            "document.type" => Some(&self.document_type),
            "document.uid" => self.uid.as_deref(),
            _ => {
                let mut parts = path.splitn(3, '.');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some("my"), Some(document_type), Some(field))
                        if document_type == self.document_type =>
                    {
                        match field {
                            "uid" => self.uid.as_deref(),
                            _ => self.data.get(field).and_then(Value::as_str),
                        }
                    }
                    _ => None,
                }
            }
        }
    }
}

/// A filter over documents, rendered in the CMS query syntax by its
/// [`fmt::Display`] implementation (e.g., `[at(document.type, "posts")]`).
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Matches documents whose `path` equals the value.
    At(String, String),

    /// Matches documents whose `path` equals any of the values.
    Any(String, Vec<String>),
}

impl Predicate {
    pub fn at(path: &str, value: &str) -> Predicate {
        Predicate::At(path.to_owned(), value.to_owned())
    }

    /// Matches documents of custom type `document_type`.
    pub fn document_type(document_type: &str) -> Predicate {
        Predicate::at("document.type", document_type)
    }

    /// Reports whether `document` satisfies the predicate.
    pub fn matches(&self, document: &RawDocument) -> bool {
        match self {
            Predicate::At(path, value) => document.field(path) == Some(value),
            Predicate::Any(path, values) => match document.field(path) {
                Some(found) => values.iter().any(|v| v == found),
                None => false,
            },
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // `Value::String` gives us a quoted, escaped literal.
        let quote = |s: &str| Value::String(s.to_owned()).to_string();
        match self {
            Predicate::At(path, value) => {
                write!(f, "[at({}, {})]", path, quote(value))
            }
            Predicate::Any(path, values) => write!(
                f,
                "[any({}, [{}])]",
                path,
                values
                    .iter()
                    .map(|v| quote(v))
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
        }
    }
}

/// The document timestamps a query can be ordered by.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderingField {
    FirstPublicationDate,
    LastPublicationDate,
}

impl OrderingField {
    /// Returns the raw timestamp this field selects on `document`.
    pub fn of<'a>(&self, document: &'a RawDocument) -> Option<&'a str> {
        match self {
            OrderingField::FirstPublicationDate => {
                document.first_publication_date.as_deref()
            }
            OrderingField::LastPublicationDate => {
                document.last_publication_date.as_deref()
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Asc
    }
}

/// An ordering for query results, displayed in the CMS syntax (e.g.,
/// `[document.last_publication_date desc]`).
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderingField,

    #[serde(default)]
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: OrderingField) -> OrderBy {
        OrderBy {
            field,
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: OrderingField) -> OrderBy {
        OrderBy {
            field,
            direction: Direction::Desc,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let field = match self.field {
            OrderingField::FirstPublicationDate => {
                "document.first_publication_date"
            }
            OrderingField::LastPublicationDate => {
                "document.last_publication_date"
            }
        };
        match self.direction {
            Direction::Asc => write!(f, "[{}]", field),
            Direction::Desc => write!(f, "[{} desc]", field),
        }
    }
}

/// Options for [`Gateway::query`]. Unset options fall back to the gateway's
/// defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    /// Restricts the returned `data` to these fields, written as
    /// `{type}.{field}` (e.g., `posts.title`).
    pub fetch: Vec<String>,

    pub page_size: Option<usize>,

    /// The 1-based page to return.
    pub page: Option<usize>,

    /// Only return documents that come after the document with this id in
    /// the requested ordering.
    pub after: Option<String>,

    pub orderings: Option<OrderBy>,

    /// The content release to query. `None` means the published content.
    pub reference: Option<String>,
}

/// Options for [`Gateway::get_by_uid`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetOptions {
    /// The content release to query. `None` means the published content.
    pub reference: Option<String>,
}

/// One page of query results.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct QueryResponse {
    #[serde(default = "first_page")]
    pub page: usize,

    #[serde(default)]
    pub total_pages: usize,

    pub results: Vec<RawDocument>,

    /// Where the next page of results can be fetched, if there is one.
    #[serde(default)]
    pub next_page: Option<String>,
}

fn first_page() -> usize {
    1
}

/// The content source for the site. Implementations must be shareable
/// between threads because independent queries run concurrently.
pub trait Gateway: Sync {
    /// Returns the documents matching every predicate.
    fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse>;

    /// Returns the document of type `document_type` whose uid is `uid`, or
    /// [`Error::NotFound`].
    fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        options: &GetOptions,
    ) -> Result<RawDocument>;
}

/// Represents the result of a gateway operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a gateway failure.
#[derive(Debug)]
pub enum Error {
    /// Returned when no document matches a uid lookup.
    NotFound { document_type: String, uid: String },

    /// Returned for transport and HTTP status failures.
    Http(ureq::Error),

    /// Returned when the repository advertises no master ref.
    NoMasterRef,

    /// Returned when the repository URL can't be joined with an API path.
    UrlParse(url::ParseError),

    /// Returned when a snapshot file isn't a document or a list of
    /// documents.
    Decode { path: PathBuf, err: serde_json::Error },

    /// Returned for I/O errors reading snapshot files.
    Io(io::Error),

    /// Returned for errors walking a snapshot directory.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound { document_type, uid } => {
                write!(f, "no `{}` document with uid `{}`", document_type, uid)
            }
            Error::Http(err) => err.fmt(f),
            Error::NoMasterRef => {
                write!(f, "repository has no master ref")
            }
            Error::UrlParse(err) => err.fmt(f),
            Error::Decode { path, err } => {
                write!(f, "decoding snapshot `{}`: {}", path.display(), err)
            }
            Error::Io(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotFound { .. } => None,
            Error::Http(err) => Some(err),
            Error::NoMasterRef => None,
            Error::UrlParse(err) => Some(err),
            Error::Decode { path: _, err } => Some(err),
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<ureq::Error> for Error {
    /// Converts a [`ureq::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator on HTTP calls.
    fn from(err: ureq::Error) -> Error {
        Error::Http(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn post() -> RawDocument {
        serde_json::from_value(json!({
            "id": "YEX1",
            "uid": "como-utilizar-hooks",
            "type": "posts",
            "first_publication_date": "2021-03-15T19:25:28+0000",
            "data": { "title": "Como utilizar Hooks", "author": "Joseph" }
        }))
        .unwrap()
    }

    #[test]
    fn test_predicate_display() {
        assert_eq!(
            "[at(document.type, \"posts\")]",
            Predicate::document_type(POSTS_TYPE).to_string()
        );
        assert_eq!(
            "[any(document.id, [\"a\", \"b\"])]",
            Predicate::Any(
                "document.id".to_owned(),
                vec!["a".to_owned(), "b".to_owned()]
            )
            .to_string()
        );
    }

    #[test]
    fn test_predicate_matches() {
        let doc = post();
        assert!(Predicate::document_type("posts").matches(&doc));
        assert!(!Predicate::document_type("pages").matches(&doc));
        assert!(Predicate::at("my.posts.uid", "como-utilizar-hooks")
            .matches(&doc));
        assert!(Predicate::at("my.posts.author", "Joseph").matches(&doc));
        assert!(!Predicate::at("my.pages.uid", "como-utilizar-hooks")
            .matches(&doc));
        assert!(Predicate::Any(
            "document.id".to_owned(),
            vec!["nope".to_owned(), "YEX1".to_owned()]
        )
        .matches(&doc));
    }

    #[test]
    fn test_order_by_display() {
        assert_eq!(
            "[document.first_publication_date]",
            OrderBy::asc(OrderingField::FirstPublicationDate).to_string()
        );
        assert_eq!(
            "[document.last_publication_date desc]",
            OrderBy::desc(OrderingField::LastPublicationDate).to_string()
        );
    }

    #[test]
    fn test_order_by_deserialize() {
        let order: OrderBy =
            serde_yaml::from_str("field: last_publication_date").unwrap();
        assert_eq!(OrderBy::asc(OrderingField::LastPublicationDate), order);
    }
}
