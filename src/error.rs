//! Defines the [`Error`] type shared by the post-rendering pipeline:
//! document mapping ([`crate::document`]), date formatting
//! ([`crate::date`]), adjacent-post resolution ([`crate::adjacent`]) and the
//! views ([`crate::view`]).

use crate::gateway::Error as GatewayError;
use std::fmt;
use std::io;

/// Represents the result of a pipeline operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure while turning CMS content into a rendered page.
#[derive(Debug)]
pub enum Error {
    /// Returned when a required document field is missing or has the wrong
    /// shape.
    MalformedDocument {
        document: String,
        field: String,
        reason: String,
    },

    /// Returned when a publication timestamp is present but can't be parsed,
    /// or when a caller requires a timestamp that the document doesn't have.
    InvalidTimestamp {
        document: String,
        field: String,
        value: String,
    },

    /// Returned when no document matches the requested identifier.
    NotFound { document_type: String, uid: String },

    /// Returned when the CMS gateway can't answer a query.
    GatewayUnavailable(GatewayError),

    /// Returned when a date pattern contains a field letter the formatter
    /// doesn't know.
    UnsupportedPattern { pattern: String, token: String },

    /// Returned when rich text can't be rendered to markup.
    Render(io::Error),

    /// Returned when a page template fails to execute.
    Template(String),
}

impl Error {
    pub(crate) fn malformed(
        document: &str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Error {
        Error::MalformedDocument {
            document: document.to_owned(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Reports whether this error means the requested content doesn't exist
    /// (as opposed to the content or the gateway being broken).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedDocument {
                document,
                field,
                reason,
            } => write!(
                f,
                "malformed document `{}`: field `{}`: {}",
                document, field, reason
            ),
            Error::InvalidTimestamp {
                document,
                field,
                value,
            } => write!(
                f,
                "document `{}`: invalid timestamp in `{}`: {:?}",
                document, field, value
            ),
            Error::NotFound { document_type, uid } => {
                write!(f, "no `{}` document with uid `{}`", document_type, uid)
            }
            Error::GatewayUnavailable(err) => {
                write!(f, "CMS gateway unavailable: {}", err)
            }
            Error::UnsupportedPattern { pattern, token } => write!(
                f,
                "unsupported token `{}` in date pattern {:?}",
                token, pattern
            ),
            Error::Render(err) => write!(f, "rendering rich text: {}", err),
            Error::Template(err) => write!(f, "executing template: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::GatewayUnavailable(err) => Some(err),
            Error::Render(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GatewayError> for Error {
    /// Converts a [`GatewayError`] into an [`Error`]. Missing documents keep
    /// their identity so views can answer with a not-found page; every other
    /// gateway failure is reported as [`Error::GatewayUnavailable`].
    fn from(err: GatewayError) -> Error {
        match err {
            GatewayError::NotFound { document_type, uid } => {
                Error::NotFound { document_type, uid }
            }
            err => Error::GatewayUnavailable(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] raised by a rich-text renderer into an
    /// [`Error`]. This allows us to use the `?` operator.
    fn from(err: io::Error) -> Error {
        Error::Render(err)
    }
}
