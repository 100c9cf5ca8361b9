//! Applies the theme's templates to view data ([`crate::view`]), producing
//! HTML documents.

use crate::value;
use crate::view::{PostList, PostPage};
use gtmpl::{Context, Template, Value};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

const BUILTIN_INDEX: &str = include_str!("../templates/index.html");
const BUILTIN_POST: &str = include_str!("../templates/post.html");
const BUILTIN_STATUS: &str = include_str!("../templates/status.html");

/// The template files of a theme. Each template may be split across several
/// files, which are concatenated in order before parsing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateFiles {
    pub index: Vec<PathBuf>,
    pub post: Vec<PathBuf>,
    pub status: Vec<PathBuf>,
}

/// The parsed templates of a theme.
pub struct Templates {
    /// The template for post-list pages.
    pub index: Template,

    /// The template for post pages.
    pub post: Template,

    /// The template for loading, not-found and error pages.
    pub status: Template,
}

impl Templates {
    /// Parses the templates that ship with the binary.
    pub fn builtin() -> Result<Templates> {
        Ok(Templates {
            index: parse(BUILTIN_INDEX)?,
            post: parse(BUILTIN_POST)?,
            status: parse(BUILTIN_STATUS)?,
        })
    }

    /// Loads and parses a theme's template files.
    pub fn from_files(files: &TemplateFiles) -> Result<Templates> {
        Ok(Templates {
            index: parse(&read_all(&files.index)?)?,
            post: parse(&read_all(&files.post)?)?,
            status: parse(&read_all(&files.status)?)?,
        })
    }
}

fn read_all<P: AsRef<Path>>(template_files: &[P]) -> Result<String> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(template_file)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|err| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err,
            })?;
        contents.push(' ');
    }
    Ok(contents)
}

fn parse(contents: &str) -> Result<Template> {
    let mut template = Template::default();
    template.parse(contents).map_err(Error::ParseTemplate)?;
    Ok(template)
}

/// Responsible for templating pages. Every page additionally receives the
/// site-wide values `site_title`, `home_page`, `static_url` and
/// `exit_preview`.
pub struct Writer<'a> {
    pub templates: &'a Templates,

    /// The site's title, typically shown in the page header.
    pub site_title: &'a str,

    /// The URL for the site's home page, typically the destination for the
    /// site-header link.
    pub home_page: &'a Url,

    /// The URL for the static assets, typically for the theme's stylesheet.
    pub static_url: &'a Url,

    /// The URL that leaves preview mode, linked from pages rendered in
    /// preview.
    pub exit_preview: &'a Url,
}

impl Writer<'_> {
    pub fn list(&self, list: &PostList) -> Result<String> {
        self.execute(&self.templates.index, Value::from(list))
    }

    pub fn post(&self, page: &PostPage) -> Result<String> {
        self.execute(&self.templates.post, Value::from(page))
    }

    /// Renders a status page. A loading page shows only a loading
    /// indicator.
    pub fn status(
        &self,
        status: u16,
        message: &str,
        loading: bool,
    ) -> Result<String> {
        self.execute(
            &self.templates.status,
            value::status(status, message, loading),
        )
    }

    fn execute(&self, template: &Template, mut data: Value) -> Result<String> {
        if let Value::Object(obj) = &mut data {
            obj.insert("site_title".to_owned(), value::text(self.site_title));
            obj.insert("home_page".to_owned(), value::url(self.home_page));
            obj.insert("static_url".to_owned(), value::url(self.static_url));
            obj.insert(
                "exit_preview".to_owned(),
                value::url(self.exit_preview),
            );
        }
        let mut out: Vec<u8> = Vec::new();
        template.execute(&mut out, &Context::from(data)?)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// The result of a fallible templating operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or executing templates.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned for errors executing a template.
    Template(String),
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => write!(f, "Parsing template: {}", err),
            Error::Template(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Template(_) => None,
        }
    }
}
