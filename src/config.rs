//! Loads the project file (`spacetravelling.yaml`) and the optional theme
//! (`theme/theme.yaml`) into a [`Config`].

use crate::adjacent::Adjacency;
use crate::date::{self, DateFormatter, PT_BR};
use crate::link::LinkResolver;
use crate::view::Settings;
use crate::write::TemplateFiles;
use chrono::FixedOffset;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "spacetravelling.yaml";

/// Overrides the project file's `access_token`.
pub const ACCESS_TOKEN_VAR: &str = "PRISMIC_ACCESS_TOKEN";

const DEFAULT_PUBLISH_DATE_PATTERN: &str = "d MMM y";
const DEFAULT_EDITED_DATE_PATTERN: &str = "'* editado em' d MMM y', às' HH:mm";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(20)
    }
}

#[derive(Deserialize)]
struct PublishDatePattern(String);
impl Default for PublishDatePattern {
    fn default() -> Self {
        PublishDatePattern(DEFAULT_PUBLISH_DATE_PATTERN.to_owned())
    }
}

#[derive(Deserialize)]
struct EditedDatePattern(String);
impl Default for EditedDatePattern {
    fn default() -> Self {
        EditedDatePattern(DEFAULT_EDITED_DATE_PATTERN.to_owned())
    }
}

fn default_title() -> String {
    String::from("spacetravelling")
}

#[derive(Deserialize)]
struct Project {
    #[serde(default = "default_title")]
    title: String,
    site_root: Url,
    repository: Url,

    #[serde(default)]
    access_token: Option<String>,

    #[serde(default)]
    index_page_size: PageSize,

    #[serde(default)]
    utc_offset_minutes: i32,

    #[serde(default)]
    publish_date_pattern: PublishDatePattern,

    #[serde(default)]
    edited_date_pattern: EditedDatePattern,

    #[serde(default)]
    adjacent: Adjacency,
}

#[derive(Deserialize)]
struct Theme {
    index_template: Vec<PathBuf>,
    post_template: Vec<PathBuf>,
    status_template: Vec<PathBuf>,

    #[serde(default, rename = "static")]
    static_directory: Option<PathBuf>,
}

/// Everything a build needs to know.
pub struct Config {
    pub title: String,

    /// The repository's API entry point.
    pub repository: Url,
    pub access_token: Option<String>,

    /// Presentation settings for every page.
    pub settings: Settings,

    /// The theme's template files, or `None` for the built-in templates.
    pub templates: Option<TemplateFiles>,

    /// The theme's static assets, if it has any.
    pub static_source_directory: Option<PathBuf>,

    /// The URL the static assets are served from (`{site_root}/static/`).
    pub static_url: Url,

    /// The directory the site is written to.
    pub root_output_directory: PathBuf,

    /// The directory the static assets are copied to.
    pub static_output_directory: PathBuf,

    pub threads: usize,
}

impl Config {
    /// Finds the project file in `dir` or the nearest parent directory that
    /// has one, and loads it.
    pub fn from_directory(
        dir: &Path,
        output_directory: &Path,
        threads: Option<usize>,
    ) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path, output_directory, threads)
        } else {
            match dir.parent() {
                Some(parent) => {
                    Config::from_directory(parent, output_directory, threads)
                }
                None => Err(Error::ProjectFileNotFound),
            }
        }
    }

    /// Loads the project file at `path`. The theme is read from the `theme`
    /// directory next to it.
    pub fn from_project_file(
        path: &Path,
        output_directory: &Path,
        threads: Option<usize>,
    ) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path)?)
            .map_err(|err| Error::Parse {
                path: path.to_owned(),
                err,
            })?;
        let project_root =
            path.parent().ok_or_else(|| Error::NoParentDirectory {
                path: path.to_owned(),
            })?;
        let env_token = std::env::var(ACCESS_TOKEN_VAR)
            .ok()
            .filter(|token| !token.is_empty());
        Config::resolve(
            project,
            project_root,
            output_directory,
            threads,
            env_token,
        )
    }

    fn resolve(
        project: Project,
        project_root: &Path,
        output_directory: &Path,
        threads: Option<usize>,
        env_token: Option<String>,
    ) -> Result<Config> {
        if project.index_page_size.0 < 1 {
            return Err(Error::InvalidPageSize(project.index_page_size.0));
        }

        let offset = project
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(Error::InvalidUtcOffset(project.utc_offset_minutes))?;

        for (key, pattern) in &[
            ("publish_date_pattern", &project.publish_date_pattern.0),
            ("edited_date_pattern", &project.edited_date_pattern.0),
        ] {
            date::validate(pattern).map_err(|err| Error::InvalidDatePattern {
                key: (*key).to_owned(),
                err,
            })?;
        }

        let theme_dir = project_root.join("theme");
        let theme_file = theme_dir.join("theme.yaml");
        let theme: Option<Theme> = match theme_file.exists() {
            true => Some(serde_yaml::from_reader(open(&theme_file)?).map_err(
                |err| Error::Parse {
                    path: theme_file.clone(),
                    err,
                },
            )?),
            false => None,
        };
        let in_theme = |paths: &[PathBuf]| -> Vec<PathBuf> {
            paths.iter().map(|relpath| theme_dir.join(relpath)).collect()
        };

        let links = LinkResolver::new(&project.site_root);
        let static_url = links
            .home()
            .join("static/")
            .map_err(|err| Error::InvalidSiteRoot {
                url: project.site_root.to_string(),
                err,
            })?;

        Ok(Config {
            title: project.title,
            repository: project.repository,
            access_token: env_token.or(project.access_token),
            settings: Settings {
                links,
                dates: DateFormatter::new(&PT_BR, offset),
                publish_date_pattern: project.publish_date_pattern.0,
                edited_date_pattern: project.edited_date_pattern.0,
                index_page_size: project.index_page_size.0,
                adjacency: project.adjacent,
            },
            templates: theme.as_ref().map(|theme| TemplateFiles {
                index: in_theme(&theme.index_template),
                post: in_theme(&theme.post_template),
                status: in_theme(&theme.status_template),
            }),
            static_source_directory: theme
                .and_then(|theme| theme.static_directory)
                .map(|dir| theme_dir.join(dir)),
            static_url,
            root_output_directory: output_directory.to_owned(),
            static_output_directory: output_directory.join("static"),
            threads: match threads {
                None => num_cpus::get(),
                Some(threads) => threads.max(1),
            },
        })
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem with the project or theme configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when no directory up to the filesystem root has a project
    /// file.
    ProjectFileNotFound,

    /// Returned when the project file path has no parent directory.
    NoParentDirectory { path: PathBuf },

    /// Returned for I/O problems while opening configuration files.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned for malformed project or theme files.
    Parse { path: PathBuf, err: serde_yaml::Error },

    /// Returned when `index_page_size` is zero.
    InvalidPageSize(usize),

    /// Returned when `utc_offset_minutes` is a day or more.
    InvalidUtcOffset(i32),

    /// Returned when a configured date pattern can't be formatted.
    InvalidDatePattern {
        key: String,
        err: crate::error::Error,
    },

    /// Returned when URLs can't be derived from `site_root`.
    InvalidSiteRoot { url: String, err: url::ParseError },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectFileNotFound => write!(
                f,
                "Could not find `{}` in any parent directory",
                PROJECT_FILE
            ),
            Error::NoParentDirectory { path } => write!(
                f,
                "Can't get parent directory for project file '{}'",
                path.display()
            ),
            Error::Open { path, err } => {
                write!(f, "Opening '{}': {}", path.display(), err)
            }
            Error::Parse { path, err } => {
                write!(f, "Parsing '{}': {}", path.display(), err)
            }
            Error::InvalidPageSize(size) => {
                write!(f, "index_page_size must be at least 1, got {}", size)
            }
            Error::InvalidUtcOffset(minutes) => write!(
                f,
                "utc_offset_minutes must be less than a day, got {}",
                minutes
            ),
            Error::InvalidDatePattern { key, err } => {
                write!(f, "{}: {}", key, err)
            }
            Error::InvalidSiteRoot { url, err } => {
                write!(f, "site_root '{}': {}", url, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Parse { path: _, err } => Some(err),
            Error::InvalidDatePattern { key: _, err } => Some(err),
            Error::InvalidSiteRoot { url: _, err } => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gateway::{Direction, OrderingField};
    use std::fs;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const MINIMAL: &str = "
site_root: https://blog.example.org/blog
repository: https://spacetravelling.cdn.prismic.io/api/v2
";

    fn project(yaml: &str) -> Project {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_defaults() -> TestResult {
        let dir = tempfile::tempdir()?;
        let config = Config::resolve(
            project(MINIMAL),
            dir.path(),
            Path::new("/tmp/out"),
            Some(3),
            None,
        )?;
        assert_eq!("spacetravelling", config.title);
        assert_eq!(None, config.access_token);
        assert_eq!(20, config.settings.index_page_size);
        assert_eq!("d MMM y", config.settings.publish_date_pattern);
        assert_eq!(Adjacency::default(), config.settings.adjacency);
        assert_eq!(
            "https://blog.example.org/blog/",
            config.settings.links.home().as_str()
        );
        assert_eq!(
            "https://blog.example.org/blog/static/",
            config.static_url.as_str()
        );
        assert_eq!(None, config.templates);
        assert_eq!(None, config.static_source_directory);
        assert_eq!(
            PathBuf::from("/tmp/out/static"),
            config.static_output_directory
        );
        assert_eq!(3, config.threads);
        Ok(())
    }

    #[test]
    fn test_overrides() -> TestResult {
        let dir = tempfile::tempdir()?;
        let yaml = format!(
            "{}
title: Space Traveling
access_token: from-file
index_page_size: 5
utc_offset_minutes: -180
adjacent:
  previous: {{ field: first_publication_date, direction: desc }}
  next: {{ field: first_publication_date }}
",
            MINIMAL
        );
        let config = Config::resolve(
            project(&yaml),
            dir.path(),
            Path::new("out"),
            None,
            Some(String::from("from-env")),
        )?;
        assert_eq!("Space Traveling", config.title);
        assert_eq!(Some(String::from("from-env")), config.access_token);
        assert_eq!(5, config.settings.index_page_size);
        assert_eq!(
            Direction::Desc,
            config.settings.adjacency.previous.direction
        );
        assert_eq!(
            OrderingField::FirstPublicationDate,
            config.settings.adjacency.next.field
        );
        assert_eq!(Direction::Asc, config.settings.adjacency.next.direction);
        assert!(config.threads >= 1);
        Ok(())
    }

    #[test]
    fn test_invalid_values() -> TestResult {
        let dir = tempfile::tempdir()?;
        let resolve = |extra: &str| {
            Config::resolve(
                project(&format!("{}{}", MINIMAL, extra)),
                dir.path(),
                Path::new("out"),
                Some(1),
                None,
            )
        };
        assert!(matches!(
            resolve("index_page_size: 0\n"),
            Err(Error::InvalidPageSize(0))
        ));
        assert!(matches!(
            resolve("utc_offset_minutes: 1440\n"),
            Err(Error::InvalidUtcOffset(1440))
        ));
        assert!(matches!(
            resolve("publish_date_pattern: \"d MMM Q\"\n"),
            Err(Error::InvalidDatePattern { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_theme_and_parent_search() -> TestResult {
        let root = tempfile::tempdir()?;
        fs::write(root.path().join(PROJECT_FILE), MINIMAL)?;
        let theme = root.path().join("theme");
        fs::create_dir(&theme)?;
        fs::write(
            theme.join("theme.yaml"),
            "
index_template: [base.html, index.html]
post_template: [base.html, post.html]
status_template: [status.html]
static: static
",
        )?;
        let nested = root.path().join("content").join("drafts");
        fs::create_dir_all(&nested)?;

        let config =
            Config::from_directory(&nested, Path::new("out"), Some(1))?;
        assert_eq!(
            Some(TemplateFiles {
                index: vec![theme.join("base.html"), theme.join("index.html")],
                post: vec![theme.join("base.html"), theme.join("post.html")],
                status: vec![theme.join("status.html")],
            }),
            config.templates
        );
        assert_eq!(Some(theme.join("static")), config.static_source_directory);
        Ok(())
    }

    #[test]
    fn test_malformed_project_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, "site_root: [not, a, url]\n")?;
        assert!(matches!(
            Config::from_project_file(&path, Path::new("out"), Some(1)),
            Err(Error::Parse { .. })
        ));
        Ok(())
    }
}
