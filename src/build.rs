//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the static site: enumerating the routes, loading each
//! page's data from the gateway on worker threads ([`crate::site::load`]),
//! templating and writing the pages ([`crate::site::Site`]), and copying the
//! theme's static assets into the output directory.
//!
//! Pages fail independently. A page whose data can't be loaded or rendered
//! is reported in the [`BuildReport`] and the rest of the site is still
//! written.

use crate::config::Config;
use crate::error::Error as PipelineError;
use crate::gateway::Gateway;
use crate::routes::Route;
use crate::site::{self, Site};
use crate::view::RequestContext;
use crate::write::{Error as WriteError, Templates, Writer};
use crossbeam_channel::unbounded;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A page that couldn't be built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub route: Route,

    /// The status the page would have been served with.
    pub status: u16,
}

/// The outcome of a build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// The pages written, not counting the not-found and fallback pages.
    pub written: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds the site described by `config` from the content `gateway` serves.
/// `ctx` selects published or preview content for every page.
pub fn build_site(
    config: &Config,
    gateway: &dyn Gateway,
    ctx: &RequestContext,
) -> Result<BuildReport> {
    let templates = match &config.templates {
        Some(files) => Templates::from_files(files)?,
        None => Templates::builtin()?,
    };
    let home_page = config.settings.links.home();
    let exit_preview = config.settings.links.exit_preview().map_err(|err| {
        Error::Url {
            what: "exit preview",
            err,
        }
    })?;
    let site = Site::new(
        gateway,
        &config.settings,
        Writer {
            templates: &templates,
            site_title: &config.title,
            home_page: &home_page,
            static_url: &config.static_url,
            exit_preview: &exit_preview,
        },
    );
    let loader = site.loader();

    let routes = enumerate(&loader, ctx)?;
    tracing::info!(pages = routes.len(), "enumerated routes");

    // Only the directories this build owns are removed, in case the output
    // directory was passed by mistake.
    let root = &config.root_output_directory;
    rmdir(&root.join("page"))?;
    rmdir(&root.join("post"))?;
    rmdir(&config.static_output_directory)?;
    fs::create_dir_all(root)?;

    let mut report = BuildReport::default();
    let threads = config.threads.max(1);
    std::thread::scope(|scope| -> Result<()> {
        let (route_tx, route_rx) = unbounded::<Route>();
        let (page_tx, page_rx) = unbounded();

        for _ in 0..threads {
            let route_rx = route_rx.clone();
            let page_tx = page_tx.clone();
            let loader = &loader;
            scope.spawn(move || {
                for route in route_rx {
                    let loaded = site::load(loader, &route, ctx);
                    if page_tx.send((route, loaded)).is_err() {
                        return;
                    }
                }
            });
        }
        drop(page_tx);

        for route in routes {
            // the workers only hang up early if the main thread panicked
            let _ = route_tx.send(route);
        }
        drop(route_tx);

        for (route, loaded) in page_rx {
            let response = match loaded {
                Some(loaded) => site.respond(&route, loaded),
                None => continue,
            };
            let output_path = match (response.status, route.output_path()) {
                (200, Some(path)) => root.join(path),
                (status, _) => {
                    tracing::warn!(
                        route = %route.path(),
                        status,
                        "page failed"
                    );
                    report.failures.push(Failure { route, status });
                    continue;
                }
            };
            write_file(&output_path, &response.body)?;
            tracing::debug!(path = %output_path.display(), "wrote page");
            report.written.push(output_path);
        }
        Ok(())
    })?;

    write_file(&root.join("404.html"), &site.not_found().body)?;
    write_file(&root.join("fallback.html"), &site.fallback().body)?;

    if let Some(static_source) = &config.static_source_directory {
        copy_dir(static_source, &config.static_output_directory)?;
        tracing::info!(
            from = %static_source.display(),
            to = %config.static_output_directory.display(),
            "copied static assets"
        );
    }

    report.failures.sort_by_key(|failure| failure.route.path());
    tracing::info!(
        written = report.written.len(),
        failed = report.failures.len(),
        "built site"
    );
    Ok(report)
}

/// Lists every page route: each page of the post list and each post. Only
/// the page count and the uids are read here, so a malformed post fails its
/// own pages instead of the whole build.
fn enumerate(
    loader: &crate::view::Loader,
    ctx: &RequestContext,
) -> Result<Vec<Route>> {
    let total_pages = loader.total_pages(ctx).map_err(Error::Enumerate)?;
    let mut routes = vec![Route::Home];
    routes.extend((2..=total_pages).map(Route::ListPage));
    routes.extend(
        loader
            .slugs(ctx)
            .map_err(Error::Enumerate)?
            .into_iter()
            .map(Route::Post),
    );
    Ok(routes)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for result in WalkDir::new(src) {
        let entry = result?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. These errors stop the whole build;
/// failures of individual pages are reported in [`BuildReport`] instead.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors loading or parsing templates.
    Templates(WriteError),

    /// Returned when the list of pages can't be determined.
    Enumerate(PipelineError),

    /// Returned when a site URL can't be built.
    Url {
        what: &'static str,
        err: url::ParseError,
    },

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for errors walking the static source directory.
    Walk(walkdir::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Templates(err) => err.fmt(f),
            Error::Enumerate(err) => write!(f, "Listing pages: {}", err),
            Error::Url { what, err } => {
                write!(f, "Building {} URL: {}", what, err)
            }
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::Walk(err) => write!(f, "Copying static assets: {}", err),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Templates(err) => Some(err),
            Error::Enumerate(err) => Some(err),
            Error::Url { what: _, err } => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::Walk(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Templates(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts [`walkdir::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: walkdir::Error) -> Error {
        Error::Walk(err)
    }
}
