use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use spacetravelling::build::build_site;
use spacetravelling::config::Config;
use spacetravelling::gateway::Gateway;
use spacetravelling::prismic::PrismicGateway;
use spacetravelling::site::Site;
use spacetravelling::snapshot::SnapshotGateway;
use spacetravelling::view::RequestContext;
use spacetravelling::write::{Templates, Writer};
use std::error::Error;
use std::path::Path;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("spacetravelling=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let project = Arg::with_name("project")
        .long("project")
        .short("p")
        .takes_value(true)
        .default_value(".")
        .help("Directory in (or under) which spacetravelling.yaml lives");
    let snapshot = Arg::with_name("snapshot")
        .long("snapshot")
        .takes_value(true)
        .help(
            "Serve content from a directory of JSON documents instead of the \
             repository",
        );
    let preview_ref = Arg::with_name("preview-ref")
        .long("preview-ref")
        .takes_value(true)
        .help(
            "Render preview content for this ref instead of published content",
        );

    let matches = App::new("spacetravelling")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds the spacetravelling blog from its Prismic repository")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the static site")
                .arg(project.clone())
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .default_value("_site")
                        .help("Output directory"),
                )
                .arg(
                    Arg::with_name("threads")
                        .long("threads")
                        .short("t")
                        .takes_value(true)
                        .help(
                            "Number of worker threads (defaults to the number \
                             of CPUs)",
                        ),
                )
                .arg(snapshot.clone())
                .arg(preview_ref.clone()),
        )
        .subcommand(
            SubCommand::with_name("render")
                .about(
                    "Prints the response for a single path, e.g. /post/my-post",
                )
                .arg(Arg::with_name("path").required(true).index(1))
                .arg(project)
                .arg(snapshot)
                .arg(preview_ref)
                .arg(
                    Arg::with_name("cookie")
                        .long("cookie")
                        .takes_value(true)
                        .conflicts_with("preview-ref")
                        .help("A Cookie header to read the preview ref from"),
                ),
        )
        .get_matches();

    let result = match matches.subcommand() {
        ("build", Some(matches)) => build(matches),
        ("render", Some(matches)) => render(matches),
        _ => Ok(true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            let mut message = err.to_string();
            let mut source = err.source();
            while let Some(err) = source {
                message.push_str(&format!(": {}", err));
                source = err.source();
            }
            tracing::error!("{}", message);
            std::process::exit(1);
        }
    }
}

fn build(matches: &ArgMatches) -> Result<bool> {
    let threads = match matches.value_of("threads") {
        Some(threads) => Some(threads.parse::<usize>()?),
        None => None,
    };
    let config = Config::from_directory(
        Path::new(matches.value_of("project").unwrap_or(".")),
        Path::new(matches.value_of("output").unwrap_or("_site")),
        threads,
    )?;
    let gateway = gateway(&config, matches.value_of("snapshot"))?;
    let ctx = context(matches);

    let report = build_site(&config, gateway.as_ref(), &ctx)?;
    for failure in &report.failures {
        tracing::error!(
            route = %failure.route.path(),
            status = failure.status,
            "page not built"
        );
    }
    Ok(report.is_success())
}

fn render(matches: &ArgMatches) -> Result<bool> {
    let config = Config::from_directory(
        Path::new(matches.value_of("project").unwrap_or(".")),
        Path::new("_site"),
        Some(1),
    )?;
    let gateway = gateway(&config, matches.value_of("snapshot"))?;
    let ctx = context(matches);

    let templates = match &config.templates {
        Some(files) => Templates::from_files(files)?,
        None => Templates::builtin()?,
    };
    let home_page = config.settings.links.home();
    let exit_preview = config.settings.links.exit_preview()?;
    let site = Site::new(
        gateway.as_ref(),
        &config.settings,
        Writer {
            templates: &templates,
            site_title: &config.title,
            home_page: &home_page,
            static_url: &config.static_url,
            exit_preview: &exit_preview,
        },
    );

    let response = site.handle(matches.value_of("path").unwrap_or("/"), &ctx);
    println!("HTTP {}", response.status);
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    println!();
    print!("{}", response.body);
    Ok(response.status < 500)
}

fn gateway(
    config: &Config,
    snapshot: Option<&str>,
) -> Result<Box<dyn Gateway>> {
    Ok(match snapshot {
        Some(dir) => Box::new(SnapshotGateway::from_directory(Path::new(dir))?),
        None => Box::new(PrismicGateway::connect(
            &config.repository,
            config.access_token.as_deref(),
        )?),
    })
}

fn context(matches: &ArgMatches) -> RequestContext {
    match (matches.value_of("preview-ref"), matches.value_of("cookie")) {
        (Some(reference), _) => RequestContext::preview(reference),
        (None, Some(cookie)) => RequestContext::from_cookie_header(cookie),
        (None, None) => RequestContext::published(),
    }
}
