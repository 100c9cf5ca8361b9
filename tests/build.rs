use serde_json::{json, Value};
use spacetravelling::build::{build_site, Failure};
use spacetravelling::config::{Config, PROJECT_FILE};
use spacetravelling::routes::Route;
use spacetravelling::snapshot::SnapshotGateway;
use spacetravelling::view::RequestContext;
use std::fs;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const PROJECT: &str = "\
site_root: https://blog.example.org/
repository: https://spacetravelling.cdn.prismic.io/api/v2
index_page_size: 2
";

const THEME: &str = "\
index_template: [index.html]
post_template: [post.html]
status_template: [status.html]
static: static
";

fn post(uid: &str, published: &str, title: &str) -> Value {
    json!({
        "id": format!("id-{}", uid),
        "uid": uid,
        "type": "posts",
        "first_publication_date": published,
        "last_publication_date": published,
        "data": {
            "title": title,
            "subtitle": "Tudo sobre como criar a sua primeira aplicação",
            "author": "Danilo Vieira",
            "banner": {
                "url": "https://images.prismic.io/spacetravelling/banner.png"
            },
            "content": [{
                "heading": "Proin et varius",
                "body": [
                    {
                        "type": "paragraph",
                        "text": "Lorem ipsum dolor sit amet",
                        "spans": [{ "start": 6, "end": 11, "type": "strong" }]
                    },
                    { "type": "list-item", "text": "um", "spans": [] },
                    { "type": "list-item", "text": "dois", "spans": [] }
                ]
            }]
        }
    })
}

/// The page a build writes for the post `uid`.
fn post_page(output: &Path, uid: &str) -> PathBuf {
    output.join("post").join(uid).join("index.html")
}

fn write_posts(dir: &Path, posts: Value) -> Result<SnapshotGateway> {
    fs::write(dir.join("posts.json"), serde_json::to_string(&posts)?)?;
    Ok(SnapshotGateway::from_directory(dir)?)
}

fn snapshot(dir: &Path) -> Result<SnapshotGateway> {
    let march = |day: u32| format!("2021-03-{:02}T19:25:28+0000", day);
    let mut broken = post("quebrado", &march(20), "Post quebrado");
    broken["data"]
        .as_object_mut()
        .ok_or("data is not an object")?
        .remove("content");
    write_posts(
        dir,
        json!([
            post("criando-um-app", &march(15), "Criando um app CRA do zero"),
            post("como-utilizar-hooks", &march(25), "Como utilizar <Hooks>"),
            broken,
            post("mapas", "2021-04-01T12:00:00+0000", "Mapas com React"),
        ]),
    )
}

#[test]
fn test_build_writes_every_page_and_isolates_failures() -> Result<()> {
    let project = tempfile::tempdir()?;
    let content = tempfile::tempdir()?;
    let output = project.path().join("_site");
    fs::write(project.path().join(PROJECT_FILE), PROJECT)?;
    let gateway = snapshot(content.path())?;
    let config = Config::from_directory(project.path(), &output, Some(2))?;

    // stale pages from an earlier build are removed
    fs::create_dir_all(output.join("post").join("old"))?;
    fs::write(post_page(&output, "old"), "old")?;

    let report = build_site(&config, &gateway, &RequestContext::published())?;

    assert_eq!(
        vec![Failure {
            route: Route::Post(String::from("quebrado")),
            status: 500,
        }],
        report.failures
    );
    assert!(!report.is_success());
    assert_eq!(5, report.written.len());

    let home = fs::read_to_string(output.join("index.html"))?;
    assert!(home.contains("Criando um app CRA do zero"));
    assert!(home.contains("Como utilizar &lt;Hooks&gt;"));
    assert!(home.contains("15 mar 2021"));
    assert!(home.contains(r#"href="https://blog.example.org/page/2/""#));

    let second =
        fs::read_to_string(output.join("page").join("2").join("index.html"))?;
    assert!(second.contains("Post quebrado"));
    assert!(second.contains("Mapas com React"));

    let hooks = fs::read_to_string(post_page(&output, "como-utilizar-hooks"))?;
    let paragraph = "<p>Lorem <strong>ipsum</strong> dolor sit amet</p>";
    assert!(hooks.contains(paragraph));
    assert!(hooks.contains("<ul><li>um</li><li>dois</li></ul>"));
    assert!(hooks.contains("25 mar 2021"));
    assert!(hooks.contains("1 min"));
    assert!(!hooks.contains("editado em"));

    assert!(post_page(&output, "criando-um-app").exists());
    assert!(post_page(&output, "mapas").exists());
    assert!(!output.join("post").join("quebrado").exists());
    assert!(!output.join("post").join("old").exists());

    let not_found = fs::read_to_string(output.join("404.html"))?;
    assert!(not_found.contains("404"));
    let fallback = fs::read_to_string(output.join("fallback.html"))?;
    assert!(fallback.contains("Carregando..."));
    Ok(())
}

#[test]
fn test_build_survives_malformed_post_on_first_list_page() -> Result<()> {
    let project = tempfile::tempdir()?;
    let content = tempfile::tempdir()?;
    let output = project.path().join("_site");
    fs::write(project.path().join(PROJECT_FILE), PROJECT)?;

    let mut untitled = post("sem-titulo", "2021-03-20T10:00:00+0000", "x");
    untitled["data"]
        .as_object_mut()
        .ok_or("data is not an object")?
        .remove("title");
    let gateway = write_posts(
        content.path(),
        json!([
            post("criando-um-app", "2021-03-15T19:25:28+0000", "Criando"),
            untitled,
        ]),
    )?;
    let config = Config::from_directory(project.path(), &output, Some(2))?;

    let report = build_site(&config, &gateway, &RequestContext::published())?;

    assert_eq!(
        vec![
            Failure {
                route: Route::Home,
                status: 500,
            },
            Failure {
                route: Route::Post(String::from("sem-titulo")),
                status: 500,
            },
        ],
        report.failures
    );
    assert_eq!(vec![post_page(&output, "criando-um-app")], report.written);
    assert!(!output.join("index.html").exists());
    assert!(output.join("404.html").exists());
    Ok(())
}

#[test]
fn test_build_never_writes_outside_output_directory() -> Result<()> {
    let project = tempfile::tempdir()?;
    let content = tempfile::tempdir()?;
    let output = project.path().join("nested").join("_site");
    fs::write(project.path().join(PROJECT_FILE), PROJECT)?;

    let mut escaping = post("escapado", "2021-03-20T10:00:00+0000", "Fuga");
    escaping["uid"] = json!("../../../escapado");
    let gateway = write_posts(
        content.path(),
        json!([
            post("criando-um-app", "2021-03-15T19:25:28+0000", "Criando"),
            escaping,
        ]),
    )?;
    let config = Config::from_directory(project.path(), &output, Some(2))?;

    let report = build_site(&config, &gateway, &RequestContext::published())?;

    assert!(report.failures.contains(&Failure {
        route: Route::Post(String::from("../../../escapado")),
        status: 500,
    }));
    assert!(report.written.iter().all(|path| path.starts_with(&output)));
    assert!(!project.path().join("escapado").exists());
    assert!(!project.path().join("nested").join("escapado").exists());
    assert!(post_page(&output, "criando-um-app").exists());
    Ok(())
}

#[test]
fn test_build_is_repeatable() -> Result<()> {
    let project = tempfile::tempdir()?;
    let content = tempfile::tempdir()?;
    let output = project.path().join("_site");
    fs::write(project.path().join(PROJECT_FILE), PROJECT)?;
    let gateway = snapshot(content.path())?;
    let config = Config::from_directory(project.path(), &output, Some(1))?;

    build_site(&config, &gateway, &RequestContext::published())?;
    let first = fs::read_to_string(post_page(&output, "mapas"))?;
    build_site(&config, &gateway, &RequestContext::published())?;
    let second = fs::read_to_string(post_page(&output, "mapas"))?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_build_with_theme() -> Result<()> {
    let project = tempfile::tempdir()?;
    let content = tempfile::tempdir()?;
    let output = project.path().join("_site");
    fs::write(project.path().join(PROJECT_FILE), PROJECT)?;

    let theme = project.path().join("theme");
    fs::create_dir_all(theme.join("static"))?;
    fs::write(theme.join("theme.yaml"), THEME)?;
    fs::write(
        theme.join("index.html"),
        "{{ range .posts }}[{{ .title }}]{{ end }}",
    )?;
    fs::write(theme.join("post.html"), "{{ .title }} by {{ .author }}")?;
    fs::write(theme.join("status.html"), "status {{ .status }}")?;
    fs::write(theme.join("static").join("style.css"), "body { margin: 0 }")?;

    let gateway = snapshot(content.path())?;
    let config = Config::from_directory(project.path(), &output, Some(4))?;
    build_site(&config, &gateway, &RequestContext::published())?;

    assert_eq!(
        "[Criando um app CRA do zero][Como utilizar &lt;Hooks&gt;] ",
        fs::read_to_string(output.join("index.html"))?
    );
    assert_eq!(
        "Mapas com React by Danilo Vieira ",
        fs::read_to_string(post_page(&output, "mapas"))?
    );
    assert_eq!("status 404 ", fs::read_to_string(output.join("404.html"))?);
    assert_eq!(
        "body { margin: 0 }",
        fs::read_to_string(output.join("static").join("style.css"))?
    );
    Ok(())
}
