//! Incremental recompilation across runs on an on-disk site.
//!
//! Each test compiles once, edits the site, and checks which reps the second
//! run considers outdated and what ends up in the output directory.

use kiln_compiler::OutdatednessReason;
use kiln_conformance::{named_rep, outdated_reps, reason_for, rep, TestSite};

fn blog() -> TestSite {
    let site = TestSite::new();
    site.write(
        "content/index.md",
        "Latest: {{ content_of /posts/one.md }}",
    )
    .write(
        "content/posts/one.md",
        "+++\ntitle = \"One\"\n+++\nFirst post",
    )
    .write(
        "content/about.md",
        "About {{ attribute_of /posts/one.md title }}",
    )
    .write("content/style.css", "body { color: red }");
    site
}

#[test]
fn first_run_writes_everything() {
    let site = blog();
    let report = site.compile().unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.created.len(), 4);
    assert_eq!(
        site.output("index/index.html").as_deref(),
        Some("<html>Latest: First post</html>")
    );
    assert_eq!(
        site.output("about/index.html").as_deref(),
        Some("<html>About One</html>")
    );
    assert_eq!(
        site.output("style.css").as_deref(),
        Some("body { color: red }")
    );
    assert!(site.has_stores());
}

#[test]
fn unchanged_site_writes_nothing_the_second_time() {
    let site = blog();
    site.compile().unwrap();

    let report = site.compile().unwrap();
    assert!(report.outdated.is_empty(), "{:?}", report.outdated);
    assert!(report.compiled.is_empty());
    assert_eq!(report.written(), 0);
    assert_eq!(report.cached.len(), 4);
    assert!(site.outdated().is_empty());
}

#[test]
fn content_change_reaches_compiled_content_dependents_only() {
    let site = blog();
    site.compile().unwrap();

    site.write(
        "content/posts/one.md",
        "+++\ntitle = \"One\"\n+++\nFirst post, edited",
    );
    let report = site.compile().unwrap();
    assert_eq!(
        reason_for(&report, &rep("/posts/one.md")),
        Some(&OutdatednessReason::ContentModified)
    );
    assert_eq!(
        reason_for(&report, &rep("/index.md")),
        Some(&OutdatednessReason::DependenciesOutdated)
    );
    assert_eq!(reason_for(&report, &rep("/about.md")), None);
    assert_eq!(
        site.output("index/index.html").as_deref(),
        Some("<html>Latest: First post, edited</html>")
    );
}

#[test]
fn attribute_change_reaches_attribute_dependents() {
    let site = blog();
    site.compile().unwrap();

    site.write("content/posts/one.md", "+++\ntitle = \"Uno\"\n+++\nFirst post");
    let report = site.compile().unwrap();
    assert_eq!(
        reason_for(&report, &rep("/posts/one.md")),
        Some(&OutdatednessReason::AttributesModified {
            keys: vec!["title".to_string()]
        })
    );
    assert_eq!(
        reason_for(&report, &rep("/about.md")),
        Some(&OutdatednessReason::DependenciesOutdated)
    );
    assert_eq!(
        site.output("about/index.html").as_deref(),
        Some("<html>About Uno</html>")
    );
}

#[test]
fn layout_change_recompiles_its_users() {
    let site = blog();
    site.compile().unwrap();

    site.write("layouts/default.html", "<body>{{ content }}</body>");
    let report = site.compile().unwrap();
    let mut outdated = outdated_reps(&report);
    outdated.sort();
    assert_eq!(outdated, vec![rep("/about.md"), rep("/index.md"), rep("/posts/one.md")]);
    assert_eq!(
        site.output("posts/one/index.html").as_deref(),
        Some("<body>First post</body>")
    );
}

#[test]
fn code_snippet_change_outdates_everything() {
    let site = blog();
    site.write("lib/helpers.rs", "fn a() {}");
    site.compile().unwrap();

    site.write("lib/helpers.rs", "fn b() {}");
    let report = site.compile().unwrap();
    assert_eq!(report.outdated.len(), 4);
    assert!(report
        .outdated
        .iter()
        .all(|(_, reason)| *reason == OutdatednessReason::CodeSnippetsModified));
}

#[test]
fn configuration_change_outdates_everything() {
    let site = blog();
    site.compile().unwrap();

    site.write("kiln.toml", "[site]\ntitle = \"Renamed\"\n");
    let report = site.compile().unwrap();
    assert_eq!(report.outdated.len(), 4);
    assert!(report
        .outdated
        .iter()
        .all(|(_, reason)| *reason == OutdatednessReason::ConfigurationModified));
}

#[test]
fn new_item_outdates_existing_items() {
    let site = blog();
    site.compile().unwrap();

    site.write("content/posts/two.md", "+++\ntitle = \"Two\"\n+++\nSecond post");
    let report = site.compile().unwrap();
    assert!(reason_for(&report, &rep("/posts/two.md")).is_some());
    assert_eq!(
        reason_for(&report, &rep("/index.md")),
        Some(&OutdatednessReason::DependenciesOutdated)
    );
    assert_eq!(
        site.output("posts/two/index.html").as_deref(),
        Some("<html>Second post</html>")
    );
}

#[test]
fn deleted_output_is_rewritten() {
    let site = blog();
    site.compile().unwrap();

    std::fs::remove_file(site.output_path("style.css")).unwrap();
    let report = site.compile().unwrap();
    assert_eq!(
        reason_for(&report, &rep("/style.css")),
        Some(&OutdatednessReason::NotWritten)
    );
    assert_eq!(
        site.output("style.css").as_deref(),
        Some("body { color: red }")
    );
}

#[test]
fn removed_dependency_outdates_the_dependent() {
    let site = blog();
    site.write("content/extra.md", "extra");
    site.write("content/uses_extra.md", "[{{ content_of /extra.md }}]");
    site.compile().unwrap();

    site.remove("content/extra.md");
    let outdated = site.outdated();
    let uses = outdated
        .iter()
        .find(|(r, _)| *r == rep("/uses_extra.md"))
        .map(|(_, reasons)| reasons.clone());
    assert_eq!(uses, Some(vec![OutdatednessReason::DependenciesOutdated]));
}

const TWO_REPS: &str = r#"
[[compile]]
pattern = "/**/*.md"
actions = [{ filter = "template" }]

[[compile]]
pattern = "/**/*.md"
rep = "raw"

[[route]]
pattern = "/**/*.md"
path = "{without_ext}.html"

[[route]]
pattern = "/**/*.md"
rep = "raw"
path = "{identifier}"

[[layout]]
pattern = "/**/*"
filter = "template"
"#;

#[test]
fn cache_miss_recompiles_every_rep_of_the_item() {
    let site = TestSite::new();
    site.write("rules.toml", TWO_REPS)
        .write("content/page.md", "[{{ content_of /note.md }}]")
        .write("content/note.md", "note");
    site.compile().unwrap();

    site.forget_cached(&named_rep("/page.md", "raw"));
    let report = site.compile().unwrap();
    assert!(report.outdated.is_empty(), "{:?}", report.outdated);
    let mut compiled = report.compiled.clone();
    compiled.sort();
    assert_eq!(compiled, vec![rep("/page.md"), named_rep("/page.md", "raw")]);

    site.write("content/note.md", "edited");
    let report = site.compile().unwrap();
    assert_eq!(
        reason_for(&report, &rep("/page.md")),
        Some(&OutdatednessReason::DependenciesOutdated)
    );
    assert_eq!(site.output("page.html").as_deref(), Some("[edited]"));
}
