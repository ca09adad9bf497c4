//! Forward references between reps, cycles and per-rep failures.

use std::rc::Rc;

use kiln_compiler::{CompileError, Notification, NotificationLog, RepError};
use kiln_conformance::{rep, TestSite};
use kiln_model::Reference;

fn chain() -> TestSite {
    let site = TestSite::new();
    site.write("content/a.md", "A{{ content_of /b.md }}")
        .write("content/b.md", "B{{ content_of /c.md }}")
        .write("content/c.md", "C{{ content_of /d.md }}")
        .write("content/d.md", "D{{ content_of /e.md }}")
        .write("content/e.md", "E");
    site
}

#[test]
fn forward_references_compile_in_reverse_dependency_order() {
    let site = chain();
    let report = site.compile().unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(
        report.compiled,
        vec![rep("/e.md"), rep("/d.md"), rep("/c.md"), rep("/b.md"), rep("/a.md")]
    );
    assert_eq!(
        site.output("a/index.html").as_deref(),
        Some("<html>ABCDE</html>")
    );
}

#[test]
fn every_attempt_is_announced() {
    let site = chain();
    let log = Rc::new(NotificationLog::new());
    let mut compiler = site.compiler().unwrap();
    compiler.subscribe(Box::new(Rc::clone(&log)));
    compiler.run().unwrap();

    let notifications = log.take_all();
    let started: Vec<&Reference> = notifications
        .iter()
        .filter_map(|n| match n {
            Notification::CompilationStarted { rep } => Some(rep),
            _ => None,
        })
        .collect();
    let expected: Vec<Reference> = ["a", "b", "c", "d", "e", "d", "c", "b", "a"]
        .iter()
        .map(|n| rep(&format!("/{n}.md")))
        .collect();
    assert_eq!(started, expected.iter().collect::<Vec<_>>());

    let suspended = notifications
        .iter()
        .filter(|n| matches!(n, Notification::CompilationSuspended { .. }))
        .count();
    assert_eq!(suspended, 4);
}

#[test]
fn editing_the_end_of_the_chain_recompiles_the_whole_chain() {
    let site = chain();
    site.compile().unwrap();

    site.write("content/e.md", "e");
    let report = site.compile().unwrap();
    assert_eq!(report.compiled.len(), 5);
    assert_eq!(
        site.output("a/index.html").as_deref(),
        Some("<html>ABCDe</html>")
    );
}

#[test]
fn cycle_is_fatal_and_named() {
    let site = TestSite::new();
    site.write("content/a.md", "{{ content_of /b.md }}")
        .write("content/b.md", "{{ content_of /a.md }}");

    match site.compile() {
        Err(CompileError::DependencyCycle { cycle }) => {
            assert_eq!(cycle, vec![rep("/a.md"), rep("/b.md")]);
        }
        other => panic!("expected a dependency cycle, got {other:?}"),
    }
    assert!(!site.has_stores());
}

#[test]
fn binary_item_through_layout_fails_alone() {
    let site = TestSite::new();
    site.write(
        "rules.toml",
        r#"
[[compile]]
pattern = "/**/*"
actions = [{ layout = "/default.*" }]

[[route]]
pattern = "/**/*"
path = "{identifier}"

[[layout]]
pattern = "/**/*"
filter = "template"
"#,
    )
    .write("content/logo.png", [0x89u8, b'P', b'N', b'G'])
    .write("content/page.md", "page");

    let report = site.compile().unwrap();
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.rep, rep("/logo.png"));
    assert!(
        matches!(failure.error, RepError::BinaryLayout { .. }),
        "{}",
        failure.error
    );
    assert_eq!(failure.stack.len(), 2);
    assert_eq!(report.compiled, vec![rep("/page.md")]);
    assert_eq!(site.output("page.md").as_deref(), Some("<html>page</html>"));
    assert!(site.output("logo.png").is_none());
    assert!(!site.has_stores());

    site.write(
        "rules.toml",
        r#"
[[compile]]
pattern = "/**/*.md"
actions = [{ layout = "/default.*" }]

[[route]]
pattern = "/**/*.md"
path = "{identifier}"

[[layout]]
pattern = "/**/*"
filter = "template"

[[passthrough]]
pattern = "/**/*"
"#,
    );
    let report = site.compile().unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.outdated.len(), 2);
    assert!(site.has_stores());
    assert_eq!(
        std::fs::read(site.output_path("logo.png")).unwrap(),
        vec![0x89u8, b'P', b'N', b'G']
    );
}

#[test]
fn dependents_of_a_failed_rep_fail_too() {
    let site = TestSite::new();
    site.write("content/a.md", "{{ content_of /b.md }}")
        .write("content/b.md", "{{ broken")
        .write("content/c.md", "fine");

    let report = site.compile().unwrap();
    let failed: Vec<Reference> = report.failures.iter().map(|f| f.rep.clone()).collect();
    assert_eq!(failed, vec![rep("/b.md"), rep("/a.md")]);
    assert!(matches!(
        report.failures[1].error,
        RepError::DependencyFailed { .. }
    ));
    assert_eq!(report.compiled, vec![rep("/c.md")]);
    assert_eq!(site.output("c/index.html").as_deref(), Some("<html>fine</html>"));
    assert!(!site.has_stores());
}
