//! `kiln compile`: compile the site and report what was written.

use std::path::{Path, PathBuf};
use std::time::Instant;

use kiln_compiler::{CompileReport, Listener, Notification, WriteKind};

use crate::pipeline::{load_compiler, resolve_site_root};
use crate::GlobalArgs;

/// Prints one line per written output file.
struct WriteLogger {
    root: PathBuf,
    show_identical: bool,
}

impl Listener for WriteLogger {
    fn notify(&self, notification: &Notification) {
        if let Notification::RepWritten { path, kind, .. } = notification {
            if *kind == WriteKind::Identical && !self.show_identical {
                return;
            }
            eprintln!("{}", write_line(*kind, &self.root, path));
        }
    }
}

fn write_line(kind: WriteKind, root: &Path, path: &Path) -> String {
    let shown = path.strip_prefix(root).unwrap_or(path);
    format!("{kind:>12}  {}", shown.display())
}

/// Runs the `kiln compile` command.
///
/// Returns exit code 0 if every rep compiled, 1 otherwise.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let started = Instant::now();
    let root = resolve_site_root(global)?;
    let mut compiler = load_compiler(&root)?;
    if !global.quiet {
        eprintln!("Compiling site in {}", root.display());
        compiler.subscribe(Box::new(WriteLogger {
            root: root.clone(),
            show_identical: global.verbose,
        }));
    }

    let report = compiler.run()?;

    for failure in &report.failures {
        eprintln!("error: {failure}");
    }
    if !global.quiet {
        eprintln!("{}", summary(&report, started.elapsed().as_secs_f64()));
    }
    Ok(if report.is_success() { 0 } else { 1 })
}

fn summary(report: &CompileReport, seconds: f64) -> String {
    if report.is_success() {
        format!(
            "Site compiled in {seconds:.2}s: {} created, {} updated, {} identical, {} from cache.",
            report.created.len(),
            report.updated.len(),
            report.identical.len(),
            report.cached.len(),
        )
    } else {
        format!(
            "Compilation failed for {} item rep(s) after {seconds:.2}s.",
            report.failures.len()
        )
    }
}
