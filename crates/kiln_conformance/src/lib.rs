//! Conformance test helpers for the Kiln site compiler.
//!
//! [`TestSite`] lays out a site in a temporary directory (configuration,
//! rules file, content, layouts and code snippets) and runs the compiler on
//! it exactly like the CLI does, so integration tests can edit files between
//! runs and assert on what the next run recompiles.

#![warn(missing_docs)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use kiln_cache::CompiledContentCache;
use kiln_common::Identifier;
use kiln_compiler::{CompileError, CompileReport, Compiler, OutdatednessReason};
use kiln_config::CONFIG_FILE_NAME;
use kiln_model::{
    ActionSequence, Configuration, DataSource, FilesystemDataSource, RepName, Reference, Site,
};
use kiln_rules::RuleCollection;
use tempfile::TempDir;

/// A basic rules file: markdown through the template filter and the default
/// layout, routed to `<name>/index.html`; everything else copied verbatim.
pub const DEFAULT_RULES: &str = r#"
[[compile]]
pattern = "/**/*.md"
actions = [
    { filter = "template" },
    { layout = "/default.*" },
]

[[route]]
pattern = "/**/*.md"
path = "{without_ext}/index.html"

[[layout]]
pattern = "/**/*"
filter = "template"

[[passthrough]]
pattern = "/**/*"
"#;

/// The layout used by [`DEFAULT_RULES`].
pub const DEFAULT_LAYOUT: &str = "<html>{{ content }}</html>";

/// A site on disk in a temporary directory.
pub struct TestSite {
    dir: TempDir,
}

impl TestSite {
    /// Creates an empty site with a default `kiln.toml`, [`DEFAULT_RULES`]
    /// and [`DEFAULT_LAYOUT`] at `layouts/default.html`.
    pub fn new() -> Self {
        let site = Self::bare();
        site.write(CONFIG_FILE_NAME, "[site]\ntitle = \"Test\"\n");
        site.write("rules.toml", DEFAULT_RULES);
        site.write("layouts/default.html", DEFAULT_LAYOUT);
        site
    }

    /// Creates a site with no files at all.
    pub fn bare() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// The site root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> &Self {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create directory");
        }
        std::fs::write(&path, contents).expect("failed to write file");
        self
    }

    /// Deletes `rel`.
    pub fn remove(&self, rel: &str) -> &Self {
        std::fs::remove_file(self.root().join(rel)).expect("failed to remove file");
        self
    }

    /// Reads the output file at `rel` below `output/`, if it exists.
    pub fn output(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.output_path(rel)).ok()
    }

    /// The path of output file `rel`.
    pub fn output_path(&self, rel: &str) -> PathBuf {
        self.root().join("output").join(rel)
    }

    /// Returns true if the stores of a successful run are on disk.
    pub fn has_stores(&self) -> bool {
        self.root().join("tmp/kiln/checksums.bin").is_file()
    }

    /// Loads the site and the rules file the way the CLI does.
    pub fn compiler(&self) -> Result<Compiler, Box<dyn std::error::Error>> {
        let root = self.root();
        let config = kiln_config::load_config(root)?;
        let rules = kiln_rules::load_rules(&config.rules_path(root), config.string_pattern_type)?;
        Ok(Compiler::new(root, self.load_site()?, rules))
    }

    /// Loads the site with rules given as a [`RuleCollection`].
    pub fn compiler_with(&self, rules: RuleCollection) -> Compiler {
        let site = self.load_site().expect("failed to load site");
        Compiler::new(self.root(), site, rules)
    }

    /// Compiles the site with its rules file.
    pub fn compile(&self) -> Result<CompileReport, CompileError> {
        self.compiler().expect("failed to load site").run()
    }

    /// Outdated reps and their reasons, without compiling.
    pub fn outdated(&self) -> Vec<(Reference, Vec<OutdatednessReason>)> {
        self.compiler()
            .expect("failed to load site")
            .outdatedness()
            .expect("failed to compute outdatedness")
    }

    /// The action sequence of `reference`, rendered one action per line.
    pub fn action_sequence(&self, reference: &Reference) -> Vec<String> {
        let sequences = self
            .compiler()
            .expect("failed to load site")
            .action_sequences()
            .expect("failed to compute action sequences");
        sequences
            .into_iter()
            .find(|(r, _)| r == reference)
            .map(|(_, seq)| render(&seq))
            .unwrap_or_default()
    }

    /// Drops the cached content of `reference`, the way a cached binary
    /// that went missing does.
    pub fn forget_cached(&self, reference: &Reference) -> &Self {
        let compiler = self.compiler().expect("failed to load site");
        let live: BTreeSet<Reference> = compiler
            .action_sequences()
            .expect("failed to compute action sequences")
            .into_iter()
            .map(|(r, _)| r)
            .filter(|r| matches!(r, Reference::ItemRep(..)))
            .collect();
        let mut cache = CompiledContentCache::load(&compiler.store_dir(), &live);
        assert!(cache.contains(reference), "{reference} is not cached");
        cache.retain(|r| r != reference);
        cache.save().expect("failed to save compiled content");
        self
    }

    fn load_site(&self) -> Result<Site, Box<dyn std::error::Error>> {
        let config = kiln_config::load_config(self.root())?;
        let data = FilesystemDataSource::new(self.root(), config.clone()).load()?;
        Ok(Site::new(
            Configuration::new(config),
            data.items,
            data.layouts,
            data.code_snippets,
        )?)
    }
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}

/// The reference of the default rep of item `identifier`.
pub fn rep(identifier: &str) -> Reference {
    named_rep(identifier, "default")
}

/// The reference of rep `name` of item `identifier`.
pub fn named_rep(identifier: &str, name: &str) -> Reference {
    Reference::ItemRep(
        Identifier::new(identifier).expect("invalid identifier"),
        RepName::new(name),
    )
}

/// Renders `sequence` one action per line.
pub fn render(sequence: &ActionSequence) -> Vec<String> {
    sequence.actions().iter().map(ToString::to_string).collect()
}

/// The outdated reps of `report`, without reasons.
pub fn outdated_reps(report: &CompileReport) -> Vec<Reference> {
    report.outdated.iter().map(|(r, _)| r.clone()).collect()
}

/// The reason `report` gives for `reference`, if it was outdated.
pub fn reason_for<'a>(report: &'a CompileReport, reference: &Reference) -> Option<&'a OutdatednessReason> {
    report
        .outdated
        .iter()
        .find(|(r, _)| r == reference)
        .map(|(_, reason)| reason)
}
