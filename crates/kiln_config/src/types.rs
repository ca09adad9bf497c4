//! Configuration types deserialized from `kiln.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_common::{Attributes, StringPatternType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The site configuration parsed from `kiln.toml`.
///
/// Every setting has a default, so an empty file is a valid configuration.
/// Keys that are not settings are collected into [`site`](Self::site).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Directory compiled output is written to, relative to the site root.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Directory holding the persisted stores, relative to the site root.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: String,
    /// Directory items are loaded from.
    #[serde(default = "default_content_dir")]
    pub content_dir: String,
    /// Directory layouts are loaded from.
    #[serde(default = "default_layouts_dir")]
    pub layouts_dir: String,
    /// Directory code snippets are loaded from.
    #[serde(default = "default_lib_dir")]
    pub lib_dir: String,
    /// Path of the declarative rules file.
    #[serde(default = "default_rules_file")]
    pub rules_file: String,
    /// How plain pattern strings in rules are interpreted.
    #[serde(default)]
    pub string_pattern_type: StringPatternType,
    /// File extensions loaded as textual content; everything else is binary.
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
    /// File names removed from the end of public paths.
    #[serde(default = "default_index_filenames")]
    pub index_filenames: Vec<String>,
    /// Whether [`index_filenames`](Self::index_filenames) are stripped.
    #[serde(default = "default_true")]
    pub strip_index_filenames: bool,
    /// Free-form site attributes (`title = "..."` and so on).
    #[serde(flatten)]
    pub site: BTreeMap<String, Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            tmp_dir: default_tmp_dir(),
            content_dir: default_content_dir(),
            layouts_dir: default_layouts_dir(),
            lib_dir: default_lib_dir(),
            rules_file: default_rules_file(),
            string_pattern_type: StringPatternType::default(),
            text_extensions: default_text_extensions(),
            index_filenames: default_index_filenames(),
            strip_index_filenames: true,
            site: BTreeMap::new(),
        }
    }
}

impl SiteConfig {
    /// Returns the output directory resolved against `root`.
    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }

    /// Returns the store directory resolved against `root`.
    pub fn tmp_path(&self, root: &Path) -> PathBuf {
        root.join(&self.tmp_dir)
    }

    /// Returns the rules file resolved against `root`.
    pub fn rules_path(&self, root: &Path) -> PathBuf {
        root.join(&self.rules_file)
    }

    /// Returns true if files with extension `ext` are loaded as text.
    pub fn is_text_extension(&self, ext: &str) -> bool {
        self.text_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Returns the attributes of the Configuration object.
    ///
    /// Settings and free-form site attributes share one flat namespace, so a
    /// change to any setting changes the configuration checksum.
    pub fn attributes(&self) -> Attributes {
        let mut attrs: Attributes = self.site.clone();
        attrs.insert("output_dir".into(), Value::from(self.output_dir.clone()));
        attrs.insert("tmp_dir".into(), Value::from(self.tmp_dir.clone()));
        attrs.insert("content_dir".into(), Value::from(self.content_dir.clone()));
        attrs.insert("layouts_dir".into(), Value::from(self.layouts_dir.clone()));
        attrs.insert("lib_dir".into(), Value::from(self.lib_dir.clone()));
        attrs.insert("rules_file".into(), Value::from(self.rules_file.clone()));
        attrs.insert(
            "string_pattern_type".into(),
            Value::from(match self.string_pattern_type {
                StringPatternType::Glob => "glob",
                StringPatternType::Legacy => "legacy",
            }),
        );
        attrs.insert(
            "text_extensions".into(),
            Value::from(self.text_extensions.clone()),
        );
        attrs.insert(
            "index_filenames".into(),
            Value::from(self.index_filenames.clone()),
        );
        attrs.insert(
            "strip_index_filenames".into(),
            Value::from(self.strip_index_filenames),
        );
        attrs
    }
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_tmp_dir() -> String {
    "tmp/kiln".to_string()
}

fn default_content_dir() -> String {
    "content".to_string()
}

fn default_layouts_dir() -> String {
    "layouts".to_string()
}

fn default_lib_dir() -> String {
    "lib".to_string()
}

fn default_rules_file() -> String {
    "rules.toml".to_string()
}

fn default_index_filenames() -> Vec<String> {
    vec!["index.html".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_text_extensions() -> Vec<String> {
    [
        "adoc", "asciidoc", "atom", "css", "erb", "haml", "htm", "html", "js", "json", "less",
        "markdown", "md", "mkd", "php", "rb", "rss", "sass", "scss", "slim", "svg", "toml",
        "txt", "xhtml", "xml", "yaml", "yml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
