//! Loading items, layouts and code snippets.
//!
//! [`FilesystemDataSource`] maps `content/` to items, `layouts/` to layouts and
//! `lib/` to code snippets. A text file may start with a TOML front matter
//! block delimited by `+++` lines; its keys become the document's attributes.
//! Text files without front matter are read lazily.

use std::io::Read;
use std::path::{Path, PathBuf};

use kiln_common::{Attributes, Identifier};
use kiln_config::SiteConfig;
use serde_json::Value;
use tracing::debug;

use crate::content::Content;
use crate::document::{CodeSnippet, Document, Item, Layout};
use crate::error::ModelError;

const FRONT_MATTER_DELIMITER: &str = "+++";

/// The raw objects a data source provides.
#[derive(Debug, Default)]
pub struct SiteData {
    /// Items, in a stable order.
    pub items: Vec<Item>,
    /// Layouts, in a stable order.
    pub layouts: Vec<Layout>,
    /// Code snippets, in a stable order.
    pub code_snippets: Vec<CodeSnippet>,
}

/// A source of site objects.
pub trait DataSource {
    /// Loads every object. Called once per run, before compilation.
    fn load(&self) -> Result<SiteData, ModelError>;
}

/// Loads a site from its directory tree.
pub struct FilesystemDataSource {
    root: PathBuf,
    config: SiteConfig,
}

impl FilesystemDataSource {
    /// Creates a data source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, config: SiteConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    fn load_documents(&self, dir: &str) -> Result<Vec<Document>, ModelError> {
        let base = self.root.join(dir);
        let mut files = Vec::new();
        collect_files(&base, &mut files)?;

        let mut docs = Vec::with_capacity(files.len());
        for path in files {
            docs.push(self.load_document(&base, &path)?);
        }
        Ok(docs)
    }

    fn load_document(&self, base: &Path, path: &Path) -> Result<Document, ModelError> {
        let identifier = identifier_for(base, path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();

        let mut attributes = Attributes::new();
        attributes.insert("extension".into(), Value::from(ext.clone()));
        attributes.insert(
            "content_filename".into(),
            Value::from(
                path.strip_prefix(&self.root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/"),
            ),
        );

        let content = if !self.config.is_text_extension(&ext) {
            Content::binary(path)
        } else if has_front_matter(path)? {
            let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let (front, body) = split_front_matter(&text, path)?;
            attributes.extend(front);
            Content::textual_with_filename(body, path)
        } else {
            Content::lazy_textual(path)
        };

        debug!(identifier = %identifier, binary = content.is_binary(), "loaded document");
        Ok(Document::new(identifier, content, attributes))
    }

    fn load_code_snippets(&self) -> Result<Vec<CodeSnippet>, ModelError> {
        let mut files = Vec::new();
        collect_files(&self.root.join(&self.config.lib_dir), &mut files)?;
        files
            .into_iter()
            .map(|path| {
                let data = std::fs::read_to_string(&path).map_err(|source| ModelError::Io {
                    path: path.clone(),
                    source,
                })?;
                let filename = path
                    .strip_prefix(&self.root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                Ok(CodeSnippet::new(data, filename))
            })
            .collect()
    }
}

impl DataSource for FilesystemDataSource {
    fn load(&self) -> Result<SiteData, ModelError> {
        let items = self
            .load_documents(&self.config.content_dir)?
            .into_iter()
            .map(Item::new)
            .collect();
        let layouts = self
            .load_documents(&self.config.layouts_dir)?
            .into_iter()
            .map(Layout::new)
            .collect();
        let code_snippets = self.load_code_snippets()?;
        Ok(SiteData {
            items,
            layouts,
            code_snippets,
        })
    }
}

/// Recursively lists files under `dir` in sorted order. A missing directory is empty.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ModelError> {
    if !dir.is_dir() {
        return Ok(());
    }
    let entries = std::fs::read_dir(dir).map_err(|source| ModelError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ModelError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if !is_ignored(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Editor backup and swap files.
fn is_ignored(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name.ends_with('~') || name.ends_with(".swp") || name.ends_with(".orig")
}

fn identifier_for(base: &Path, path: &Path) -> Result<Identifier, ModelError> {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(Identifier::new(format!("/{}", parts.join("/")))?)
}

fn has_front_matter(path: &Path) -> Result<bool, ModelError> {
    let mut file = std::fs::File::open(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut head = [0u8; 3];
    let mut read = 0;
    while read < head.len() {
        let n = file
            .read(&mut head[read..])
            .map_err(|source| ModelError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(&head[..read] == FRONT_MATTER_DELIMITER.as_bytes())
}

/// Splits `+++`-delimited TOML front matter from the body.
pub fn split_front_matter(text: &str, path: &Path) -> Result<(Attributes, String), ModelError> {
    let mut lines = text.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == FRONT_MATTER_DELIMITER => {}
        _ => return Ok((Attributes::new(), text.to_string())),
    }

    let mut front = String::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            closed = true;
            break;
        }
        front.push_str(line);
    }
    if !closed {
        return Err(ModelError::FrontMatter {
            path: path.to_path_buf(),
            message: "missing closing '+++'".to_string(),
        });
    }

    let attributes: Attributes = toml::from_str(&front).map_err(|e| ModelError::FrontMatter {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let body: String = lines.collect();
    Ok((attributes, body.strip_prefix('\n').unwrap_or(&body).to_string()))
}
