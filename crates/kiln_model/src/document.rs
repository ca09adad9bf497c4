//! Items, layouts, code snippets and the site configuration.

use std::ops::Deref;
use std::sync::Arc;

use kiln_common::{Attributes, Identifier};
use kiln_config::SiteConfig;

use crate::content::Content;
use crate::reference::Reference;

/// Content, attributes and identifier shared by items and layouts.
///
/// A document never changes after construction. The `with_*` methods consume
/// and return the document, so they can only be used while building it.
#[derive(Debug, Clone)]
pub struct Document {
    identifier: Identifier,
    content: Content,
    attributes: Arc<Attributes>,
    content_checksum_data: Option<String>,
    attributes_checksum_data: Option<String>,
}

impl Document {
    /// Creates a document.
    pub fn new(identifier: Identifier, content: Content, attributes: Attributes) -> Self {
        Self {
            identifier,
            content,
            attributes: Arc::new(attributes),
            content_checksum_data: None,
            attributes_checksum_data: None,
        }
    }

    /// Supplies data to digest in place of the content itself.
    #[must_use]
    pub fn with_content_checksum_data(mut self, data: impl Into<String>) -> Self {
        self.content_checksum_data = Some(data.into());
        self
    }

    /// Supplies data to digest in place of the attributes themselves.
    #[must_use]
    pub fn with_attributes_checksum_data(mut self, data: impl Into<String>) -> Self {
        self.attributes_checksum_data = Some(data.into());
        self
    }

    /// The identifier.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The raw content.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// The attributes.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Checksum hint for the content, if the data source supplied one.
    pub fn content_checksum_data(&self) -> Option<&str> {
        self.content_checksum_data.as_deref()
    }

    /// Checksum hint for the attributes, if the data source supplied one.
    pub fn attributes_checksum_data(&self) -> Option<&str> {
        self.attributes_checksum_data.as_deref()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Document {}

/// A piece of content to be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item(Document);

/// A template applied to items by `layout` actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout(Document);

impl Item {
    /// Wraps a document as an item.
    pub fn new(document: Document) -> Self {
        Self(document)
    }

    /// The item's reference.
    pub fn reference(&self) -> Reference {
        Reference::Item(self.0.identifier.clone())
    }
}

impl Layout {
    /// Wraps a document as a layout.
    pub fn new(document: Document) -> Self {
        Self(document)
    }

    /// The layout's reference.
    pub fn reference(&self) -> Reference {
        Reference::Layout(self.0.identifier.clone())
    }
}

impl Deref for Item {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.0
    }
}

impl Deref for Layout {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.0
    }
}

/// Source code that rules or filters depend on.
///
/// Any change to a code snippet makes every rep outdated, because there is no
/// way to tell which parts of the site it affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSnippet {
    /// The source text.
    pub data: String,
    /// Path relative to the site root, used as the snippet's identity.
    pub filename: String,
}

impl CodeSnippet {
    /// Creates a code snippet.
    pub fn new(data: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            filename: filename.into(),
        }
    }

    /// The snippet's reference.
    pub fn reference(&self) -> Reference {
        Reference::CodeSnippet(self.filename.clone())
    }
}

/// The site configuration as a checksum-bearing object.
#[derive(Debug, Clone)]
pub struct Configuration {
    settings: Arc<SiteConfig>,
    attributes: Arc<Attributes>,
}

impl Configuration {
    /// Wraps a loaded configuration.
    pub fn new(settings: SiteConfig) -> Self {
        let attributes = settings.attributes();
        Self {
            settings: Arc::new(settings),
            attributes: Arc::new(attributes),
        }
    }

    /// The typed settings.
    pub fn settings(&self) -> &SiteConfig {
        &self.settings
    }

    /// The flat attribute view seen by rules and filters.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The configuration's reference.
    pub fn reference(&self) -> Reference {
        Reference::Configuration
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(SiteConfig::default())
    }
}
