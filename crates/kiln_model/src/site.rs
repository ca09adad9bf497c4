//! The loaded site: configuration, items, layouts and code snippets.

use std::collections::HashMap;
use std::ops::Deref;

use kiln_common::{Attributes, Identifier, Pattern, StringPatternType};

use crate::content::Content;
use crate::document::{CodeSnippet, Configuration, Document, Item, Layout};
use crate::error::ModelError;
use crate::reference::Reference;

/// An ordered collection of documents, indexed by identifier.
#[derive(Debug, Clone)]
pub struct DocumentCollection<T> {
    docs: Vec<T>,
    index: HashMap<Identifier, usize>,
}

impl<T: Deref<Target = Document>> DocumentCollection<T> {
    fn new(kind: &'static str, docs: Vec<T>) -> Result<Self, ModelError> {
        let mut index = HashMap::with_capacity(docs.len());
        for (i, doc) in docs.iter().enumerate() {
            if index.insert(doc.identifier().clone(), i).is_some() {
                return Err(ModelError::DuplicateIdentifier {
                    kind,
                    identifier: doc.identifier().to_string(),
                });
            }
        }
        Ok(Self { docs, index })
    }

    /// Returns the document with exactly this identifier.
    pub fn get(&self, identifier: &Identifier) -> Option<&T> {
        self.index.get(identifier).map(|&i| &self.docs[i])
    }

    /// Returns every document matching `pattern`, in load order.
    pub fn find_all(&self, pattern: &Pattern) -> Vec<&T> {
        self.docs
            .iter()
            .filter(|d| pattern.matches(d.identifier()))
            .collect()
    }

    /// Resolves an identifier or pattern string to the first matching document.
    ///
    /// An exact identifier match wins over pattern matching.
    pub fn resolve(&self, s: &str, kind: StringPatternType) -> Option<&T> {
        if let Ok(id) = Identifier::new(s) {
            if let Some(doc) = self.get(&id) {
                return Some(doc);
            }
        }
        let pattern = Pattern::parse(s, kind).ok()?;
        self.docs.iter().find(|d| pattern.matches(d.identifier()))
    }

    /// Iterates in load order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.docs.iter()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns true if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// A checksum-bearing site object, borrowed from a [`Site`].
///
/// The closed set of object kinds the checksum and dependency logic deals
/// with. Item reps are not included: they carry no checksums of their own.
#[derive(Debug, Clone, Copy)]
pub enum SiteObject<'a> {
    /// An item.
    Item(&'a Item),
    /// A layout.
    Layout(&'a Layout),
    /// The configuration.
    Configuration(&'a Configuration),
    /// A code snippet.
    CodeSnippet(&'a CodeSnippet),
}

impl<'a> SiteObject<'a> {
    /// The object's reference.
    pub fn reference(&self) -> Reference {
        match self {
            SiteObject::Item(i) => i.reference(),
            SiteObject::Layout(l) => l.reference(),
            SiteObject::Configuration(c) => c.reference(),
            SiteObject::CodeSnippet(s) => s.reference(),
        }
    }

    /// The object's content, for items and layouts.
    pub fn content(&self) -> Option<&'a Content> {
        match *self {
            SiteObject::Item(i) => Some(i.content()),
            SiteObject::Layout(l) => Some(l.content()),
            _ => None,
        }
    }

    /// The object's attributes, for everything but code snippets.
    pub fn attributes(&self) -> Option<&'a Attributes> {
        match *self {
            SiteObject::Item(i) => Some(i.attributes()),
            SiteObject::Layout(l) => Some(l.attributes()),
            SiteObject::Configuration(c) => Some(c.attributes()),
            SiteObject::CodeSnippet(_) => None,
        }
    }

    /// The document, for items and layouts.
    pub fn document(&self) -> Option<&'a Document> {
        match *self {
            SiteObject::Item(i) => Some(&**i),
            SiteObject::Layout(l) => Some(&**l),
            _ => None,
        }
    }
}

/// Everything a compilation run reads.
#[derive(Debug, Clone)]
pub struct Site {
    config: Configuration,
    items: DocumentCollection<Item>,
    layouts: DocumentCollection<Layout>,
    code_snippets: Vec<CodeSnippet>,
}

impl Site {
    /// Assembles a site, rejecting duplicate identifiers.
    pub fn new(
        config: Configuration,
        items: Vec<Item>,
        layouts: Vec<Layout>,
        code_snippets: Vec<CodeSnippet>,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            config,
            items: DocumentCollection::new("item", items)?,
            layouts: DocumentCollection::new("layout", layouts)?,
            code_snippets,
        })
    }

    /// The configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// The items.
    pub fn items(&self) -> &DocumentCollection<Item> {
        &self.items
    }

    /// The layouts.
    pub fn layouts(&self) -> &DocumentCollection<Layout> {
        &self.layouts
    }

    /// The code snippets.
    pub fn code_snippets(&self) -> &[CodeSnippet] {
        &self.code_snippets
    }

    /// Looks up a checksum-bearing object by reference.
    pub fn object(&self, reference: &Reference) -> Option<SiteObject<'_>> {
        match reference {
            Reference::Item(id) => self.items.get(id).map(SiteObject::Item),
            Reference::Layout(id) => self.layouts.get(id).map(SiteObject::Layout),
            Reference::Configuration => Some(SiteObject::Configuration(&self.config)),
            Reference::CodeSnippet(name) => self
                .code_snippets
                .iter()
                .find(|s| &s.filename == name)
                .map(SiteObject::CodeSnippet),
            Reference::ItemRep(..) => None,
        }
    }

    /// All checksum-bearing objects: configuration, code snippets, layouts, items.
    pub fn objects(&self) -> Vec<SiteObject<'_>> {
        let mut objects = Vec::with_capacity(
            1 + self.code_snippets.len() + self.layouts.len() + self.items.len(),
        );
        objects.push(SiteObject::Configuration(&self.config));
        objects.extend(self.code_snippets.iter().map(SiteObject::CodeSnippet));
        objects.extend(self.layouts.iter().map(SiteObject::Layout));
        objects.extend(self.items.iter().map(SiteObject::Item));
        objects
    }

    /// References of [`objects`](Self::objects), in the same order.
    pub fn references(&self) -> Vec<Reference> {
        self.objects().iter().map(SiteObject::reference).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> Item {
        Item::new(Document::new(
            Identifier::new(id).unwrap(),
            Content::textual(""),
            Attributes::new(),
        ))
    }

    fn layout(id: &str) -> Layout {
        Layout::new(Document::new(
            Identifier::new(id).unwrap(),
            Content::textual(""),
            Attributes::new(),
        ))
    }

    fn site() -> Site {
        Site::new(
            Configuration::default(),
            vec![item("/index.md"), item("/blog/a.md"), item("/blog/b.md")],
            vec![layout("/default.html"), layout("/post.html")],
            vec![CodeSnippet::new("", "lib/helpers.rb")],
        )
        .unwrap()
    }

    #[test]
    fn duplicate_items_rejected() {
        let err = Site::new(
            Configuration::default(),
            vec![item("/a.md"), item("/a.md")],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateIdentifier { kind: "item", .. }));
    }

    #[test]
    fn find_all_by_glob() {
        let s = site();
        let p = Pattern::glob("/blog/*").unwrap();
        let found: Vec<&str> = s
            .items()
            .find_all(&p)
            .iter()
            .map(|i| i.identifier().as_str())
            .collect();
        assert_eq!(found, vec!["/blog/a.md", "/blog/b.md"]);
    }

    #[test]
    fn resolve_layout_by_pattern() {
        let s = site();
        let l = s
            .layouts()
            .resolve("/default.*", StringPatternType::Glob)
            .unwrap();
        assert_eq!(l.identifier().as_str(), "/default.html");
        assert!(s
            .layouts()
            .resolve("/missing.*", StringPatternType::Glob)
            .is_none());
    }

    #[test]
    fn objects_in_canonical_order() {
        let s = site();
        let refs: Vec<String> = s.references().iter().map(|r| r.to_string()).collect();
        assert_eq!(
            refs,
            vec![
                "configuration",
                "code_snippet:lib/helpers.rb",
                "layout:/default.html",
                "layout:/post.html",
                "item:/index.md",
                "item:/blog/a.md",
                "item:/blog/b.md",
            ]
        );
    }

    #[test]
    fn object_lookup() {
        let s = site();
        let r = Reference::Item(Identifier::new("/blog/a.md").unwrap());
        assert!(matches!(s.object(&r), Some(SiteObject::Item(_))));
        assert!(s
            .object(&Reference::CodeSnippet("lib/helpers.rb".into()))
            .is_some());
        assert!(s
            .object(&Reference::Item(Identifier::new("/nope").unwrap()))
            .is_none());
    }
}
