//! Content and attribute digests used to detect raw changes between runs.
//!
//! Each checksum-bearing object gets a whole-object digest, a content digest,
//! an attributes digest and one digest per attribute. Attribute digests are
//! computed over canonical JSON, so they do not depend on key order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use kiln_common::{canonical_json, Attributes, ContentHash, ContentHasher};
use kiln_model::{Document, Reference, Site, SiteObject};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::store::StoreFile;

const STORE_NAME: &str = "checksums";
const STORE_VERSION: u32 = 1;

/// The digests of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectChecksums {
    /// Digest of the whole object.
    pub whole: ContentHash,
    /// Digest of the content, for items, layouts and code snippets.
    pub content: Option<ContentHash>,
    /// Digest of all attributes together.
    pub attributes: Option<ContentHash>,
    /// Digest of each attribute value, by key.
    pub each_attribute: BTreeMap<String, ContentHash>,
}

/// Computes [`ObjectChecksums`] for site objects.
pub struct Checksummer;

impl Checksummer {
    /// Computes the digests of one object.
    ///
    /// Checksum hints supplied by the data source replace the digested data.
    pub fn calc(object: &SiteObject<'_>) -> Result<ObjectChecksums, CacheError> {
        let reference = object.reference();
        match object {
            SiteObject::CodeSnippet(snippet) => {
                let content = ContentHash::from_bytes(snippet.data.as_bytes());
                Ok(ObjectChecksums {
                    whole: content,
                    content: Some(content),
                    attributes: None,
                    each_attribute: BTreeMap::new(),
                })
            }
            SiteObject::Configuration(config) => {
                let attributes = attributes_checksum(config.attributes(), None);
                Ok(ObjectChecksums {
                    whole: attributes,
                    content: None,
                    attributes: Some(attributes),
                    each_attribute: each_attribute_checksums(config.attributes()),
                })
            }
            SiteObject::Item(item) => calc_document(&reference, item),
            SiteObject::Layout(layout) => calc_document(&reference, layout),
        }
    }
}

fn calc_document(reference: &Reference, doc: &Document) -> Result<ObjectChecksums, CacheError> {
    let content = match doc.content_checksum_data() {
        Some(hint) => ContentHash::from_bytes(hint.as_bytes()),
        None => doc
            .content()
            .checksum()
            .map_err(|source| CacheError::Checksum {
                reference: reference.clone(),
                source,
            })?,
    };
    let attributes = attributes_checksum(doc.attributes(), doc.attributes_checksum_data());

    let mut hasher = ContentHasher::new();
    hasher.update_part(if doc.content().is_binary() { b"b" } else { b"t" });
    hasher.update_part(content.to_string().as_bytes());
    hasher.update_part(attributes.to_string().as_bytes());

    Ok(ObjectChecksums {
        whole: hasher.finish(),
        content: Some(content),
        attributes: Some(attributes),
        each_attribute: each_attribute_checksums(doc.attributes()),
    })
}

fn attributes_checksum(attributes: &Attributes, hint: Option<&str>) -> ContentHash {
    match hint {
        Some(hint) => ContentHash::from_bytes(hint.as_bytes()),
        None => {
            let mut hasher = ContentHasher::new();
            for (key, value) in attributes {
                hasher.update_part(key.as_bytes());
                hasher.update_part(canonical_json(value).as_bytes());
            }
            hasher.finish()
        }
    }
}

fn each_attribute_checksums(attributes: &Attributes) -> BTreeMap<String, ContentHash> {
    attributes
        .iter()
        .map(|(key, value)| {
            (
                key.clone(),
                ContentHash::from_bytes(canonical_json(value).as_bytes()),
            )
        })
        .collect()
}

/// Persisted digests, keyed by object reference.
///
/// Two instances exist during a run: the one loaded from disk (old) and the
/// one computed from the current site (new). Comparing them drives the
/// content, attribute, configuration and code-snippet outdatedness rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumStore {
    checksums: BTreeMap<Reference, ObjectChecksums>,
}

impl ChecksumStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes fresh digests for every checksum-bearing object of `site`.
    pub fn for_site(site: &Site) -> Result<Self, CacheError> {
        let mut store = Self::new();
        for object in site.objects() {
            store.add(object.reference(), Checksummer::calc(&object)?);
        }
        Ok(store)
    }

    /// Records the digests of `reference`.
    pub fn add(&mut self, reference: Reference, checksums: ObjectChecksums) {
        self.checksums.insert(reference, checksums);
    }

    /// All digests of `reference`.
    pub fn get(&self, reference: &Reference) -> Option<&ObjectChecksums> {
        self.checksums.get(reference)
    }

    /// Whole-object digest.
    pub fn checksum_for(&self, reference: &Reference) -> Option<ContentHash> {
        self.get(reference).map(|c| c.whole)
    }

    /// Content digest.
    pub fn content_checksum_for(&self, reference: &Reference) -> Option<ContentHash> {
        self.get(reference).and_then(|c| c.content)
    }

    /// All-attributes digest.
    pub fn attributes_checksum_for(&self, reference: &Reference) -> Option<ContentHash> {
        self.get(reference).and_then(|c| c.attributes)
    }

    /// Per-attribute digests.
    pub fn each_attribute_checksums_for(
        &self,
        reference: &Reference,
    ) -> Option<&BTreeMap<String, ContentHash>> {
        self.get(reference).map(|c| &c.each_attribute)
    }

    /// References with stored digests.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.checksums.keys()
    }

    /// Drops entries for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&Reference) -> bool) {
        self.checksums.retain(|r, _| keep(r));
    }

    /// Number of objects with stored digests.
    pub fn len(&self) -> usize {
        self.checksums.len()
    }

    /// Returns true if no digests are stored.
    pub fn is_empty(&self) -> bool {
        self.checksums.is_empty()
    }

    /// Loads the store from `dir`, dropping entries for objects that no longer exist.
    ///
    /// Code snippet entries are kept even when the snippet is gone, so that
    /// its removal can be noticed.
    pub fn load(dir: &Path, live: &BTreeSet<Reference>) -> Self {
        let mut store: Self = Self::file(dir).load().unwrap_or_default();
        store.retain(|r| matches!(r, Reference::CodeSnippet(_)) || live.contains(r));
        store
    }

    /// Saves the store into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), CacheError> {
        Self::file(dir).save(self)
    }

    fn file(dir: &Path) -> StoreFile {
        StoreFile::new(dir, STORE_NAME, STORE_VERSION)
    }
}

/// Keys whose per-attribute digests differ between `old` and `new`,
/// including keys present in only one of them.
pub fn modified_attribute_keys(
    old: &BTreeMap<String, ContentHash>,
    new: &BTreeMap<String, ContentHash>,
) -> Vec<String> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| old.get(*k) != new.get(*k))
        .cloned()
        .collect()
}
