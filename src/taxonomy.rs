//! Taxonomies: ordinal/name bijections and their resolver.
//!
//! A taxonomy lets the writer strip field names down to two-byte ordinals and
//! lets the reader restore them. Which taxonomy applies is carried in the
//! envelope header as a 16-bit id; a [`TaxonomyResolver`] turns that id back
//! into a [`Taxonomy`]. Id 0 always means "none", and an unresolved id simply
//! disables name/ordinal rewriting for that envelope.

use std::collections::HashMap;

/// A bijection between a set of 16-bit ordinals and a set of field names.
///
/// Backed by two parallel arrays of equal length. Taxonomies are small (they
/// enumerate the field vocabulary of one schema), so lookups are linear scans.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    ordinals: Vec<i16>,
    names: Vec<String>,
}

impl Taxonomy {
    /// Builds a taxonomy from (ordinal, name) pairs.
    pub fn new<'a>(entries: impl IntoIterator<Item = (i16, &'a str)>) -> Self {
        let mut ordinals = Vec::new();
        let mut names = Vec::new();
        for (ordinal, name) in entries {
            ordinals.push(ordinal);
            names.push(name.to_owned());
        }
        Self { ordinals, names }
    }

    /// Maps a name to its ordinal. Unknown names return `None`.
    pub fn ordinal_of(&self, name: &str) -> Option<i16> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.ordinals[i])
    }

    /// Maps an ordinal to its name. Unknown ordinals return `None`.
    pub fn name_of(&self, ordinal: i16) -> Option<&str> {
        self.ordinals
            .iter()
            .position(|&o| o == ordinal)
            .map(|i| self.names[i].as_str())
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    /// Returns true if the taxonomy has no entries.
    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }
}

/// Maps 16-bit taxonomy ids to taxonomies.
///
/// Returning `None` (for id 0, or for any id the resolver does not know)
/// means the envelope is processed without name/ordinal rewriting.
pub trait TaxonomyResolver: Send + Sync + std::fmt::Debug {
    /// Resolves a taxonomy id.
    fn resolve(&self, taxonomy_id: i16) -> Option<&Taxonomy>;
}

/// A resolver over an immutable map, fixed at construction.
#[derive(Debug, Default)]
pub struct MapResolver {
    taxonomies: HashMap<i16, Taxonomy>,
}

impl MapResolver {
    /// Builds a resolver from (id, taxonomy) pairs. Entries with id 0 are
    /// dropped; that id is reserved for "no taxonomy".
    pub fn new(entries: impl IntoIterator<Item = (i16, Taxonomy)>) -> Self {
        Self {
            taxonomies: entries.into_iter().filter(|(id, _)| *id != 0).collect(),
        }
    }
}

impl TaxonomyResolver for MapResolver {
    fn resolve(&self, taxonomy_id: i16) -> Option<&Taxonomy> {
        self.taxonomies.get(&taxonomy_id)
    }
}
