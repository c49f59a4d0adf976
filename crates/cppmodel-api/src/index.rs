//! Qualified-name lookup over the merged entity set.
//!
//! The index has two phases. [`IndexBuilder`] is owned by the single thread
//! that finishes the merge and is the only writer; [`IndexBuilder::freeze`]
//! consumes it and yields a [`CrossReferenceIndex`], which has no mutating
//! methods and can be shared across any number of readers.

use crate::entities::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build phase of the cross-reference index
#[derive(Debug, Default)]
pub struct IndexBuilder {
    names: BTreeMap<String, Vec<EntityId>>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` under `qualified_name`. Insertion order is kept per name.
    pub fn insert(&mut self, qualified_name: &str, id: EntityId) {
        let ids = self.names.entry(qualified_name.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn freeze(self) -> CrossReferenceIndex {
        CrossReferenceIndex { names: self.names }
    }
}

/// Frozen, read-only mapping from qualified name to entities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferenceIndex {
    names: BTreeMap<String, Vec<EntityId>>,
}

impl CrossReferenceIndex {
    /// All entities registered under exactly this qualified name
    pub fn lookup(&self, qualified_name: &str) -> &[EntityId] {
        let key = qualified_name.strip_prefix("::").unwrap_or(qualified_name);
        self.names.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        !self.lookup(qualified_name).is_empty()
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Indexed names in lexicographic order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// Resolve a possibly partially qualified `name` as seen from `scope`.
    ///
    /// Lookup starts in `scope` and moves outward one enclosing scope at a
    /// time, ending at the global scope. A leading `::` forces global lookup.
    pub fn resolve(&self, name: &str, scope: &str) -> &[EntityId] {
        if let Some(absolute) = name.strip_prefix("::") {
            return self.lookup(absolute);
        }

        let components: Vec<&str> = scope
            .trim_start_matches("::")
            .split("::")
            .filter(|c| !c.is_empty())
            .collect();

        for depth in (0..=components.len()).rev() {
            let candidate = if depth == 0 {
                name.to_string()
            } else {
                format!("{}::{}", components[..depth].join("::"), name)
            };
            let found = self.lookup(&candidate);
            if !found.is_empty() {
                return found;
            }
        }
        &[]
    }
}
