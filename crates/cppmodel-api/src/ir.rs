use crate::{
    diagnostics::Diagnostic,
    entities::{Entity, EntityId},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An `#include` directive seen in a unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeDirective {
    /// Header name as written, without quotes or brackets
    pub path: String,

    /// `<...>` form
    pub system: bool,

    pub line: usize,
}

/// Intermediate representation of one translation unit
///
/// This is the bridge between the syntax tree and the merged model. A worker
/// builds one `UnitIR` per unit; once handed to the merger it is never
/// modified again. Entity IDs are indices into `entities` and are local to
/// this unit.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitIR {
    /// Position of the unit in the run's deterministic order
    pub unit_index: usize,

    /// Source file path
    pub file_path: PathBuf,

    /// Extracted entities in source order
    pub entities: Vec<Entity>,

    /// Top-level entities in source order
    pub roots: Vec<EntityId>,

    pub includes: Vec<IncludeDirective>,

    /// Unit-level findings (syntax, preprocessor, comment warnings)
    pub diagnostics: Vec<Diagnostic>,

    pub line_count: usize,

    pub byte_count: usize,
}

impl UnitIR {
    /// Create a new empty IR
    pub fn new(unit_index: usize, file_path: PathBuf) -> Self {
        Self {
            unit_index,
            file_path,
            ..Default::default()
        }
    }

    /// Add an entity under `parent` (or as a root) and return its ID.
    ///
    /// The entity's `parent` is overwritten and it is appended to the
    /// parent's children, so source order is the insertion order.
    pub fn add_entity(&mut self, mut entity: Entity, parent: Option<EntityId>) -> EntityId {
        let id = EntityId(self.entities.len());
        entity.parent = parent;
        self.entities.push(entity);

        match parent.and_then(|p| self.entities.get_mut(p.index())) {
            Some(owner) => owner.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.index())
    }

    /// Total number of entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Find entities by qualified name
    pub fn find(&self, qualified_name: &str) -> impl Iterator<Item = &Entity> {
        let name = qualified_name.to_string();
        self.entities
            .iter()
            .filter(move |e| e.qualified_name == name)
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
