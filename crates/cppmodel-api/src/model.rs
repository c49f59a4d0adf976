//! The frozen result of an extraction run.

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind},
    entities::{Access, Entity, EntityId, EntityKind},
    index::CrossReferenceIndex,
};
use serde::{Deserialize, Serialize};

/// Edge from a specialization to its primary template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecializationEdge {
    pub specialization: EntityId,
    pub primary: EntityId,
    /// Template arguments as written, normalized
    pub arguments: Vec<String>,
    pub partial: bool,
}

/// One entry of a record's flattened base set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlatBase {
    /// Resolved base entity; `None` when the base was never declared in the inputs
    pub entity: Option<EntityId>,
    pub name: String,
    pub is_virtual: bool,
    /// Access as written on the nearest edge to this base
    pub access: Access,
    /// Number of derivation steps from the derived class
    pub depth: usize,
}

/// Callables sharing one name in one scope, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverloadSet {
    pub qualified_name: String,
    pub scope: Option<EntityId>,
    pub members: Vec<EntityId>,
}

impl OverloadSet {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Everything the resolver hands over to build a [`CodeModel`]
#[derive(Debug, Default)]
pub struct ModelParts {
    pub entities: Vec<Entity>,
    pub roots: Vec<EntityId>,
    pub specializations: Vec<SpecializationEdge>,
    /// Aligned with `entities`; empty for non-records
    pub flattened_bases: Vec<Vec<FlatBase>>,
    pub overload_sets: Vec<OverloadSet>,
    pub diagnostics: Vec<Diagnostic>,
    pub index: CrossReferenceIndex,
}

/// Immutable, merged model of all translation units of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeModel {
    entities: Vec<Entity>,
    roots: Vec<EntityId>,
    specializations: Vec<SpecializationEdge>,
    flattened_bases: Vec<Vec<FlatBase>>,
    overload_sets: Vec<OverloadSet>,
    diagnostics: Vec<Diagnostic>,
    index: CrossReferenceIndex,
}

impl From<ModelParts> for CodeModel {
    fn from(parts: ModelParts) -> Self {
        Self {
            entities: parts.entities,
            roots: parts.roots,
            specializations: parts.specializations,
            flattened_bases: parts.flattened_bases,
            overload_sets: parts.overload_sets,
            diagnostics: parts.diagnostics,
            index: parts.index,
        }
    }
}

impl CodeModel {
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    /// All entities with their IDs, in merge order
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityId(i), e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Top-level entities in merge order
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Children of `id` in source order
    pub fn children(&self, id: EntityId) -> Vec<&Entity> {
        self.entity(id)
            .map(|e| e.children.iter().filter_map(|c| self.entity(*c)).collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: EntityId) -> Option<&Entity> {
        self.entity(id)
            .and_then(|e| e.parent)
            .and_then(|p| self.entity(p))
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities().filter(move |(_, e)| e.kind == kind)
    }

    pub fn index(&self) -> &CrossReferenceIndex {
        &self.index
    }

    /// IDs registered under exactly `qualified_name`
    pub fn lookup_ids(&self, qualified_name: &str) -> &[EntityId] {
        self.index.lookup(qualified_name)
    }

    /// Entities registered under exactly `qualified_name`
    pub fn lookup(&self, qualified_name: &str) -> Vec<&Entity> {
        self.ids_to_entities(self.index.lookup(qualified_name))
    }

    /// First entity registered under `qualified_name`
    pub fn lookup_one(&self, qualified_name: &str) -> Option<&Entity> {
        self.index
            .lookup(qualified_name)
            .first()
            .and_then(|id| self.entity(*id))
    }

    /// Resolve a reference as written inside `scope` using outward scope lookup
    pub fn resolve(&self, name: &str, scope: &str) -> Vec<&Entity> {
        self.ids_to_entities(self.index.resolve(name, scope))
    }

    pub fn overload_sets(&self) -> &[OverloadSet] {
        &self.overload_sets
    }

    pub fn overload_set(&self, qualified_name: &str) -> Option<&OverloadSet> {
        let key = qualified_name.strip_prefix("::").unwrap_or(qualified_name);
        self.overload_sets
            .iter()
            .find(|set| set.qualified_name == key)
    }

    pub fn specializations(&self) -> &[SpecializationEdge] {
        &self.specializations
    }

    pub fn specializations_of(&self, primary: EntityId) -> Vec<&SpecializationEdge> {
        self.specializations
            .iter()
            .filter(|edge| edge.primary == primary)
            .collect()
    }

    pub fn primary_of(&self, specialization: EntityId) -> Option<EntityId> {
        self.specializations
            .iter()
            .find(|edge| edge.specialization == specialization)
            .map(|edge| edge.primary)
    }

    /// Every direct and indirect base of a record, virtual bases exactly once
    pub fn flattened_bases(&self, id: EntityId) -> &[FlatBase] {
        self.flattened_bases
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Run-level diagnostics, comment warnings and merge conflicts included
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn diagnostics_of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// Entities flagged as conflicting
    pub fn conflicts(&self) -> Vec<EntityId> {
        self.entities()
            .filter(|(_, e)| e.conflicting)
            .map(|(id, _)| id)
            .collect()
    }

    fn ids_to_entities(&self, ids: &[EntityId]) -> Vec<&Entity> {
        ids.iter().filter_map(|id| self.entity(*id)).collect()
    }
}
