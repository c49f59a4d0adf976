//! Declaration merger: folds per-unit entity lists into one entity set
//!
//! Units are merged strictly in unit index order and, inside a unit, in
//! source order, so the merged arena is identical across runs. The merger is
//! the only writer of the merged state.
//!
//! Identity is the qualified name for types and data, and the signature key
//! for callables. Three things happen when an identity is seen again:
//!
//! - a forward declaration is completed by a later definition,
//! - an out-of-line member definition joins its in-class declaration,
//! - anything else is an idempotent redeclaration, unless it is structurally
//!   incompatible, in which case both occurrences are kept and flagged.

use crate::visitor::ANONYMOUS;
use cppmodel_api::{
    Completeness, Diagnostic, DiagnosticKind, Entity, EntityDetails, EntityId, EntityKind, UnitIR,
};
use std::collections::{HashMap, HashSet};

/// Counters reported at the end of a merge
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub redeclarations: usize,
    /// Forward declarations completed by a definition
    pub completed: usize,
    /// Out-of-line definitions matched to their in-class declaration
    pub out_of_line: usize,
    pub conflicts: usize,
}

/// Output of the merge phase, input of the resolver
#[derive(Debug, Default)]
pub struct MergedEntities {
    pub entities: Vec<Entity>,
    pub roots: Vec<EntityId>,
    /// Unit-level diagnostics in unit order, followed by merge conflicts
    pub diagnostics: Vec<Diagnostic>,
    pub stats: MergeStats,
}

/// An out-of-line definition waiting for every in-class declaration to be seen
struct Deferred {
    slot: usize,
    local: EntityId,
    parent: Option<EntityId>,
}

#[derive(Default)]
pub struct Merger {
    entities: Vec<Entity>,
    roots: Vec<EntityId>,
    identities: HashMap<String, EntityId>,
    /// First entity of each name class under a scoped name, for clashes
    /// between kinds that never share an identity
    names: HashMap<String, Vec<(NameClass, EntityId)>>,
    diagnostics: Vec<Diagnostic>,
    units: Vec<UnitIR>,
    deferred: Vec<Deferred>,
    /// Conflicting copies and everything below them; their members never
    /// merge with the first occurrence's
    detached: HashSet<EntityId>,
    stats: MergeStats,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the next unit. Units must arrive in unit index order.
    pub fn add_unit(&mut self, unit: UnitIR) {
        log::debug!(
            "Merging unit {} ({} entities)",
            unit.file_path.display(),
            unit.entity_count()
        );
        self.diagnostics.extend(unit.diagnostics.iter().cloned());

        let slot = self.units.len();
        let roots = unit.roots.clone();
        self.units.push(unit);
        for local in roots {
            self.merge_entity(slot, local, None, false);
        }
    }

    /// Match the deferred out-of-line definitions and hand over the result
    pub fn finish(mut self) -> MergedEntities {
        let deferred = std::mem::take(&mut self.deferred);
        for item in deferred {
            self.merge_entity(item.slot, item.local, item.parent, true);
        }

        log::debug!(
            "Merge finished: {} entities, {} redeclarations, {} completed forward declarations, {} out-of-line definitions, {} conflicts",
            self.entities.len(),
            self.stats.redeclarations,
            self.stats.completed,
            self.stats.out_of_line,
            self.stats.conflicts
        );

        MergedEntities {
            entities: self.entities,
            roots: self.roots,
            diagnostics: self.diagnostics,
            stats: self.stats,
        }
    }

    fn merge_entity(
        &mut self,
        slot: usize,
        local: EntityId,
        parent: Option<EntityId>,
        deferred_phase: bool,
    ) {
        let Some(entity) = self.units[slot].entity(local).cloned() else {
            return;
        };
        if !deferred_phase && self.is_out_of_line(slot, &entity) {
            self.deferred.push(Deferred {
                slot,
                local,
                parent,
            });
            return;
        }

        let key = self.identity_key(&entity, parent);
        let children = entity.children.clone();

        let target = match self.identities.get(&key).copied() {
            Some(existing) => match self.incompatibility(existing, slot, &entity) {
                None => {
                    self.absorb(existing, entity);
                    existing
                }
                Some(reason) => self.insert_conflicting(existing, entity, parent, reason),
            },
            None => {
                let named = self.name_key(&entity, parent);
                let clash = named
                    .as_ref()
                    .and_then(|(name, class)| self.name_clash(name, *class));
                let id = match clash {
                    Some(existing) => {
                        let reason = format!(
                            "declared as {} and as {}",
                            self.entities[existing.index()].kind,
                            entity.kind
                        );
                        self.insert_conflicting(existing, entity, parent, reason)
                    }
                    None => self.insert(entity, parent),
                };
                self.identities.insert(key, id);
                if let Some((name, class)) = named {
                    let seen = self.names.entry(name).or_default();
                    if !seen.iter().any(|(c, _)| *c == class) {
                        seen.push((class, id));
                    }
                }
                id
            }
        };

        for child in children {
            self.merge_entity(slot, child, Some(target), false);
        }
    }

    /// A function or variable whose qualified name does not follow from its
    /// lexical parent was defined out of line (`void Foo::bar() {}`)
    fn is_out_of_line(&self, slot: usize, entity: &Entity) -> bool {
        if !matches!(entity.kind, EntityKind::Function | EntityKind::Variable) {
            return false;
        }
        let unit = &self.units[slot];
        let expected = match entity.parent.and_then(|p| unit.entity(p)) {
            Some(parent) => format!("{}::{}", parent.qualified_name, entity.name),
            None => entity.name.clone(),
        };
        entity.qualified_name != expected
    }

    fn identity_key(&self, entity: &Entity, parent: Option<EntityId>) -> String {
        let key = match entity.kind {
            EntityKind::Function | EntityKind::Method => format!("fn:{}", entity.signature_key()),
            EntityKind::Field | EntityKind::Variable | EntityKind::EnumConstant => {
                format!("val:{}", entity.qualified_name)
            }
            _ => format!("ty:{}", entity.qualified_name),
        };
        key + &self.scope_suffix(entity, parent)
    }

    /// Scoped name used to detect a name declared as two clashing kinds
    fn name_key(&self, entity: &Entity, parent: Option<EntityId>) -> Option<(String, NameClass)> {
        if entity.name == ANONYMOUS {
            return None;
        }
        let class = NameClass::of(entity.kind)?;
        Some((
            entity.qualified_name.clone() + &self.scope_suffix(entity, parent),
            class,
        ))
    }

    fn name_clash(&self, name: &str, class: NameClass) -> Option<EntityId> {
        self.names
            .get(name)?
            .iter()
            .find(|(seen, _)| seen.clashes_with(class))
            .map(|(_, id)| *id)
    }

    fn scope_suffix(&self, entity: &Entity, parent: Option<EntityId>) -> String {
        let mut suffix = String::new();

        // template parameters of overloads, members of unnamed records and
        // members of conflicting copies are only unique below their parent
        let parent_scoped = parent.is_some_and(|p| self.detached.contains(&p))
            || parent
                .and_then(|p| self.entities.get(p.index()))
                .is_some_and(|p| {
                    p.kind.is_callable() || (p.name == ANONYMOUS && p.kind != EntityKind::Namespace)
                });
        if let Some(p) = parent.filter(|_| parent_scoped) {
            suffix.push_str(&format!("#{}", p.index()));
        }

        if entity.name == ANONYMOUS && entity.kind != EntityKind::Namespace {
            suffix.push_str(&format!(
                "@{}:{}",
                entity.location.file.display(),
                entity.location.offset
            ));
        } else if entity.internal_linkage {
            suffix.push_str(&format!("@{}", entity.location.file.display()));
        }
        suffix
    }

    /// Why `incoming` cannot be the same entity as `existing`, if it cannot
    fn incompatibility(&self, existing: EntityId, slot: usize, incoming: &Entity) -> Option<String> {
        let current = &self.entities[existing.index()];

        if !kinds_compatible(current.kind, incoming.kind) {
            return Some(format!(
                "declared as {} and as {}",
                current.kind, incoming.kind
            ));
        }
        if current.is_template() != incoming.is_template() {
            return Some("declared as template and as non-template".to_string());
        }

        match (&current.details, &incoming.details) {
            (EntityDetails::Record(ours), EntityDetails::Record(theirs)) => {
                if current.is_complete() && incoming.is_complete() {
                    if ours.base_signature() != theirs.base_signature() {
                        return Some("different base lists".to_string());
                    }
                    let our_fields = field_names(
                        current.children.iter().filter_map(|c| self.entities.get(c.index())),
                    );
                    let unit = &self.units[slot];
                    let their_fields =
                        field_names(incoming.children.iter().filter_map(|c| unit.entity(*c)));
                    if our_fields != their_fields {
                        return Some("different data members".to_string());
                    }
                }
            }
            (EntityDetails::Function(ours), EntityDetails::Function(theirs)) => {
                if ours.return_type != theirs.return_type {
                    return Some("different return types".to_string());
                }
            }
            (EntityDetails::Field(ours), EntityDetails::Field(theirs)) => {
                if ours.type_name != theirs.type_name {
                    return Some("different types".to_string());
                }
            }
            (EntityDetails::Field(ours), EntityDetails::Variable(theirs)) => {
                if ours.type_name != theirs.type_name {
                    return Some("different types".to_string());
                }
            }
            (EntityDetails::Variable(ours), EntityDetails::Variable(theirs)) => {
                if ours.type_name != theirs.type_name {
                    return Some("different types".to_string());
                }
            }
            (EntityDetails::Typedef(ours), EntityDetails::Typedef(theirs)) => {
                if ours.underlying_type != theirs.underlying_type {
                    return Some("different underlying types".to_string());
                }
            }
            (EntityDetails::Enum(ours), EntityDetails::Enum(theirs)) => {
                let underlying_differs = matches!(
                    (&ours.underlying_type, &theirs.underlying_type),
                    (Some(a), Some(b)) if a != b
                );
                if ours.scoped != theirs.scoped || underlying_differs {
                    return Some("different enum declarations".to_string());
                }
            }
            _ => {}
        }
        None
    }

    /// Fold a compatible redeclaration into the existing entity
    fn absorb(&mut self, id: EntityId, incoming: Entity) {
        let target = &mut self.entities[id.index()];
        let out_of_line = target.kind != incoming.kind;

        // a definition seen first yields its comment to a later declaration
        let declaration_doc_preferred = match (&target.details, &incoming.details) {
            (EntityDetails::Function(ours), EntityDetails::Function(theirs)) => {
                ours.is_definition
                    && !theirs.is_definition
                    && target.redeclarations.is_empty()
                    && incoming.doc.is_some()
            }
            _ => false,
        };

        let seen = incoming.location == target.location
            || target.redeclarations.contains(&incoming.location)
            || target.definition_location.as_ref() == Some(&incoming.location);
        if !seen {
            target.redeclarations.push(incoming.location.clone());
        }
        if target.definition_location.is_none() {
            target.definition_location = incoming.definition_location.clone();
        }

        if target.completeness == Completeness::Incomplete && incoming.is_complete() {
            log::debug!("Forward declaration of {} completed", target.qualified_name);
            target.completeness = Completeness::Complete;
            target.details = incoming.details.clone();
            self.stats.completed += 1;
        } else {
            merge_details(&mut target.details, &incoming.details);
        }

        if target.template.is_none() {
            target.template = incoming.template.clone();
        }

        // the declaration's comment wins; the definition's is the fallback
        if declaration_doc_preferred {
            target
                .diagnostics
                .retain(|d| d.kind != DiagnosticKind::CommentWarning);
            target.doc = incoming.doc;
            target.diagnostics.extend(incoming.diagnostics);
        } else if target.doc.is_none() && incoming.doc.is_some() {
            target.doc = incoming.doc;
            target.diagnostics.extend(incoming.diagnostics);
        }

        for attr in incoming.attributes {
            if !target.attributes.iter().any(|a| a.key == attr.key) {
                target.attributes.push(attr);
            }
        }

        if out_of_line {
            log::debug!(
                "Out-of-line definition of {} merged into its declaration",
                target.qualified_name
            );
            self.stats.out_of_line += 1;
        } else if !seen {
            self.stats.redeclarations += 1;
        }
    }

    fn insert_conflicting(
        &mut self,
        existing: EntityId,
        mut entity: Entity,
        parent: Option<EntityId>,
        reason: String,
    ) -> EntityId {
        log::warn!(
            "Conflicting redeclaration of {} at {}: {}",
            entity.qualified_name,
            entity.location,
            reason
        );
        self.diagnostics.push(
            Diagnostic::warning(
                DiagnosticKind::MergeConflict,
                format!(
                    "conflicting redeclaration of '{}': {}",
                    entity.qualified_name, reason
                ),
            )
            .at(entity.location.clone())
            .for_entity(entity.qualified_name.clone()),
        );
        self.entities[existing.index()].conflicting = true;
        entity.conflicting = true;
        self.stats.conflicts += 1;
        let id = self.insert(entity, parent);
        self.detached.insert(id);
        id
    }

    fn insert(&mut self, mut entity: Entity, parent: Option<EntityId>) -> EntityId {
        let id = EntityId(self.entities.len());
        entity.parent = parent;
        entity.children.clear();
        self.entities.push(entity);
        if parent.is_some_and(|p| self.detached.contains(&p)) {
            self.detached.insert(id);
        }
        match parent {
            Some(p) => self.entities[p.index()].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}

/// What a name denotes, for the kinds that live in separate identities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameClass {
    Namespace,
    /// Records and enums, which a function or variable may hide
    Type,
    Alias,
    Value,
    Callable,
}

impl NameClass {
    fn of(kind: EntityKind) -> Option<Self> {
        use EntityKind::*;
        match kind {
            Namespace => Some(NameClass::Namespace),
            Class | Struct | Union | Enum => Some(NameClass::Type),
            Typedef => Some(NameClass::Alias),
            Field | Variable => Some(NameClass::Value),
            Function | Method => Some(NameClass::Callable),
            EnumConstant | TemplateParameter => None,
        }
    }

    fn clashes_with(self, other: NameClass) -> bool {
        use NameClass::*;
        self != other
            && match (self, other) {
                (Namespace, _) | (_, Namespace) => true,
                (Type, _) | (_, Type) => false,
                _ => true,
            }
    }
}

fn kinds_compatible(existing: EntityKind, incoming: EntityKind) -> bool {
    use EntityKind::*;
    existing == incoming
        || matches!(
            (existing, incoming),
            (Class, Struct) | (Struct, Class) | (Method, Function) | (Field, Variable)
        )
}

fn field_names<'e>(entities: impl Iterator<Item = &'e Entity>) -> Vec<&'e str> {
    entities
        .filter(|e| e.kind == EntityKind::Field)
        .map(|e| e.name.as_str())
        .collect()
}

/// Fill what a redeclaration knows and the first declaration did not
fn merge_details(target: &mut EntityDetails, incoming: &EntityDetails) {
    match (target, incoming) {
        (EntityDetails::Function(ours), EntityDetails::Function(theirs)) => {
            ours.is_definition |= theirs.is_definition;
            ours.is_inline |= theirs.is_inline;
            ours.is_noexcept |= theirs.is_noexcept;
            for (param, other) in ours.parameters.iter_mut().zip(&theirs.parameters) {
                if param.name.is_empty() {
                    param.name = other.name.clone();
                }
                if param.default_value.is_none() {
                    param.default_value = other.default_value.clone();
                }
            }
        }
        (EntityDetails::Field(ours), EntityDetails::Variable(theirs)) => {
            if ours.default_value.is_none() {
                ours.default_value = theirs.initializer.clone();
            }
        }
        (EntityDetails::Field(ours), EntityDetails::Field(theirs)) => {
            if ours.default_value.is_none() {
                ours.default_value = theirs.default_value.clone();
            }
        }
        (EntityDetails::Variable(ours), EntityDetails::Variable(theirs)) => {
            if theirs.initializer.is_some() && ours.initializer.is_none() {
                ours.initializer = theirs.initializer.clone();
                ours.is_extern = theirs.is_extern;
            }
        }
        (EntityDetails::Enum(ours), EntityDetails::Enum(theirs)) => {
            if ours.underlying_type.is_none() {
                ours.underlying_type = theirs.underlying_type.clone();
            }
        }
        _ => {}
    }
}
