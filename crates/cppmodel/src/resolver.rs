//! Template & overload resolution over the merged entity set
//!
//! Everything here is read-mostly: the resolver fills base targets in place,
//! then derives the flattened base sets, specialization edges and overload
//! sets, and finally freezes the cross-reference index.

use crate::merger::MergedEntities;
use cppmodel_api::{
    CodeModel, CrossReferenceIndex, Diagnostic, DiagnosticKind, Entity, EntityId,
    EntityKind, FlatBase, IndexBuilder, ModelParts, OverloadSet, SpecializationEdge,
};
use std::collections::{HashMap, HashSet};

/// Turn merged entities into the immutable [`CodeModel`]
pub fn resolve(merged: MergedEntities) -> CodeModel {
    let MergedEntities {
        mut entities,
        roots,
        mut diagnostics,
        ..
    } = merged;

    let index = build_index(&entities);

    resolve_base_targets(&mut entities, &index);
    let flattened_bases = (0..entities.len())
        .map(|i| flatten_bases(&entities, EntityId(i)))
        .collect();
    let specializations = link_specializations(&entities, &index, &mut diagnostics);
    let overload_sets = group_overloads(&entities);

    let mut comment_warnings = 0;
    for entity in &entities {
        comment_warnings += entity.diagnostics.len();
        diagnostics.extend(entity.diagnostics.iter().cloned());
    }

    log::debug!(
        "Resolved {} specializations, {} overload sets, {} comment warnings",
        specializations.len(),
        overload_sets.len(),
        comment_warnings
    );

    CodeModel::from(ModelParts {
        entities,
        roots,
        specializations,
        flattened_bases,
        overload_sets,
        diagnostics,
        index,
    })
}

/// Index every entity except template parameters, which are only
/// meaningful inside their template
pub fn build_index(entities: &[Entity]) -> CrossReferenceIndex {
    let mut builder = IndexBuilder::new();
    for (i, entity) in entities.iter().enumerate() {
        if entity.kind == EntityKind::TemplateParameter {
            continue;
        }
        builder.insert(&entity.qualified_name, EntityId(i));
    }
    builder.freeze()
}

/// Qualified name of the scope an entity's references are written in
fn enclosing_scope(entities: &[Entity], entity: &Entity) -> String {
    entity
        .parent
        .and_then(|p| entities.get(p.index()))
        .map(|p| p.qualified_name.clone())
        .unwrap_or_else(|| {
            // out-of-line definitions have no parent but a qualified name
            entity
                .qualified_name
                .rsplit_once("::")
                .map(|(scope, _)| scope.to_string())
                .unwrap_or_default()
        })
}

/// Strip a trailing template argument list: `Base<int>` => `Base`
fn template_base_name(name: &str) -> &str {
    if name.ends_with('>') {
        name.find('<').map_or(name, |open| &name[..open])
    } else {
        name
    }
}

fn first_record(entities: &[Entity], ids: &[EntityId]) -> Option<EntityId> {
    let records: Vec<EntityId> = ids
        .iter()
        .copied()
        .filter(|id| entities[id.index()].kind.is_record())
        .collect();
    records
        .iter()
        .copied()
        .find(|id| entities[id.index()].is_complete())
        .or_else(|| records.first().copied())
}

fn resolve_base_targets(entities: &mut [Entity], index: &CrossReferenceIndex) {
    for i in 0..entities.len() {
        let Some(record) = entities[i].record() else {
            continue;
        };
        if record.bases.is_empty() {
            continue;
        }

        let scope = enclosing_scope(entities, &entities[i]);
        let targets: Vec<Option<EntityId>> = record
            .bases
            .iter()
            .map(|base| {
                first_record(entities, index.resolve(&base.name, &scope)).or_else(|| {
                    first_record(
                        entities,
                        index.resolve(template_base_name(&base.name), &scope),
                    )
                })
            })
            .collect();

        if let Some(record) = entities[i].record_mut() {
            for (base, target) in record.bases.iter_mut().zip(targets) {
                base.target = target;
            }
        }
    }
}

/// Every direct and indirect base, depth first in declaration order.
///
/// A virtual base appears once however many paths lead to it; a non-virtual
/// base appears once per path.
pub fn flatten_bases(entities: &[Entity], id: EntityId) -> Vec<FlatBase> {
    let mut out = Vec::new();
    let mut virtual_seen = HashSet::new();
    let mut path = vec![id];
    walk_bases(entities, id, 1, &mut path, &mut virtual_seen, &mut out);
    out
}

fn walk_bases(
    entities: &[Entity],
    id: EntityId,
    depth: usize,
    path: &mut Vec<EntityId>,
    virtual_seen: &mut HashSet<String>,
    out: &mut Vec<FlatBase>,
) {
    let Some(record) = entities.get(id.index()).and_then(|e| e.record()) else {
        return;
    };

    for base in &record.bases {
        if base.is_virtual {
            let key = match base.target {
                Some(target) => format!("{}", target),
                None => base.name.clone(),
            };
            if !virtual_seen.insert(key) {
                continue;
            }
        }

        out.push(FlatBase {
            entity: base.target,
            name: base.name.clone(),
            is_virtual: base.is_virtual,
            access: base.access,
            depth,
        });

        if let Some(target) = base.target {
            if path.contains(&target) {
                log::warn!("Cyclic base list through {}", base.name);
                continue;
            }
            path.push(target);
            walk_bases(entities, target, depth + 1, path, virtual_seen, out);
            path.pop();
        }
    }
}

fn link_specializations(
    entities: &[Entity],
    index: &CrossReferenceIndex,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<SpecializationEdge> {
    let mut edges = Vec::new();

    for (i, entity) in entities.iter().enumerate() {
        let Some(spec) = entity
            .template
            .as_ref()
            .and_then(|t| t.specialization.as_ref())
        else {
            continue;
        };

        let scope = enclosing_scope(entities, entity);
        let candidates = index.resolve(&spec.primary_name, &scope);
        let primary = candidates.iter().copied().find(|id| {
            let candidate = &entities[id.index()];
            let same_family = candidate.kind.is_record() == entity.kind.is_record()
                && candidate.kind.is_callable() == entity.kind.is_callable();
            let arity_matches = match (candidate.function(), entity.function()) {
                (Some(a), Some(b)) => a.arity() == b.arity(),
                _ => true,
            };
            same_family
                && arity_matches
                && candidate.template.as_ref().is_some_and(|t| t.is_primary())
        });

        match primary {
            Some(primary) => edges.push(SpecializationEdge {
                specialization: EntityId(i),
                primary,
                arguments: spec.arguments.clone(),
                partial: spec.partial,
            }),
            None => {
                log::debug!(
                    "No primary template {} for {}",
                    spec.primary_name,
                    entity.qualified_name
                );
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::UnresolvedTemplate,
                        format!(
                            "primary template '{}' of '{}' was not found",
                            spec.primary_name,
                            entity.display_name()
                        ),
                    )
                    .at(entity.location.clone())
                    .for_entity(entity.qualified_name.clone()),
                );
            }
        }
    }
    edges
}

/// Callables sharing a qualified name in one scope, first-seen order
fn group_overloads(entities: &[Entity]) -> Vec<OverloadSet> {
    let mut sets: Vec<OverloadSet> = Vec::new();
    let mut positions: HashMap<(Option<EntityId>, &str), usize> = HashMap::new();

    for (i, entity) in entities.iter().enumerate() {
        if !entity.kind.is_callable() {
            continue;
        }
        let key = (entity.parent, entity.qualified_name.as_str());
        match positions.get(&key) {
            Some(&pos) => sets[pos].members.push(EntityId(i)),
            None => {
                positions.insert(key, sets.len());
                sets.push(OverloadSet {
                    qualified_name: entity.qualified_name.clone(),
                    scope: entity.parent,
                    members: vec![EntityId(i)],
                });
            }
        }
    }
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract_unit;
    use crate::ingestor::{SourceIngestor, TreeSitterIngestor};
    use crate::merger::Merger;
    use cppmodel_api::{ParserConfig, TranslationUnit};

    fn model(source: &str) -> CodeModel {
        let config = ParserConfig::default();
        let unit = TranslationUnit::in_memory("model.hpp", source);
        let parsed = TreeSitterIngestor::new().parse(&unit, &config).unwrap();
        let mut merger = Merger::new();
        merger.add_unit(extract_unit(&parsed, 0, &config));
        resolve(merger.finish())
    }

    fn id_of(model: &CodeModel, qualified: &str) -> EntityId {
        model.lookup_ids(qualified)[0]
    }

    #[test]
    fn test_virtual_diamond_is_flattened_once() {
        let model = model(
            "struct A {};\nstruct B : virtual A {};\nstruct C : virtual A {};\nstruct D : B, C {};\n",
        );
        let d = id_of(&model, "D");
        let bases = model.flattened_bases(d);
        let names: Vec<&str> = bases.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(bases.iter().filter(|b| b.name == "A").count(), 1);
        assert_eq!(bases[1].depth, 2);
        assert_eq!(bases[1].entity, Some(id_of(&model, "A")));
    }

    #[test]
    fn test_non_virtual_diamond_keeps_both_paths() {
        let model = model("struct A {};\nstruct B : A {};\nstruct C : A {};\nstruct D : B, C {};\n");
        let bases = model.flattened_bases(id_of(&model, "D"));
        assert_eq!(bases.iter().filter(|b| b.name == "A").count(), 2);
    }

    #[test]
    fn test_base_resolved_from_enclosing_scope() {
        let model = model(
            "namespace io {\nclass Stream {};\nclass File : public Stream {};\n}\nclass Unknown : public Missing {};\n",
        );
        let file = model.lookup_one("io::File").unwrap();
        let base = &file.record().unwrap().bases[0];
        assert_eq!(base.target, Some(id_of(&model, "io::Stream")));

        let unknown = model.lookup_one("Unknown").unwrap();
        assert_eq!(unknown.record().unwrap().bases[0].target, None);
        let flat = model.flattened_bases(id_of(&model, "Unknown"));
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].entity, None);
    }

    #[test]
    fn test_templated_base_resolves_to_primary() {
        let model = model("template <class T> struct Base {};\nstruct Derived : Base<int> {};\n");
        let derived = model.lookup_one("Derived").unwrap();
        assert_eq!(
            derived.record().unwrap().bases[0].target,
            Some(id_of(&model, "Base"))
        );
    }

    #[test]
    fn test_specializations_link_to_primary() {
        let model = model(
            "template <class T, class U> struct Pair {};\ntemplate <class T> struct Pair<T, T> {};\ntemplate <> struct Pair<int, char> {};\n",
        );
        let primary = id_of(&model, "Pair");
        let edges = model.specializations_of(primary);
        assert_eq!(edges.len(), 2);
        assert!(edges[0].partial);
        assert_eq!(edges[0].arguments, vec!["T", "T"]);
        assert!(!edges[1].partial);
        assert_eq!(edges[1].arguments, vec!["int", "char"]);
        assert_eq!(model.primary_of(edges[1].specialization), Some(primary));
    }

    #[test]
    fn test_unresolved_specialization_is_reported() {
        let model = model("template <> struct Orphan<int> {};\n");
        assert_eq!(
            model
                .diagnostics_of_kind(DiagnosticKind::UnresolvedTemplate)
                .count(),
            1
        );
    }

    #[test]
    fn test_overload_sets_keep_first_seen_order() {
        let model = model(
            "/// One.\ntemplate <class T> T pick(T a);\n\n/// Two.\ntemplate <class T> T pick(T a, T b);\nvoid other();\n",
        );
        let set = model.overload_set("pick").unwrap();
        assert_eq!(set.len(), 2);
        let first = model.entity(set.members[0]).unwrap();
        let second = model.entity(set.members[1]).unwrap();
        assert_eq!(first.function().unwrap().arity(), 1);
        assert_eq!(second.function().unwrap().arity(), 2);
        assert_eq!(first.doc.as_ref().unwrap().summary.as_deref(), Some("One."));
        assert_eq!(second.doc.as_ref().unwrap().summary.as_deref(), Some("Two."));
        assert_eq!(model.overload_set("other").unwrap().len(), 1);
    }

    #[test]
    fn test_comment_warnings_reach_model_diagnostics() {
        let model = model("/// @param nope Not here.\nvoid f(int x);\n");
        let warnings: Vec<_> = model
            .diagnostics_of_kind(DiagnosticKind::CommentWarning)
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.entity.as_deref() == Some("f")));
    }

    #[test]
    fn test_template_parameters_are_not_indexed() {
        let model = model("template <class T> struct Box { T value; };\n");
        assert!(model.lookup("Box::T").is_empty());
        assert_eq!(model.lookup("Box::value").len(), 1);
    }
}
