//! Integration tests for the C++ model extractor

use cppmodel::CppModelExtractor;
use cppmodel_api::{
    Completeness, DiagnosticKind, DocContent, DocTag, EntityKind, IncludePolicy, Linkage,
    ModelExtractor, ParamDirection, ParserConfig, TranslationUnit,
};
use std::fs;
use std::path::Path;

const HIERARCHY_HPP: &str = include_str!("fixtures/hierarchy.hpp");
const FORWARD_HPP: &str = include_str!("fixtures/forward.hpp");
const HANDLE_CPP: &str = include_str!("fixtures/handle.cpp");
const LINKAGE_H: &str = include_str!("fixtures/linkage.h");
const TEMPLATES_HPP: &str = include_str!("fixtures/templates.hpp");
const DOCUMENTED_HPP: &str = include_str!("fixtures/documented.hpp");

fn fixture_units() -> Vec<TranslationUnit> {
    vec![
        TranslationUnit::in_memory("hierarchy.hpp", HIERARCHY_HPP),
        TranslationUnit::in_memory("forward.hpp", FORWARD_HPP),
        TranslationUnit::in_memory("handle.cpp", HANDLE_CPP),
        TranslationUnit::in_memory("linkage.h", LINKAGE_H),
        TranslationUnit::in_memory("templates.hpp", TEMPLATES_HPP),
        TranslationUnit::in_memory("documented.hpp", DOCUMENTED_HPP),
    ]
}

#[test]
fn test_extract_all_fixtures() {
    let extractor = CppModelExtractor::new();
    let result = extractor.extract_units(&fixture_units());
    assert!(result.is_ok(), "Failed to extract fixtures: {:?}", result.err());

    let extraction = result.unwrap();
    assert_eq!(extraction.units.len(), 6);
    assert!(extraction.failed_units.is_empty());
    assert!(extraction.model.conflicts().is_empty());
    assert_eq!(extraction.metrics.units_succeeded, 6);
    assert!(extraction.metrics.total_entities > extraction.metrics.merged_entities);
}

#[test]
fn test_virtual_diamond_flattens_base_once() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(HIERARCHY_HPP, Path::new("hierarchy.hpp"))
        .unwrap();
    let model = &extraction.model;

    let bat_id = model.lookup_ids("zoo::Bat")[0];
    let bat = model.entity(bat_id).unwrap();
    assert!(bat.record().unwrap().is_final);

    let bases = model.flattened_bases(bat_id);
    let names: Vec<&str> = bases.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["Mammal", "Animal", "WingedAnimal"]);
    assert_eq!(bases.iter().filter(|b| b.name == "Animal").count(), 1);
    assert!(bases[1].is_virtual);
    assert_eq!(bases[1].entity, Some(model.lookup_ids("zoo::Animal")[0]));

    let animal = model.lookup_one("zoo::Animal").unwrap();
    assert!(animal.record().unwrap().is_abstract);
    assert!(!bat.record().unwrap().is_abstract);

    let name = model.lookup_one("zoo::Bat::name").unwrap();
    assert!(name.function().unwrap().flags.is_override);
}

#[test]
fn test_forward_declarations_across_units() {
    let extractor = CppModelExtractor::new();
    let units = vec![
        TranslationUnit::in_memory("forward.hpp", FORWARD_HPP),
        TranslationUnit::in_memory("handle.cpp", HANDLE_CPP),
    ];
    let extraction = extractor.extract_units(&units).unwrap();
    let model = &extraction.model;

    let handle_ids = model.lookup_ids("io::Handle");
    assert_eq!(handle_ids.len(), 1);
    let handle = model.entity(handle_ids[0]).unwrap();
    assert_eq!(handle.completeness, Completeness::Complete);
    assert_eq!(handle.location.file, Path::new("forward.hpp"));
    assert_eq!(
        handle.definition_location.as_ref().unwrap().file,
        Path::new("handle.cpp")
    );
    assert_eq!(
        handle.doc.as_ref().unwrap().summary.as_deref(),
        Some("Owns one file descriptor.")
    );
    assert!(model.lookup_one("io::Handle::fd_").is_some());

    let opaque = model.lookup_one("io::Opaque").unwrap();
    assert_eq!(opaque.completeness, Completeness::Incomplete);
    assert!(opaque.children.is_empty());
}

#[test]
fn test_out_of_line_definitions_merge() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(HANDLE_CPP, Path::new("handle.cpp"))
        .unwrap();
    let model = &extraction.model;

    let fds = model.lookup("io::Handle::fd");
    assert_eq!(fds.len(), 1);
    let fd = fds[0];
    assert_eq!(fd.kind, EntityKind::Method);
    assert!(fd.function().unwrap().is_definition);
    assert!(fd.definition_location.is_some());
    assert!(fd.doc.is_none());

    let ctors = model.lookup("io::Handle::Handle");
    assert_eq!(ctors.len(), 1);
    assert!(ctors[0].function().unwrap().flags.is_explicit);
    assert!(ctors[0].function().unwrap().is_definition);
}

#[test]
fn test_linkage_blocks() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(LINKAGE_H, Path::new("linkage.h"))
        .unwrap();
    let model = &extraction.model;

    assert_eq!(model.lookup_one("capi::device_open").unwrap().linkage, Linkage::C);
    assert_eq!(model.lookup_one("device_errno").unwrap().linkage, Linkage::C);
    assert_eq!(model.lookup_one("device_flags").unwrap().linkage, Linkage::C);
    assert_eq!(model.lookup_one("device_reset").unwrap().linkage, Linkage::C);
    assert_eq!(model.lookup_one("cpp_only").unwrap().linkage, Linkage::Default);

    let reset = model.lookup_one("device_reset").unwrap();
    assert!(reset.function().unwrap().parameters.is_empty());
}

#[test]
fn test_bitfields_in_typedef_struct() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(LINKAGE_H, Path::new("linkage.h"))
        .unwrap();
    let model = &extraction.model;

    let flags = model.lookup_one("device_flags").unwrap();
    assert_eq!(flags.kind, EntityKind::Struct);
    assert_eq!(flags.children.len(), 3);
    assert_eq!(model.lookup_one("device_flags::mode").unwrap().bit_width(), Some(2));
    assert_eq!(model.lookup_one("device_flags::level").unwrap().bit_width(), Some(6));
    assert_eq!(model.lookup_one("device_flags::count").unwrap().bit_width(), None);
}

#[test]
fn test_templates_and_specializations() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(TEMPLATES_HPP, Path::new("templates.hpp"))
        .unwrap();
    let model = &extraction.model;

    let primary_id = model.lookup_ids("tpl::Buffer")[0];
    let primary = model.entity(primary_id).unwrap();
    assert!(primary.is_template());
    let doc = primary.doc.as_ref().unwrap();
    assert_eq!(doc.template_param("N").unwrap().text, "Capacity.");

    let edges = model.specializations_of(primary_id);
    assert_eq!(edges.len(), 2);
    assert!(edges[0].partial);
    assert_eq!(edges[0].arguments, vec!["T*", "N"]);
    assert!(!edges[1].partial);
    assert_eq!(edges[1].arguments, vec!["bool", "8"]);
    assert_eq!(model.primary_of(edges[1].specialization), Some(primary_id));

    let derived = model.lookup_one("tpl::Derived").unwrap();
    assert_eq!(
        derived.record().unwrap().bases[0].target,
        Some(model.lookup_ids("tpl::Base")[0])
    );
    assert_eq!(
        model
            .diagnostics_of_kind(DiagnosticKind::UnresolvedTemplate)
            .count(),
        0
    );
}

#[test]
fn test_overloaded_templates_keep_independent_docs() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(TEMPLATES_HPP, Path::new("templates.hpp"))
        .unwrap();
    let model = &extraction.model;

    let set = model.overload_set("tpl::largest").unwrap();
    assert_eq!(set.len(), 2);

    let two = model.entity(set.members[0]).unwrap();
    let three = model.entity(set.members[1]).unwrap();
    assert_eq!(two.function().unwrap().arity(), 2);
    assert_eq!(three.function().unwrap().arity(), 3);

    let doc = two.doc.as_ref().unwrap();
    assert_eq!(doc.summary.as_deref(), Some("Largest of two values."));
    assert_eq!(doc.returns.as_deref(), Some("The larger one."));
    assert!(three.doc.is_none());
}

#[test]
fn test_parameter_directions() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(DOCUMENTED_HPP, Path::new("documented.hpp"))
        .unwrap();
    let model = &extraction.model;

    let copy = model.lookup_one("bytes::copy_bytes").unwrap();
    let doc = copy.doc.as_ref().unwrap();
    assert_eq!(
        doc.summary.as_deref(),
        Some("Copies bytes from a cursor into a buffer.")
    );
    assert_eq!(doc.param("cursor").unwrap().direction, ParamDirection::InOut);
    assert_eq!(doc.param("dest").unwrap().direction, ParamDirection::Out);
    let count = doc.param("count").unwrap();
    assert_eq!(count.direction, ParamDirection::In);
    assert!(!count.documented);
    assert_eq!(doc.returns.as_deref(), Some("Number of bytes copied."));
    assert!(doc
        .content
        .iter()
        .any(|c| matches!(c, DocContent::Recognized { tag: DocTag::Returns, .. })));
    assert!(doc
        .content
        .iter()
        .any(|c| matches!(c, DocContent::Opaque(text) if text.contains("advanced past"))));
}

#[test]
fn test_comment_warnings_are_collected() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(DOCUMENTED_HPP, Path::new("documented.hpp"))
        .unwrap();
    let model = &extraction.model;

    let record = model.lookup_one("bytes::record_copy").unwrap();
    assert_eq!(record.diagnostics.len(), 2);

    let warnings: Vec<_> = model
        .diagnostics_of_kind(DiagnosticKind::CommentWarning)
        .collect();
    assert_eq!(warnings.len(), 3);
    assert_eq!(extraction.metrics.comment_warnings, 3);
    assert!(extraction.failed_units.is_empty());
}

#[test]
fn test_enum_member_docs() {
    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_source(DOCUMENTED_HPP, Path::new("documented.hpp"))
        .unwrap();
    let model = &extraction.model;

    let status = model.lookup_one("bytes::Status").unwrap();
    assert!(status.enumeration().unwrap().scoped);
    assert_eq!(status.children.len(), 3);

    let partial = model.lookup_one("bytes::Status::Partial").unwrap();
    assert_eq!(
        partial.doc.as_ref().unwrap().summary.as_deref(),
        Some("Some bytes were left.")
    );
    let failed = model.lookup_one("bytes::Status::Failed").unwrap();
    assert_eq!(failed.enum_constant().unwrap().value.as_deref(), Some("0x10"));
}

#[test]
fn test_determinism() {
    let units = fixture_units();
    let first = CppModelExtractor::new().extract_units(&units).unwrap();
    let second = CppModelExtractor::with_config(ParserConfig::default().with_parallel(false))
        .extract_units(&units)
        .unwrap();

    let a = serde_json::to_string(&first.model).unwrap();
    let b = serde_json::to_string(&second.model).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_model_round_trips_through_json() {
    let extraction = CppModelExtractor::new()
        .extract_units(&fixture_units())
        .unwrap();
    let json = serde_json::to_string(&extraction.model).unwrap();
    let restored: cppmodel_api::CodeModel = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, extraction.model);
}

#[test]
fn test_follow_local_includes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("forward.hpp"), FORWARD_HPP).unwrap();
    fs::write(dir.path().join("handle.cpp"), HANDLE_CPP).unwrap();

    let config = ParserConfig::default().with_follow_includes(IncludePolicy::Local);
    let extractor = CppModelExtractor::with_config(config);
    let extraction = extractor
        .extract_files(&[dir.path().join("handle.cpp")])
        .unwrap();

    assert_eq!(extraction.units.len(), 2);
    assert!(!extraction.units[0].included);
    assert!(extraction.units[1].included);
    assert_eq!(extraction.units[1].unit_index, 1);
    assert!(extraction.units[1].file_path.ends_with("forward.hpp"));

    let model = &extraction.model;
    assert!(model.lookup_one("io::open_handle").is_some());
    assert_eq!(model.lookup("io::Handle").len(), 1);
}

#[test]
fn test_includes_not_followed_by_default() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("forward.hpp"), FORWARD_HPP).unwrap();
    fs::write(dir.path().join("handle.cpp"), HANDLE_CPP).unwrap();

    let extractor = CppModelExtractor::new();
    let extraction = extractor
        .extract_files(&[dir.path().join("handle.cpp")])
        .unwrap();

    assert_eq!(extraction.units.len(), 1);
    assert!(extraction.model.lookup_one("io::open_handle").is_none());
}

#[test]
fn test_header_is_ingested_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("common.h"), "struct Common { int id; };\n").unwrap();
    fs::write(dir.path().join("a.cpp"), "#include \"common.h\"\nvoid a(Common* c);\n").unwrap();
    fs::write(dir.path().join("b.cpp"), "#include \"common.h\"\nvoid b(Common* c);\n").unwrap();

    let config = ParserConfig::default().with_follow_includes(IncludePolicy::Local);
    let extractor = CppModelExtractor::with_config(config);
    let extraction = extractor
        .extract_files(&[dir.path().join("a.cpp"), dir.path().join("b.cpp")])
        .unwrap();

    assert_eq!(extraction.units.len(), 3);
    assert_eq!(
        extraction.units.iter().filter(|u| u.included).count(),
        1
    );
    assert_eq!(extraction.model.lookup("Common").len(), 1);
}

#[test]
fn test_extract_directory() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("src");
    fs::create_dir(&sub).unwrap();
    fs::write(dir.path().join("hierarchy.hpp"), HIERARCHY_HPP).unwrap();
    fs::write(sub.join("templates.hpp"), TEMPLATES_HPP).unwrap();
    fs::write(sub.join("notes.txt"), "not c++").unwrap();

    let extractor = CppModelExtractor::new();
    let files = extractor.discover_files(dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let extraction = extractor.extract_directory(dir.path()).unwrap();
    assert_eq!(extraction.units.len(), 2);
    assert!(extraction.model.lookup_one("zoo::Bat").is_some());
    assert!(extraction.model.lookup_one("tpl::Buffer").is_some());
}

#[test]
fn test_conflicting_redeclarations_are_flagged() {
    let units = vec![
        TranslationUnit::in_memory("one.h", "struct Point { int x; int y; };\n"),
        TranslationUnit::in_memory("two.h", "struct Point { double x; };\n"),
    ];
    let extraction = CppModelExtractor::new().extract_units(&units).unwrap();
    let model = &extraction.model;

    assert_eq!(model.lookup("Point").len(), 2);
    assert_eq!(model.conflicts().len(), 2);
    assert_eq!(
        model.diagnostics_of_kind(DiagnosticKind::MergeConflict).count(),
        1
    );
    assert_eq!(extraction.metrics.merge_conflicts, 1);
}

#[test]
fn test_scope_resolution_for_cross_references() {
    let extraction = CppModelExtractor::new()
        .extract_units(&fixture_units())
        .unwrap();
    let model = &extraction.model;

    let found = model.resolve("Animal", "zoo::Bat");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].qualified_name, "zoo::Animal");

    let found = model.resolve("Handle::fd", "io");
    assert_eq!(found.len(), 1);
    assert!(model.resolve("::Animal", "zoo").is_empty());
}
