//! Per-unit extraction: syntax tree to [`UnitIR`]

use cppmodel_api::{ParserConfig, UnitIR};

use crate::ingestor::ParsedUnit;
use crate::visitor::CppVisitor;

/// Build the entity list of one parsed unit.
///
/// Runs on a worker thread; the result is immutable once returned and shares
/// nothing with other units.
pub fn extract_unit(parsed: &ParsedUnit, unit_index: usize, config: &ParserConfig) -> UnitIR {
    let root = parsed.root();
    let mut visitor = CppVisitor::new(
        unit_index,
        &parsed.path,
        &parsed.source,
        root,
        &parsed.compiler,
        config,
    );
    visitor.visit(root);

    let mut ir = visitor.into_ir();
    if !parsed.diagnostics.is_empty() {
        let mut diagnostics = parsed.diagnostics.clone();
        diagnostics.append(&mut ir.diagnostics);
        ir.diagnostics = diagnostics;
    }

    log::debug!(
        "Built {} entities from {} ({} includes)",
        ir.entity_count(),
        parsed.path.display(),
        ir.includes.len()
    );
    ir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestor::{SourceIngestor, TreeSitterIngestor};
    use cppmodel_api::{DiagnosticKind, EntityKind, TranslationUnit};

    fn extract(source: &str, config: &ParserConfig) -> UnitIR {
        let unit = TranslationUnit::in_memory("unit.cpp", source);
        let parsed = TreeSitterIngestor::new().parse(&unit, config).unwrap();
        extract_unit(&parsed, 3, config)
    }

    #[test]
    fn test_extract_simple_class() {
        let source = r#"
class HelloWorld {
public:
    void greet() {
        // Hello
    }
};
"#;
        let ir = extract(source, &ParserConfig::default());

        assert_eq!(ir.unit_index, 3);
        assert_eq!(ir.roots.len(), 1);
        let class = ir.find("HelloWorld").next().unwrap();
        assert_eq!(class.kind, EntityKind::Class);
        let greet = ir.find("HelloWorld::greet").next().unwrap();
        assert!(greet.function().unwrap().is_definition);
        assert_eq!(ir.line_count, 7);
        assert_eq!(ir.byte_count, source.len());
    }

    #[test]
    fn test_recovered_syntax_errors_come_first() {
        let source = "struct Ok { int a; };\nstruct Broken { int b };\n";
        let config = ParserConfig::default().with_tolerant(true);
        let ir = extract(source, &config);

        assert!(!ir.diagnostics.is_empty());
        assert_eq!(ir.diagnostics[0].kind, DiagnosticKind::Syntax);
        assert!(ir.find("Ok").next().is_some());
    }

    #[test]
    fn test_source_order_is_preserved() {
        let source = "void c();\nvoid a();\nvoid b();\n";
        let ir = extract(source, &ParserConfig::default());
        let names: Vec<&str> = ir.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
