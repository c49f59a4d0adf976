//! cppmodel API
//!
//! Shared types for extracting a documentation-oriented semantic model from
//! C++ sources.
//!
//! This crate is what a renderer depends on. It defines:
//!
//! - **Entity model**: namespaces, records, functions, fields, enums, typedefs
//!   and templates with their structural attributes
//! - **Documentation model**: recognized tags and opaque text attached to entities
//! - **CodeModel**: the merged, frozen result of a run, with a read-only
//!   [`CrossReferenceIndex`] for qualified-name lookup
//! - **ModelExtractor trait**: the interface an extractor implements
//! - **Configuration, diagnostics, metrics and errors**
//!
//! # Example
//!
//! ```rust,ignore
//! use cppmodel_api::{ModelExtractor, ParserConfig};
//! use cppmodel::CppModelExtractor;
//! use std::path::Path;
//!
//! let extractor = CppModelExtractor::with_config(ParserConfig::default());
//! let extraction = extractor.extract_directory(Path::new("include"))?;
//!
//! for entity in extraction.model.lookup("geo::Shape") {
//!     println!("{} {}", entity.kind, entity.qualified_name);
//! }
//! for diagnostic in extraction.model.diagnostics() {
//!     eprintln!("{}", diagnostic);
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod docs;
pub mod entities;
pub mod errors;
pub mod index;
pub mod ir;
pub mod metrics;
pub mod model;
pub mod traits;

// Re-export commonly used types
pub use config::{
    CompileFlags, CompilerConfig, IncludePolicy, LanguageStandard, ParserConfig, TranslationUnit,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use docs::{DocBlock, DocContent, DocTag, ParamDirection, ParamDoc, TemplateParamDoc};
pub use entities::{
    Access, Attribute, BaseSpecifier, Completeness, Entity, EntityDetails, EntityId, EntityKind,
    FieldDetails, FunctionDetails, FunctionRole, Linkage, MethodFlags, Parameter, RecordDetails,
    RecordTag, RefQualifier, SourceLocation, TemplateInfo, TemplateParameter,
    TemplateParameterKind,
};
pub use errors::{ExtractError, ParserError, ParserResult};
pub use index::{CrossReferenceIndex, IndexBuilder};
pub use ir::{IncludeDirective, UnitIR};
pub use metrics::ParserMetrics;
pub use model::{CodeModel, FlatBase, ModelParts, OverloadSet, SpecializationEdge};
pub use traits::{Extraction, ModelExtractor, UnitSummary};
