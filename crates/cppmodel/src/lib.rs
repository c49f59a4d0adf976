//! C++ semantic model extractor
//!
//! This crate parses C++ translation units with tree-sitter and builds one
//! merged, documentation-oriented model of their declarations: namespaces,
//! records, enums, functions, templates and their doc comments, with
//! redeclarations across units folded together.
//!
//! # Example
//!
//! ```rust
//! use cppmodel::CppModelExtractor;
//! use cppmodel_api::{EntityKind, ModelExtractor};
//! use std::path::Path;
//!
//! let extractor = CppModelExtractor::new();
//!
//! let source = r#"
//!     namespace shapes {
//!     /// A closed figure
//!     class Shape {
//!     public:
//!         virtual double area() const = 0;
//!     };
//!     }
//! "#;
//!
//! let extraction = extractor.extract_source(source, Path::new("shapes.h")).unwrap();
//! let shape = extraction.model.lookup_one("shapes::Shape").unwrap();
//! assert_eq!(shape.kind, EntityKind::Class);
//! println!("Found {} entities", extraction.model.len());
//! ```

pub mod comments;
mod extractor;
pub mod ingestor;
pub mod merger;
mod parser_impl;
pub mod resolver;
mod visitor;

pub use extractor::extract_unit;
pub use ingestor::{ParsedUnit, SourceIngestor, TreeSitterIngestor};
pub use merger::{MergeStats, MergedEntities, Merger};
pub use parser_impl::CppModelExtractor;
pub use visitor::ANONYMOUS;
