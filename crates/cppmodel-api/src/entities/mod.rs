//! Entity model shared by the extractor and downstream renderers.
//!
//! Every declaration observed in a translation unit becomes one [`Entity`].
//! Structural attributes common to all declarations live on `Entity` itself;
//! kind-specific attributes live in [`EntityDetails`].

pub mod enum_;
pub mod field;
pub mod function;
pub mod record;
pub mod template;
pub mod typedef;

pub use enum_::{EnumConstantDetails, EnumDetails};
pub use field::{builtin_bit_width, FieldDetails, VariableDetails};
pub use function::{
    normalize_type, FunctionDetails, FunctionRole, MethodFlags, Parameter, RefQualifier,
};
pub use record::{BaseSpecifier, RecordDetails, RecordTag};
pub use template::{
    split_template_arguments, SpecializationInfo, TemplateInfo, TemplateParameter,
    TemplateParameterKind,
};
pub use typedef::TypedefDetails;

use crate::diagnostics::Diagnostic;
use crate::docs::DocBlock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Arena index of an entity.
///
/// IDs inside a [`UnitIR`](crate::ir::UnitIR) are local to that unit; IDs
/// inside a [`CodeModel`](crate::model::CodeModel) are global to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Namespace,
    Class,
    Struct,
    Union,
    Function,
    Method,
    Field,
    Variable,
    Enum,
    EnumConstant,
    Typedef,
    TemplateParameter,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Namespace => "namespace",
            EntityKind::Class => "class",
            EntityKind::Struct => "struct",
            EntityKind::Union => "union",
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Field => "field",
            EntityKind::Variable => "variable",
            EntityKind::Enum => "enum",
            EntityKind::EnumConstant => "enum_constant",
            EntityKind::Typedef => "typedef",
            EntityKind::TemplateParameter => "template_parameter",
        }
    }

    /// Class, struct or union
    pub fn is_record(&self) -> bool {
        matches!(self, EntityKind::Class | EntityKind::Struct | EntityKind::Union)
    }

    /// Declarations that introduce a type name with a possible body
    pub fn is_type(&self) -> bool {
        self.is_record() || matches!(self, EntityKind::Enum)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, EntityKind::Function | EntityKind::Method)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Member access. Namespace-scope declarations carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Access {
    Public,
    Protected,
    Private,
    #[default]
    None,
}

impl Access {
    /// Parse an access keyword, tolerating a trailing `:`.
    pub fn from_keyword(text: &str) -> Option<Self> {
        match text.trim().trim_end_matches(':').trim() {
            "public" => Some(Access::Public),
            "protected" => Some(Access::Protected),
            "private" => Some(Access::Private),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
            Access::None => "none",
        }
    }
}

/// Language linkage established by `extern "..."` blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Linkage {
    #[default]
    Default,
    C,
}

impl Linkage {
    /// Interpret the string literal of a linkage specification, quotes included or not.
    pub fn from_literal(literal: &str) -> Self {
        match literal.trim().trim_matches('"') {
            "C" => Linkage::C,
            _ => Linkage::Default,
        }
    }
}

/// Whether a body (definition) has been observed for the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Completeness {
    Incomplete,
    Complete,
}

/// Position of a declaration. Lines and columns are 1-based; `offset` is a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize, offset: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Opaque source attribute, e.g. `deprecated` => `"use bar"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Kind-specific attributes of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityDetails {
    Namespace { anonymous: bool, inline: bool },
    Record(RecordDetails),
    Function(FunctionDetails),
    Field(FieldDetails),
    Variable(VariableDetails),
    Enum(EnumDetails),
    EnumConstant(EnumConstantDetails),
    Typedef(TypedefDetails),
    TemplateParameter(TemplateParameter),
}

/// One declaration in the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unqualified spelling
    pub name: String,

    /// Fully qualified name (`ns::Class::member`)
    pub qualified_name: String,

    pub kind: EntityKind,

    pub details: EntityDetails,

    /// Location of the first encountered declaration
    pub location: SourceLocation,

    /// Location of the defining occurrence, once one has been seen
    pub definition_location: Option<SourceLocation>,

    /// Locations of every other occurrence merged into this entity
    pub redeclarations: Vec<SourceLocation>,

    pub access: Access,

    pub linkage: Linkage,

    /// `static` at namespace scope or member of an anonymous namespace
    pub internal_linkage: bool,

    pub completeness: Completeness,

    pub doc: Option<DocBlock>,

    pub attributes: Vec<Attribute>,

    /// Present for templates and template specializations
    pub template: Option<TemplateInfo>,

    pub parent: Option<EntityId>,

    pub children: Vec<EntityId>,

    /// Non-fatal findings about this entity (comment warnings and the like)
    pub diagnostics: Vec<Diagnostic>,

    /// Set when an incompatible redeclaration of the same identity was seen
    pub conflicting: bool,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        kind: EntityKind,
        details: EntityDetails,
        location: SourceLocation,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            details,
            location,
            definition_location: None,
            redeclarations: Vec::new(),
            access: Access::None,
            linkage: Linkage::Default,
            internal_linkage: false,
            completeness: Completeness::Complete,
            doc: None,
            attributes: Vec::new(),
            template: None,
            parent: None,
            children: Vec::new(),
            diagnostics: Vec::new(),
            conflicting: false,
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn with_completeness(mut self, completeness: Completeness) -> Self {
        self.completeness = completeness;
        self
    }

    pub fn with_doc(mut self, doc: DocBlock) -> Self {
        self.doc = Some(doc);
        self
    }

    pub fn with_attributes(mut self, attrs: Vec<Attribute>) -> Self {
        self.attributes = attrs;
        self
    }

    pub fn with_template(mut self, template: TemplateInfo) -> Self {
        self.template = Some(template);
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal_linkage = true;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.completeness == Completeness::Complete
    }

    pub fn is_template(&self) -> bool {
        self.template
            .as_ref()
            .is_some_and(|t| t.specialization.is_none())
    }

    pub fn is_specialization(&self) -> bool {
        self.template
            .as_ref()
            .is_some_and(|t| t.specialization.is_some())
    }

    pub fn record(&self) -> Option<&RecordDetails> {
        match &self.details {
            EntityDetails::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut RecordDetails> {
        match &mut self.details {
            EntityDetails::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn function(&self) -> Option<&FunctionDetails> {
        match &self.details {
            EntityDetails::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn function_mut(&mut self) -> Option<&mut FunctionDetails> {
        match &mut self.details {
            EntityDetails::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&FieldDetails> {
        match &self.details {
            EntityDetails::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn variable(&self) -> Option<&VariableDetails> {
        match &self.details {
            EntityDetails::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn enumeration(&self) -> Option<&EnumDetails> {
        match &self.details {
            EntityDetails::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn enum_constant(&self) -> Option<&EnumConstantDetails> {
        match &self.details {
            EntityDetails::EnumConstant(c) => Some(c),
            _ => None,
        }
    }

    pub fn typedef(&self) -> Option<&TypedefDetails> {
        match &self.details {
            EntityDetails::Typedef(t) => Some(t),
            _ => None,
        }
    }

    pub fn template_parameter(&self) -> Option<&TemplateParameter> {
        match &self.details {
            EntityDetails::TemplateParameter(p) => Some(p),
            _ => None,
        }
    }

    /// Bit width of a bit-field member; `None` for every other entity
    pub fn bit_width(&self) -> Option<u32> {
        self.field().and_then(|f| f.bit_width)
    }

    /// Qualified name plus, for callables, the full signature.
    ///
    /// Two declarations of the same logical entity share this key. Parameter
    /// names and default arguments do not participate. Function templates
    /// are prefixed with their parameter count and explicit specializations
    /// carry their argument list.
    pub fn signature_key(&self) -> String {
        match &self.details {
            EntityDetails::Function(func) => {
                let (arity, arguments) = match &self.template {
                    Some(TemplateInfo {
                        specialization: Some(spec),
                        ..
                    }) => (String::new(), format!("<{}>", spec.arguments.join(","))),
                    Some(t) => (format!("template<{}>", t.parameters.len()), String::new()),
                    None => (String::new(), String::new()),
                };
                format!(
                    "{}{}{}{}",
                    arity,
                    self.qualified_name,
                    arguments,
                    func.signature()
                )
            }
            _ => self.qualified_name.clone(),
        }
    }

    /// Human-readable name in the style of a declaration's display name,
    /// e.g. `create(int,double) const`.
    pub fn display_name(&self) -> String {
        match &self.details {
            EntityDetails::Function(func) => format!("{}{}", self.name, func.signature()),
            _ => self.name.clone(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}
