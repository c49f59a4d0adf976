use super::{Access, EntityId, EntityKind};
use serde::{Deserialize, Serialize};

/// Class-key of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordTag {
    Class,
    Struct,
    Union,
}

impl RecordTag {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "class" => Some(RecordTag::Class),
            "struct" => Some(RecordTag::Struct),
            "union" => Some(RecordTag::Union),
            _ => None,
        }
    }

    /// Access applied to members and bases before any explicit specifier
    pub fn default_access(&self) -> Access {
        match self {
            RecordTag::Class => Access::Private,
            RecordTag::Struct | RecordTag::Union => Access::Public,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            RecordTag::Class => EntityKind::Class,
            RecordTag::Struct => EntityKind::Struct,
            RecordTag::Union => EntityKind::Union,
        }
    }
}

/// One base-class edge, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseSpecifier {
    /// Base name as written (`ns::Base<int>`)
    pub name: String,

    pub access: Access,

    pub is_virtual: bool,

    /// Resolved base entity, filled in after merge
    pub target: Option<EntityId>,
}

impl BaseSpecifier {
    pub fn new(name: impl Into<String>, access: Access) -> Self {
        Self {
            name: name.into(),
            access,
            is_virtual: false,
            target: None,
        }
    }

    pub fn virtual_base(mut self) -> Self {
        self.is_virtual = true;
        self
    }
}

/// Attributes of a class, struct or union
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordDetails {
    pub tag: RecordTag,

    pub bases: Vec<BaseSpecifier>,

    /// Declares at least one pure virtual method
    pub is_abstract: bool,

    /// Marked `final`
    pub is_final: bool,
}

impl RecordDetails {
    pub fn new(tag: RecordTag) -> Self {
        Self {
            tag,
            bases: Vec::new(),
            is_abstract: false,
            is_final: false,
        }
    }

    pub fn with_bases(mut self, bases: Vec<BaseSpecifier>) -> Self {
        self.bases = bases;
        self
    }

    /// Base list as compared between redeclarations (targets are ignored)
    pub fn base_signature(&self) -> Vec<(String, Access, bool)> {
        self.bases
            .iter()
            .map(|b| (b.name.clone(), b.access, b.is_virtual))
            .collect()
    }
}
