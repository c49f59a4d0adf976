use serde::{Deserialize, Serialize};

/// Attributes of an enumeration. Constants are the entity's children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EnumDetails {
    /// `enum class` / `enum struct`
    pub scoped: bool,

    /// Explicit underlying type (`enum E : uint8_t`)
    pub underlying_type: Option<String>,
}

/// Attributes of one enumerator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EnumConstantDetails {
    /// Explicit value expression as written, if any
    pub value: Option<String>,
}
