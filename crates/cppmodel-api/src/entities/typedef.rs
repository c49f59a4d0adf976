use serde::{Deserialize, Serialize};

/// Attributes of a `typedef` or alias declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedefDetails {
    /// Aliased type as written, normalized
    pub underlying_type: String,

    /// Declared with `using X = ...`
    pub is_alias: bool,
}

impl TypedefDetails {
    pub fn new(underlying_type: impl Into<String>) -> Self {
        Self {
            underlying_type: underlying_type.into(),
            is_alias: false,
        }
    }
}
