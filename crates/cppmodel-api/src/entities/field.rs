use serde::{Deserialize, Serialize};

/// Attributes of a non-static or static data member
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDetails {
    /// Normalized type spelling
    pub type_name: String,

    /// Width of a bit-field; `None` for ordinary members
    pub bit_width: Option<u32>,

    pub is_const: bool,

    pub is_mutable: bool,

    pub is_static: bool,

    /// Default member initializer as written
    pub default_value: Option<String>,
}

impl FieldDetails {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            bit_width: None,
            is_const: false,
            is_mutable: false,
            is_static: false,
            default_value: None,
        }
    }

    pub fn with_bit_width(mut self, width: u32) -> Self {
        self.bit_width = Some(width);
        self
    }

    pub fn is_bit_field(&self) -> bool {
        self.bit_width.is_some()
    }
}

/// Attributes of a namespace-scope variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableDetails {
    pub type_name: String,

    pub is_const: bool,

    pub is_constexpr: bool,

    pub is_static: bool,

    pub is_extern: bool,

    pub initializer: Option<String>,
}

impl VariableDetails {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            is_const: false,
            is_constexpr: false,
            is_static: false,
            is_extern: false,
            initializer: None,
        }
    }
}

/// Width in bits of a builtin integral type, if the spelling names one.
///
/// Widths follow the LP64 data model. Unknown spellings (typedefs, enums,
/// class types) return `None`.
pub fn builtin_bit_width(type_name: &str) -> Option<u32> {
    let words: Vec<&str> = type_name
        .split_whitespace()
        .filter(|w| !matches!(*w, "const" | "volatile" | "signed" | "unsigned"))
        .collect();

    match words.as_slice() {
        ["bool"] => Some(1),
        ["char"] | ["char8_t"] | ["int8_t"] | ["uint8_t"] | ["std::int8_t"] | ["std::uint8_t"] => {
            Some(8)
        }
        ["short"] | ["short", "int"] | ["char16_t"] | ["int16_t"] | ["uint16_t"] => Some(16),
        [] | ["int"] | ["char32_t"] | ["wchar_t"] | ["int32_t"] | ["uint32_t"] => {
            // bare `unsigned` / `signed` leaves no words
            Some(32)
        }
        ["long"] | ["long", "int"] | ["long", "long"] | ["long", "long", "int"] => Some(64),
        ["int64_t"] | ["uint64_t"] | ["size_t"] | ["std::size_t"] => Some(64),
        _ => None,
    }
}
