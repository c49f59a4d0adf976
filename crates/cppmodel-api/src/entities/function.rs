use serde::{Deserialize, Serialize};

/// Represents a function parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name (empty for unnamed parameters)
    pub name: String,

    /// Normalized type spelling, without the parameter name
    pub type_name: String,

    /// Default argument as written
    pub default_value: Option<String>,

    /// Is this a parameter pack? (`Ts... args`)
    pub is_pack: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: normalize_type(&type_name.into()),
            default_value: None,
            is_pack: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    pub fn pack(mut self) -> Self {
        self.is_pack = true;
        self
    }
}

/// Method ref-qualifier (`&` / `&&` after the parameter list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RefQualifier {
    #[default]
    None,
    LValue,
    RValue,
}

impl RefQualifier {
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "&" => RefQualifier::LValue,
            "&&" => RefQualifier::RValue,
            _ => RefQualifier::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefQualifier::None => "",
            RefQualifier::LValue => "&",
            RefQualifier::RValue => "&&",
        }
    }
}

/// Stored method flags. These are recorded as written and never resolved
/// into dispatch behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MethodFlags {
    pub is_virtual: bool,
    pub is_pure: bool,
    pub is_override: bool,
    pub is_final: bool,
    pub is_explicit: bool,
    pub is_defaulted: bool,
    pub is_deleted: bool,
}

/// Special role of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FunctionRole {
    #[default]
    Ordinary,
    Constructor,
    Destructor,
    Operator,
    Conversion,
}

/// Attributes of a function or method
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionDetails {
    /// Return type as written (`None` for constructors, destructors and `void`)
    pub return_type: Option<String>,

    pub parameters: Vec<Parameter>,

    /// `const` member function
    pub is_const: bool,

    pub ref_qualifier: RefQualifier,

    /// C-style ellipsis parameter
    pub is_variadic: bool,

    pub flags: MethodFlags,

    pub role: FunctionRole,

    pub is_static: bool,

    pub is_inline: bool,

    pub is_constexpr: bool,

    pub is_noexcept: bool,

    /// A body (or `= default` / `= delete`) was present
    pub is_definition: bool,

    /// Qualifier of an out-of-line definition as written (`Outer::Inner`)
    pub scope_qualifier: Option<String>,
}

impl FunctionDetails {
    /// Parenthesized signature used for identity: normalized parameter types,
    /// ellipsis, `const` and ref-qualifier.
    pub fn signature(&self) -> String {
        let mut types: Vec<&str> = self
            .parameters
            .iter()
            .map(|p| p.type_name.as_str())
            .collect();
        if self.is_variadic {
            types.push("...");
        }

        let mut sig = format!("({})", types.join(","));
        if self.is_const {
            sig.push_str(" const");
        }
        if self.ref_qualifier != RefQualifier::None {
            sig.push(' ');
            sig.push_str(self.ref_qualifier.as_str());
        }
        sig
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// Canonical spelling of a type for identity comparison.
///
/// Whitespace runs collapse to a single space. No space is kept before
/// punctuation (`*`, `&`, `<`, `>`, `,`, `.`, parentheses, brackets, `:`) or
/// after an opening bracket, comma or scope operator; a word following `*`,
/// `&` or a closing bracket keeps its space (`char* const`).
pub fn normalize_type(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            let prev_open = out.chars().last().is_some_and(is_open);
            if !is_tight(ch) && !prev_open {
                out.push(' ');
            }
            pending_space = false;
        }
        out.push(ch);
    }

    out
}

fn is_tight(c: char) -> bool {
    matches!(
        c,
        '*' | '&' | '<' | '>' | ',' | '.' | '(' | ')' | '[' | ']' | ':'
    )
}

fn is_open(c: char) -> bool {
    matches!(c, '<' | ',' | '.' | '(' | '[' | ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("char *"), "char*");
        assert_eq!(normalize_type("const  MyClass2 &"), "const MyClass2&");
        assert_eq!(normalize_type("std::vector< int >"), "std::vector<int>");
        assert_eq!(normalize_type("unsigned   long"), "unsigned long");
        assert_eq!(normalize_type("  int  "), "int");
        assert_eq!(normalize_type("Ts ..."), "Ts...");
        assert_eq!(normalize_type("const char * const"), "const char* const");
        assert_eq!(normalize_type("void (*)(int, char)"), "void(*)(int,char)");
    }

    #[test]
    fn test_signature_includes_qualifiers() {
        let mut details = FunctionDetails {
            parameters: vec![Parameter::new("a", "int"), Parameter::new("b", "char *")],
            is_const: true,
            ..Default::default()
        };
        assert_eq!(details.signature(), "(int,char*) const");

        details.ref_qualifier = RefQualifier::RValue;
        details.is_variadic = true;
        assert_eq!(details.signature(), "(int,char*,...) const &&");
    }
}
