use serde::{Deserialize, Serialize};

/// Kind of a template parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateParameterKind {
    /// `typename T` / `class T`
    Type,
    /// `int N`
    NonType,
    /// `template<typename> class TT`
    TemplateTemplate,
}

/// One parameter of a template parameter list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateParameter {
    /// Parameter name (empty when unnamed)
    pub name: String,

    pub kind: TemplateParameterKind,

    /// Type of a non-type parameter
    pub type_name: Option<String>,

    /// Default argument as written
    pub default: Option<String>,

    /// Parameter pack (`typename... Ts`)
    pub is_pack: bool,

    /// Nested parameter list of a template template parameter
    pub parameters: Vec<TemplateParameter>,
}

impl TemplateParameter {
    pub fn new(name: impl Into<String>, kind: TemplateParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            type_name: None,
            default: None,
            is_pack: false,
            parameters: Vec::new(),
        }
    }
}

/// Binding of a specialization to its primary template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecializationInfo {
    /// Name of the primary template as written; resolved by scope lookup
    pub primary_name: String,

    /// Template arguments as written, normalized
    pub arguments: Vec<String>,

    /// A partial specialization keeps free parameters in [`TemplateInfo::parameters`]
    pub partial: bool,
}

/// Template information of a template or specialization entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Parameter list (empty for a full specialization)
    pub parameters: Vec<TemplateParameter>,

    pub specialization: Option<SpecializationInfo>,
}

impl TemplateInfo {
    pub fn new(parameters: Vec<TemplateParameter>) -> Self {
        Self {
            parameters,
            specialization: None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.specialization.is_none()
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

/// Split the contents of a template argument list on top-level commas.
///
/// Accepts the list with or without the surrounding angle brackets:
/// `<int, std::map<K, V>>` yields `["int", "std::map<K,V>"]`.
pub fn split_template_arguments(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(trimmed);

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for ch in inner.chars() {
        match ch {
            '<' | '(' | '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            '>' | ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                args.push(super::normalize_type(&current));
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let last = super::normalize_type(&current);
    if !last.is_empty() || !args.is_empty() {
        args.push(last);
    }
    args
}
