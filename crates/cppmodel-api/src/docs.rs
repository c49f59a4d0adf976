//! Structured documentation attached to entities.
//!
//! Comment text is kept as a sequence of [`DocContent`] items: tags the
//! extractor understands are `Recognized`, everything else (paragraphs,
//! unknown commands, inline markup, HTML fragments) is `Opaque` and kept
//! verbatim.

use serde::{Deserialize, Serialize};

/// Direction of a documented parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParamDirection {
    #[default]
    In,
    Out,
    InOut,
}

impl ParamDirection {
    /// Parse the bracketed qualifier of a parameter tag (`in`, `out`, `in,out`).
    pub fn from_qualifier(qualifier: &str) -> Option<Self> {
        let parts: Vec<String> = qualifier
            .split(',')
            .map(|p| p.trim().to_ascii_lowercase())
            .collect();
        match parts
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .as_slice()
        {
            ["in"] => Some(ParamDirection::In),
            ["out"] => Some(ParamDirection::Out),
            ["in", "out"] | ["out", "in"] => Some(ParamDirection::InOut),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamDirection::In => "in",
            ParamDirection::Out => "out",
            ParamDirection::InOut => "in,out",
        }
    }
}

/// A documentation command the extractor recognizes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocTag {
    Brief,
    Param {
        name: String,
        direction: ParamDirection,
        /// Direction came from an explicit `[..]` qualifier
        explicit_direction: bool,
    },
    Returns,
    TemplateParam {
        name: String,
    },
}

/// One item of documentation content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocContent {
    Recognized { tag: DocTag, payload: String },
    Opaque(String),
}

/// Resolved documentation of one declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamDoc {
    pub name: String,
    pub direction: ParamDirection,
    pub text: Option<String>,
    /// A tag for this parameter was present
    pub documented: bool,
}

/// Documentation of one template parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateParamDoc {
    pub name: String,
    pub text: String,
}

/// The structured documentation block of an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DocBlock {
    /// Raw comment text, markers included
    pub raw: String,

    /// Explicit brief, or the first sentence of untagged text
    pub summary: Option<String>,

    /// Content in source order
    pub content: Vec<DocContent>,

    /// One entry per declared parameter, in declaration order
    pub params: Vec<ParamDoc>,

    pub returns: Option<String>,

    pub template_params: Vec<TemplateParamDoc>,
}

impl DocBlock {
    pub fn param(&self, name: &str) -> Option<&ParamDoc> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn template_param(&self, name: &str) -> Option<&TemplateParamDoc> {
        self.template_params.iter().find(|p| p.name == name)
    }

    /// Untagged text items joined by blank lines
    pub fn opaque_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                DocContent::Opaque(text) => Some(text.as_str()),
                DocContent::Recognized { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Recognized parameter tags, including ones naming unknown parameters
    pub fn param_tags(&self) -> impl Iterator<Item = (&str, ParamDirection, &str)> {
        self.content.iter().filter_map(|c| match c {
            DocContent::Recognized {
                tag: DocTag::Param {
                    name, direction, ..
                },
                payload,
            } => Some((name.as_str(), *direction, payload.as_str())),
            _ => None,
        })
    }
}
