//! Non-fatal findings collected during extraction

use crate::entities::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

/// Category of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A unit could not be parsed (reported for failed units in non-strict runs)
    Parse,
    /// Syntax error recovered from in tolerant mode
    Syntax,
    /// Malformed or mismatched documentation tag
    CommentWarning,
    /// Incompatible redeclaration of one identity
    MergeConflict,
    /// Specialization whose primary template was never seen
    UnresolvedTemplate,
    /// Bit-field width that is not a positive literal within the type's width
    InvalidBitField,
    /// Preprocessor directive that could not be evaluated or followed
    Preprocessor,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Parse => "parse",
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::CommentWarning => "comment",
            DiagnosticKind::MergeConflict => "merge-conflict",
            DiagnosticKind::UnresolvedTemplate => "unresolved-template",
            DiagnosticKind::InvalidBitField => "invalid-bit-field",
            DiagnosticKind::Preprocessor => "preprocessor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Qualified name of the entity the diagnostic is about
    pub entity: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location: None,
            entity: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, message)
    }

    pub fn comment_warning(message: impl Into<String>) -> Self {
        Self::warning(DiagnosticKind::CommentWarning, message)
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn for_entity(mut self, qualified_name: impl Into<String>) -> Self {
        self.entity = Some(qualified_name.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref loc) = self.location {
            write!(f, "{}: ", loc)?;
        }
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if let Some(ref entity) = self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}
