//! Source ingestion: drives tree-sitter over one translation unit
//!
//! The ingestor is the only place that talks to the front end. It turns a
//! [`TranslationUnit`] into a [`ParsedUnit`] (source text plus syntax tree)
//! or a unit-level [`ParserError`]. Preprocessor conditionals are evaluated
//! later, during the walk, with the [`Preprocessor`] defined here.

use cppmodel_api::{
    CompilerConfig, Diagnostic, DiagnosticKind, IncludeDirective, IncludePolicy, ParserConfig,
    ParserError, SourceLocation, TranslationUnit,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

/// A unit the front end produced a syntax tree for
pub struct ParsedUnit {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
    /// Effective compiler configuration (shared config layered with unit flags)
    pub compiler: CompilerConfig,
    /// Syntax errors recovered from in tolerant mode
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedUnit {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// The front-end contract: `parse(unit, config) -> tree | error`
pub trait SourceIngestor: Send + Sync {
    fn parse(&self, unit: &TranslationUnit, config: &ParserConfig) -> Result<ParsedUnit, ParserError>;
}

/// Default ingestor backed by tree-sitter-cpp
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterIngestor;

impl TreeSitterIngestor {
    pub fn new() -> Self {
        Self
    }

    fn read_source(unit: &TranslationUnit, config: &ParserConfig) -> Result<String, ParserError> {
        let path = &unit.path;
        if let Some(ref contents) = unit.contents {
            if contents.len() > config.max_file_size {
                return Err(ParserError::FileTooLarge(path.clone(), contents.len()));
            }
            return Ok(contents.clone());
        }

        let metadata = fs::metadata(path).map_err(|e| ParserError::IoError(path.clone(), e))?;
        if metadata.len() as usize > config.max_file_size {
            return Err(ParserError::FileTooLarge(
                path.clone(),
                metadata.len() as usize,
            ));
        }

        let bytes = fs::read(path).map_err(|e| ParserError::IoError(path.clone(), e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl SourceIngestor for TreeSitterIngestor {
    fn parse(&self, unit: &TranslationUnit, config: &ParserConfig) -> Result<ParsedUnit, ParserError> {
        let path = unit.path.clone();
        let source = Self::read_source(unit, config)?;

        let mut parser = Parser::new();
        let language = tree_sitter_cpp::language();
        parser
            .set_language(&language)
            .map_err(|e| ParserError::ParseError(path.clone(), e.to_string()))?;

        if let Some(timeout) = config.timeout_per_file {
            parser.set_timeout_micros(timeout.as_micros().min(u64::MAX as u128) as u64);
        }

        let tree = match parser.parse(&source, None) {
            Some(tree) => tree,
            None if config.timeout_per_file.is_some() => return Err(ParserError::Timeout(path)),
            None => {
                return Err(ParserError::ParseError(
                    path,
                    "Failed to parse".to_string(),
                ))
            }
        };

        let errors = syntax_errors(tree.root_node(), &path);
        let diagnostics = if errors.is_empty() {
            Vec::new()
        } else if config.tolerant {
            errors
        } else {
            let first = &errors[0];
            let (line, column) = first
                .location
                .as_ref()
                .map(|l| (l.line, l.column))
                .unwrap_or((0, 0));
            return Err(ParserError::SyntaxError(
                path,
                line,
                column,
                first.message.clone(),
            ));
        };

        log::debug!(
            "Parsed {} ({} bytes, {} recovered syntax errors)",
            path.display(),
            source.len(),
            diagnostics.len()
        );

        Ok(ParsedUnit {
            path,
            source,
            tree,
            compiler: config.compiler.layered(&unit.flags),
            diagnostics,
        })
    }
}

/// One `Syntax` diagnostic per ERROR or MISSING node, in source order
fn syntax_errors(root: Node, path: &Path) -> Vec<Diagnostic> {
    let mut errors = Vec::new();
    if !root.has_error() {
        return errors;
    }
    collect_errors(root, path, &mut errors);
    errors
}

fn collect_errors(node: Node, path: &Path, errors: &mut Vec<Diagnostic>) {
    if node.is_error() || node.is_missing() {
        let pos = node.start_position();
        let message = if node.is_missing() {
            format!("missing '{}'", node.kind())
        } else {
            "unexpected syntax".to_string()
        };
        errors.push(
            Diagnostic::error(DiagnosticKind::Syntax, message).at(SourceLocation::new(
                path,
                pos.row + 1,
                pos.column + 1,
                node.start_byte(),
            )),
        );
        return;
    }

    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_errors(child, path, errors);
    }
}

/// Evaluates preprocessor conditionals against the active defines
#[derive(Debug, Clone)]
pub struct Preprocessor {
    defines: HashMap<String, Option<String>>,
}

const MAX_EXPANSION_DEPTH: usize = 16;

impl Preprocessor {
    pub fn new(compiler: &CompilerConfig) -> Self {
        let mut defines: HashMap<String, Option<String>> = compiler
            .defines
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        defines.insert(
            "__cplusplus".to_string(),
            Some(format!("{}L", compiler.standard.cplusplus_value())),
        );
        Self { defines }
    }

    pub fn define(&mut self, name: impl Into<String>, value: Option<String>) {
        self.defines.insert(name.into(), value);
    }

    pub fn undefine(&mut self, name: &str) {
        self.defines.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    /// Value of a `#if` / `#elif` condition. `None` when the expression uses
    /// something that cannot be evaluated without macro expansion.
    pub fn evaluate(&self, node: Node, source: &[u8]) -> Option<i64> {
        let text = |n: Node| n.utf8_text(source).unwrap_or("").trim().to_string();

        match node.kind() {
            "number_literal" => parse_integer(&text(node)),
            "char_literal" => {
                let t = text(node);
                let inner = t.trim_matches('\'');
                let mut chars = inner.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c as i64),
                    _ => None,
                }
            }
            "true" => Some(1),
            "false" => Some(0),
            "identifier" => self.identifier_value(&text(node), 0),
            "preproc_defined" => {
                let mut cursor = node.walk();
                let name = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "identifier")
                    .map(text)?;
                Some(self.is_defined(&name) as i64)
            }
            "parenthesized_expression" => {
                let inner = node.named_child(0)?;
                self.evaluate(inner, source)
            }
            "unary_expression" => {
                let op = node.child_by_field_name("operator").map(text)?;
                let arg = self.evaluate(node.child_by_field_name("argument")?, source)?;
                match op.as_str() {
                    "!" => Some((arg == 0) as i64),
                    "-" => Some(arg.wrapping_neg()),
                    "+" => Some(arg),
                    "~" => Some(!arg),
                    _ => None,
                }
            }
            "binary_expression" => {
                let op = node.child_by_field_name("operator").map(text)?;
                let left = self.evaluate(node.child_by_field_name("left")?, source);
                let right_node = node.child_by_field_name("right")?;

                // short-circuit operators tolerate an unknown side
                match op.as_str() {
                    "&&" => {
                        if left == Some(0) {
                            return Some(0);
                        }
                        let right = self.evaluate(right_node, source);
                        if right == Some(0) {
                            return Some(0);
                        }
                        return Some((left? != 0 && right? != 0) as i64);
                    }
                    "||" => {
                        if matches!(left, Some(v) if v != 0) {
                            return Some(1);
                        }
                        let right = self.evaluate(right_node, source);
                        if matches!(right, Some(v) if v != 0) {
                            return Some(1);
                        }
                        return Some((left? != 0 || right? != 0) as i64);
                    }
                    _ => {}
                }

                let (l, r) = (left?, self.evaluate(right_node, source)?);
                match op.as_str() {
                    "==" => Some((l == r) as i64),
                    "!=" => Some((l != r) as i64),
                    "<" => Some((l < r) as i64),
                    ">" => Some((l > r) as i64),
                    "<=" => Some((l <= r) as i64),
                    ">=" => Some((l >= r) as i64),
                    "+" => Some(l.wrapping_add(r)),
                    "-" => Some(l.wrapping_sub(r)),
                    "*" => Some(l.wrapping_mul(r)),
                    "/" => l.checked_div(r),
                    "%" => l.checked_rem(r),
                    "&" => Some(l & r),
                    "|" => Some(l | r),
                    "^" => Some(l ^ r),
                    "<<" => Some(l.wrapping_shl(r as u32)),
                    ">>" => Some(l.wrapping_shr(r as u32)),
                    _ => None,
                }
            }
            "conditional_expression" => {
                let cond = self.evaluate(node.child_by_field_name("condition")?, source)?;
                let branch = if cond != 0 {
                    node.child_by_field_name("consequence")?
                } else {
                    node.child_by_field_name("alternative")?
                };
                self.evaluate(branch, source)
            }
            _ => None,
        }
    }

    fn identifier_value(&self, name: &str, depth: usize) -> Option<i64> {
        if depth > MAX_EXPANSION_DEPTH {
            return None;
        }
        match name {
            "true" => return Some(1),
            "false" => return Some(0),
            _ => {}
        }
        match self.defines.get(name) {
            // undefined identifiers evaluate to 0
            None => Some(0),
            Some(None) => Some(1),
            Some(Some(value)) => {
                let value = value.trim();
                if let Some(v) = parse_integer(value) {
                    return Some(v);
                }
                if !value.is_empty() && value.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return self.identifier_value(value, depth + 1);
                }
                None
            }
        }
    }
}

/// Parse a C integer literal: decimal, hex, octal or binary, with optional
/// digit separators and `u`/`l` suffixes.
pub fn parse_integer(text: &str) -> Option<i64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '\'').collect();
    let digits = cleaned.trim_end_matches(['u', 'U', 'l', 'L']);
    if digits.is_empty() {
        return None;
    }

    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if let Some(bin) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        (2, bin)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    i64::from_str_radix(body, radix).ok()
}

/// Resolve an include directive to an existing file.
///
/// Quoted includes are looked up next to the including file first, then in
/// the include paths. Angled includes only use the include paths and are
/// only followed under [`IncludePolicy::All`].
pub fn resolve_include(
    directive: &IncludeDirective,
    including_file: &Path,
    compiler: &CompilerConfig,
    policy: IncludePolicy,
) -> Option<PathBuf> {
    match policy {
        IncludePolicy::None => return None,
        IncludePolicy::Local if directive.system => return None,
        _ => {}
    }

    let mut candidates = Vec::new();
    if !directive.system {
        if let Some(dir) = including_file.parent() {
            candidates.push(dir.join(&directive.path));
        }
    }
    candidates.extend(compiler.include_paths.iter().map(|p| p.join(&directive.path)));

    candidates.into_iter().find(|c| c.is_file())
}

/// Canonical identity of a file; falls back to the path as given for
/// in-memory units that do not exist on disk
pub fn canonical_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
