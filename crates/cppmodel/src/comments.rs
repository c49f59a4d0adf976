//! Documentation comment association and tag parsing
//!
//! Comments arrive from tree-sitter as `comment` extras scattered through the
//! tree. [`CommentIndex`] collects them once per unit, in source order, and
//! hands out the block immediately preceding a declaration. Every comment is
//! handed out at most once, so a block sitting in front of two adjacent
//! overloads documents only the first of them.

use cppmodel_api::{
    Diagnostic, DocBlock, DocContent, DocTag, Entity, ParamDirection, ParamDoc, Parameter,
    TemplateParamDoc,
};
use tree_sitter::Node;

/// One raw comment token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComment {
    pub text: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub line: usize,
    /// Code precedes the comment on its first line
    pub trailing: bool,
}

impl RawComment {
    pub fn is_line(&self) -> bool {
        self.text.starts_with("//")
    }

    /// `///`, `//!`, `/**` or `/*!` style
    pub fn is_doc(&self) -> bool {
        let t = self.text.as_str();
        (t.starts_with("///") && !t.starts_with("////"))
            || t.starts_with("//!")
            || (t.starts_with("/**") && !t.starts_with("/***") && t != "/**/")
            || t.starts_with("/*!")
    }

    /// `///<` style comment documenting the declaration before it
    pub fn is_member_trailing(&self) -> bool {
        ["///<", "//!<", "/**<", "/*!<"]
            .iter()
            .any(|m| self.text.starts_with(m))
    }
}

/// All comments of a unit with their consumption state
#[derive(Debug, Default)]
pub struct CommentIndex {
    comments: Vec<RawComment>,
    consumed: Vec<bool>,
}

impl CommentIndex {
    pub fn collect(root: Node, source: &[u8]) -> Self {
        let mut comments = Vec::new();
        collect_comments(root, source, &mut comments);
        comments.sort_by_key(|c| c.start_byte);
        let consumed = vec![false; comments.len()];
        Self { comments, consumed }
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Take the contiguous block ending right before `anchor_start`.
    ///
    /// Only whitespace without a blank line may separate the block from the
    /// anchor. Consecutive line comments on adjacent lines form one block; a
    /// block comment stands alone.
    pub fn take_preceding(
        &mut self,
        anchor_start: usize,
        source: &[u8],
        doc_only: bool,
    ) -> Option<String> {
        let after = self
            .comments
            .partition_point(|c| c.end_byte <= anchor_start);
        if after == 0 {
            return None;
        }
        let last = after - 1;
        if !self.is_candidate(last, doc_only) || !tight_gap(source, self.comments[last].end_byte, anchor_start) {
            return None;
        }

        let mut first = last;
        if self.comments[last].is_line() {
            while first > 0 {
                let prev = first - 1;
                let joinable = self.is_candidate(prev, doc_only)
                    && self.comments[prev].is_line()
                    && self.comments[prev].is_doc() == self.comments[last].is_doc()
                    && tight_gap(
                        source,
                        self.comments[prev].end_byte,
                        self.comments[first].start_byte,
                    );
                if !joinable {
                    break;
                }
                first = prev;
            }
        }

        let text = (first..=last)
            .map(|i| {
                self.consumed[i] = true;
                self.comments[i].text.as_str()
            })
            .collect::<Vec<_>>()
            .join("\n");
        log::trace!(
            "associated comment block at line {} with declaration at byte {}",
            self.comments[first].line,
            anchor_start
        );
        Some(text)
    }

    /// Take a `///<` comment on the same line right after `decl_end`
    pub fn take_trailing(&mut self, decl_end: usize, source: &[u8]) -> Option<String> {
        let idx = self.comments.partition_point(|c| c.start_byte < decl_end);
        let comment = self.comments.get(idx)?;
        if self.consumed[idx] || !comment.is_member_trailing() {
            return None;
        }
        let gap = source.get(decl_end..comment.start_byte)?;
        if !gap.iter().all(|b| *b == b' ' || *b == b'\t' || *b == b';' || *b == b',') {
            return None;
        }
        self.consumed[idx] = true;
        Some(comment.text.clone())
    }

    fn is_candidate(&self, idx: usize, doc_only: bool) -> bool {
        let c = &self.comments[idx];
        !self.consumed[idx] && !c.trailing && !c.is_member_trailing() && (!doc_only || c.is_doc())
    }
}

fn collect_comments(node: Node, source: &[u8], out: &mut Vec<RawComment>) {
    if node.kind() == "comment" {
        let start = node.start_byte();
        let line_start = source[..start]
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        let trailing = source[line_start..start]
            .iter()
            .any(|b| !b.is_ascii_whitespace());
        out.push(RawComment {
            text: node.utf8_text(source).unwrap_or("").to_string(),
            start_byte: start,
            end_byte: node.end_byte(),
            line: node.start_position().row + 1,
            trailing,
        });
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_comments(child, source, out);
    }
}

/// Whitespace only, with at most one line break
fn tight_gap(source: &[u8], from: usize, to: usize) -> bool {
    match source.get(from..to) {
        Some(gap) => {
            gap.iter().all(|b| b.is_ascii_whitespace())
                && gap.iter().filter(|b| **b == b'\n').count() <= 1
        }
        None => false,
    }
}

/// Remove comment markers and continuation stars, one entry per line
pub fn strip_markers(raw: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for line in raw.lines() {
        let mut l = line.trim();
        for marker in ["///<", "//!<", "///", "//!", "//", "/**<", "/*!<", "/**", "/*!", "/*"] {
            if let Some(rest) = l.strip_prefix(marker) {
                l = rest;
                break;
            }
        }
        l = l.trim_end();
        if let Some(rest) = l.strip_suffix("*/") {
            l = rest;
        }
        l = l.trim();
        if let Some(rest) = l.strip_prefix('*') {
            if !rest.starts_with('/') {
                l = rest.trim_start();
            }
        }
        lines.push(l.trim_end().to_string());
    }

    // drop leading and trailing blank lines
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Inline commands that never start a new paragraph
const INLINE_COMMANDS: &[&str] = &[
    "a", "b", "c", "e", "em", "p", "ref", "link", "endlink", "n", "f$", "anchor",
];

enum Pending {
    Text(Vec<String>),
    Tag(DocTag, Vec<String>),
}

/// Result of parsing the tags of one comment block
#[derive(Debug, Default)]
pub struct ParsedComment {
    pub content: Vec<DocContent>,
    pub warnings: Vec<String>,
}

/// Split comment text into recognized tags and opaque paragraphs
pub fn parse_comment(raw: &str) -> ParsedComment {
    let mut parsed = ParsedComment::default();
    let mut pending: Option<Pending> = None;

    for line in strip_markers(raw) {
        if line.is_empty() {
            flush(&mut pending, &mut parsed.content);
            continue;
        }

        match block_command(&line) {
            Some((command, rest)) => {
                flush(&mut pending, &mut parsed.content);
                pending = Some(match command {
                    "param" => match parse_param_head(rest, &mut parsed.warnings) {
                        Some((tag, payload)) => Pending::Tag(tag, vec![payload]),
                        None => Pending::Text(vec![line.clone()]),
                    },
                    "return" | "returns" | "result" => {
                        Pending::Tag(DocTag::Returns, vec![rest.trim().to_string()])
                    }
                    "tparam" => {
                        let (name, payload) = split_name(rest);
                        if name.is_empty() {
                            parsed
                                .warnings
                                .push("template parameter tag without a name".to_string());
                            Pending::Text(vec![line.clone()])
                        } else {
                            Pending::Tag(DocTag::TemplateParam { name }, vec![payload])
                        }
                    }
                    "brief" | "short" => Pending::Tag(DocTag::Brief, vec![rest.trim().to_string()]),
                    _ => Pending::Text(vec![line.clone()]),
                });
            }
            None => match pending {
                Some(Pending::Text(ref mut lines)) | Some(Pending::Tag(_, ref mut lines)) => {
                    lines.push(line)
                }
                None => pending = Some(Pending::Text(vec![line])),
            },
        }
    }
    flush(&mut pending, &mut parsed.content);
    parsed
}

fn flush(pending: &mut Option<Pending>, content: &mut Vec<DocContent>) {
    match pending.take() {
        Some(Pending::Text(lines)) => content.push(DocContent::Opaque(lines.join("\n"))),
        Some(Pending::Tag(tag, lines)) => content.push(DocContent::Recognized {
            tag,
            payload: lines
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }),
        None => {}
    }
}

/// A `@word` or `\word` at the start of a line that is not an inline command
fn block_command(line: &str) -> Option<(&str, &str)> {
    let body = line.strip_prefix('@').or_else(|| line.strip_prefix('\\'))?;
    let end = body
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(body.len());
    if end == 0 {
        return None;
    }
    let (command, rest) = body.split_at(end);
    if INLINE_COMMANDS.contains(&command) {
        return None;
    }
    Some((command, rest))
}

fn split_name(rest: &str) -> (String, String) {
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(rest.len());
    let name = rest[..end].trim_end_matches("...").to_string();
    (name, rest[end..].trim().to_string())
}

fn parse_param_head(rest: &str, warnings: &mut Vec<String>) -> Option<(DocTag, String)> {
    let mut rest = rest.trim_start();
    let mut direction = ParamDirection::In;
    let mut explicit_direction = false;

    if let Some(qualified) = rest.strip_prefix('[') {
        match qualified.find(']') {
            Some(close) => {
                let qualifier = &qualified[..close];
                match ParamDirection::from_qualifier(qualifier) {
                    Some(d) => {
                        direction = d;
                        explicit_direction = true;
                    }
                    None => warnings.push(format!(
                        "unknown parameter direction '[{}]', assuming 'in'",
                        qualifier.trim()
                    )),
                }
                rest = &qualified[close + 1..];
            }
            None => {
                warnings.push("unterminated parameter direction, assuming 'in'".to_string());
                rest = qualified;
            }
        }
    }

    let (name, payload) = split_name(rest);
    if name.is_empty() {
        warnings.push("parameter tag without a name".to_string());
        return None;
    }

    Some((
        DocTag::Param {
            name,
            direction,
            explicit_direction,
        },
        payload,
    ))
}

/// First sentence of a paragraph, with line breaks folded
fn first_sentence(text: &str) -> String {
    let folded = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let bytes = folded.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'.' && (i + 1 == bytes.len() || bytes[i + 1] == b' ') {
            return folded[..=i].to_string();
        }
    }
    folded
}

/// Build the documentation block of `entity` from raw comment text.
///
/// Parameter tags are matched against `parameters` and template-parameter
/// tags against `template_params`. Mismatches come back as comment
/// warnings; the block itself is never rejected.
pub fn build_doc_block(
    raw: &str,
    parameters: Option<&[Parameter]>,
    template_params: &[String],
) -> (DocBlock, Vec<String>) {
    let ParsedComment {
        content,
        mut warnings,
    } = parse_comment(raw);

    let mut summary = None;
    let mut returns = None;
    let mut tparams = Vec::new();

    for item in &content {
        match item {
            DocContent::Recognized {
                tag: DocTag::Brief,
                payload,
            } if summary.is_none() => summary = Some(payload.clone()),
            DocContent::Recognized {
                tag: DocTag::Returns,
                payload,
            } => {
                if returns.is_some() {
                    warnings.push("duplicate return tag".to_string());
                } else {
                    returns = Some(payload.clone());
                }
            }
            DocContent::Recognized {
                tag: DocTag::TemplateParam { name },
                payload,
            } => {
                if template_params.iter().any(|p| p == name) {
                    tparams.push(TemplateParamDoc {
                        name: name.clone(),
                        text: payload.clone(),
                    });
                } else {
                    warnings.push(format!(
                        "template parameter tag names unknown parameter '{}'",
                        name
                    ));
                }
            }
            _ => {}
        }
    }

    if summary.is_none() {
        summary = content.iter().find_map(|item| match item {
            DocContent::Opaque(text) if block_command(text).is_none() => {
                Some(first_sentence(text))
            }
            _ => None,
        });
    }

    let mut block = DocBlock {
        raw: raw.to_string(),
        summary,
        content,
        params: Vec::new(),
        returns,
        template_params: tparams,
    };

    if let Some(parameters) = parameters {
        resolve_params(&mut block, parameters, &mut warnings);
    }

    (block, warnings)
}

/// One [`ParamDoc`] per declared parameter, in declaration order
fn resolve_params(block: &mut DocBlock, parameters: &[Parameter], warnings: &mut Vec<String>) {
    let tags: Vec<(String, ParamDirection, String)> = block
        .param_tags()
        .map(|(name, direction, text)| (name.to_string(), direction, text.to_string()))
        .collect();

    for (i, (name, _, _)) in tags.iter().enumerate() {
        if !parameters.iter().any(|p| &p.name == name) {
            warnings.push(format!("parameter tag names unknown parameter '{}'", name));
        } else if tags[..i].iter().any(|(earlier, _, _)| earlier == name) {
            warnings.push(format!("duplicate parameter tag for '{}'", name));
        }
    }

    for param in parameters {
        let tag = tags.iter().find(|(name, _, _)| name == &param.name);
        match tag {
            Some((_, direction, text)) => block.params.push(ParamDoc {
                name: param.name.clone(),
                direction: *direction,
                text: Some(text.clone()),
                documented: true,
            }),
            None => {
                if !param.name.is_empty() {
                    warnings.push(format!("parameter '{}' is not documented", param.name));
                }
                block.params.push(ParamDoc {
                    name: param.name.clone(),
                    direction: ParamDirection::In,
                    text: None,
                    documented: false,
                });
            }
        }
    }
}

/// Attach `raw` to `entity` as its documentation block, recording every
/// tag mismatch as a comment warning on the entity
pub fn attach_doc(entity: &mut Entity, raw: &str) {
    let template_params = entity
        .template
        .as_ref()
        .map(|t| t.parameter_names())
        .unwrap_or_default();
    let parameters = entity.function().map(|f| f.parameters.clone());

    let (block, warnings) = build_doc_block(raw, parameters.as_deref(), &template_params);
    for warning in warnings {
        log::trace!("{}: {}", entity.qualified_name, warning);
        entity.diagnostics.push(
            Diagnostic::comment_warning(warning)
                .at(entity.location.clone())
                .for_entity(entity.qualified_name.clone()),
        );
    }
    entity.doc = Some(block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn index_for(source: &str) -> CommentIndex {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_cpp::language()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        CommentIndex::collect(tree.root_node(), source.as_bytes())
    }

    #[test]
    fn test_strip_markers() {
        assert_eq!(strip_markers("/// Hello\n/// world"), vec!["Hello", "world"]);
        assert_eq!(
            strip_markers("/**\n * Block text.\n *\n * More.\n */"),
            vec!["Block text.", "", "More."]
        );
        assert_eq!(strip_markers("/*! Short */"), vec!["Short"]);
    }

    #[test]
    fn test_take_preceding_requires_adjacency() {
        let source = "// file header\n\n/// First line\n/// Second line\nvoid f();\n";
        let mut index = index_for(source);
        assert_eq!(index.len(), 3);

        let anchor = source.find("void").unwrap();
        let block = index.take_preceding(anchor, source.as_bytes(), false).unwrap();
        assert_eq!(block, "/// First line\n/// Second line");

        // consumed: a second request finds nothing
        assert!(index.take_preceding(anchor, source.as_bytes(), false).is_none());
    }

    #[test]
    fn test_take_preceding_rejects_code_between() {
        let source = "/// About a\nint a;\nint b;\n";
        let mut index = index_for(source);
        let anchor = source.find("int b").unwrap();
        assert!(index.take_preceding(anchor, source.as_bytes(), false).is_none());
    }

    #[test]
    fn test_take_preceding_ignores_trailing_comments() {
        let source = "int a; // about a\nint b;\n";
        let mut index = index_for(source);
        let anchor = source.find("int b").unwrap();
        assert!(index.take_preceding(anchor, source.as_bytes(), false).is_none());
    }

    #[test]
    fn test_doc_comments_only() {
        let source = "// plain\nvoid f();\n";
        let mut index = index_for(source);
        let anchor = source.find("void").unwrap();
        assert!(index.take_preceding(anchor, source.as_bytes(), true).is_none());
        assert!(index.take_preceding(anchor, source.as_bytes(), false).is_some());
    }

    #[test]
    fn test_take_trailing_member_comment() {
        let source = "struct S {\n  int x; ///< The x.\n  int y; // not doc\n};\n";
        let mut index = index_for(source);
        let x_end = source.find("int x;").unwrap() + "int x;".len();
        assert_eq!(
            index.take_trailing(x_end, source.as_bytes()).as_deref(),
            Some("///< The x.")
        );
        let y_end = source.find("int y;").unwrap() + "int y;".len();
        assert!(index.take_trailing(y_end, source.as_bytes()).is_none());
    }

    #[test]
    fn test_parse_param_directions() {
        let raw = "/// Copies data.\n/// @param[in,out] buffer Target.\n/// @param[out] count Bytes written.\n/// @return true on success";
        let params = vec![
            Parameter::new("buffer", "char*"),
            Parameter::new("count", "size_t*"),
            Parameter::new("flags", "int"),
        ];
        let (block, warnings) = build_doc_block(raw, Some(&params), &[]);

        assert_eq!(block.summary.as_deref(), Some("Copies data."));
        assert_eq!(block.returns.as_deref(), Some("true on success"));
        assert_eq!(block.params.len(), 3);
        assert_eq!(block.params[0].direction, ParamDirection::InOut);
        assert_eq!(block.params[0].text.as_deref(), Some("Target."));
        assert_eq!(block.params[1].direction, ParamDirection::Out);
        assert_eq!(block.params[2].direction, ParamDirection::In);
        assert!(!block.params[2].documented);
        assert_eq!(warnings, vec!["parameter 'flags' is not documented".to_string()]);
    }

    #[test]
    fn test_unknown_param_and_bad_direction_warn() {
        let raw = "/** \\param [sideways] x Value.\n * \\param ghost Nothing. */";
        let params = vec![Parameter::new("x", "int")];
        let (block, warnings) = build_doc_block(raw, Some(&params), &[]);

        assert_eq!(block.params[0].direction, ParamDirection::In);
        assert!(block.params[0].documented);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("sideways"));
        assert!(warnings[1].contains("ghost"));
    }

    #[test]
    fn test_untagged_doc_warns_for_every_named_parameter() {
        let params = vec![Parameter::new("x", "int"), Parameter::new("y", "int")];
        let (block, warnings) = build_doc_block("/// Does a thing.", Some(&params), &[]);

        assert_eq!(block.summary.as_deref(), Some("Does a thing."));
        assert!(block.params.iter().all(|p| !p.documented));
        assert_eq!(
            warnings,
            vec![
                "parameter 'x' is not documented".to_string(),
                "parameter 'y' is not documented".to_string(),
            ]
        );

        let unnamed = vec![Parameter::new("", "int")];
        let (_, warnings) = build_doc_block("/// Does a thing.", Some(&unnamed), &[]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_duplicate_param_tag_warns() {
        let raw = "/// @param x First.\n/// @param[out] x Second.";
        let params = vec![Parameter::new("x", "int*")];
        let (block, warnings) = build_doc_block(raw, Some(&params), &[]);

        assert_eq!(block.params[0].text.as_deref(), Some("First."));
        assert_eq!(block.params[0].direction, ParamDirection::In);
        assert_eq!(warnings, vec!["duplicate parameter tag for 'x'".to_string()]);
    }

    #[test]
    fn test_opaque_markup_preserved() {
        let raw = "/// Uses \\em emphasis and <b>bold</b> text.\n/// @see other_function\n/// @brief Short form.";
        let (block, _) = build_doc_block(raw, None, &[]);

        assert_eq!(block.summary.as_deref(), Some("Short form."));
        assert_eq!(
            block.content[0],
            DocContent::Opaque("Uses \\em emphasis and <b>bold</b> text.".to_string())
        );
        assert_eq!(
            block.content[1],
            DocContent::Opaque("@see other_function".to_string())
        );
    }

    #[test]
    fn test_template_param_tags() {
        let raw = "/// Holds a value.\n/// @tparam T Stored type.\n/// @tparam U Unknown.";
        let (block, warnings) = build_doc_block(raw, None, &["T".to_string()]);
        assert_eq!(block.template_param("T").unwrap().text, "Stored type.");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("Does a thing. Then more."), "Does a thing.");
        assert_eq!(first_sentence("Version 1.2 support\nis here"), "Version 1.2 support is here");
    }
}
