//! AST visitor building the entity model of one translation unit

use crate::comments::{attach_doc, CommentIndex};
use crate::ingestor::{parse_integer, Preprocessor};
use cppmodel_api::entities::{
    builtin_bit_width, normalize_type, split_template_arguments, EnumConstantDetails,
    EnumDetails, SpecializationInfo, TypedefDetails, VariableDetails,
};
use cppmodel_api::{
    Access, Attribute, BaseSpecifier, CompilerConfig, Completeness, Diagnostic, DiagnosticKind,
    Entity, EntityDetails, EntityId, EntityKind, FieldDetails, FunctionDetails, FunctionRole,
    IncludeDirective, Linkage, Parameter, ParserConfig, RecordDetails, RecordTag, RefQualifier,
    Severity, SourceLocation, TemplateInfo, TemplateParameter, TemplateParameterKind, UnitIR,
};
use std::path::{Path, PathBuf};
use tree_sitter::Node;

/// Name given to unnamed namespaces, records and enums
pub const ANONYMOUS: &str = "(anonymous)";

/// A `template<...>` header waiting for the declaration it introduces
struct TemplateContext {
    parameters: Vec<TemplateParameter>,
    locations: Vec<SourceLocation>,
}

impl TemplateContext {
    fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

/// The record whose body is being walked
struct RecordContext {
    /// Unqualified name without template arguments (constructor detection)
    base_name: String,
    has_pure: bool,
}

/// Storage class and specifier keywords of a declaration
#[derive(Debug, Default, Clone, Copy)]
struct Specifiers {
    is_static: bool,
    is_inline: bool,
    is_virtual: bool,
    is_explicit: bool,
    is_constexpr: bool,
    is_extern: bool,
    is_mutable: bool,
    is_const: bool,
}

/// The parts of a function declarator
struct FunctionShape<'t> {
    /// `function_declarator` or `abstract_function_declarator`
    declarator: Node<'t>,
    /// Name node, possibly qualified
    name: Node<'t>,
    /// Pointer and reference tokens between the declaration and the function declarator
    return_suffix: String,
}

pub struct CppVisitor<'a> {
    source: &'a [u8],
    file: PathBuf,
    config: &'a ParserConfig,
    ir: UnitIR,
    comments: CommentIndex,
    preprocessor: Preprocessor,
    scope: Vec<String>,
    parent: Option<EntityId>,
    linkage: Linkage,
    internal: bool,
    access: Access,
    record: Option<RecordContext>,
    pending_templates: Vec<TemplateContext>,
    /// Start of a `template<...>` or `extern "C"` prefix owning the next declaration
    pending_anchor: Option<usize>,
}

impl<'a> CppVisitor<'a> {
    pub fn new(
        unit_index: usize,
        file: &Path,
        source: &'a str,
        root: Node,
        compiler: &CompilerConfig,
        config: &'a ParserConfig,
    ) -> Self {
        let comments = if config.include_docs {
            CommentIndex::collect(root, source.as_bytes())
        } else {
            CommentIndex::default()
        };

        let mut ir = UnitIR::new(unit_index, file.to_path_buf());
        ir.byte_count = source.len();
        ir.line_count = source.lines().count();

        Self {
            source: source.as_bytes(),
            file: file.to_path_buf(),
            config,
            ir,
            comments,
            preprocessor: Preprocessor::new(compiler),
            scope: Vec::new(),
            parent: None,
            linkage: Linkage::Default,
            internal: false,
            access: Access::None,
            record: None,
            pending_templates: Vec::new(),
            pending_anchor: None,
        }
    }

    pub fn visit(&mut self, root: Node) {
        self.visit_children(root);
    }

    pub fn into_ir(self) -> UnitIR {
        self.ir
    }

    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }

    fn location(&self, node: Node) -> SourceLocation {
        let pos = node.start_position();
        SourceLocation::new(
            self.file.clone(),
            pos.row + 1,
            pos.column + 1,
            node.start_byte(),
        )
    }

    fn qualify_with(&self, extra: &[String], name: &str) -> String {
        self.scope
            .iter()
            .chain(extra.iter())
            .map(String::as_str)
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join("::")
    }

    fn member_access(&self) -> Access {
        if self.record.is_some() {
            self.access
        } else {
            Access::None
        }
    }

    fn skips_member(&self) -> bool {
        self.config.skip_private && self.record.is_some() && self.access == Access::Private
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_item(child);
        }
    }

    fn visit_item(&mut self, node: Node) {
        match node.kind() {
            "namespace_definition" => {
                let anchor = self.take_anchor(node);
                self.visit_namespace(node, anchor);
            }
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier" => {
                let anchor = self.take_anchor(node);
                self.visit_type_specifier(node, anchor, None, true);
            }
            "declaration" | "field_declaration" => {
                let anchor = self.take_anchor(node);
                self.visit_declaration(node, anchor);
            }
            "function_definition" => {
                let anchor = self.take_anchor(node);
                self.visit_function_definition(node, anchor);
            }
            "type_definition" => {
                let anchor = self.take_anchor(node);
                self.visit_typedef(node, anchor);
            }
            "alias_declaration" => {
                let anchor = self.take_anchor(node);
                self.visit_alias(node, anchor);
            }
            "template_declaration" => self.visit_template(node),
            "linkage_specification" => self.visit_linkage(node),
            "access_specifier" => {
                if self.record.is_some() {
                    if let Some(access) = Access::from_keyword(&self.text(node)) {
                        self.access = access;
                    }
                }
            }
            "preproc_if" | "preproc_ifdef" => self.visit_conditional(node),
            "preproc_include" => self.visit_include(node),
            "preproc_def" | "preproc_function_def" => self.visit_define(node),
            "preproc_call" => self.visit_preproc_call(node),
            "declaration_list" | "field_declaration_list" | "translation_unit" => {
                self.visit_children(node)
            }
            "ERROR" if self.config.tolerant => self.visit_children(node),
            _ => {}
        }
    }

    fn take_anchor(&mut self, node: Node) -> usize {
        self.pending_anchor
            .take()
            .unwrap_or_else(|| node.start_byte())
    }

    /// Attach the comment block preceding `anchor`, or a trailing member
    /// comment after `end`, as the entity's documentation
    fn attach_comment(&mut self, entity: &mut Entity, anchor: usize, end: Option<usize>) {
        if !self.config.include_docs {
            return;
        }
        let raw = self
            .comments
            .take_preceding(anchor, self.source, self.config.doc_comments_only)
            .or_else(|| end.and_then(|e| self.comments.take_trailing(e, self.source)));
        if let Some(raw) = raw {
            attach_doc(entity, &raw);
        }
    }

    fn enter(&mut self, components: Vec<String>, id: EntityId) -> (usize, Option<EntityId>) {
        let saved = (self.scope.len(), self.parent);
        self.scope.extend(components);
        self.parent = Some(id);
        saved
    }

    fn leave(&mut self, saved: (usize, Option<EntityId>)) {
        self.scope.truncate(saved.0);
        self.parent = saved.1;
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    fn visit_namespace(&mut self, node: Node, anchor: usize) {
        let name_node = node.child_by_field_name("name");
        let mut components: Vec<(String, Node)> = Vec::new();
        if let Some(name) = name_node {
            if name.kind() == "nested_namespace_specifier" {
                collect_namespace_identifiers(name, self.source, &mut components);
            } else {
                components.push((self.text(name), name));
            }
        }

        let anonymous = components.is_empty();
        if anonymous {
            components.push((ANONYMOUS.to_string(), node));
        }

        let mut cursor = node.walk();
        let inline = node.children(&mut cursor).any(|c| c.kind() == "inline");

        let saved = (self.scope.len(), self.parent);
        let saved_internal = self.internal;
        let last = components.len() - 1;

        for (i, (component, component_node)) in components.into_iter().enumerate() {
            let qualified = self.qualify_with(&[], &component);
            let mut entity = Entity::new(
                component.clone(),
                qualified,
                EntityKind::Namespace,
                EntityDetails::Namespace {
                    anonymous,
                    inline: inline && i == last,
                },
                self.location(component_node),
            )
            .with_linkage(self.linkage);
            entity.internal_linkage = self.internal || anonymous;
            if i == 0 {
                self.attach_comment(&mut entity, anchor, None);
            }
            let id = self.ir.add_entity(entity, self.parent);
            self.scope.push(component);
            self.parent = Some(id);
        }

        if anonymous {
            self.internal = true;
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }

        self.internal = saved_internal;
        self.leave(saved);
    }

    fn visit_linkage(&mut self, node: Node) {
        let linkage = node
            .child_by_field_name("value")
            .map(|v| Linkage::from_literal(&self.text(v)))
            .unwrap_or_default();
        let saved = std::mem::replace(&mut self.linkage, linkage);

        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "declaration_list" {
                self.visit_children(body);
            } else {
                if self.pending_anchor.is_none() {
                    self.pending_anchor = Some(node.start_byte());
                }
                self.visit_item(body);
                self.pending_anchor = None;
            }
        }

        self.linkage = saved;
    }

    fn visit_template(&mut self, node: Node) {
        let parameters = node.child_by_field_name("parameters");
        let (params, locations) = parameters
            .map(|p| self.template_parameters(p))
            .unwrap_or_default();

        if self.pending_anchor.is_none() {
            self.pending_anchor = Some(node.start_byte());
        }
        let depth = self.pending_templates.len();
        self.pending_templates.push(TemplateContext {
            parameters: params,
            locations,
        });

        let parameters_id = parameters.map(|p| p.id());
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if Some(child.id()) == parameters_id {
                continue;
            }
            self.visit_item(child);
        }

        self.pending_templates.truncate(depth);
        self.pending_anchor = None;
    }

    fn template_parameters(&self, list: Node) -> (Vec<TemplateParameter>, Vec<SourceLocation>) {
        let mut params = Vec::new();
        let mut locations = Vec::new();
        let mut cursor = list.walk();
        for child in list.named_children(&mut cursor) {
            if let Some((param, at)) = self.template_parameter(child) {
                params.push(param);
                locations.push(self.location(at));
            }
        }
        (params, locations)
    }

    fn template_parameter<'t>(&self, node: Node<'t>) -> Option<(TemplateParameter, Node<'t>)> {
        match node.kind() {
            "type_parameter_declaration" | "variadic_type_parameter_declaration" => {
                let name = find_named_child(node, "type_identifier");
                let mut param = TemplateParameter::new(
                    name.map(|n| self.text(n)).unwrap_or_default(),
                    TemplateParameterKind::Type,
                );
                param.is_pack = node.kind() == "variadic_type_parameter_declaration";
                Some((param, name.unwrap_or(node)))
            }
            "optional_type_parameter_declaration" => {
                let name = node.child_by_field_name("name");
                let mut param = TemplateParameter::new(
                    name.map(|n| self.text(n)).unwrap_or_default(),
                    TemplateParameterKind::Type,
                );
                param.default = node
                    .child_by_field_name("default_type")
                    .map(|d| normalize_type(&self.text(d)));
                Some((param, name.unwrap_or(node)))
            }
            "template_template_parameter_declaration" => {
                let nested = node
                    .child_by_field_name("parameters")
                    .map(|p| self.template_parameters(p).0)
                    .unwrap_or_default();
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() != "template_parameter_list")
                    .find_map(|c| self.template_parameter(c));
                let (mut param, at) = inner
                    .unwrap_or_else(|| (TemplateParameter::new("", TemplateParameterKind::Type), node));
                param.kind = TemplateParameterKind::TemplateTemplate;
                param.parameters = nested;
                Some((param, at))
            }
            "parameter_declaration"
            | "optional_parameter_declaration"
            | "variadic_parameter_declaration" => {
                let declarator = node.child_by_field_name("declarator");
                let name = declarator.and_then(declarator_name);
                let mut param = TemplateParameter::new(
                    name.map(|n| self.text(n)).unwrap_or_default(),
                    TemplateParameterKind::NonType,
                );
                let type_name = self.declared_type(node, declarator);
                param.is_pack = node.kind() == "variadic_parameter_declaration";
                param.type_name = Some(type_name.trim_end_matches("...").to_string());
                param.default = node
                    .child_by_field_name("default_value")
                    .map(|d| self.text(d).trim().to_string());
                Some((param, name.unwrap_or(node)))
            }
            _ => None,
        }
    }

    /// Remove template headers owned by templated scope components.
    ///
    /// `template<class T> void Foo<T>::bar()` names the member `Foo::bar`;
    /// the header belongs to `Foo`, not to `bar`.
    fn strip_scope_templates(
        &self,
        scope: Vec<String>,
        templates: &mut Vec<TemplateContext>,
    ) -> Vec<String> {
        scope
            .into_iter()
            .map(|component| {
                let Some((base, args)) = split_template_name(&component) else {
                    return component;
                };
                if templates.is_empty() {
                    return component;
                }
                let header = templates.remove(0);
                if header.names() == args {
                    base
                } else {
                    component
                }
            })
            .collect()
    }

    /// Split a possibly qualified name into its scope components and leaf node
    fn split_qualified<'t>(&self, node: Node<'t>) -> (Vec<String>, Node<'t>) {
        let mut scope = Vec::new();
        let mut current = node;
        while current.kind() == "qualified_identifier" {
            if let Some(s) = current.child_by_field_name("scope") {
                scope.push(normalize_type(&self.text(s)));
            }
            match current.child_by_field_name("name") {
                Some(name) => current = name,
                None => break,
            }
        }
        (scope, current)
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn visit_type_specifier(
        &mut self,
        node: Node,
        anchor: usize,
        typedef_name: Option<&str>,
        standalone: bool,
    ) -> Option<EntityId> {
        match node.kind() {
            "enum_specifier" => self.visit_enum(node, anchor, typedef_name, standalone),
            _ => self.visit_record(node, anchor, typedef_name, standalone),
        }
    }

    fn visit_record(
        &mut self,
        node: Node,
        anchor: usize,
        typedef_name: Option<&str>,
        standalone: bool,
    ) -> Option<EntityId> {
        let tag = match node.kind() {
            "class_specifier" => RecordTag::Class,
            "struct_specifier" => RecordTag::Struct,
            _ => RecordTag::Union,
        };
        let body = node.child_by_field_name("body");
        let name_node = node.child_by_field_name("name");
        if body.is_none() && (!standalone || name_node.is_none()) {
            return None;
        }

        let mut templates = std::mem::take(&mut self.pending_templates);
        if self.skips_member() {
            return None;
        }

        let (scope, name, specialized) = match name_node {
            Some(n) => {
                let (scope, leaf) = self.split_qualified(n);
                if leaf.kind() == "template_type" {
                    let base = leaf
                        .child_by_field_name("name")
                        .map(|b| self.text(b))
                        .unwrap_or_default();
                    let args = leaf
                        .child_by_field_name("arguments")
                        .map(|a| split_template_arguments(&self.text(a)))
                        .unwrap_or_default();
                    let name = format!("{}<{}>", base, args.join(","));
                    (scope, name, Some((base, args)))
                } else {
                    (scope, self.text(leaf), None)
                }
            }
            None => (
                Vec::new(),
                typedef_name.unwrap_or(ANONYMOUS).to_string(),
                None,
            ),
        };
        let scope = self.strip_scope_templates(scope, &mut templates);
        let header = templates.pop();

        let template = match (header.as_ref(), specialized) {
            (header, Some((base, arguments))) => {
                let parameters = header
                    .map(|h| h.parameters.clone())
                    .unwrap_or_default();
                let mut primary = scope.clone();
                primary.push(base);
                Some(TemplateInfo {
                    specialization: Some(SpecializationInfo {
                        primary_name: primary.join("::"),
                        arguments,
                        partial: !parameters.is_empty(),
                    }),
                    parameters,
                })
            }
            (Some(h), None) if !h.parameters.is_empty() => {
                Some(TemplateInfo::new(h.parameters.clone()))
            }
            _ => None,
        };

        let mut details = RecordDetails::new(tag);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "base_class_clause" => details.bases = self.base_specifiers(child, tag),
                "virtual_specifier" if self.text(child) == "final" => details.is_final = true,
                _ => {}
            }
        }

        let qualified = self.qualify_with(&scope, &name);
        let location = self.location(name_node.unwrap_or(node));
        let completeness = if body.is_some() {
            Completeness::Complete
        } else {
            Completeness::Incomplete
        };

        let mut entity = Entity::new(
            name.clone(),
            qualified,
            tag.kind(),
            EntityDetails::Record(details),
            location.clone(),
        )
        .with_access(self.member_access())
        .with_linkage(self.linkage)
        .with_completeness(completeness)
        .with_attributes(self.attributes(node));
        entity.internal_linkage = self.internal;
        entity.template = template;
        if body.is_some() {
            entity.definition_location = Some(location);
        }
        self.attach_comment(&mut entity, anchor, None);
        let qualified = entity.qualified_name.clone();
        let id = self.ir.add_entity(entity, self.parent);

        let Some(body) = body else {
            return Some(id);
        };

        if let Some(h) = header.as_ref() {
            self.emit_template_parameters(id, &qualified, h);
        }

        let mut components = scope;
        components.push(name.clone());
        let saved = self.enter(components, id);
        let saved_access = std::mem::replace(&mut self.access, tag.default_access());
        let saved_record = self.record.replace(RecordContext {
            base_name: name.split('<').next().unwrap_or(&name).to_string(),
            has_pure: false,
        });

        self.visit_children(body);

        let finished = std::mem::replace(&mut self.record, saved_record);
        self.access = saved_access;
        self.leave(saved);

        if finished.is_some_and(|r| r.has_pure) {
            if let Some(record) = self.ir.entity_mut(id).and_then(|e| e.record_mut()) {
                record.is_abstract = true;
            }
        }
        Some(id)
    }

    fn base_specifiers(&self, clause: Node, tag: RecordTag) -> Vec<BaseSpecifier> {
        let mut bases = Vec::new();
        let mut access = None;
        let mut is_virtual = false;

        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "access_specifier" => access = Access::from_keyword(&self.text(child)),
                "virtual" => is_virtual = true,
                "type_identifier" | "qualified_identifier" | "template_type" => {
                    let mut base = BaseSpecifier::new(
                        normalize_type(&self.text(child)),
                        access.unwrap_or_else(|| tag.default_access()),
                    );
                    base.is_virtual = is_virtual;
                    bases.push(base);
                    access = None;
                    is_virtual = false;
                }
                _ => {}
            }
        }
        bases
    }

    fn emit_template_parameters(
        &mut self,
        owner: EntityId,
        owner_qualified: &str,
        header: &TemplateContext,
    ) {
        for (param, location) in header.parameters.iter().zip(&header.locations) {
            if param.name.is_empty() {
                continue;
            }
            let entity = Entity::new(
                param.name.clone(),
                format!("{}::{}", owner_qualified, param.name),
                EntityKind::TemplateParameter,
                EntityDetails::TemplateParameter(param.clone()),
                location.clone(),
            )
            .with_linkage(self.linkage);
            self.ir.add_entity(entity, Some(owner));
        }
    }

    fn visit_enum(
        &mut self,
        node: Node,
        anchor: usize,
        typedef_name: Option<&str>,
        standalone: bool,
    ) -> Option<EntityId> {
        let body = node.child_by_field_name("body");
        let name_node = node.child_by_field_name("name");
        if body.is_none() && (!standalone || name_node.is_none()) {
            return None;
        }
        self.pending_templates.clear();
        if self.skips_member() {
            return None;
        }

        let (scope, name) = match name_node {
            Some(n) => {
                let (scope, leaf) = self.split_qualified(n);
                (scope, self.text(leaf))
            }
            None => (Vec::new(), typedef_name.unwrap_or(ANONYMOUS).to_string()),
        };

        let mut cursor = node.walk();
        let scoped = node
            .children(&mut cursor)
            .any(|c| matches!(c.kind(), "class" | "struct"));
        let details = EnumDetails {
            scoped,
            underlying_type: node
                .child_by_field_name("base")
                .map(|b| normalize_type(&self.text(b))),
        };

        let location = self.location(name_node.unwrap_or(node));
        let access = self.member_access();
        let mut entity = Entity::new(
            name.clone(),
            self.qualify_with(&scope, &name),
            EntityKind::Enum,
            EntityDetails::Enum(details),
            location.clone(),
        )
        .with_access(access)
        .with_linkage(self.linkage)
        .with_attributes(self.attributes(node));
        entity.internal_linkage = self.internal;
        if body.is_some() {
            entity.definition_location = Some(location);
        } else {
            entity.completeness = Completeness::Incomplete;
        }
        self.attach_comment(&mut entity, anchor, None);
        let id = self.ir.add_entity(entity, self.parent);

        if let Some(body) = body {
            let mut components = scope;
            components.push(name);
            let saved = self.enter(components, id);

            let mut cursor = body.walk();
            for enumerator in body.named_children(&mut cursor) {
                if enumerator.kind() != "enumerator" {
                    continue;
                }
                let Some(name_node) = enumerator.child_by_field_name("name") else {
                    continue;
                };
                let name = self.text(name_node);
                let details = EnumConstantDetails {
                    value: enumerator
                        .child_by_field_name("value")
                        .map(|v| self.text(v).trim().to_string()),
                };
                let mut constant = Entity::new(
                    name.clone(),
                    self.qualify_with(&[], &name),
                    EntityKind::EnumConstant,
                    EntityDetails::EnumConstant(details),
                    self.location(name_node),
                )
                .with_access(access)
                .with_linkage(self.linkage);
                constant.internal_linkage = self.internal;
                self.attach_comment(
                    &mut constant,
                    enumerator.start_byte(),
                    Some(enumerator.end_byte()),
                );
                self.ir.add_entity(constant, self.parent);
            }

            self.leave(saved);
        }
        Some(id)
    }

    fn visit_typedef(&mut self, node: Node, anchor: usize) {
        self.pending_templates.clear();
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        let first_name = declarators
            .first()
            .and_then(|d| declarator_name(*d))
            .map(|n| self.text(n));

        // `typedef struct { ... } Name;` names the record itself
        let mut named_by_typedef = false;
        if let Some(type_node) = node.child_by_field_name("type") {
            if is_type_specifier(type_node.kind())
                && type_node.child_by_field_name("body").is_some()
            {
                let anonymous = type_node.child_by_field_name("name").is_none();
                let alias = if anonymous { first_name.as_deref() } else { None };
                self.visit_type_specifier(type_node, anchor, alias, false);
                named_by_typedef = anonymous
                    && declarators
                        .first()
                        .is_some_and(|d| d.kind() == "type_identifier");
            }
        }

        for (i, declarator) in declarators.iter().enumerate() {
            if i == 0 && named_by_typedef {
                continue;
            }
            if self.skips_member() {
                continue;
            }
            let Some(name_node) = declarator_name(*declarator) else {
                continue;
            };
            let name = self.text(name_node);
            let underlying = self.declared_type(node, Some(*declarator));
            let mut entity = Entity::new(
                name.clone(),
                self.qualify_with(&[], &name),
                EntityKind::Typedef,
                EntityDetails::Typedef(TypedefDetails::new(underlying)),
                self.location(name_node),
            )
            .with_access(self.member_access())
            .with_linkage(self.linkage);
            entity.internal_linkage = self.internal;
            self.attach_comment(&mut entity, anchor, Some(node.end_byte()));
            self.ir.add_entity(entity, self.parent);
        }
    }

    fn visit_alias(&mut self, node: Node, anchor: usize) {
        let header = std::mem::take(&mut self.pending_templates).pop();
        if self.skips_member() {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let underlying = node
            .child_by_field_name("type")
            .map(|t| normalize_type(&self.text(t)))
            .unwrap_or_default();

        let mut details = TypedefDetails::new(underlying);
        details.is_alias = true;
        let mut entity = Entity::new(
            name.clone(),
            self.qualify_with(&[], &name),
            EntityKind::Typedef,
            EntityDetails::Typedef(details),
            self.location(name_node),
        )
        .with_access(self.member_access())
        .with_linkage(self.linkage)
        .with_attributes(self.attributes(node));
        entity.internal_linkage = self.internal;
        if let Some(h) = header.filter(|h| !h.parameters.is_empty()) {
            entity.template = Some(TemplateInfo::new(h.parameters));
        }
        self.attach_comment(&mut entity, anchor, Some(node.end_byte()));
        self.ir.add_entity(entity, self.parent);
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn visit_declaration(&mut self, node: Node, anchor: usize) {
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();

        if let Some(type_node) = node.child_by_field_name("type") {
            if is_type_specifier(type_node.kind()) {
                let standalone = declarators.is_empty();
                if standalone || type_node.child_by_field_name("body").is_some() {
                    self.visit_type_specifier(type_node, anchor, None, standalone);
                }
            }
        }

        for declarator in declarators {
            match function_shape(declarator) {
                Some(shape) => self.build_function(node, shape, anchor),
                None => self.build_data(node, declarator, anchor),
            }
        }
    }

    fn visit_function_definition(&mut self, node: Node, anchor: usize) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        if let Some(shape) = function_shape(declarator) {
            self.build_function(node, shape, anchor);
        }
    }

    fn specifiers(&self, node: Node) -> Specifiers {
        let mut spec = Specifiers::default();
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return spec;
        }
        loop {
            let child = cursor.node();
            let skip = matches!(
                cursor.field_name(),
                Some("declarator" | "body" | "type" | "default_value")
            );
            if !skip {
                if child.kind() == "explicit_function_specifier" {
                    spec.is_explicit = true;
                }
                match self.text(child).as_str() {
                    "static" => spec.is_static = true,
                    "inline" => spec.is_inline = true,
                    "virtual" => spec.is_virtual = true,
                    "constexpr" | "consteval" => spec.is_constexpr = true,
                    "extern" => spec.is_extern = true,
                    "mutable" => spec.is_mutable = true,
                    "const" => spec.is_const = true,
                    _ => {}
                }
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        spec
    }

    /// Type and cv-qualifiers of a declaration, in source order
    fn specifier_text(&self, node: Node) -> String {
        let mut parts = Vec::new();
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return String::new();
        }
        loop {
            let child = cursor.node();
            if cursor.field_name() == Some("type") {
                parts.push(self.type_text(child));
            } else if child.kind() == "type_qualifier" {
                let text = self.text(child);
                if !matches!(text.as_str(), "constexpr" | "consteval" | "constinit") {
                    parts.push(text);
                }
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        parts.join(" ")
    }

    /// Spelling of a type specifier; record and enum bodies are left out
    fn type_text(&self, node: Node) -> String {
        if is_type_specifier(node.kind()) {
            let keyword = node
                .child(0)
                .map(|k| self.text(k))
                .unwrap_or_default();
            let name = node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_else(|| ANONYMOUS.to_string());
            format!("{} {}", keyword, name)
        } else {
            self.text(node)
        }
    }

    /// Declared type of one declarator: specifiers plus the declarator with its name removed
    fn declared_type(&self, node: Node, declarator: Option<Node>) -> String {
        let mut text = self.specifier_text(node);
        if let Some(mut d) = declarator {
            if d.kind() == "init_declarator" {
                if let Some(inner) = d.child_by_field_name("declarator") {
                    d = inner;
                }
            }
            let rest = match declarator_name(d) {
                Some(name) => {
                    let before = &self.source[d.start_byte()..name.start_byte()];
                    let after = &self.source[name.end_byte()..d.end_byte()];
                    format!(
                        "{}{}",
                        String::from_utf8_lossy(before),
                        String::from_utf8_lossy(after)
                    )
                }
                None => self.text(d),
            };
            text.push(' ');
            text.push_str(&rest);
        }
        normalize_type(&text)
    }

    fn attributes(&self, node: Node) -> Vec<Attribute> {
        let mut attrs = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let text = self.text(child);
            let inner = match child.kind() {
                "attribute_declaration" => text
                    .trim()
                    .strip_prefix("[[")
                    .and_then(|t| t.strip_suffix("]]")),
                "attribute_specifier" => text
                    .trim()
                    .strip_prefix("__attribute__")
                    .map(str::trim)
                    .and_then(|t| t.strip_prefix("(("))
                    .and_then(|t| t.strip_suffix("))")),
                "ms_declspec_modifier" => text
                    .trim()
                    .strip_prefix("__declspec")
                    .map(str::trim)
                    .and_then(|t| t.strip_prefix('('))
                    .and_then(|t| t.strip_suffix(')')),
                _ => None,
            };
            if let Some(inner) = inner {
                attrs.extend(parse_attribute_list(inner));
            }
        }
        attrs
    }

    fn parameters(&self, list: Node) -> (Vec<Parameter>, bool) {
        let mut params = Vec::new();
        let mut variadic = false;

        let mut cursor = list.walk();
        for child in list.children(&mut cursor) {
            match child.kind() {
                "parameter_declaration"
                | "optional_parameter_declaration"
                | "variadic_parameter_declaration" => {
                    let declarator = child.child_by_field_name("declarator");
                    let name = declarator
                        .and_then(declarator_name)
                        .map(|n| self.text(n))
                        .unwrap_or_default();
                    let mut param = Parameter::new(name, self.declared_type(child, declarator));
                    param.default_value = child
                        .child_by_field_name("default_value")
                        .map(|d| self.text(d).trim().to_string());
                    param.is_pack = child.kind() == "variadic_parameter_declaration";
                    params.push(param);
                }
                "..." | "variadic_parameter" => variadic = true,
                _ => {}
            }
        }

        // `f(void)` declares no parameters
        if params.len() == 1 && params[0].name.is_empty() && params[0].type_name == "void" {
            params.clear();
        }
        (params, variadic)
    }

    fn build_function(&mut self, node: Node, shape: FunctionShape, anchor: usize) {
        let mut templates = std::mem::take(&mut self.pending_templates);
        let (scope, leaf) = self.split_qualified(shape.name);

        let (name, mut role, explicit_args) = match leaf.kind() {
            "destructor_name" => (
                self.text(leaf).split_whitespace().collect::<String>(),
                FunctionRole::Destructor,
                None,
            ),
            "operator_name" => (
                operator_name(&self.text(leaf)),
                FunctionRole::Operator,
                None,
            ),
            "operator_cast" => {
                let end = shape
                    .declarator
                    .child_by_field_name("parameters")
                    .map_or(shape.declarator.start_byte(), |p| p.start_byte())
                    .max(leaf.start_byte());
                let spelled = String::from_utf8_lossy(&self.source[leaf.start_byte()..end]);
                (
                    normalize_type(&spelled),
                    FunctionRole::Conversion,
                    None,
                )
            }
            "template_function" => (
                leaf.child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or_default(),
                FunctionRole::Ordinary,
                leaf.child_by_field_name("arguments")
                    .map(|a| split_template_arguments(&self.text(a))),
            ),
            _ => (self.text(leaf), FunctionRole::Ordinary, None),
        };

        if role == FunctionRole::Ordinary && node.child_by_field_name("type").is_none() {
            let owner = match scope.last() {
                Some(component) => Some(component.split('<').next().unwrap_or("").to_string()),
                None => self.record.as_ref().map(|r| r.base_name.clone()),
            };
            if owner.as_deref() == Some(name.as_str()) {
                role = FunctionRole::Constructor;
            }
        }

        let scope = self.strip_scope_templates(scope, &mut templates);
        let header = templates.pop();
        let is_member = scope.is_empty() && self.record.is_some();
        let spec = self.specifiers(node);

        let mut details = FunctionDetails {
            role,
            is_definition: node.kind() == "function_definition",
            is_static: spec.is_static,
            is_inline: spec.is_inline,
            is_constexpr: spec.is_constexpr,
            scope_qualifier: (!scope.is_empty()).then(|| scope.join("::")),
            ..Default::default()
        };
        details.flags.is_virtual = spec.is_virtual;
        details.flags.is_explicit = spec.is_explicit;

        if let Some(list) = shape.declarator.child_by_field_name("parameters") {
            let (parameters, variadic) = self.parameters(list);
            details.parameters = parameters;
            details.is_variadic = variadic;
        }

        let mut trailing_return = None;
        let mut cursor = shape.declarator.walk();
        for child in shape.declarator.children(&mut cursor) {
            let text = self.text(child);
            match child.kind() {
                "type_qualifier" if text == "const" => details.is_const = true,
                "ref_qualifier" | "&" | "&&" => {
                    details.ref_qualifier = RefQualifier::from_token(&text)
                }
                "virtual_specifier" => match text.as_str() {
                    "override" => details.flags.is_override = true,
                    "final" => details.flags.is_final = true,
                    _ => {}
                },
                "noexcept" => details.is_noexcept = !text.contains("false"),
                "trailing_return_type" => {
                    trailing_return = Some(normalize_type(text.trim_start_matches("->")))
                }
                _ => {}
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "pure_virtual_clause" => details.flags.is_pure = true,
                "default_method_clause" => details.flags.is_defaulted = true,
                "delete_method_clause" => details.flags.is_deleted = true,
                _ => {}
            }
        }
        if node
            .child_by_field_name("default_value")
            .is_some_and(|v| self.text(v).trim() == "0")
        {
            details.flags.is_pure = true;
        }
        if details.flags.is_defaulted || details.flags.is_deleted {
            details.is_definition = true;
        }

        details.return_type = match role {
            FunctionRole::Constructor | FunctionRole::Destructor | FunctionRole::Conversion => None,
            _ => trailing_return
                .or_else(|| {
                    let written = normalize_type(&format!(
                        "{} {}",
                        self.specifier_text(node),
                        shape.return_suffix
                    ));
                    (!written.is_empty()).then_some(written)
                })
                .filter(|t| t != "void"),
        };

        if is_member && details.flags.is_pure {
            if let Some(record) = self.record.as_mut() {
                record.has_pure = true;
            }
        }
        if is_member && self.skips_member() {
            return;
        }

        let template = match (header.as_ref(), explicit_args) {
            (h, Some(arguments)) => Some(TemplateInfo {
                parameters: h.map(|h| h.parameters.clone()).unwrap_or_default(),
                specialization: Some(SpecializationInfo {
                    primary_name: name.clone(),
                    arguments,
                    partial: false,
                }),
            }),
            (Some(h), None) if h.parameters.is_empty() => Some(TemplateInfo {
                parameters: Vec::new(),
                specialization: Some(SpecializationInfo {
                    primary_name: name.clone(),
                    arguments: Vec::new(),
                    partial: false,
                }),
            }),
            (Some(h), None) => Some(TemplateInfo::new(h.parameters.clone())),
            (None, None) => None,
        };

        let kind = if is_member {
            EntityKind::Method
        } else {
            EntityKind::Function
        };
        let location = self.location(shape.name);
        let qualified = self.qualify_with(&scope, &name);
        let is_definition = details.is_definition;
        let internal = self.internal || (spec.is_static && self.record.is_none());

        let mut attributes = self.attributes(node);
        attributes.extend(self.attributes(shape.declarator));

        let mut entity = Entity::new(
            name,
            qualified.clone(),
            kind,
            EntityDetails::Function(details),
            location.clone(),
        )
        .with_access(if is_member { self.access } else { Access::None })
        .with_linkage(self.linkage)
        .with_attributes(attributes);
        entity.internal_linkage = internal;
        entity.template = template;
        if is_definition {
            entity.definition_location = Some(location);
        }
        self.attach_comment(&mut entity, anchor, Some(node.end_byte()));
        let id = self.ir.add_entity(entity, self.parent);

        if let Some(h) = header.as_ref() {
            self.emit_template_parameters(id, &qualified, h);
        }
    }

    /// A field (inside a record) or a variable (at namespace scope)
    fn build_data(&mut self, node: Node, declarator: Node, anchor: usize) {
        let header = std::mem::take(&mut self.pending_templates).pop();
        let Some(name_node) = declarator_name(declarator) else {
            return;
        };
        let (scope, leaf) = self.split_qualified(name_node);
        let name = self.text(leaf);
        let qualified = self.qualify_with(&scope, &name);
        let type_name = self.declared_type(node, Some(declarator));
        let spec = self.specifiers(node);
        let initializer = if declarator.kind() == "init_declarator" {
            declarator
                .child_by_field_name("value")
                .map(|v| self.text(v).trim().to_string())
        } else {
            None
        };
        let location = self.location(name_node);

        let is_field = self.record.is_some() && scope.is_empty();
        if is_field && self.skips_member() {
            return;
        }

        let (kind, details) = if is_field {
            let mut details = FieldDetails::new(type_name.clone());
            details.is_const = spec.is_const;
            details.is_mutable = spec.is_mutable;
            details.is_static = spec.is_static;
            details.default_value = node
                .child_by_field_name("default_value")
                .map(|v| self.text(v).trim().to_string())
                .or(initializer);

            let mut cursor = node.walk();
            let clause = node
                .children(&mut cursor)
                .find(|c| c.kind() == "bitfield_clause");
            if let Some(clause) = clause {
                details.bit_width = self.bit_width(clause, &type_name, &qualified, &location);
            }
            (EntityKind::Field, EntityDetails::Field(details))
        } else {
            let mut details = VariableDetails::new(type_name);
            details.is_const = spec.is_const;
            details.is_constexpr = spec.is_constexpr;
            details.is_static = spec.is_static;
            details.is_extern = spec.is_extern;
            details.initializer = initializer;
            (EntityKind::Variable, EntityDetails::Variable(details))
        };

        let mut entity = Entity::new(name, qualified, kind, details, location)
            .with_access(if is_field { self.access } else { Access::None })
            .with_linkage(self.linkage)
            .with_attributes(self.attributes(node));
        entity.internal_linkage =
            self.internal || (spec.is_static && self.record.is_none() && scope.is_empty());
        if let Some(h) = header.filter(|h| !h.parameters.is_empty()) {
            entity.template = Some(TemplateInfo::new(h.parameters));
        }
        self.attach_comment(&mut entity, anchor, Some(node.end_byte()));
        self.ir.add_entity(entity, self.parent);
    }

    /// Width of a bit-field: a positive integer literal that fits the type
    fn bit_width(
        &mut self,
        clause: Node,
        type_name: &str,
        qualified: &str,
        location: &SourceLocation,
    ) -> Option<u32> {
        let written = clause
            .named_child(0)
            .map(|e| self.text(e))
            .unwrap_or_default();
        let limit = builtin_bit_width(type_name);

        match parse_integer(&written) {
            Some(width) if width > 0 && limit.map_or(width <= u32::MAX as i64, |l| width <= l as i64) => {
                Some(width as u32)
            }
            _ => {
                self.ir.add_diagnostic(
                    Diagnostic::warning(
                        DiagnosticKind::InvalidBitField,
                        format!(
                            "invalid bit-field width '{}' for type '{}'",
                            written.trim(),
                            type_name
                        ),
                    )
                    .at(location.clone())
                    .for_entity(qualified),
                );
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Preprocessor
    // ------------------------------------------------------------------

    fn visit_conditional(&mut self, node: Node) {
        let taken = match node.kind() {
            "preproc_ifdef" | "preproc_elifdef" => {
                let negate = node
                    .child(0)
                    .is_some_and(|t| self.text(t).contains("ndef"));
                let defined = node
                    .child_by_field_name("name")
                    .is_some_and(|n| self.preprocessor.is_defined(self.text(n).trim()));
                defined != negate
            }
            _ => match node.child_by_field_name("condition") {
                Some(condition) => match self.preprocessor.evaluate(condition, self.source) {
                    Some(value) => value != 0,
                    None => {
                        let written = self.text(condition);
                        let location = self.location(condition);
                        self.ir.add_diagnostic(
                            Diagnostic::new(
                                Severity::Note,
                                DiagnosticKind::Preprocessor,
                                format!("cannot evaluate '{}', assuming true", written.trim()),
                            )
                            .at(location),
                        );
                        true
                    }
                },
                None => true,
            },
        };

        if taken {
            self.visit_branch(node);
        } else if let Some(alternative) = node.child_by_field_name("alternative") {
            match alternative.kind() {
                "preproc_else" => self.visit_branch(alternative),
                _ => self.visit_conditional(alternative),
            }
        }
    }

    fn visit_branch(&mut self, node: Node) {
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return;
        }
        loop {
            let child = cursor.node();
            if !matches!(
                cursor.field_name(),
                Some("condition" | "name" | "alternative")
            ) {
                self.visit_item(child);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    fn visit_include(&mut self, node: Node) {
        let Some(path) = node.child_by_field_name("path") else {
            return;
        };
        let written = self.text(path);
        self.ir.includes.push(IncludeDirective {
            path: written
                .trim()
                .trim_matches(|c| c == '"' || c == '<' || c == '>')
                .to_string(),
            system: path.kind() == "system_lib_string",
            line: node.start_position().row + 1,
        });
    }

    fn visit_define(&mut self, node: Node) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let value = if node.kind() == "preproc_def" {
            node.child_by_field_name("value")
                .map(|v| self.text(v).trim().to_string())
                .filter(|v| !v.is_empty())
        } else {
            None
        };
        let name = self.text(name);
        self.preprocessor.define(name, value);
    }

    fn visit_preproc_call(&mut self, node: Node) {
        let directive = node
            .child_by_field_name("directive")
            .map(|d| self.text(d))
            .unwrap_or_default();
        if directive.trim() != "#undef" {
            return;
        }
        if let Some(argument) = node.child_by_field_name("argument") {
            let name = self.text(argument);
            self.preprocessor.undefine(name.trim());
        }
    }
}

fn is_type_specifier(kind: &str) -> bool {
    matches!(
        kind,
        "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
    )
}

fn find_named_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn collect_namespace_identifiers<'t>(
    node: Node<'t>,
    source: &[u8],
    out: &mut Vec<(String, Node<'t>)>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "namespace_identifier" | "identifier" => {
                out.push((child.utf8_text(source).unwrap_or("").to_string(), child))
            }
            "nested_namespace_specifier" => collect_namespace_identifiers(child, source, out),
            _ => {}
        }
    }
}

/// Leaf name node of a declarator
fn declarator_name(node: Node) -> Option<Node> {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier"
        | "destructor_name" | "operator_name" | "template_function" | "operator_cast" => {
            Some(node)
        }
        "init_declarator" | "pointer_declarator" | "array_declarator" | "function_declarator"
        | "attributed_declarator" => node
            .child_by_field_name("declarator")
            .and_then(declarator_name),
        "reference_declarator" | "parenthesized_declarator" | "variadic_declarator" => {
            let mut cursor = node.walk();
            let found = node
                .named_children(&mut cursor)
                .find_map(declarator_name);
            found
        }
        _ => None,
    }
}

/// Find the function declarator under a declarator, collecting the pointer
/// and reference tokens on the way. Function pointers are not functions.
fn function_shape(declarator: Node) -> Option<FunctionShape> {
    let mut suffix = String::new();
    let mut current = declarator;
    loop {
        match current.kind() {
            "function_declarator" => {
                let name = current.child_by_field_name("declarator")?;
                if name.kind() == "parenthesized_declarator" {
                    return None;
                }
                return Some(FunctionShape {
                    declarator: current,
                    name,
                    return_suffix: suffix,
                });
            }
            "operator_cast" => {
                return Some(FunctionShape {
                    declarator: cast_function_declarator(current)?,
                    name: current,
                    return_suffix: suffix,
                });
            }
            "qualified_identifier" => {
                let mut leaf = current;
                while leaf.kind() == "qualified_identifier" {
                    leaf = leaf.child_by_field_name("name")?;
                }
                if leaf.kind() != "operator_cast" {
                    return None;
                }
                return Some(FunctionShape {
                    declarator: cast_function_declarator(leaf)?,
                    name: current,
                    return_suffix: suffix,
                });
            }
            "init_declarator" | "attributed_declarator" => {
                current = current.child_by_field_name("declarator")?
            }
            "pointer_declarator" => {
                suffix.push('*');
                current = current.child_by_field_name("declarator")?;
            }
            "reference_declarator" => {
                if let Some(token) = current.child(0) {
                    suffix.push_str(token.kind());
                }
                current = current.named_child(current.named_child_count().checked_sub(1)?)?;
            }
            _ => return None,
        }
    }
}

/// The abstract function declarator of a conversion operator
fn cast_function_declarator(cast: Node) -> Option<Node> {
    let mut current = cast.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "abstract_function_declarator" | "function_declarator" => return Some(current),
            _ => current = current.child_by_field_name("declarator")?,
        }
    }
}

/// `operator ==` => `operator==`, `operator  new [ ]` => `operator new[]`
fn operator_name(written: &str) -> String {
    let rest = written.trim().trim_start_matches("operator").trim();
    if rest.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        format!("operator {}", normalize_type(rest))
    } else {
        format!("operator{}", rest.split_whitespace().collect::<String>())
    }
}

/// `Foo<T, U>` => (`Foo`, [`T`, `U`])
fn split_template_name(component: &str) -> Option<(String, Vec<String>)> {
    let open = component.find('<')?;
    if !component.ends_with('>') {
        return None;
    }
    Some((
        component[..open].to_string(),
        split_template_arguments(&component[open..]),
    ))
}

/// Split the inside of an attribute list into key/value pairs.
///
/// `deprecated("use bar"), gnu::cold` yields `deprecated => "use bar"` and
/// `gnu::cold => ""`. Values are kept verbatim.
fn parse_attribute_list(inner: &str) -> Vec<Attribute> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut current = String::new();
    let mut prev = '\0';

    for ch in inner.chars() {
        match ch {
            '"' if prev != '\\' => in_string = !in_string,
            '(' | '[' | '{' if !in_string => depth += 1,
            ')' | ']' | '}' if !in_string => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_string => {
                items.push(std::mem::take(&mut current));
                prev = ch;
                continue;
            }
            _ => {}
        }
        current.push(ch);
        prev = ch;
    }
    items.push(current);

    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| match item.find('(') {
            Some(open) if item.ends_with(')') => Attribute::new(
                normalize_type(&item[..open]),
                item[open + 1..item.len() - 1].trim(),
            ),
            _ => Attribute::new(normalize_type(item), ""),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cppmodel_api::ParamDirection;
    use tree_sitter::Parser;

    fn build_with(source: &str, config: &ParserConfig) -> UnitIR {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_cpp::language()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        let root = tree.root_node();
        let mut visitor = CppVisitor::new(
            0,
            Path::new("test.hpp"),
            source,
            root,
            &config.compiler,
            config,
        );
        visitor.visit(root);
        visitor.into_ir()
    }

    fn build(source: &str) -> UnitIR {
        build_with(source, &ParserConfig::default())
    }

    fn find<'a>(ir: &'a UnitIR, qualified: &str) -> &'a Entity {
        ir.find(qualified)
            .next()
            .unwrap_or_else(|| panic!("no entity named {}", qualified))
    }

    #[test]
    fn test_namespace_class_and_access() {
        let source = r#"
namespace geo {
class Shape {
public:
    virtual ~Shape();
    virtual double area() const = 0;
protected:
    int id_;
private:
    int secret_;
};
}
"#;
        let ir = build(source);

        let ns = find(&ir, "geo");
        assert_eq!(ns.kind, EntityKind::Namespace);

        let shape = find(&ir, "geo::Shape");
        assert_eq!(shape.kind, EntityKind::Class);
        assert!(shape.is_complete());
        assert!(shape.record().unwrap().is_abstract);
        assert_eq!(shape.children.len(), 4);

        let area = find(&ir, "geo::Shape::area");
        assert_eq!(area.kind, EntityKind::Method);
        assert_eq!(area.access, Access::Public);
        let func = area.function().unwrap();
        assert!(func.is_const);
        assert!(func.flags.is_virtual);
        assert!(func.flags.is_pure);
        assert_eq!(func.return_type.as_deref(), Some("double"));

        let dtor = find(&ir, "geo::Shape::~Shape");
        assert_eq!(dtor.function().unwrap().role, FunctionRole::Destructor);
        assert_eq!(dtor.function().unwrap().return_type, None);

        assert_eq!(find(&ir, "geo::Shape::id_").access, Access::Protected);
        assert_eq!(find(&ir, "geo::Shape::secret_").access, Access::Private);
    }

    #[test]
    fn test_struct_default_access_and_bases() {
        let source = r#"
struct A {};
class B : public virtual A {};
struct C : A {};
class D : B, protected C {};
"#;
        let ir = build(source);

        let b = find(&ir, "B").record().unwrap();
        assert_eq!(b.bases.len(), 1);
        assert!(b.bases[0].is_virtual);
        assert_eq!(b.bases[0].access, Access::Public);

        let c = find(&ir, "C").record().unwrap();
        assert_eq!(c.bases[0].access, Access::Public);

        let d = find(&ir, "D").record().unwrap();
        assert_eq!(d.bases[0].name, "B");
        assert_eq!(d.bases[0].access, Access::Private);
        assert_eq!(d.bases[1].access, Access::Protected);
    }

    #[test]
    fn test_forward_declaration_is_incomplete() {
        let ir = build("class Opaque;\nstruct Opaque* make();\n");
        let opaque: Vec<_> = ir.find("Opaque").collect();
        assert_eq!(opaque.len(), 1);
        assert_eq!(opaque[0].completeness, Completeness::Incomplete);
        assert!(opaque[0].children.is_empty());

        let make = find(&ir, "make");
        assert_eq!(
            make.function().unwrap().return_type.as_deref(),
            Some("struct Opaque*")
        );
    }

    #[test]
    fn test_linkage_block_reaches_nested_namespaces() {
        let source = r#"
extern "C" {
namespace api {
void open(int fd);
}
int flag;
}
void cpp_side();
"#;
        let ir = build(source);
        assert_eq!(find(&ir, "api::open").linkage, Linkage::C);
        assert_eq!(find(&ir, "flag").linkage, Linkage::C);
        assert_eq!(find(&ir, "cpp_side").linkage, Linkage::Default);
    }

    #[test]
    fn test_bitfields() {
        let source = r#"
struct Flags {
    unsigned mode : 2;
    unsigned level : 6;
    int count;
    unsigned char wide : 9;
};
"#;
        let ir = build(source);
        assert_eq!(find(&ir, "Flags::mode").bit_width(), Some(2));
        assert_eq!(find(&ir, "Flags::level").bit_width(), Some(6));
        assert_eq!(find(&ir, "Flags::count").bit_width(), None);
        assert_eq!(find(&ir, "Flags::wide").bit_width(), None);

        assert_eq!(ir.diagnostics.len(), 1);
        assert_eq!(ir.diagnostics[0].kind, DiagnosticKind::InvalidBitField);
    }

    #[test]
    fn test_out_of_line_definition() {
        let source = r#"
class Widget {
public:
    void resize(int w, int h) const;
};

void Widget::resize(int w, int h) const {}
"#;
        let ir = build(source);
        let all: Vec<_> = ir.find("Widget::resize").collect();
        assert_eq!(all.len(), 2);

        assert_eq!(all[0].kind, EntityKind::Method);
        assert!(!all[0].function().unwrap().is_definition);

        assert_eq!(all[1].kind, EntityKind::Function);
        let def = all[1].function().unwrap();
        assert!(def.is_definition);
        assert!(def.is_const);
        assert_eq!(def.scope_qualifier.as_deref(), Some("Widget"));
        assert_eq!(all[0].signature_key(), all[1].signature_key());
    }

    #[test]
    fn test_constructor_roles_and_flags() {
        let source = r#"
class Buffer {
public:
    explicit Buffer(int size);
    Buffer(const Buffer&) = delete;
    Buffer& operator=(const Buffer& other);
    operator bool() const;
};
"#;
        let ir = build(source);
        let ctors: Vec<_> = ir.find("Buffer::Buffer").collect();
        assert_eq!(ctors.len(), 2);
        let explicit = ctors[0].function().unwrap();
        assert_eq!(explicit.role, FunctionRole::Constructor);
        assert!(explicit.flags.is_explicit);
        assert!(ctors[1].function().unwrap().flags.is_deleted);

        let assign = find(&ir, "Buffer::operator=");
        assert_eq!(assign.function().unwrap().role, FunctionRole::Operator);
        assert_eq!(
            assign.function().unwrap().return_type.as_deref(),
            Some("Buffer&")
        );
    }

    #[test]
    fn test_ref_qualified_overloads() {
        let source = r#"
struct Holder {
    int& get() &;
    int get() &&;
};
"#;
        let ir = build(source);
        let gets: Vec<_> = ir.find("Holder::get").collect();
        assert_eq!(gets.len(), 2);
        assert_eq!(gets[0].function().unwrap().ref_qualifier, RefQualifier::LValue);
        assert_eq!(gets[1].function().unwrap().ref_qualifier, RefQualifier::RValue);
        assert_ne!(gets[0].signature_key(), gets[1].signature_key());
    }

    #[test]
    fn test_class_template_and_specializations() {
        let source = r#"
template <typename T, int N = 4>
class Array {
    T data[N];
};

template <typename T>
class Array<T*, 4> {};

template <>
class Array<bool, 8> {};
"#;
        let ir = build(source);

        let primary = find(&ir, "Array");
        assert!(primary.is_template());
        let info = primary.template.as_ref().unwrap();
        assert_eq!(info.parameter_names(), vec!["T", "N"]);
        assert_eq!(info.parameters[1].kind, TemplateParameterKind::NonType);
        assert_eq!(info.parameters[1].type_name.as_deref(), Some("int"));
        assert_eq!(info.parameters[1].default.as_deref(), Some("4"));

        // template parameters come first among the children
        let first_child = ir.entity(primary.children[0]).unwrap();
        assert_eq!(first_child.kind, EntityKind::TemplateParameter);
        assert_eq!(first_child.qualified_name, "Array::T");

        let partial = find(&ir, "Array<T*,4>");
        let spec = partial.template.as_ref().unwrap().specialization.as_ref().unwrap();
        assert!(spec.partial);
        assert_eq!(spec.primary_name, "Array");
        assert_eq!(spec.arguments, vec!["T*", "4"]);

        let full = find(&ir, "Array<bool,8>");
        let spec = full.template.as_ref().unwrap().specialization.as_ref().unwrap();
        assert!(!spec.partial);
        assert!(full.template.as_ref().unwrap().parameters.is_empty());
    }

    #[test]
    fn test_out_of_line_member_of_class_template() {
        let source = r#"
template <typename T>
class Stack {
    void push(T value);
};

template <typename T>
void Stack<T>::push(T value) {}
"#;
        let ir = build(source);
        let pushes: Vec<_> = ir.find("Stack::push").collect();
        assert_eq!(pushes.len(), 2);
        assert!(pushes[1].template.is_none());
        assert_eq!(
            pushes[1].function().unwrap().scope_qualifier.as_deref(),
            Some("Stack")
        );
    }

    #[test]
    fn test_function_template_and_explicit_specialization() {
        let source = r#"
template <class T>
T largest(T a, T b);

template <>
int largest<int>(int a, int b);
"#;
        let ir = build(source);
        let all: Vec<_> = ir.find("largest").collect();
        assert_eq!(all.len(), 2);
        assert!(all[0].is_template());
        assert!(all[1].is_specialization());
        assert_ne!(all[0].signature_key(), all[1].signature_key());
        assert_eq!(find(&ir, "largest::T").kind, EntityKind::TemplateParameter);
    }

    #[test]
    fn test_enum_constants() {
        let source = r#"
enum class Color : unsigned char {
    Red = 1,
    Green, ///< The green one
    Blue
};
enum Legacy { A, B };
"#;
        let ir = build(source);
        let color = find(&ir, "Color");
        let details = color.enumeration().unwrap();
        assert!(details.scoped);
        assert_eq!(details.underlying_type.as_deref(), Some("unsigned char"));
        assert_eq!(color.children.len(), 3);

        let red = find(&ir, "Color::Red");
        assert_eq!(red.enum_constant().unwrap().value.as_deref(), Some("1"));
        let green = find(&ir, "Color::Green");
        assert_eq!(
            green.doc.as_ref().unwrap().summary.as_deref(),
            Some("The green one")
        );

        assert!(!find(&ir, "Legacy").enumeration().unwrap().scoped);
        assert_eq!(find(&ir, "Legacy::B").kind, EntityKind::EnumConstant);
    }

    #[test]
    fn test_documentation_and_parameter_warnings() {
        let source = r#"
/// Adds two numbers.
/// @param[in] a First operand.
/// @param[out] sum Result.
int add(int a, int b, int* sum);
"#;
        let ir = build(source);
        let add = find(&ir, "add");
        let doc = add.doc.as_ref().unwrap();
        assert_eq!(doc.summary.as_deref(), Some("Adds two numbers."));
        assert_eq!(doc.params.len(), 3);
        assert_eq!(doc.param("sum").unwrap().direction, ParamDirection::Out);
        assert!(!doc.param("b").unwrap().documented);

        assert_eq!(add.diagnostics.len(), 1);
        assert_eq!(add.diagnostics[0].kind, DiagnosticKind::CommentWarning);
        assert_eq!(add.diagnostics[0].entity.as_deref(), Some("add"));
    }

    #[test]
    fn test_comment_goes_to_first_of_adjacent_overloads() {
        let source = r#"
/// Prints an integer.
void print(int value);
void print(double value);
"#;
        let ir = build(source);
        let prints: Vec<_> = ir.find("print").collect();
        assert!(prints[0].doc.is_some());
        assert!(prints[1].doc.is_none());
    }

    #[test]
    fn test_template_doc_anchor_is_template_header() {
        let source = r#"
/// Holds one value.
/// @tparam T Stored type.
template <typename T>
struct Box {
    T value;
};
"#;
        let ir = build(source);
        let doc = find(&ir, "Box").doc.as_ref().unwrap();
        assert_eq!(doc.template_param("T").unwrap().text, "Stored type.");
    }

    #[test]
    fn test_preprocessor_branches() {
        let source = r#"
#ifdef FEATURE
void feature();
#else
void fallback();
#endif
#if __cplusplus >= 201703L
void modern();
#endif
"#;
        let ir = build(source);
        assert_eq!(ir.find("feature").count(), 0);
        assert_eq!(ir.find("fallback").count(), 1);
        assert_eq!(ir.find("modern").count(), 1);

        let config = ParserConfig::default()
            .with_compiler(CompilerConfig::default().with_define("FEATURE", None));
        let ir = build_with(source, &config);
        assert_eq!(ir.find("feature").count(), 1);
        assert_eq!(ir.find("fallback").count(), 0);
    }

    #[test]
    fn test_define_in_source_controls_later_branches() {
        let source = "#define USE_FAST 1\n#if USE_FAST\nvoid fast();\n#endif\n#undef USE_FAST\n#ifdef USE_FAST\nvoid never();\n#endif\n";
        let ir = build(source);
        assert_eq!(ir.find("fast").count(), 1);
        assert_eq!(ir.find("never").count(), 0);
    }

    #[test]
    fn test_includes_are_recorded() {
        let ir = build("#include \"local.h\"\n#include <vector>\n");
        assert_eq!(ir.includes.len(), 2);
        assert_eq!(ir.includes[0].path, "local.h");
        assert!(!ir.includes[0].system);
        assert_eq!(ir.includes[1].path, "vector");
        assert!(ir.includes[1].system);
    }

    #[test]
    fn test_typedefs_and_aliases() {
        let source = r#"
typedef struct {
    int x;
    int y;
} Point;
typedef void (*Callback)(int);
using Size = unsigned long;
"#;
        let ir = build(source);
        let point = find(&ir, "Point");
        assert_eq!(point.kind, EntityKind::Struct);
        assert_eq!(point.children.len(), 2);
        assert_eq!(ir.find("Point").count(), 1);

        let callback = find(&ir, "Callback").typedef().unwrap();
        assert_eq!(callback.underlying_type, "void(*)(int)");
        assert!(!callback.is_alias);

        let size = find(&ir, "Size").typedef().unwrap();
        assert!(size.is_alias);
        assert_eq!(size.underlying_type, "unsigned long");
    }

    #[test]
    fn test_attributes_are_opaque() {
        let ir = build("[[deprecated(\"use bar\")]] void foo();\n");
        let foo = find(&ir, "foo");
        assert_eq!(foo.attribute("deprecated"), Some("\"use bar\""));
    }

    #[test]
    fn test_parse_attribute_list() {
        let attrs = parse_attribute_list("availability(macosx,introduced=10.4.1), gnu::cold");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].key, "availability");
        assert_eq!(attrs[0].value, "macosx,introduced=10.4.1");
        assert_eq!(attrs[1].key, "gnu::cold");
        assert_eq!(attrs[1].value, "");
    }

    #[test]
    fn test_internal_linkage() {
        let source = r#"
static void helper();
namespace {
int hidden;
}
void visible();
"#;
        let ir = build(source);
        assert!(find(&ir, "helper").internal_linkage);
        assert!(find(&ir, "(anonymous)::hidden").internal_linkage);
        assert!(!find(&ir, "visible").internal_linkage);
    }

    #[test]
    fn test_skip_private() {
        let source = "class Account {\n  int balance_;\npublic:\n  int balance() const;\n};\n";
        let config = ParserConfig {
            skip_private: true,
            ..Default::default()
        };
        let ir = build_with(source, &config);
        assert_eq!(ir.find("Account::balance_").count(), 0);
        assert_eq!(ir.find("Account::balance").count(), 1);
    }

    #[test]
    fn test_variadic_and_void_parameters() {
        let source = "int log(const char* fmt, ...);\nint none(void);\n";
        let ir = build(source);
        let log = find(&ir, "log").function().unwrap();
        assert!(log.is_variadic);
        assert_eq!(log.parameters[0].type_name, "const char*");
        assert_eq!(find(&ir, "none").function().unwrap().arity(), 0);
    }

    #[test]
    fn test_nested_namespace_definition() {
        let ir = build("namespace outer::inner {\nvoid f();\n}\n");
        assert_eq!(find(&ir, "outer").kind, EntityKind::Namespace);
        assert_eq!(find(&ir, "outer::inner").kind, EntityKind::Namespace);
        assert_eq!(find(&ir, "outer::inner::f").kind, EntityKind::Function);
    }

    #[test]
    fn test_operator_name_normalization() {
        assert_eq!(operator_name("operator =="), "operator==");
        assert_eq!(operator_name("operator ( )"), "operator()");
        assert_eq!(operator_name("operator new [ ]"), "operator new[]");
    }
}
