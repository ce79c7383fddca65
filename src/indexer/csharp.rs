use crate::indexer::{Extractor, extract_with, scan};
use crate::model::{
    Call, CallKind, ErrorCode, ExtractionError, ExtractionResult, Import, ImportKind, MODULE_SCOPE,
    Symbol, SymbolKind,
};
use anyhow::Result;
use std::path::Path;
use tree_sitter::{Node, Parser};

const PUBLIC_MODIFIERS: &[&str] = &["public", "internal", "protected"];

/// Node kinds that can precede a method name as its return type.
const RETURN_TYPE_KINDS: &[&str] = &[
    "predefined_type",
    "generic_name",
    "qualified_name",
    "nullable_type",
    "array_type",
    "pointer_type",
    "tuple_type",
    "ref_type",
];

#[derive(Clone)]
struct Context {
    path: String,
    type_stack: Vec<String>,
    current_scope: String,
}

impl Context {
    fn parent_type(&self) -> Option<String> {
        self.type_stack.last().cloned()
    }

    fn with_scope(&self, scope: impl Into<String>) -> Context {
        let mut next = self.clone();
        next.current_scope = scope.into();
        next
    }
}

/// Syntactic C# extraction. Block and file-scoped namespaces are walked
/// through; types inside them record no namespace as their parent.
pub struct CSharpExtractor {
    parser: Parser,
}

impl CSharpExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_c_sharp::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }

    pub fn extract_source(&mut self, source: &str, rel_path: &str) -> ExtractionResult {
        let Some(tree) = self.parser.parse(source, None) else {
            return ExtractionResult::with_error(ExtractionError::recoverable(
                rel_path,
                ErrorCode::ExtractionError,
                "tree-sitter produced no parse tree",
            ));
        };
        let root = tree.root_node();
        let mut output = ExtractionResult::default();
        if root.has_error() {
            output.errors.push(ExtractionError::recoverable(
                rel_path,
                ErrorCode::SyntaxError,
                "Syntax errors detected (partial extraction performed)",
            ));
        }
        let ctx = Context {
            path: rel_path.to_string(),
            type_stack: Vec::new(),
            current_scope: MODULE_SCOPE.to_string(),
        };
        walk_node(root, &ctx, source, &mut output);
        output
    }
}

impl Extractor for CSharpExtractor {
    fn language(&self) -> &'static str {
        "csharp"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        scan::CSHARP_EXTENSIONS
    }

    fn extract_file(&mut self, path: &Path, rel_path: &str) -> ExtractionResult {
        extract_with(path, rel_path, |source| self.extract_source(source, rel_path))
    }
}

fn walk_node(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    match node.kind() {
        "class_declaration"
        | "struct_declaration"
        | "interface_declaration"
        | "record_declaration"
        | "record_struct_declaration" => {
            handle_type(node, ctx, source, output);
            return;
        }
        "enum_declaration" => {
            handle_enum(node, ctx, source, output);
            return;
        }
        "method_declaration" => {
            handle_method(node, ctx, source, output);
            return;
        }
        "constructor_declaration" => {
            handle_constructor(node, ctx, source, output);
            return;
        }
        "property_declaration" => {
            handle_property(node, ctx, source, output);
            return;
        }
        "field_declaration" => handle_variables(node, SymbolKind::Field, ctx, source, output),
        "event_field_declaration" => {
            handle_variables(node, SymbolKind::Event, ctx, source, output)
        }
        "event_declaration" => handle_event(node, ctx, source, output),
        "invocation_expression" => handle_invocation(node, ctx, source, output),
        "object_creation_expression" => handle_object_creation(node, ctx, source, output),
        "using_directive" => {
            handle_using(node, ctx, source, output);
            return;
        }
        "extern_alias_directive" => {
            handle_extern_alias(node, ctx, source, output);
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, source, output);
    }
}

fn handle_type(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(name_node) = node
        .child_by_field_name("name")
        .or_else(|| first_child_kind(node, "identifier"))
    else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    push_symbol(node, &name, SymbolKind::Class, None, ctx, source, output);

    let mut next_ctx = ctx.with_scope(MODULE_SCOPE);
    next_ctx.type_stack.push(name);
    let body = node
        .child_by_field_name("body")
        .or_else(|| first_child_kind(node, "declaration_list"));
    if let Some(body) = body {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
        }
    }
}

fn handle_enum(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    push_symbol(node, &name, SymbolKind::Class, None, ctx, source, output);
}

fn handle_method(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(name_node) = method_name_node(node) else {
        return;
    };
    let name = node_text(name_node, source);
    let params = Some(count_parameters(node));
    push_symbol(node, &name, SymbolKind::Method, params, ctx, source, output);
    walk_function_body(node, &ctx.with_scope(name), source, output);
}

fn handle_constructor(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(name_node) = node
        .child_by_field_name("name")
        .or_else(|| first_child_kind(node, "identifier"))
    else {
        return;
    };
    let name = node_text(name_node, source);
    let params = Some(count_parameters(node));
    push_symbol(node, &name, SymbolKind::Method, params, ctx, source, output);
    let scoped = ctx.with_scope(name);
    // `: base(...)` / `: this(...)` chains run inside the constructor.
    if let Some(initializer) = first_child_kind(node, "constructor_initializer") {
        walk_node(initializer, &scoped, source, output);
    }
    walk_function_body(node, &scoped, source, output);
}

fn handle_property(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(name_node) = node
        .child_by_field_name("name")
        .or_else(|| first_child_kind(node, "identifier"))
    else {
        return;
    };
    let name = node_text(name_node, source);
    push_symbol(node, &name, SymbolKind::Property, None, ctx, source, output);

    if let Some(accessors) = first_child_kind(node, "accessor_list") {
        let mut cursor = accessors.walk();
        for accessor in accessors.named_children(&mut cursor) {
            if accessor.kind() != "accessor_declaration" {
                continue;
            }
            let scope = match accessor_keyword(accessor, source) {
                Some(keyword) => format!("{name}.{keyword}"),
                None => name.clone(),
            };
            walk_function_body(accessor, &ctx.with_scope(scope), source, output);
        }
    }
    if let Some(arrow) = first_child_kind(node, "arrow_expression_clause") {
        walk_node(arrow, &ctx.with_scope(name), source, output);
    }
}

fn handle_event(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(name_node) = node
        .child_by_field_name("name")
        .or_else(|| first_child_kind(node, "identifier"))
    else {
        return;
    };
    let name = node_text(name_node, source);
    push_symbol(node, &name, SymbolKind::Event, None, ctx, source, output);
}

/// Fields and field-style events: one symbol per declarator.
fn handle_variables(
    node: Node<'_>,
    kind: SymbolKind,
    ctx: &Context,
    source: &str,
    output: &mut ExtractionResult,
) {
    let Some(declaration) = first_child_kind(node, "variable_declaration") else {
        return;
    };
    let mut cursor = declaration.walk();
    for declarator in declaration.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator
            .child_by_field_name("name")
            .or_else(|| first_child_kind(declarator, "identifier"))
        else {
            continue;
        };
        let name = node_text(name_node, source);
        push_symbol(node, &name, kind, None, ctx, source, output);
    }
}

fn walk_function_body(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if matches!(child.kind(), "block" | "arrow_expression_clause") {
            walk_node(child, ctx, source, output);
        }
    }
}

fn handle_invocation(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(function) = node
        .child_by_field_name("function")
        .or_else(|| node.named_child(0))
    else {
        return;
    };
    let Some(target) = call_target(function, source) else {
        return;
    };
    output.calls.push(Call {
        caller_file: ctx.path.clone(),
        caller_symbol: ctx.current_scope.clone(),
        callee_symbol: target.callee,
        callee_file: None,
        line_number: span(node).0,
        kind: target.kind,
        is_dynamic_code_execution: false,
        callee_object: target.receiver,
    });
}

struct CallTarget {
    callee: String,
    kind: CallKind,
    receiver: Option<String>,
}

fn call_target(function: Node<'_>, source: &str) -> Option<CallTarget> {
    match function.kind() {
        "identifier" => Some(CallTarget {
            callee: node_text(function, source),
            kind: CallKind::Direct,
            receiver: None,
        }),
        "generic_name" => Some(CallTarget {
            callee: generic_base_name(function, source),
            kind: CallKind::Direct,
            receiver: None,
        }),
        "member_access_expression" => {
            let name = function.child_by_field_name("name")?;
            let receiver = function
                .child_by_field_name("expression")
                .and_then(|expr| receiver_root(expr, source));
            Some(CallTarget {
                callee: simple_name(name, source),
                kind: CallKind::Dynamic,
                receiver,
            })
        }
        "conditional_access_expression" => {
            let binding = first_child_kind(function, "member_binding_expression")?;
            conditional_target(function, binding, source)
        }
        // `a?.B()` may also parse with the invocation inside the conditional access.
        "member_binding_expression" => {
            let parent = function.parent()?.parent()?;
            if parent.kind() != "conditional_access_expression" {
                return None;
            }
            conditional_target(parent, function, source)
        }
        _ => None,
    }
}

/// `Handler?.Invoke(...)` raises an event; any other `a?.B()` is a member call.
fn conditional_target(
    conditional: Node<'_>,
    binding: Node<'_>,
    source: &str,
) -> Option<CallTarget> {
    let condition = conditional
        .child_by_field_name("condition")
        .or_else(|| conditional.named_child(0))?;
    let member = binding
        .child_by_field_name("name")
        .or_else(|| first_child_kind(binding, "identifier"))
        .map(|name| simple_name(name, source))?;
    if member == "Invoke" && condition.kind() == "identifier" {
        return Some(CallTarget {
            callee: node_text(condition, source),
            kind: CallKind::Event,
            receiver: None,
        });
    }
    Some(CallTarget {
        callee: member,
        kind: CallKind::Dynamic,
        receiver: receiver_root(condition, source),
    })
}

fn handle_object_creation(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    output: &mut ExtractionResult,
) {
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let callee = match type_node.kind() {
        "identifier" => node_text(type_node, source),
        "generic_name" => generic_base_name(type_node, source),
        "qualified_name" => {
            let text = node_text(type_node, source);
            let base = text.split('<').next().unwrap_or(&text);
            base.rsplit('.').next().unwrap_or(base).trim().to_string()
        }
        _ => return,
    };
    if callee.is_empty() {
        return;
    }
    output.calls.push(Call {
        caller_file: ctx.path.clone(),
        caller_symbol: ctx.current_scope.clone(),
        callee_symbol: callee,
        callee_file: None,
        line_number: span(node).0,
        kind: CallKind::Constructor,
        is_dynamic_code_execution: false,
        callee_object: None,
    });
}

fn handle_using(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let mut is_static = false;
    let mut is_global = false;
    let mut has_alias = false;
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static" => is_static = true,
            "global" => is_global = true,
            "=" => has_alias = true,
            "name_equals" => {
                has_alias = true;
                if let Some(alias) = first_child_kind(child, "identifier") {
                    names.insert(0, alias);
                }
            }
            "qualified_name" | "identifier" | "generic_name" | "alias_qualified_name" => {
                names.push(child)
            }
            _ => {}
        }
    }
    let (alias, target) = if has_alias && names.len() >= 2 {
        (Some(node_text(names[0], source)), names.last().copied())
    } else {
        (None, names.first().copied())
    };
    let Some(target) = target else {
        return;
    };
    let kind = if is_global {
        ImportKind::Global
    } else if is_static {
        ImportKind::UsingStatic
    } else {
        ImportKind::Static
    };
    output.imports.push(Import {
        file: ctx.path.clone(),
        imported_path: node_text(target, source),
        imported_symbols: None,
        kind,
        line_number: span(node).0,
        module_alias: alias,
    });
}

fn handle_extern_alias(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(name_node) = node
        .child_by_field_name("name")
        .or_else(|| first_child_kind(node, "identifier"))
    else {
        return;
    };
    output.imports.push(Import {
        file: ctx.path.clone(),
        imported_path: node_text(name_node, source),
        imported_symbols: None,
        kind: ImportKind::Extern,
        line_number: span(node).0,
        module_alias: None,
    });
}

fn push_symbol(
    node: Node<'_>,
    name: &str,
    kind: SymbolKind,
    parameter_count: Option<i64>,
    ctx: &Context,
    source: &str,
    output: &mut ExtractionResult,
) {
    let (line_start, line_end) = span(node);
    output.symbols.push(Symbol {
        path: ctx.path.clone(),
        name: name.to_string(),
        kind,
        line_start,
        line_end,
        is_exported: is_exported(node, source),
        parameter_count,
        parent_symbol: ctx.parent_type(),
        doc_comment: xml_doc_summary(node, source),
    });
}

/// The method name sits after the return type; for `T Second<T>(..)` the
/// first identifier is the return type.
fn method_name_node(node: Node<'_>) -> Option<Node<'_>> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(name);
    }
    let mut saw_type = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if RETURN_TYPE_KINDS.contains(&child.kind()) {
            saw_type = true;
        } else if child.kind() == "identifier" {
            if saw_type {
                return Some(child);
            }
            saw_type = true;
        } else if child.kind() == "parameter_list" {
            break;
        }
    }
    None
}

fn accessor_keyword(node: Node<'_>, source: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(name, source));
    }
    let mut cursor = node.walk();
    let keyword = node
        .children(&mut cursor)
        .map(|child| node_text(child, source))
        .find(|text| matches!(text.as_str(), "get" | "set" | "init" | "add" | "remove"));
    keyword
}

/// The first access modifier decides; no modifier means exported.
fn is_exported(node: Node<'_>, source: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "modifier" {
            continue;
        }
        let text = node_text(child, source);
        if text == "private" {
            return false;
        }
        if PUBLIC_MODIFIERS.contains(&text.as_str()) {
            return true;
        }
    }
    true
}

fn count_parameters(node: Node<'_>) -> i64 {
    let params = node
        .child_by_field_name("parameters")
        .or_else(|| first_child_kind(node, "parameter_list"));
    let Some(params) = params else {
        return 0;
    };
    let mut cursor = params.walk();
    let count = params
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "parameter")
        .count();
    count as i64
}

/// Summary text of the `///` block directly above a declaration.
fn xml_doc_summary(node: Node<'_>, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_named_sibling();
    while let Some(comment) = current {
        if comment.kind() != "comment" || comment.end_position().row + 1 < expected_row {
            break;
        }
        let text = node_text(comment, source);
        if !text.starts_with("///") {
            break;
        }
        lines.push(text);
        expected_row = comment.start_position().row;
        current = comment.prev_named_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    parse_summary(&lines.join("\n"))
}

fn parse_summary(text: &str) -> Option<String> {
    let mut summary = Vec::new();
    let mut in_summary = false;
    for line in text.lines() {
        let line = line.trim();
        let mut line = line.strip_prefix("///").unwrap_or(line).trim().to_string();
        if line.contains("<summary>") {
            in_summary = true;
            line = line.replace("<summary>", "").trim().to_string();
        }
        if line.contains("</summary>") {
            let line = line.replace("</summary>", "");
            let line = line.trim();
            if !line.is_empty() {
                summary.push(line.to_string());
            }
            break;
        }
        if in_summary && !line.is_empty() {
            summary.push(line);
        }
    }
    if summary.is_empty() {
        None
    } else {
        Some(summary.join(" "))
    }
}

/// Leftmost name of a receiver chain, with literal receivers tagged.
fn receiver_root(node: Node<'_>, source: &str) -> Option<String> {
    let mut current = node;
    loop {
        match current.kind() {
            "identifier" | "predefined_type" => return Some(node_text(current, source)),
            "generic_name" => return Some(generic_base_name(current, source)),
            "this_expression" | "this" => return Some("this".to_string()),
            "base_expression" | "base" => return Some("base".to_string()),
            "string_literal" | "verbatim_string_literal" | "raw_string_literal"
            | "interpolated_string_expression" => return Some("<string>".to_string()),
            "integer_literal" | "real_literal" => return Some("<number>".to_string()),
            "member_access_expression" => {
                current = current
                    .child_by_field_name("expression")
                    .or_else(|| current.named_child(0))?;
            }
            "invocation_expression" => {
                current = current
                    .child_by_field_name("function")
                    .or_else(|| current.named_child(0))?;
            }
            "conditional_access_expression" => {
                current = current
                    .child_by_field_name("condition")
                    .or_else(|| current.named_child(0))?;
            }
            "parenthesized_expression" => current = current.named_child(0)?,
            _ => return None,
        }
    }
}

fn simple_name(node: Node<'_>, source: &str) -> String {
    if node.kind() == "generic_name" {
        return generic_base_name(node, source);
    }
    node_text(node, source)
}

/// `Method<T>` → `Method`.
fn generic_base_name(node: Node<'_>, source: &str) -> String {
    if let Some(identifier) = first_child_kind(node, "identifier") {
        return node_text(identifier, source);
    }
    let text = node_text(node, source);
    text.split('<').next().unwrap_or_default().trim().to_string()
}

fn first_child_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|child| child.kind() == kind);
    found
}

fn span(node: Node<'_>) -> (i64, i64) {
    let start = node.start_position();
    let end = node.end_position();
    (start.row as i64 + 1, end.row as i64 + 1)
}

fn node_text(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    source.get(start..end).unwrap_or("").trim().to_string()
}
