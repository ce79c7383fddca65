use crate::indexer::{Extractor, extract_with, scan};
use crate::model::{
    Call, CallKind, ErrorCode, ExtractionError, ExtractionResult, Import, ImportKind, MODULE_SCOPE,
    Symbol, SymbolKind,
};
use crate::util;
use anyhow::Result;
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Callees that run code built at runtime.
const DYNAMIC_EXEC_FUNCTIONS: &[&str] = &["eval", "Function"];

const PARAMETER_KINDS: &[&str] = &[
    "identifier",
    "assignment_pattern",
    "rest_pattern",
    "object_pattern",
    "array_pattern",
    "required_parameter",
    "optional_parameter",
    "rest_parameter",
];

pub struct JavascriptExtractor {
    parser: Parser,
}

/// TypeScript extraction; `.tsx` files are parsed with the TSX grammar.
pub struct TypescriptExtractor {
    parser: Parser,
    tsx_parser: Parser,
}

impl JavascriptExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_javascript::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }

    pub fn extract_source(&mut self, source: &str, rel_path: &str) -> ExtractionResult {
        extract_with_parser(&mut self.parser, source, rel_path)
    }
}

impl TypescriptExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT;
        parser.set_language(&language.into())?;
        let mut tsx_parser = Parser::new();
        let language = tree_sitter_typescript::LANGUAGE_TSX;
        tsx_parser.set_language(&language.into())?;
        Ok(Self { parser, tsx_parser })
    }

    pub fn extract_source(&mut self, source: &str, rel_path: &str) -> ExtractionResult {
        let parser = if rel_path.ends_with(".tsx") {
            &mut self.tsx_parser
        } else {
            &mut self.parser
        };
        extract_with_parser(parser, source, rel_path)
    }
}

impl Extractor for JavascriptExtractor {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        scan::JAVASCRIPT_EXTENSIONS
    }

    fn extract_file(&mut self, path: &Path, rel_path: &str) -> ExtractionResult {
        extract_with(path, rel_path, |source| self.extract_source(source, rel_path))
    }
}

impl Extractor for TypescriptExtractor {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        scan::TYPESCRIPT_EXTENSIONS
    }

    fn extract_file(&mut self, path: &Path, rel_path: &str) -> ExtractionResult {
        extract_with(path, rel_path, |source| self.extract_source(source, rel_path))
    }
}

fn extract_with_parser(parser: &mut Parser, source: &str, rel_path: &str) -> ExtractionResult {
    let Some(tree) = parser.parse(source, None) else {
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
    let walker = Walker { rel_path, source };
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        walker.top_level(child, false, &mut output);
    }
    output
}

struct Walker<'a> {
    rel_path: &'a str,
    source: &'a str,
}

impl Walker<'_> {
    fn top_level(&self, node: Node<'_>, exported: bool, output: &mut ExtractionResult) {
        match node.kind() {
            "export_statement" => self.handle_export(node, output),
            "function_declaration" | "generator_function_declaration" => {
                self.handle_function(node, exported, output)
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.handle_class(node, exported, output)
            }
            "lexical_declaration" | "variable_declaration" => {
                self.handle_variable_declaration(node, exported, output)
            }
            "import_statement" => self.handle_import(node, output),
            "interface_declaration" | "enum_declaration" => {
                self.handle_named_type(node, SymbolKind::Class, exported, output)
            }
            "type_alias_declaration" => {
                self.handle_named_type(node, SymbolKind::Variable, exported, output)
            }
            "comment" => {}
            _ => self.extract_calls(node, MODULE_SCOPE, output),
        }
    }

    fn handle_export(&self, node: Node<'_>, output: &mut ExtractionResult) {
        // Re-exports (`export { a } from "./b"`) bind nothing locally.
        if node.child_by_field_name("source").is_some() {
            return;
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "function_declaration"
                | "generator_function_declaration"
                | "class_declaration"
                | "abstract_class_declaration"
                | "lexical_declaration"
                | "variable_declaration"
                | "interface_declaration"
                | "enum_declaration"
                | "type_alias_declaration" => self.top_level(child, true, output),
                "export_clause" | "comment" | "decorator" => {}
                _ => self.extract_calls_at(child, MODULE_SCOPE, output),
            }
        }
    }

    fn handle_function(&self, node: Node<'_>, exported: bool, output: &mut ExtractionResult) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source);
        let (line_start, line_end) = span(node);
        output.symbols.push(Symbol {
            path: self.rel_path.to_string(),
            name: name.clone(),
            kind: SymbolKind::Function,
            line_start,
            line_end,
            is_exported: exported,
            parameter_count: Some(count_parameters(node)),
            parent_symbol: None,
            doc_comment: self.jsdoc(node),
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.extract_calls(body, &name, output);
        }
    }

    fn handle_class(&self, node: Node<'_>, exported: bool, output: &mut ExtractionResult) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source);
        let (line_start, line_end) = span(node);
        output.symbols.push(Symbol {
            path: self.rel_path.to_string(),
            name: name.clone(),
            kind: SymbolKind::Class,
            line_start,
            line_end,
            is_exported: exported,
            parameter_count: None,
            parent_symbol: None,
            doc_comment: self.jsdoc(node),
        });
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_definition" => self.handle_method(member, &name, output),
                "field_definition" | "public_field_definition" => {
                    self.handle_field(member, &name, output)
                }
                "abstract_method_signature" => self.handle_abstract_method(member, &name, output),
                _ => {}
            }
        }
    }

    fn handle_method(&self, node: Node<'_>, class_name: &str, output: &mut ExtractionResult) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        if !matches!(
            name_node.kind(),
            "property_identifier" | "private_property_identifier" | "identifier"
        ) {
            return;
        }
        let name = node_text(name_node, self.source);
        let (line_start, line_end) = span(node);
        output.symbols.push(Symbol {
            path: self.rel_path.to_string(),
            name: name.clone(),
            kind: SymbolKind::Method,
            line_start,
            line_end,
            is_exported: !self.is_private_member(node, &name),
            parameter_count: Some(count_parameters(node)),
            parent_symbol: Some(class_name.to_string()),
            doc_comment: self.jsdoc(node),
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.extract_calls(body, &name, output);
        }
    }

    fn handle_field(&self, node: Node<'_>, class_name: &str, output: &mut ExtractionResult) {
        let name_node = node
            .child_by_field_name("property")
            .or_else(|| node.child_by_field_name("name"));
        let Some(name_node) = name_node else {
            return;
        };
        if !matches!(
            name_node.kind(),
            "property_identifier" | "private_property_identifier"
        ) {
            return;
        }
        let name = node_text(name_node, self.source);
        let (line_start, line_end) = span(node);
        output.symbols.push(Symbol {
            path: self.rel_path.to_string(),
            is_exported: !self.is_private_member(node, &name),
            name,
            kind: SymbolKind::Variable,
            line_start,
            line_end,
            parameter_count: None,
            parent_symbol: Some(class_name.to_string()),
            doc_comment: None,
        });
    }

    fn handle_abstract_method(&self, node: Node<'_>, class_name: &str, output: &mut ExtractionResult) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let (line_start, line_end) = span(node);
        output.symbols.push(Symbol {
            path: self.rel_path.to_string(),
            name: node_text(name_node, self.source),
            kind: SymbolKind::Method,
            line_start,
            line_end,
            is_exported: true,
            parameter_count: Some(count_parameters(node)),
            parent_symbol: Some(class_name.to_string()),
            doc_comment: None,
        });
    }

    /// `#name` members, plus TypeScript `private` accessibility.
    fn is_private_member(&self, node: Node<'_>, name: &str) -> bool {
        if name.starts_with('#') {
            return true;
        }
        let mut cursor = node.walk();
        let private = node.named_children(&mut cursor).any(|child| {
            child.kind() == "accessibility_modifier" && node_text(child, self.source) == "private"
        });
        private
    }

    fn handle_named_type(
        &self,
        node: Node<'_>,
        kind: SymbolKind,
        exported: bool,
        output: &mut ExtractionResult,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let (line_start, line_end) = span(node);
        output.symbols.push(Symbol {
            path: self.rel_path.to_string(),
            name: node_text(name_node, self.source),
            kind,
            line_start,
            line_end,
            is_exported: exported,
            parameter_count: None,
            parent_symbol: None,
            doc_comment: self.jsdoc(node),
        });
    }

    fn handle_variable_declaration(
        &self,
        node: Node<'_>,
        exported: bool,
        output: &mut ExtractionResult,
    ) {
        let (line_start, line_end) = span(node);
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let value = declarator.child_by_field_name("value");
            let name_node = declarator
                .child_by_field_name("name")
                .filter(|name| name.kind() == "identifier");
            let Some(name_node) = name_node else {
                // Destructuring binds no single name; still scan the initializer.
                if let Some(value) = value {
                    self.extract_calls_at(value, MODULE_SCOPE, output);
                }
                continue;
            };
            let name = node_text(name_node, self.source);
            let function = value.filter(|value| {
                matches!(
                    value.kind(),
                    "arrow_function" | "function_expression" | "function" | "generator_function"
                )
            });
            if let Some(function) = function {
                output.symbols.push(Symbol {
                    path: self.rel_path.to_string(),
                    name: name.clone(),
                    kind: SymbolKind::Function,
                    line_start,
                    line_end,
                    is_exported: exported,
                    parameter_count: Some(count_parameters(function)),
                    parent_symbol: None,
                    doc_comment: self.jsdoc(node),
                });
                if let Some(body) = function.child_by_field_name("body") {
                    self.extract_calls_at(body, &name, output);
                }
                continue;
            }
            output.symbols.push(Symbol {
                path: self.rel_path.to_string(),
                name: name.clone(),
                kind: SymbolKind::Variable,
                line_start,
                line_end,
                is_exported: exported,
                parameter_count: None,
                parent_symbol: None,
                doc_comment: None,
            });
            let Some(value) = value else {
                continue;
            };
            if let Some(module) = self.require_target(value) {
                output.imports.push(Import {
                    file: self.rel_path.to_string(),
                    imported_path: module,
                    imported_symbols: None,
                    kind: ImportKind::Dynamic,
                    line_number: span(value).0,
                    module_alias: Some(name),
                });
                continue;
            }
            self.extract_calls_at(value, MODULE_SCOPE, output);
        }
    }

    fn handle_import(&self, node: Node<'_>, output: &mut ExtractionResult) {
        let Some(module) = node
            .child_by_field_name("source")
            .and_then(|source| string_value(source, self.source))
        else {
            return;
        };
        let line_number = span(node).0;
        let clause = {
            let mut cursor = node.walk();
            let found = node
                .named_children(&mut cursor)
                .find(|child| child.kind() == "import_clause");
            found
        };
        let Some(clause) = clause else {
            output.imports.push(Import {
                file: self.rel_path.to_string(),
                imported_path: module,
                imported_symbols: None,
                kind: ImportKind::SideEffect,
                line_number,
                module_alias: None,
            });
            return;
        };
        let kind = if is_type_import(node) {
            ImportKind::TypeCheckingOnly
        } else {
            ImportKind::Static
        };
        let mut cursor = clause.walk();
        for child in clause.named_children(&mut cursor) {
            let (imported_symbols, module_alias) = match child.kind() {
                "identifier" => (None, Some(node_text(child, self.source))),
                "named_imports" => {
                    let symbols = self.named_imports(child);
                    if symbols.is_empty() {
                        continue;
                    }
                    (Some(symbols.join(",")), None)
                }
                "namespace_import" => {
                    let alias = {
                        let mut inner = child.walk();
                        let found = child
                            .named_children(&mut inner)
                            .find(|c| c.kind() == "identifier");
                        found
                    };
                    (
                        Some("*".to_string()),
                        alias.map(|alias| node_text(alias, self.source)),
                    )
                }
                _ => continue,
            };
            output.imports.push(Import {
                file: self.rel_path.to_string(),
                imported_path: module.clone(),
                imported_symbols,
                kind,
                line_number,
                module_alias,
            });
        }
    }

    fn named_imports(&self, node: Node<'_>) -> Vec<String> {
        let mut symbols = Vec::new();
        let mut cursor = node.walk();
        for specifier in node.named_children(&mut cursor) {
            if specifier.kind() != "import_specifier" {
                continue;
            }
            let Some(name) = specifier
                .child_by_field_name("name")
                .map(|name| import_name(name, self.source))
            else {
                continue;
            };
            match specifier.child_by_field_name("alias") {
                Some(alias) => symbols.push(format!(
                    "{name} as {}",
                    import_name(alias, self.source)
                )),
                None => symbols.push(name),
            }
        }
        symbols
    }

    /// Records calls under `node`, whose own kind may itself be a call.
    fn extract_calls_at(&self, node: Node<'_>, caller: &str, output: &mut ExtractionResult) {
        match node.kind() {
            "call_expression" => self.handle_call(node, caller, false, output),
            "new_expression" => self.handle_new(node, caller, output),
            "await_expression" => self.handle_await(node, caller, output),
            _ => self.extract_calls(node, caller, output),
        }
    }

    fn extract_calls(&self, node: Node<'_>, caller: &str, output: &mut ExtractionResult) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.extract_calls_at(child, caller, output);
        }
    }

    fn handle_await(&self, node: Node<'_>, caller: &str, output: &mut ExtractionResult) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "call_expression" {
                self.handle_call(child, caller, true, output);
            } else {
                self.extract_calls_at(child, caller, output);
            }
        }
    }

    fn handle_call(
        &self,
        node: Node<'_>,
        caller: &str,
        awaited: bool,
        output: &mut ExtractionResult,
    ) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let line_number = span(node).0;
        let arguments = node.child_by_field_name("arguments");
        let target = match function.kind() {
            "identifier" => {
                let name = node_text(function, self.source);
                if name == "require" {
                    if let Some(module) = self.require_target(node) {
                        self.push_dynamic_import(module, line_number, output);
                    }
                    return;
                }
                let dynamic_code = DYNAMIC_EXEC_FUNCTIONS.contains(&name.as_str());
                Some((name, CallKind::Direct, dynamic_code, None))
            }
            "import" => {
                if let Some(module) = arguments.and_then(|args| self.first_string_argument(args)) {
                    self.push_dynamic_import(module, line_number, output);
                }
                return;
            }
            "member_expression" => function
                .child_by_field_name("property")
                .filter(|property| {
                    matches!(
                        property.kind(),
                        "property_identifier" | "private_property_identifier"
                    )
                })
                .map(|property| {
                    let object = function
                        .child_by_field_name("object")
                        .and_then(|object| self.receiver_root(object));
                    (
                        node_text(property, self.source),
                        CallKind::Dynamic,
                        false,
                        object,
                    )
                }),
            _ => None,
        };
        if let Some((callee, kind, dynamic_code, object)) = target {
            output.calls.push(Call {
                caller_file: self.rel_path.to_string(),
                caller_symbol: caller.to_string(),
                callee_symbol: callee,
                callee_file: None,
                line_number,
                kind: if awaited { CallKind::Async } else { kind },
                is_dynamic_code_execution: dynamic_code,
                callee_object: object,
            });
        }
        // Chained and nested calls: `a.b().c()`, `f(g())`.
        self.extract_calls(function, caller, output);
        if let Some(arguments) = arguments {
            self.extract_calls(arguments, caller, output);
        }
    }

    fn handle_new(&self, node: Node<'_>, caller: &str, output: &mut ExtractionResult) {
        if let Some(constructor) = node.child_by_field_name("constructor") {
            let target = match constructor.kind() {
                "identifier" => Some((node_text(constructor, self.source), None)),
                "member_expression" => constructor.child_by_field_name("property").map(|property| {
                    (
                        node_text(property, self.source),
                        constructor
                            .child_by_field_name("object")
                            .and_then(|object| self.receiver_root(object)),
                    )
                }),
                _ => None,
            };
            if let Some((callee, object)) = target {
                output.calls.push(Call {
                    caller_file: self.rel_path.to_string(),
                    caller_symbol: caller.to_string(),
                    callee_symbol: callee,
                    callee_file: None,
                    line_number: span(node).0,
                    kind: CallKind::Constructor,
                    is_dynamic_code_execution: false,
                    callee_object: object,
                });
            }
        }
        if let Some(arguments) = node.child_by_field_name("arguments") {
            self.extract_calls(arguments, caller, output);
        }
    }

    fn push_dynamic_import(&self, module: String, line_number: i64, output: &mut ExtractionResult) {
        output.imports.push(Import {
            file: self.rel_path.to_string(),
            imported_path: module,
            imported_symbols: None,
            kind: ImportKind::Dynamic,
            line_number,
            module_alias: None,
        });
    }

    /// Module named by `require("...")` when `node` is such a call.
    fn require_target(&self, node: Node<'_>) -> Option<String> {
        if node.kind() != "call_expression" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        if function.kind() != "identifier" || node_text(function, self.source) != "require" {
            return None;
        }
        self.first_string_argument(node.child_by_field_name("arguments")?)
    }

    fn first_string_argument(&self, arguments: Node<'_>) -> Option<String> {
        let first = arguments.named_child(0)?;
        if first.kind() != "string" {
            return None;
        }
        string_value(first, self.source)
    }

    /// Leftmost name of a receiver chain: `a` for `a.b().c`, `this` for `this.x`.
    fn receiver_root(&self, node: Node<'_>) -> Option<String> {
        let mut current = node;
        loop {
            match current.kind() {
                "identifier" => return Some(node_text(current, self.source)),
                "this" => return Some("this".to_string()),
                "super" => return Some("super".to_string()),
                "member_expression" | "subscript_expression" => {
                    current = current.child_by_field_name("object")?;
                }
                "call_expression" => current = current.child_by_field_name("function")?,
                "parenthesized_expression" | "non_null_expression" => {
                    current = current.named_child(0)?;
                }
                _ => return None,
            }
        }
    }

    fn jsdoc(&self, node: Node<'_>) -> Option<String> {
        let prev = node.prev_named_sibling().or_else(|| {
            node.parent()
                .filter(|parent| parent.kind() == "export_statement")
                .and_then(|parent| parent.prev_named_sibling())
        })?;
        if prev.kind() != "comment" {
            return None;
        }
        let text = node_text(prev, self.source);
        if !text.starts_with("/**") {
            return None;
        }
        parse_jsdoc(&text)
    }
}

/// Description lines of a `/** ... */` block, up to the first `@tag`.
fn parse_jsdoc(text: &str) -> Option<String> {
    let body = text.trim();
    let body = body.strip_prefix("/**").unwrap_or(body);
    let body = body.strip_suffix("*/").unwrap_or(body);
    let mut lines = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        let line = line.strip_prefix('*').map(str::trim).unwrap_or(line);
        if line.starts_with('@') {
            break;
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

fn count_parameters(node: Node<'_>) -> i64 {
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        let count = params
            .named_children(&mut cursor)
            .filter(|child| PARAMETER_KINDS.contains(&child.kind()))
            .count();
        return count as i64;
    }
    // `x => x` carries a single bare parameter.
    if node.child_by_field_name("parameter").is_some() {
        return 1;
    }
    0
}

fn is_type_import(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == "type");
    found
}

fn import_name(node: Node<'_>, source: &str) -> String {
    if node.kind() == "string" {
        return string_value(node, source).unwrap_or_default();
    }
    node_text(node, source)
}

fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    util::unquote_string_literal(&node_text(node, source)).filter(|value| !value.is_empty())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsdoc_stops_at_first_tag() {
        let doc = parse_jsdoc("/**\n * Adds numbers.\n * Fast path.\n * @param a first\n */");
        assert_eq!(doc.as_deref(), Some("Adds numbers. Fast path."));
        assert_eq!(parse_jsdoc("/** @returns nothing */"), None);
    }

    #[test]
    fn chained_member_calls_share_receiver() {
        let mut extractor = JavascriptExtractor::new().unwrap();
        let result = extractor.extract_source("api.client().fetch();\n", "app.js");
        let calls: Vec<_> = result
            .calls
            .iter()
            .map(|c| (c.callee_symbol.as_str(), c.callee_object.as_deref()))
            .collect();
        assert_eq!(calls, vec![("fetch", Some("api")), ("client", Some("api"))]);
    }

    #[test]
    fn tsx_files_use_tsx_grammar() {
        let mut extractor = TypescriptExtractor::new().unwrap();
        let source = "export const View = () => <div>{render()}</div>;\n";
        let result = extractor.extract_source(source, "view.tsx");
        assert!(result.errors.is_empty());
        assert_eq!(result.symbols[0].name, "View");
        assert_eq!(result.calls[0].callee_symbol, "render");
        assert_eq!(result.calls[0].caller_symbol, "View");
    }
}
