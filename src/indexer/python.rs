use crate::indexer::python_ast::{DYNAMIC_CODE_BUILTINS, is_dunder};
use crate::indexer::{Extractor, extract_with, scan};
use crate::model::{
    Call, CallKind, ErrorCode, ExtractionError, ExtractionResult, Import, ImportKind, MODULE_SCOPE,
    Symbol, SymbolKind,
};
use crate::util;
use anyhow::Result;
use std::path::Path;
use tree_sitter::{Node, Parser};

#[derive(Clone, Default)]
struct Context {
    parent_class: Option<String>,
    function: Option<String>,
    type_checking: bool,
}

/// Error-tolerant Python extractor over the tree-sitter grammar.
pub struct PythonTreeSitterExtractor {
    parser: Parser,
}

impl PythonTreeSitterExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
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
        let walker = Walker { rel_path, source };
        walker.walk_node(root, &Context::default(), &mut output);
        walker.module_variables(root, &mut output);
        output
    }
}

impl Extractor for PythonTreeSitterExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        scan::PYTHON_EXTENSIONS
    }

    fn extract_file(&mut self, path: &Path, rel_path: &str) -> ExtractionResult {
        extract_with(path, rel_path, |source| self.extract_source(source, rel_path))
    }
}

struct Walker<'a> {
    rel_path: &'a str,
    source: &'a str,
}

impl Walker<'_> {
    fn walk_node(&self, node: Node<'_>, ctx: &Context, output: &mut ExtractionResult) {
        match node.kind() {
            "function_definition" => {
                self.handle_function(node, ctx, output);
                return;
            }
            "class_definition" => {
                self.handle_class(node, ctx, output);
                return;
            }
            "if_statement" => {
                self.handle_if(node, ctx, output);
                return;
            }
            "call" => self.handle_call(node, ctx, output),
            "import_statement" => {
                self.handle_import(node, ctx, output);
                return;
            }
            "import_from_statement" => {
                self.handle_import_from(node, ctx, output);
                return;
            }
            "future_import_statement" => {
                self.handle_future_import(node, output);
                return;
            }
            _ => {}
        }
        self.walk_children(node, ctx, output);
    }

    fn walk_children(&self, node: Node<'_>, ctx: &Context, output: &mut ExtractionResult) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_node(child, ctx, output);
        }
    }

    fn handle_function(&self, node: Node<'_>, ctx: &Context, output: &mut ExtractionResult) {
        if node.has_error() {
            return;
        }
        let body = node.child_by_field_name("body");
        // Recovered trees often leave a truncated def with an empty block.
        if body.is_some_and(|body| body.named_child_count() == 0) {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source);
        let in_class = ctx.parent_class.is_some();
        let (line_start, line_end) = span(node);
        output.symbols.push(Symbol {
            path: self.rel_path.to_string(),
            name: name.clone(),
            kind: if in_class {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            },
            line_start,
            line_end,
            is_exported: !name.starts_with('_'),
            parameter_count: Some(
                node.child_by_field_name("parameters")
                    .map(|params| self.count_parameters(params, in_class))
                    .unwrap_or(0),
            ),
            parent_symbol: ctx.parent_class.clone(),
            doc_comment: body.and_then(|body| self.docstring(body)),
        });

        let mut next_ctx = ctx.clone();
        next_ctx.function = Some(name);
        self.walk_children(node, &next_ctx, output);
    }

    fn handle_class(&self, node: Node<'_>, ctx: &Context, output: &mut ExtractionResult) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source);
        let (line_start, line_end) = span(node);
        let body = node.child_by_field_name("body");
        output.symbols.push(Symbol {
            path: self.rel_path.to_string(),
            name: name.clone(),
            kind: SymbolKind::Class,
            line_start,
            line_end,
            is_exported: !name.starts_with('_'),
            parameter_count: None,
            parent_symbol: ctx.parent_class.clone(),
            doc_comment: body.and_then(|body| self.docstring(body)),
        });

        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            self.walk_node(superclasses, ctx, output);
        }
        if let Some(body) = body {
            let mut next_ctx = ctx.clone();
            next_ctx.parent_class = Some(name);
            self.walk_children(body, &next_ctx, output);
        }
    }

    fn handle_if(&self, node: Node<'_>, ctx: &Context, output: &mut ExtractionResult) {
        let condition = node.child_by_field_name("condition");
        let guarded = condition.is_some_and(|cond| self.is_type_checking(cond));
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if guarded && node.child_by_field_name("consequence") == Some(child) {
                let mut next_ctx = ctx.clone();
                next_ctx.type_checking = true;
                self.walk_node(child, &next_ctx, output);
            } else {
                self.walk_node(child, ctx, output);
            }
        }
    }

    fn is_type_checking(&self, condition: Node<'_>) -> bool {
        match condition.kind() {
            "identifier" => node_text(condition, self.source) == "TYPE_CHECKING",
            "attribute" => condition
                .child_by_field_name("attribute")
                .is_some_and(|attr| node_text(attr, self.source) == "TYPE_CHECKING"),
            _ => false,
        }
    }

    fn handle_call(&self, node: Node<'_>, ctx: &Context, output: &mut ExtractionResult) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let line_number = span(node).0;
        self.dynamic_import(node, function, line_number, output);
        let (callee, kind, dynamic_code, object) = match function.kind() {
            "identifier" => {
                let name = node_text(function, self.source);
                let dynamic_code = DYNAMIC_CODE_BUILTINS.contains(&name.as_str());
                (name, CallKind::Direct, dynamic_code, None)
            }
            "attribute" => {
                let Some(attr) = function.child_by_field_name("attribute") else {
                    return;
                };
                (
                    node_text(attr, self.source),
                    CallKind::Dynamic,
                    false,
                    self.attribute_root(function),
                )
            }
            _ => return,
        };
        let awaited = node.parent().is_some_and(|parent| parent.kind() == "await");
        output.calls.push(Call {
            caller_file: self.rel_path.to_string(),
            caller_symbol: ctx
                .function
                .clone()
                .unwrap_or_else(|| MODULE_SCOPE.to_string()),
            callee_symbol: callee,
            callee_file: None,
            line_number,
            kind: if awaited { CallKind::Async } else { kind },
            is_dynamic_code_execution: dynamic_code,
            callee_object: object,
        });
    }

    fn dynamic_import(
        &self,
        call: Node<'_>,
        function: Node<'_>,
        line_number: i64,
        output: &mut ExtractionResult,
    ) {
        let is_import_call = match function.kind() {
            "identifier" => matches!(
                node_text(function, self.source).as_str(),
                "__import__" | "import_module"
            ),
            "attribute" => function
                .child_by_field_name("attribute")
                .is_some_and(|attr| node_text(attr, self.source) == "import_module"),
            _ => false,
        };
        if !is_import_call {
            return;
        }
        let Some(first) = call
            .child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
        else {
            return;
        };
        if first.kind() != "string" {
            return;
        }
        let Some(module) = util::unquote_string_literal(&node_text(first, self.source)) else {
            return;
        };
        output.imports.push(Import {
            file: self.rel_path.to_string(),
            imported_path: module,
            imported_symbols: None,
            kind: ImportKind::Dynamic,
            line_number,
            module_alias: None,
        });
    }

    fn attribute_root(&self, attribute: Node<'_>) -> Option<String> {
        let mut current = attribute;
        loop {
            let object = current.child_by_field_name("object")?;
            match object.kind() {
                "identifier" => return Some(node_text(object, self.source)),
                "attribute" => current = object,
                _ => return None,
            }
        }
    }

    fn handle_import(&self, node: Node<'_>, ctx: &Context, output: &mut ExtractionResult) {
        let line_number = span(node).0;
        let mut cursor = node.walk();
        for child in node.children_by_field_name("name", &mut cursor) {
            let (module, alias) = match child.kind() {
                "dotted_name" => (node_text(child, self.source), None),
                "aliased_import" => {
                    let Some(name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    (
                        node_text(name, self.source),
                        child
                            .child_by_field_name("alias")
                            .map(|alias| node_text(alias, self.source)),
                    )
                }
                _ => continue,
            };
            output.imports.push(Import {
                file: self.rel_path.to_string(),
                imported_path: module,
                imported_symbols: None,
                kind: import_kind(ctx),
                line_number,
                module_alias: alias,
            });
        }
    }

    fn handle_import_from(&self, node: Node<'_>, ctx: &Context, output: &mut ExtractionResult) {
        let module_path = node
            .child_by_field_name("module_name")
            .map(|module| node_text(module, self.source))
            .unwrap_or_default();
        let mut symbols = Vec::new();
        let mut wildcard = false;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "wildcard_import" {
                wildcard = true;
            }
        }
        let mut cursor = node.walk();
        for child in node.children_by_field_name("name", &mut cursor) {
            match child.kind() {
                "dotted_name" | "identifier" => symbols.push(node_text(child, self.source)),
                "aliased_import" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|name| node_text(name, self.source));
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|alias| node_text(alias, self.source));
                    match (name, alias) {
                        (Some(name), Some(alias)) => symbols.push(format!("{name} as {alias}")),
                        (Some(name), None) => symbols.push(name),
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        let imported_symbols = if wildcard {
            Some("*".to_string())
        } else if symbols.is_empty() {
            None
        } else {
            Some(symbols.join(","))
        };
        output.imports.push(Import {
            file: self.rel_path.to_string(),
            imported_path: module_path,
            imported_symbols,
            kind: import_kind(ctx),
            line_number: span(node).0,
            module_alias: None,
        });
    }

    fn handle_future_import(&self, node: Node<'_>, output: &mut ExtractionResult) {
        let mut cursor = node.walk();
        let symbols: Vec<String> = node
            .children_by_field_name("name", &mut cursor)
            .map(|child| node_text(child, self.source))
            .collect();
        output.imports.push(Import {
            file: self.rel_path.to_string(),
            imported_path: "__future__".to_string(),
            imported_symbols: if symbols.is_empty() {
                None
            } else {
                Some(symbols.join(","))
            },
            kind: ImportKind::Static,
            line_number: span(node).0,
            module_alias: None,
        });
    }

    /// Assignments that are direct statements of the module body.
    fn module_variables(&self, root: Node<'_>, output: &mut ExtractionResult) {
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            if statement.kind() != "expression_statement" {
                continue;
            }
            let mut inner = statement.walk();
            for expr in statement.named_children(&mut inner) {
                if expr.kind() == "assignment" {
                    self.assignment(expr, statement, output);
                }
            }
        }
    }

    fn assignment(&self, node: Node<'_>, statement: Node<'_>, output: &mut ExtractionResult) {
        // `x: int` without a value only annotates.
        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        if let Some(left) = node.child_by_field_name("left") {
            self.variable_targets(left, statement, output);
        }
        if right.kind() == "assignment" {
            self.assignment(right, statement, output);
        }
    }

    fn variable_targets(&self, target: Node<'_>, statement: Node<'_>, output: &mut ExtractionResult) {
        match target.kind() {
            "identifier" => {
                let name = node_text(target, self.source);
                if is_dunder(&name) {
                    return;
                }
                let (line_start, line_end) = span(statement);
                output.symbols.push(Symbol {
                    path: self.rel_path.to_string(),
                    is_exported: !name.starts_with('_'),
                    name,
                    kind: SymbolKind::Variable,
                    line_start,
                    line_end,
                    parameter_count: None,
                    parent_symbol: None,
                    doc_comment: None,
                });
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" => {
                let mut cursor = target.walk();
                for child in target.named_children(&mut cursor) {
                    self.variable_targets(child, statement, output);
                }
            }
            _ => {}
        }
    }

    fn count_parameters(&self, params: Node<'_>, is_method: bool) -> i64 {
        let mut count = 0;
        let mut first = true;
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            let name = match child.kind() {
                "identifier" => Some(node_text(child, self.source)),
                "typed_parameter" => {
                    if has_child_kind(child, "list_splat_pattern")
                        || has_child_kind(child, "dictionary_splat_pattern")
                    {
                        continue;
                    }
                    first_child_kind(child, "identifier").map(|name| node_text(name, self.source))
                }
                "default_parameter" | "typed_default_parameter" => child
                    .child_by_field_name("name")
                    .map(|name| node_text(name, self.source)),
                _ => continue,
            };
            if first && is_method {
                first = false;
                if matches!(name.as_deref(), Some("self" | "cls")) {
                    continue;
                }
            }
            first = false;
            count += 1;
        }
        count
    }

    fn docstring(&self, body: Node<'_>) -> Option<String> {
        let first = body.named_child(0)?;
        let string_node = match first.kind() {
            "string" => first,
            "expression_statement" => first.named_child(0)?,
            _ => return None,
        };
        if string_node.kind() != "string" {
            return None;
        }
        let raw = node_text(string_node, self.source);
        util::unquote_string_literal(&raw).and_then(|text| util::clean_docstring(&text))
    }
}

fn import_kind(ctx: &Context) -> ImportKind {
    if ctx.type_checking {
        ImportKind::TypeCheckingOnly
    } else {
        ImportKind::Static
    }
}

fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    first_child_kind(node, kind).is_some()
}

fn first_child_kind<'tree>(node: Node<'tree>, kind: &str) -> Option<Node<'tree>> {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> ExtractionResult {
        let mut extractor = PythonTreeSitterExtractor::new().unwrap();
        extractor.extract_source(source, "mod.py")
    }

    #[test]
    fn counts_typed_and_default_parameters() {
        let result = extract(
            r#"
class Repo:
    def save(self: "Repo", item: int, retries=3, *args: str, **kwargs: str):
        pass
"#,
        );
        let save = result.symbols.iter().find(|s| s.name == "save").unwrap();
        assert_eq!(save.parameter_count, Some(2));
    }

    #[test]
    fn awaited_call_is_async_only() {
        let result = extract(
            r#"
async def run():
    await fetch()
"#,
        );
        let kinds: Vec<_> = result.calls.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CallKind::Async]);
        assert_eq!(result.calls[0].caller_symbol, "run");
    }

    #[test]
    fn chained_assignment_records_each_name() {
        let result = extract("a = b = 1\n__all__ = ['a']\nfirst, *rest = items\n");
        let names: Vec<_> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "first", "rest"]);
    }
}
