use crate::indexer::{Extractor, extract_with, scan};
use crate::model::{
    Call, CallKind, ErrorCode, ExtractionError, ExtractionResult, Import, ImportKind, MODULE_SCOPE,
    Symbol, SymbolKind,
};
use crate::util::{self, LineIndex};
use rustpython_parser::ast::{self, Expr, Ranged, Stmt};
use rustpython_parser::Parse;
use std::path::Path;

/// Builtins that execute code handed to them at runtime.
pub(crate) const DYNAMIC_CODE_BUILTINS: &[&str] = &["eval", "exec", "compile"];

/// Extracts Python records from the native syntax tree. Exact on valid code;
/// any syntax error yields a single `SYNTAX_ERROR` and no records.
#[derive(Debug, Default)]
pub struct PythonAstExtractor;

impl PythonAstExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_source(&mut self, source: &str, rel_path: &str) -> ExtractionResult {
        let lines = LineIndex::new(source);
        let suite = match ast::Suite::parse(source, rel_path) {
            Ok(suite) => suite,
            Err(err) => {
                let line = lines.line_of(usize::from(err.offset));
                return ExtractionResult::with_error(ExtractionError::recoverable(
                    rel_path,
                    ErrorCode::SyntaxError,
                    format!("Syntax error: {} at line {line}", err.error),
                ));
            }
        };

        let mut walker = AstWalker {
            rel_path,
            lines: &lines,
            functions: Vec::new(),
            output: ExtractionResult::default(),
        };
        walker.collect_symbols(&suite, None);
        walker.collect_module_variables(&suite);
        walker.walk_body(&suite, false);
        walker.output
    }
}

impl Extractor for PythonAstExtractor {
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

struct FunctionSpan {
    name: String,
    start: i64,
    end: i64,
}

struct AstWalker<'a> {
    rel_path: &'a str,
    lines: &'a LineIndex,
    functions: Vec<FunctionSpan>,
    output: ExtractionResult,
}

impl AstWalker<'_> {
    fn lines_of<T: Ranged>(&self, node: &T) -> (i64, i64) {
        let range = node.range();
        let start = usize::from(range.start());
        let end = usize::from(range.end());
        (self.lines.line_of(start), self.lines.end_line_of(start, end))
    }

    fn line_of<T: Ranged>(&self, node: &T) -> i64 {
        self.lines.line_of(usize::from(node.range().start()))
    }

    fn collect_symbols(&mut self, body: &[Stmt], parent_class: Option<&str>) {
        for stmt in body {
            match stmt {
                Stmt::FunctionDef(ast::StmtFunctionDef {
                    name, args, body, ..
                })
                | Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef {
                    name, args, body, ..
                }) => {
                    let (line_start, line_end) = self.lines_of(stmt);
                    let kind = if parent_class.is_some() {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    self.output.symbols.push(Symbol {
                        path: self.rel_path.to_string(),
                        name: name.to_string(),
                        kind,
                        line_start,
                        line_end,
                        is_exported: !name.as_str().starts_with('_'),
                        parameter_count: Some(parameter_count(args, parent_class.is_some())),
                        parent_symbol: parent_class.map(str::to_string),
                        doc_comment: docstring(body),
                    });
                    self.functions.push(FunctionSpan {
                        name: name.to_string(),
                        start: line_start,
                        end: line_end,
                    });
                    self.collect_symbols(body, parent_class);
                }
                Stmt::ClassDef(ast::StmtClassDef { name, body, .. }) => {
                    let (line_start, line_end) = self.lines_of(stmt);
                    self.output.symbols.push(Symbol {
                        path: self.rel_path.to_string(),
                        name: name.to_string(),
                        kind: SymbolKind::Class,
                        line_start,
                        line_end,
                        is_exported: !name.as_str().starts_with('_'),
                        parameter_count: None,
                        parent_symbol: parent_class.map(str::to_string),
                        doc_comment: docstring(body),
                    });
                    self.collect_symbols(body, Some(name.as_str()));
                }
                Stmt::If(ast::StmtIf { body, orelse, .. })
                | Stmt::For(ast::StmtFor { body, orelse, .. })
                | Stmt::AsyncFor(ast::StmtAsyncFor { body, orelse, .. })
                | Stmt::While(ast::StmtWhile { body, orelse, .. }) => {
                    self.collect_symbols(body, parent_class);
                    self.collect_symbols(orelse, parent_class);
                }
                Stmt::With(ast::StmtWith { body, .. })
                | Stmt::AsyncWith(ast::StmtAsyncWith { body, .. }) => {
                    self.collect_symbols(body, parent_class);
                }
                Stmt::Match(ast::StmtMatch { cases, .. }) => {
                    for case in cases {
                        self.collect_symbols(&case.body, parent_class);
                    }
                }
                Stmt::Try(ast::StmtTry {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                    ..
                })
                | Stmt::TryStar(ast::StmtTryStar {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                    ..
                }) => {
                    self.collect_symbols(body, parent_class);
                    for handler in handlers {
                        let ast::ExceptHandler::ExceptHandler(handler) = handler;
                        self.collect_symbols(&handler.body, parent_class);
                    }
                    self.collect_symbols(orelse, parent_class);
                    self.collect_symbols(finalbody, parent_class);
                }
                _ => {}
            }
        }
    }

    fn collect_module_variables(&mut self, suite: &[Stmt]) {
        for stmt in suite {
            match stmt {
                Stmt::Assign(ast::StmtAssign { targets, .. }) => {
                    for target in targets {
                        self.assignment_targets(target, stmt);
                    }
                }
                Stmt::AnnAssign(ast::StmtAnnAssign {
                    target,
                    value: Some(_),
                    ..
                }) => self.assignment_targets(target, stmt),
                _ => {}
            }
        }
    }

    fn assignment_targets(&mut self, target: &Expr, stmt: &Stmt) {
        match target {
            Expr::Name(ast::ExprName { id, .. }) => {
                let name = id.as_str();
                if is_dunder(name) {
                    return;
                }
                let (line_start, line_end) = self.lines_of(stmt);
                self.output.symbols.push(Symbol {
                    path: self.rel_path.to_string(),
                    name: name.to_string(),
                    kind: SymbolKind::Variable,
                    line_start,
                    line_end,
                    is_exported: !name.starts_with('_'),
                    parameter_count: None,
                    parent_symbol: None,
                    doc_comment: None,
                });
            }
            Expr::Tuple(ast::ExprTuple { elts, .. }) | Expr::List(ast::ExprList { elts, .. }) => {
                for elt in elts {
                    self.assignment_targets(elt, stmt);
                }
            }
            Expr::Starred(ast::ExprStarred { value, .. }) => self.assignment_targets(value, stmt),
            _ => {}
        }
    }

    fn walk_body(&mut self, body: &[Stmt], type_checking: bool) {
        for stmt in body {
            self.walk_stmt(stmt, type_checking);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt, type_checking: bool) {
        match stmt {
            Stmt::FunctionDef(ast::StmtFunctionDef {
                args,
                body,
                decorator_list,
                returns,
                ..
            })
            | Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef {
                args,
                body,
                decorator_list,
                returns,
                ..
            }) => {
                self.walk_exprs(decorator_list);
                for arg in args
                    .posonlyargs
                    .iter()
                    .chain(&args.args)
                    .chain(&args.kwonlyargs)
                {
                    if let Some(default) = &arg.default {
                        self.walk_expr(default);
                    }
                }
                if let Some(returns) = returns {
                    self.walk_expr(returns);
                }
                self.walk_body(body, type_checking);
            }
            Stmt::ClassDef(ast::StmtClassDef {
                bases,
                keywords,
                body,
                decorator_list,
                ..
            }) => {
                self.walk_exprs(decorator_list);
                self.walk_exprs(bases);
                for keyword in keywords {
                    self.walk_expr(&keyword.value);
                }
                self.walk_body(body, type_checking);
            }
            Stmt::Return(ast::StmtReturn { value, .. }) => self.walk_opt(value.as_deref()),
            Stmt::Delete(ast::StmtDelete { targets, .. }) => self.walk_exprs(targets),
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                self.walk_exprs(targets);
                self.walk_expr(value);
            }
            Stmt::AugAssign(ast::StmtAugAssign { target, value, .. }) => {
                self.walk_expr(target);
                self.walk_expr(value);
            }
            Stmt::AnnAssign(ast::StmtAnnAssign { target, value, .. }) => {
                self.walk_expr(target);
                self.walk_opt(value.as_deref());
            }
            Stmt::For(ast::StmtFor {
                target,
                iter,
                body,
                orelse,
                ..
            })
            | Stmt::AsyncFor(ast::StmtAsyncFor {
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                self.walk_expr(target);
                self.walk_expr(iter);
                self.walk_body(body, type_checking);
                self.walk_body(orelse, type_checking);
            }
            Stmt::While(ast::StmtWhile {
                test, body, orelse, ..
            }) => {
                self.walk_expr(test);
                self.walk_body(body, type_checking);
                self.walk_body(orelse, type_checking);
            }
            Stmt::If(ast::StmtIf {
                test, body, orelse, ..
            }) => {
                self.walk_expr(test);
                let guarded = type_checking || is_type_checking_test(test);
                self.walk_body(body, guarded);
                self.walk_body(orelse, type_checking);
            }
            Stmt::With(ast::StmtWith { items, body, .. })
            | Stmt::AsyncWith(ast::StmtAsyncWith { items, body, .. }) => {
                for item in items {
                    self.walk_expr(&item.context_expr);
                    self.walk_opt(item.optional_vars.as_deref());
                }
                self.walk_body(body, type_checking);
            }
            Stmt::Match(ast::StmtMatch { subject, cases, .. }) => {
                self.walk_expr(subject);
                for case in cases {
                    self.walk_opt(case.guard.as_deref());
                    self.walk_body(&case.body, type_checking);
                }
            }
            Stmt::Raise(ast::StmtRaise { exc, cause, .. }) => {
                self.walk_opt(exc.as_deref());
                self.walk_opt(cause.as_deref());
            }
            Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            })
            | Stmt::TryStar(ast::StmtTryStar {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            }) => {
                self.walk_body(body, type_checking);
                for handler in handlers {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    self.walk_opt(handler.type_.as_deref());
                    self.walk_body(&handler.body, type_checking);
                }
                self.walk_body(orelse, type_checking);
                self.walk_body(finalbody, type_checking);
            }
            Stmt::Assert(ast::StmtAssert { test, msg, .. }) => {
                self.walk_expr(test);
                self.walk_opt(msg.as_deref());
            }
            Stmt::Import(ast::StmtImport { names, .. }) => {
                let line_number = self.line_of(stmt);
                for alias in names {
                    self.output.imports.push(Import {
                        file: self.rel_path.to_string(),
                        imported_path: alias.name.to_string(),
                        imported_symbols: None,
                        kind: static_kind(type_checking),
                        line_number,
                        module_alias: alias.asname.as_ref().map(|name| name.to_string()),
                    });
                }
            }
            Stmt::ImportFrom(ast::StmtImportFrom {
                module,
                names,
                level,
                ..
            }) => {
                let level = level.as_ref().map(|level| level.to_u32()).unwrap_or(0) as usize;
                let mut imported_path = ".".repeat(level);
                if let Some(module) = module {
                    imported_path.push_str(module.as_str());
                }
                let symbols: Vec<String> = names
                    .iter()
                    .map(|alias| match &alias.asname {
                        Some(asname) => format!("{} as {}", alias.name, asname),
                        None => alias.name.to_string(),
                    })
                    .collect();
                self.output.imports.push(Import {
                    file: self.rel_path.to_string(),
                    imported_path,
                    imported_symbols: if symbols.is_empty() {
                        None
                    } else {
                        Some(symbols.join(","))
                    },
                    kind: static_kind(type_checking),
                    line_number: self.line_of(stmt),
                    module_alias: None,
                });
            }
            Stmt::Expr(ast::StmtExpr { value, .. }) => self.walk_expr(value),
            _ => {}
        }
    }

    fn walk_opt(&mut self, expr: Option<&Expr>) {
        if let Some(expr) = expr {
            self.walk_expr(expr);
        }
    }

    fn walk_exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.walk_expr(expr);
        }
    }

    fn walk_call_parts(&mut self, call: &ast::ExprCall) {
        self.walk_expr(&call.func);
        self.walk_exprs(&call.args);
        for keyword in &call.keywords {
            self.walk_expr(&keyword.value);
        }
    }

    fn walk_comprehensions(&mut self, generators: &[ast::Comprehension]) {
        for generator in generators {
            self.walk_expr(&generator.target);
            self.walk_expr(&generator.iter);
            self.walk_exprs(&generator.ifs);
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call(call) => {
                self.record_call(call, None);
                self.walk_call_parts(call);
            }
            Expr::Await(ast::ExprAwait { value, .. }) => match value.as_ref() {
                Expr::Call(call) => {
                    self.record_call(call, Some(CallKind::Async));
                    self.walk_call_parts(call);
                }
                other => self.walk_expr(other),
            },
            Expr::BoolOp(ast::ExprBoolOp { values, .. }) => self.walk_exprs(values),
            Expr::NamedExpr(ast::ExprNamedExpr { target, value, .. }) => {
                self.walk_expr(target);
                self.walk_expr(value);
            }
            Expr::BinOp(ast::ExprBinOp { left, right, .. }) => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            Expr::UnaryOp(ast::ExprUnaryOp { operand, .. }) => self.walk_expr(operand),
            Expr::Lambda(ast::ExprLambda { body, .. }) => self.walk_expr(body),
            Expr::IfExp(ast::ExprIfExp {
                test, body, orelse, ..
            }) => {
                self.walk_expr(test);
                self.walk_expr(body);
                self.walk_expr(orelse);
            }
            Expr::Dict(ast::ExprDict { keys, values, .. }) => {
                for key in keys.iter().flatten() {
                    self.walk_expr(key);
                }
                self.walk_exprs(values);
            }
            Expr::Set(ast::ExprSet { elts, .. })
            | Expr::List(ast::ExprList { elts, .. })
            | Expr::Tuple(ast::ExprTuple { elts, .. }) => self.walk_exprs(elts),
            Expr::ListComp(ast::ExprListComp {
                elt, generators, ..
            })
            | Expr::SetComp(ast::ExprSetComp {
                elt, generators, ..
            })
            | Expr::GeneratorExp(ast::ExprGeneratorExp {
                elt, generators, ..
            }) => {
                self.walk_expr(elt);
                self.walk_comprehensions(generators);
            }
            Expr::DictComp(ast::ExprDictComp {
                key,
                value,
                generators,
                ..
            }) => {
                self.walk_expr(key);
                self.walk_expr(value);
                self.walk_comprehensions(generators);
            }
            Expr::Yield(ast::ExprYield { value, .. }) => self.walk_opt(value.as_deref()),
            Expr::YieldFrom(ast::ExprYieldFrom { value, .. }) => self.walk_expr(value),
            Expr::Compare(ast::ExprCompare {
                left, comparators, ..
            }) => {
                self.walk_expr(left);
                self.walk_exprs(comparators);
            }
            Expr::FormattedValue(ast::ExprFormattedValue { value, .. }) => self.walk_expr(value),
            Expr::JoinedStr(ast::ExprJoinedStr { values, .. }) => self.walk_exprs(values),
            Expr::Attribute(ast::ExprAttribute { value, .. }) => self.walk_expr(value),
            Expr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                self.walk_expr(value);
                self.walk_expr(slice);
            }
            Expr::Starred(ast::ExprStarred { value, .. }) => self.walk_expr(value),
            Expr::Slice(ast::ExprSlice {
                lower, upper, step, ..
            }) => {
                self.walk_opt(lower.as_deref());
                self.walk_opt(upper.as_deref());
                self.walk_opt(step.as_deref());
            }
            _ => {}
        }
    }

    fn record_call(&mut self, call: &ast::ExprCall, forced: Option<CallKind>) {
        let line_number = self.line_of(call);
        self.record_dynamic_import(call, line_number);
        let (callee, kind, dynamic_code, object) = match call.func.as_ref() {
            Expr::Name(ast::ExprName { id, .. }) => (
                id.to_string(),
                CallKind::Direct,
                DYNAMIC_CODE_BUILTINS.contains(&id.as_str()),
                None,
            ),
            Expr::Attribute(ast::ExprAttribute { value, attr, .. }) => (
                attr.to_string(),
                CallKind::Dynamic,
                false,
                attribute_root(value),
            ),
            _ => return,
        };
        self.output.calls.push(Call {
            caller_file: self.rel_path.to_string(),
            caller_symbol: self.enclosing_function(line_number),
            callee_symbol: callee,
            callee_file: None,
            line_number,
            kind: forced.unwrap_or(kind),
            is_dynamic_code_execution: dynamic_code,
            callee_object: object,
        });
    }

    fn record_dynamic_import(&mut self, call: &ast::ExprCall, line_number: i64) {
        let is_import_call = match call.func.as_ref() {
            Expr::Name(ast::ExprName { id, .. }) => {
                matches!(id.as_str(), "__import__" | "import_module")
            }
            Expr::Attribute(ast::ExprAttribute { attr, .. }) => attr.as_str() == "import_module",
            _ => false,
        };
        if !is_import_call {
            return;
        }
        let Some(Expr::Constant(ast::ExprConstant {
            value: ast::Constant::Str(module),
            ..
        })) = call.args.first()
        else {
            return;
        };
        self.output.imports.push(Import {
            file: self.rel_path.to_string(),
            imported_path: module.clone(),
            imported_symbols: None,
            kind: ImportKind::Dynamic,
            line_number,
            module_alias: None,
        });
    }

    /// Innermost function containing `line`: smallest span, then latest start.
    fn enclosing_function(&self, line: i64) -> String {
        self.functions
            .iter()
            .filter(|span| span.start <= line && line <= span.end)
            .min_by_key(|span| (span.end - span.start, -span.start))
            .map(|span| span.name.clone())
            .unwrap_or_else(|| MODULE_SCOPE.to_string())
    }
}

fn parameter_count(args: &ast::Arguments, in_class: bool) -> i64 {
    let mut count = args.posonlyargs.len() + args.args.len() + args.kwonlyargs.len();
    if in_class {
        let first = args.posonlyargs.first().or_else(|| args.args.first());
        if first.is_some_and(|arg| matches!(arg.def.arg.as_str(), "self" | "cls")) {
            count -= 1;
        }
    }
    count as i64
}

fn docstring(body: &[Stmt]) -> Option<String> {
    let Some(Stmt::Expr(ast::StmtExpr { value, .. })) = body.first() else {
        return None;
    };
    match value.as_ref() {
        Expr::Constant(ast::ExprConstant {
            value: ast::Constant::Str(text),
            ..
        }) => util::clean_docstring(text),
        _ => None,
    }
}

fn attribute_root(expr: &Expr) -> Option<String> {
    let mut current = expr;
    while let Expr::Attribute(ast::ExprAttribute { value, .. }) = current {
        current = value;
    }
    match current {
        Expr::Name(ast::ExprName { id, .. }) => Some(id.to_string()),
        _ => None,
    }
}

fn is_type_checking_test(test: &Expr) -> bool {
    match test {
        Expr::Name(ast::ExprName { id, .. }) => id.as_str() == "TYPE_CHECKING",
        Expr::Attribute(ast::ExprAttribute { attr, .. }) => attr.as_str() == "TYPE_CHECKING",
        _ => false,
    }
}

fn static_kind(type_checking: bool) -> ImportKind {
    if type_checking {
        ImportKind::TypeCheckingOnly
    } else {
        ImportKind::Static
    }
}

pub(crate) fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> ExtractionResult {
        PythonAstExtractor::new().extract_source(source, "pkg/mod.py")
    }

    #[test]
    fn method_parameters_skip_receiver() {
        let result = extract(
            r#"
class Greeter:
    def greet(self, name, *, loud=False):
        return name

    @classmethod
    def build(cls):
        return cls()
"#,
        );
        let greet = result.symbols.iter().find(|s| s.name == "greet").unwrap();
        assert_eq!(greet.kind, SymbolKind::Method);
        assert_eq!(greet.parameter_count, Some(2));
        assert_eq!(greet.parent_symbol.as_deref(), Some("Greeter"));
        let build = result.symbols.iter().find(|s| s.name == "build").unwrap();
        assert_eq!(build.parameter_count, Some(0));
    }

    #[test]
    fn definitions_inside_match_cases_are_collected() {
        let result = extract(
            r#"
match mode:
    case "fast":
        def runner(job):
            return quick(job)
    case _:
        pass
"#,
        );
        let runner = result.symbols.iter().find(|s| s.name == "runner").unwrap();
        assert_eq!(runner.kind, SymbolKind::Function);
        assert_eq!(runner.parameter_count, Some(1));
        let quick = result.calls.iter().find(|c| c.callee_symbol == "quick").unwrap();
        assert_eq!(quick.caller_symbol, "runner");
    }

    #[test]
    fn awaited_call_is_recorded_once() {
        let result = extract(
            r#"
async def main():
    await client.fetch()
"#,
        );
        assert_eq!(result.calls.len(), 1);
        assert_eq!(result.calls[0].kind, CallKind::Async);
        assert_eq!(result.calls[0].callee_object.as_deref(), Some("client"));
        assert_eq!(result.calls[0].caller_symbol, "main");
    }

    #[test]
    fn dunder_detection() {
        assert!(is_dunder("__all__"));
        assert!(!is_dunder("__"));
        assert!(!is_dunder("_private"));
    }

    #[test]
    fn syntax_error_yields_single_error() {
        let result = extract("def broken(:\n    pass\n");
        assert!(result.symbols.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::SyntaxError);
        assert!(result.errors[0].recoverable);
    }
}
