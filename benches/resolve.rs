use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use symscan::model::{Call, CallKind, Import, ImportKind, MODULE_SCOPE, Symbol, SymbolKind};
use symscan::resolver::PythonCallResolver;

struct Project {
    symbols: Vec<Symbol>,
    imports: Vec<Import>,
    calls: Vec<Call>,
}

fn symbol(path: &str, name: &str) -> Symbol {
    Symbol {
        path: path.to_string(),
        name: name.to_string(),
        kind: SymbolKind::Function,
        line_start: 1,
        line_end: 2,
        is_exported: true,
        parameter_count: Some(1),
        parent_symbol: None,
        doc_comment: None,
    }
}

fn call(file: &str, callee: &str, receiver: Option<&str>) -> Call {
    Call {
        caller_file: file.to_string(),
        caller_symbol: MODULE_SCOPE.to_string(),
        callee_symbol: callee.to_string(),
        callee_file: None,
        line_number: 10,
        kind: if receiver.is_some() {
            CallKind::Dynamic
        } else {
            CallKind::Direct
        },
        is_dynamic_code_execution: false,
        callee_object: receiver.map(str::to_string),
    }
}

/// `modules` Python files in one package; each imports its predecessor by
/// name and as a module, and calls into it, itself, builtins and the stdlib.
fn synthetic_project(modules: usize) -> Project {
    let mut project = Project {
        symbols: Vec::new(),
        imports: Vec::new(),
        calls: Vec::new(),
    };
    for index in 0..modules {
        let path = format!("pkg/mod_{index}.py");
        project.symbols.push(symbol(&path, &format!("func_{index}")));
        project.symbols.push(symbol(&path, "local_helper"));
        project.calls.push(call(&path, "local_helper", None));
        project.calls.push(call(&path, "len", None));
        project.calls.push(call(&path, "join", Some("os")));
        project.imports.push(Import {
            file: path.clone(),
            imported_path: "os".to_string(),
            imported_symbols: None,
            kind: ImportKind::Static,
            line_number: 1,
            module_alias: None,
        });
        if index == 0 {
            continue;
        }
        let previous = index - 1;
        project.imports.push(Import {
            file: path.clone(),
            imported_path: format!("pkg.mod_{previous}"),
            imported_symbols: Some(format!("func_{previous}")),
            kind: ImportKind::Static,
            line_number: 2,
            module_alias: None,
        });
        project.imports.push(Import {
            file: path.clone(),
            imported_path: format!(".mod_{previous}"),
            imported_symbols: None,
            kind: ImportKind::Static,
            line_number: 3,
            module_alias: Some("prev".to_string()),
        });
        project.calls.push(call(&path, &format!("func_{previous}"), None));
        project.calls.push(call(&path, &format!("func_{previous}"), Some("prev")));
        project.calls.push(call(&path, "missing", None));
    }
    project
}

fn bench_python_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("python_resolution");
    for modules in [10usize, 100, 1000] {
        let project = synthetic_project(modules);
        group.bench_with_input(BenchmarkId::from_parameter(modules), &project, |b, project| {
            b.iter(|| {
                let mut resolver = PythonCallResolver::python(&project.symbols, &project.imports);
                let resolved = resolver.resolve(black_box(&project.calls));
                black_box((resolved, resolver.stats()))
            })
        });
    }
    group.finish();
}

/// Second pass over the same calls, with every namespace already cached.
fn bench_cached_namespaces(c: &mut Criterion) {
    let project = synthetic_project(500);
    let mut resolver = PythonCallResolver::python(&project.symbols, &project.imports);
    resolver.resolve(&project.calls);

    c.bench_function("python_resolution_cached_500", |b| {
        b.iter(|| black_box(resolver.resolve(black_box(&project.calls))))
    });
}

criterion_group!(benches, bench_python_resolution, bench_cached_namespaces);
criterion_main!(benches);
