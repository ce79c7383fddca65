use symscan::indexer::scan::ScanOptions;
use symscan::indexer::{Language, RepositoryOptions, extract_repository};
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn mixed_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app/__init__.py", "");
    write(root, "app/util.py", "def helper(x):\n    return x\n");
    write(
        root,
        "app/main.py",
        "from app.util import helper\n\ndef run():\n    return helper(1)\n",
    );
    write(
        root,
        "web/lib.ts",
        "export function add(a: number, b: number): number {\n  return a + b;\n}\n",
    );
    write(
        root,
        "web/main.js",
        "import { add } from \"./lib\";\n\nexport function start() {\n  return add(1, 2);\n}\n",
    );
    write(root, "node_modules/pkg/index.js", "export function vendored() { run(); }\n");
    write(root, "README.md", "# not code\n");
    dir
}

fn options(languages: Vec<Language>, resolve_calls: bool) -> RepositoryOptions {
    RepositoryOptions {
        languages,
        scan: ScanOptions::new(vec!["node_modules".to_string()]),
        resolve_calls,
    }
}

#[test]
fn resolves_python_and_web_calls_separately() {
    let dir = mixed_repo();
    let result = extract_repository(
        dir.path(),
        &options(
            vec![Language::Python, Language::Javascript, Language::Typescript],
            true,
        ),
    )
    .unwrap();
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let paths: Vec<_> = result.symbols.iter().map(|s| s.path.as_str()).collect();
    assert_eq!(paths, vec!["app/main.py", "app/util.py", "web/main.js", "web/lib.ts"]);

    let targets: Vec<_> = result
        .calls
        .iter()
        .map(|c| (c.callee_symbol.as_str(), c.callee_file.as_deref()))
        .collect();
    assert_eq!(
        targets,
        vec![("helper", Some("app/util.py")), ("add", Some("web/lib.ts"))]
    );

    let stats = result.resolution_stats.unwrap();
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.resolved_cross_file, 2);
    assert_eq!(result.summary().resolved_calls, 2);
}

#[test]
fn extraction_without_resolution_leaves_targets_empty() {
    let dir = mixed_repo();
    let result = extract_repository(
        dir.path(),
        &options(vec![Language::Python, Language::Javascript, Language::Typescript], false),
    )
    .unwrap();
    assert!(result.resolution_stats.is_none());
    assert!(result.calls.iter().all(|c| c.callee_file.is_none()));
    assert_eq!(result.calls.len(), 2);
}

#[test]
fn language_filter_limits_the_walk() {
    let dir = mixed_repo();
    let result = extract_repository(dir.path(), &options(vec![Language::Python], true)).unwrap();
    assert!(result.symbols.iter().all(|s| s.path.ends_with(".py")));
    assert!(result.imports.iter().all(|i| i.file.ends_with(".py")));
    assert_eq!(result.resolution_stats.unwrap().total_calls, 1);
}

#[test]
fn ignore_files_are_honored_on_request() {
    let dir = mixed_repo();
    write(dir.path(), ".gitignore", "generated/\n");
    write(dir.path(), "generated/schema.py", "def generated():\n    pass\n");

    let mut opts = options(vec![Language::Python], false);
    let result = extract_repository(dir.path(), &opts).unwrap();
    assert!(result.symbols.iter().any(|s| s.name == "generated"));

    opts.scan.respect_ignore_files = true;
    let result = extract_repository(dir.path(), &opts).unwrap();
    assert!(!result.symbols.iter().any(|s| s.name == "generated"));
    assert!(result.symbols.iter().any(|s| s.name == "helper"));
}

#[test]
fn summary_counts_records_by_kind() {
    let dir = mixed_repo();
    let result = extract_repository(
        dir.path(),
        &options(vec![Language::Python, Language::Javascript, Language::Typescript], true),
    )
    .unwrap();
    let summary = result.summary();
    assert_eq!(summary.total_symbols, 4);
    assert_eq!(summary.symbols_by_type.get("function"), Some(&4));
    assert_eq!(summary.total_imports, 2);
    assert_eq!(summary.calls_by_type.get("direct"), Some(&2));
    assert_eq!(summary.total_errors, 0);
}
