use symscan::indexer::javascript::{JavascriptExtractor, TypescriptExtractor};
use symscan::model::{Call, CallKind, ExtractionResult};
use symscan::resolver::{self, JsCallResolver};

fn resolve_js(files: &[(&str, &str)]) -> ExtractionResult {
    let mut js = JavascriptExtractor::new().unwrap();
    let mut ts = TypescriptExtractor::new().unwrap();
    let mut result = ExtractionResult::default();
    for (path, source) in files {
        let part = if path.ends_with(".ts") || path.ends_with(".tsx") {
            ts.extract_source(source, path)
        } else {
            js.extract_source(source, path)
        };
        result.merge(part);
    }
    resolver::resolve_for_language("javascript", &mut result);
    result
}

fn call<'a>(result: &'a ExtractionResult, callee: &str) -> &'a Call {
    result
        .calls
        .iter()
        .find(|call| call.callee_symbol == callee)
        .unwrap_or_else(|| panic!("no call to {callee}"))
}

#[test]
fn named_and_namespace_imports_resolve() {
    let result = resolve_js(&[
        (
            "src/util.js",
            "export function helper() { return 1; }\nexport function other() { return 2; }\n",
        ),
        (
            "src/main.js",
            "import { helper as h } from './util';\nimport * as u from './util';\n\nfunction main() {\n  h();\n  u.other();\n}\n",
        ),
    ]);
    let h = call(&result, "h");
    assert_eq!(h.caller_symbol, "main");
    assert_eq!(h.callee_file.as_deref(), Some("src/util.js"));
    assert_eq!(call(&result, "other").callee_file.as_deref(), Some("src/util.js"));
    let stats = result.resolution_stats.unwrap();
    assert_eq!(stats.resolved_cross_file, 1);
    assert_eq!(stats.resolved_module_attr, 1);
}

#[test]
fn parent_directory_and_index_files_resolve() {
    let result = resolve_js(&[
        (
            "src/components/index.js",
            "export class Button {}\nexport function render() {}\n",
        ),
        (
            "src/pages/home.js",
            "import { Button, render } from '../components';\n\nrender(new Button());\n",
        ),
    ]);
    let button = call(&result, "Button");
    assert_eq!(button.kind, CallKind::Constructor);
    assert_eq!(button.callee_file.as_deref(), Some("src/components/index.js"));
    assert_eq!(
        call(&result, "render").callee_file.as_deref(),
        Some("src/components/index.js")
    );
}

#[test]
fn typescript_sources_resolve_from_js_specifiers() {
    let result = resolve_js(&[
        ("lib/math.ts", "export function add(a: number, b: number): number { return a + b; }\n"),
        (
            "lib/index.ts",
            "import { add } from './math.js';\n\nexport const total = add(1, 2);\n",
        ),
    ]);
    let add = call(&result, "add");
    assert_eq!(add.caller_file, "lib/index.ts");
    assert_eq!(add.callee_file.as_deref(), Some("lib/math.ts"));
}

#[test]
fn this_and_super_receivers_are_dynamic() {
    let result = resolve_js(&[(
        "widget.js",
        "class Widget extends Base {\n  draw() {\n    this.paint();\n    super.draw();\n  }\n  paint() {}\n}\n",
    )]);
    assert_eq!(call(&result, "paint").callee_file, None);
    let stats = result.resolution_stats.unwrap();
    assert_eq!(stats.unresolved_dynamic, 2);
    assert_eq!(stats.resolved_same_file, 0);
}

#[test]
fn globals_node_builtins_and_packages_are_classified() {
    let result = resolve_js(&[(
        "server.js",
        "import { readFile } from 'node:fs/promises';\nimport { useState } from 'react';\nconst path = require('path');\n\nJSON.parse('{}');\nsetTimeout(tick, 10);\nreadFile('a');\npath.join('a', 'b');\nuseState(0);\nclient.send();\n",
    )]);
    let stats = result.resolution_stats.unwrap();
    assert_eq!(stats.total_calls, 6);
    assert_eq!(stats.unresolved_builtin, 2);
    assert_eq!(stats.unresolved_stdlib, 2);
    assert_eq!(stats.unresolved_external, 1);
    assert_eq!(stats.unresolved_dynamic, 1);
}

#[test]
fn local_definitions_win_over_globals() {
    let result = resolve_js(&[(
        "app.js",
        "function fetch(url) { return url; }\n\nfetch('/api');\n",
    )]);
    assert_eq!(call(&result, "fetch").callee_file.as_deref(), Some("app.js"));
}

#[test]
fn bare_specifiers_never_resolve_locally() {
    let result = resolve_js(&[
        ("lodash.js", "export function chunk() {}\n"),
        ("main.js", "import { chunk } from 'lodash';\n\nchunk();\n"),
    ]);
    assert_eq!(call(&result, "chunk").callee_file, None);
    assert_eq!(result.resolution_stats.unwrap().unresolved_external, 1);
}

#[test]
fn resolving_twice_gives_the_same_calls() {
    let result = resolve_js(&[
        ("a.js", "export function one() {}\n"),
        ("b.js", "import { one } from './a';\none();\nMath.max(1, 2);\n"),
    ]);
    let mut resolver = JsCallResolver::javascript(&result.symbols, &result.imports);
    let again = resolver.resolve(&result.calls);
    assert_eq!(again, result.calls);
    assert_eq!(Some(resolver.stats()), result.resolution_stats);
}
