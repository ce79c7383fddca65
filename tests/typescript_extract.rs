use symscan::indexer::Extractor;
use symscan::indexer::javascript::TypescriptExtractor;
use symscan::model::{CallKind, ImportKind, SymbolKind};

#[test]
fn extract_symbols_and_calls() {
    let source = r#"
import type { Foo } from "./foo";
import { Store } from "./store";

export interface Greeter {
    greet(name: string): void;
}

export type Id = string | number;

export enum Kind { A, B }

export abstract class Shape {
    abstract area(scale: number): number;
}

export class Impl implements Greeter {
    private cache: Map<string, Foo> = new Map();
    public label = "impl";

    helper(): void {}

    greet(name: string, loud?: boolean, ...rest: string[]): void {
        this.helper();
        const store = new Store<Foo>(name);
        store.save(name);
    }

    private reset() {}
}

export const build = async (input: string): Promise<string> => {
    return await process(input);
};
"#;
    let mut extractor = TypescriptExtractor::new().unwrap();
    let result = extractor.extract_source(source, "src/types.ts");
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let names: Vec<_> = result
        .symbols
        .iter()
        .map(|s| (s.kind, s.name.as_str()))
        .collect();
    assert!(names.contains(&(SymbolKind::Class, "Greeter")));
    assert!(names.contains(&(SymbolKind::Variable, "Id")));
    assert!(names.contains(&(SymbolKind::Class, "Kind")));
    assert!(names.contains(&(SymbolKind::Class, "Shape")));
    assert!(names.contains(&(SymbolKind::Method, "area")));
    assert!(names.contains(&(SymbolKind::Class, "Impl")));
    assert!(names.contains(&(SymbolKind::Variable, "cache")));
    assert!(names.contains(&(SymbolKind::Variable, "label")));
    assert!(names.contains(&(SymbolKind::Method, "helper")));
    assert!(names.contains(&(SymbolKind::Method, "greet")));
    assert!(names.contains(&(SymbolKind::Method, "reset")));
    assert!(names.contains(&(SymbolKind::Function, "build")));

    let find = |name: &str| result.symbols.iter().find(|s| s.name == name).unwrap();
    assert_eq!(find("greet").parameter_count, Some(3));
    assert_eq!(find("area").parameter_count, Some(1));
    assert_eq!(find("build").parameter_count, Some(1));
    assert!(!find("reset").is_exported);
    assert!(!find("cache").is_exported);
    assert!(find("label").is_exported);
    assert!(find("Impl").is_exported);

    let calls: Vec<_> = result
        .calls
        .iter()
        .map(|c| {
            (
                c.caller_symbol.as_str(),
                c.callee_symbol.as_str(),
                c.kind,
                c.callee_object.as_deref(),
            )
        })
        .collect();
    assert!(calls.contains(&("greet", "helper", CallKind::Dynamic, Some("this"))));
    assert!(calls.contains(&("greet", "Store", CallKind::Constructor, None)));
    assert!(calls.contains(&("greet", "save", CallKind::Dynamic, Some("store"))));
    assert!(calls.contains(&("build", "process", CallKind::Async, None)));

    let imports: Vec<_> = result
        .imports
        .iter()
        .map(|i| (i.imported_path.as_str(), i.imported_symbols.as_deref(), i.kind))
        .collect();
    assert_eq!(
        imports,
        vec![
            ("./foo", Some("Foo"), ImportKind::TypeCheckingOnly),
            ("./store", Some("Store"), ImportKind::Static),
        ]
    );
}

#[test]
fn tsx_components_extract_with_tsx_grammar() {
    let source = r#"
import React from "react";

export function App({ title }: { title: string }) {
    const items = useItems();
    return <List title={title}>{items.map((item) => <Row key={item.id} />)}</List>;
}
"#;
    let mut extractor = TypescriptExtractor::new().unwrap();
    let result = extractor.extract_source(source, "src/App.tsx");
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let app = result.symbols.iter().find(|s| s.name == "App").unwrap();
    assert_eq!(app.parameter_count, Some(1));
    let callees: Vec<_> = result
        .calls
        .iter()
        .map(|c| (c.caller_symbol.as_str(), c.callee_symbol.as_str()))
        .collect();
    assert!(callees.contains(&("App", "useItems")));
    assert!(callees.contains(&("App", "map")));
}

#[test]
fn directory_walk_covers_every_typescript_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ts"), "export function a() {}\n").unwrap();
    std::fs::write(dir.path().join("b.tsx"), "export const B = () => <div />;\n").unwrap();
    std::fs::write(dir.path().join("c.mts"), "export function c() {}\n").unwrap();
    std::fs::write(dir.path().join("d.js"), "export function d() {}\n").unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
    std::fs::write(
        dir.path().join("node_modules/pkg/index.ts"),
        "export function vendored() {}\n",
    )
    .unwrap();

    let mut extractor = TypescriptExtractor::new().unwrap();
    let result = extractor.extract_directory(dir.path(), &["node_modules".to_string()], false);
    let paths: Vec<_> = result.symbols.iter().map(|s| s.path.as_str()).collect();
    assert_eq!(paths, vec!["a.ts", "b.tsx", "c.mts"]);
}
