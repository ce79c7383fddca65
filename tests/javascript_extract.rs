use symscan::indexer::javascript::JavascriptExtractor;
use symscan::model::{CallKind, ErrorCode, ImportKind};

const SOURCE: &str = r#"
import fs from "fs";
import { readFile, writeFile as write } from "./io";
import * as helpers from "./helpers";
import "./polyfill";
const lodash = require("lodash");

/**
 * Greets someone.
 * @param {string} name
 */
export function greet(name, punctuation = "!") {
  console.log(helpers.format(name));
  return name + punctuation;
}

export class Greeter extends Base {
  #secret = 1;
  count = 0;

  constructor(prefix) {
    super();
    this.prefix = prefix;
  }

  async load(path) {
    const data = await readFile(path);
    return new Parser(data).parse();
  }

  #reset() {
    this.count = 0;
  }
}

const shout = (text) => greet(text.toUpperCase());
let counter = 0;
const { a, b } = loadPair();

greet("world");
eval("1 + 1");
import("./lazy").then(run);
"#;

fn extract() -> symscan::model::ExtractionResult {
    let mut extractor = JavascriptExtractor::new().unwrap();
    extractor.extract_source(SOURCE, "src/app.js")
}

#[test]
fn extract_symbols() {
    let result = extract();
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let names: Vec<_> = result
        .symbols
        .iter()
        .map(|s| (s.kind.as_str(), s.name.as_str(), s.is_exported))
        .collect();

    assert!(names.contains(&("function", "greet", true)));
    assert!(names.contains(&("class", "Greeter", true)));
    assert!(names.contains(&("method", "constructor", true)));
    assert!(names.contains(&("method", "load", true)));
    assert!(names.contains(&("method", "#reset", false)));
    assert!(names.contains(&("variable", "#secret", false)));
    assert!(names.contains(&("variable", "count", true)));
    assert!(names.contains(&("function", "shout", false)));
    assert!(names.contains(&("variable", "counter", false)));
    assert!(names.contains(&("variable", "lodash", false)));

    let greet = result.symbols.iter().find(|s| s.name == "greet").unwrap();
    assert_eq!(greet.parameter_count, Some(2));
    assert_eq!(greet.doc_comment.as_deref(), Some("Greets someone."));
    let load = result.symbols.iter().find(|s| s.name == "load").unwrap();
    assert_eq!(load.parent_symbol.as_deref(), Some("Greeter"));
    assert_eq!(load.parameter_count, Some(1));
    for symbol in &result.symbols {
        assert!(symbol.line_start <= symbol.line_end);
    }
}

#[test]
fn extract_imports() {
    let result = extract();
    let imports: Vec<_> = result
        .imports
        .iter()
        .map(|i| {
            (
                i.imported_path.as_str(),
                i.imported_symbols.as_deref(),
                i.module_alias.as_deref(),
                i.kind,
            )
        })
        .collect();

    assert!(imports.contains(&("fs", None, Some("fs"), ImportKind::Static)));
    assert!(imports.contains(&(
        "./io",
        Some("readFile,writeFile as write"),
        None,
        ImportKind::Static
    )));
    assert!(imports.contains(&("./helpers", Some("*"), Some("helpers"), ImportKind::Static)));
    assert!(imports.contains(&("./polyfill", None, None, ImportKind::SideEffect)));
    assert!(imports.contains(&("lodash", None, Some("lodash"), ImportKind::Dynamic)));
    assert!(imports.contains(&("./lazy", None, None, ImportKind::Dynamic)));
}

#[test]
fn extract_calls() {
    let result = extract();
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

    assert!(calls.contains(&("greet", "log", CallKind::Dynamic, Some("console"))));
    assert!(calls.contains(&("greet", "format", CallKind::Dynamic, Some("helpers"))));
    assert!(calls.contains(&("load", "readFile", CallKind::Async, None)));
    assert!(calls.contains(&("load", "Parser", CallKind::Constructor, None)));
    assert!(calls.contains(&("load", "parse", CallKind::Dynamic, None)));
    assert!(calls.contains(&("shout", "greet", CallKind::Direct, None)));
    assert!(calls.contains(&("shout", "toUpperCase", CallKind::Dynamic, Some("text"))));
    assert!(calls.contains(&("<module>", "loadPair", CallKind::Direct, None)));
    assert!(calls.contains(&("<module>", "greet", CallKind::Direct, None)));
    assert!(calls.contains(&("<module>", "then", CallKind::Dynamic, None)));
    assert!(!calls.iter().any(|(_, callee, _, _)| *callee == "require"));
    assert_eq!(
        calls.iter().filter(|(_, callee, _, _)| *callee == "readFile").count(),
        1
    );

    let eval = result.calls.iter().find(|c| c.callee_symbol == "eval").unwrap();
    assert!(eval.is_dynamic_code_execution);
}

#[test]
fn broken_source_is_partial_not_fatal() {
    let mut extractor = JavascriptExtractor::new().unwrap();
    let result = extractor.extract_source(
        "export function ok() { return 1; }\nfunction broken( {\n",
        "broken.js",
    );
    assert!(result.has_error_code(&ErrorCode::SyntaxError));
    assert!(!result.has_fatal_error());
    assert!(result.symbols.iter().any(|s| s.name == "ok"));
}

#[test]
fn exported_expressions_keep_their_outer_call() {
    let mut extractor = JavascriptExtractor::new().unwrap();
    let result = extractor.extract_source("export default createApp(config());\n", "src/main.js");
    let calls: Vec<_> = result
        .calls
        .iter()
        .map(|c| (c.caller_symbol.as_str(), c.callee_symbol.as_str()))
        .collect();
    assert!(calls.contains(&("<module>", "createApp")), "{calls:?}");
    assert!(calls.contains(&("<module>", "config")), "{calls:?}");
    assert_eq!(calls.len(), 2);
}
