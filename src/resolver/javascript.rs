use super::ResolutionRules;
use crate::util;
use std::collections::HashSet;

/// Node.js core modules (bare names; `node:` specifiers are always core).
pub const NODE_BUILTINS: &[&str] = &[
    "assert", "assert/strict", "async_hooks", "buffer", "child_process", "cluster", "console",
    "constants", "crypto", "dgram", "diagnostics_channel", "dns", "dns/promises", "domain",
    "events", "fs", "fs/promises", "http", "http2", "https", "inspector", "module", "net", "os",
    "path", "path/posix", "path/win32", "perf_hooks", "process", "punycode", "querystring",
    "readline", "readline/promises", "repl", "stream", "stream/consumers", "stream/promises",
    "stream/web", "string_decoder", "sys", "test", "timers", "timers/promises", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Globals available in every JS runtime without an import.
pub const JS_GLOBALS: &[&str] = &[
    "console", "setTimeout", "setInterval", "clearTimeout", "clearInterval", "setImmediate",
    "clearImmediate", "queueMicrotask", "fetch", "parseInt", "parseFloat", "isNaN", "isFinite",
    "encodeURI", "encodeURIComponent", "decodeURI", "decodeURIComponent", "JSON", "Math",
    "Date", "RegExp", "Error", "TypeError", "RangeError", "SyntaxError", "ReferenceError",
    "URIError", "EvalError", "Promise", "Array", "Object", "String", "Number", "Boolean",
    "Symbol", "Map", "Set", "WeakMap", "WeakSet", "WeakRef", "Proxy", "Reflect", "globalThis",
    "Intl", "ArrayBuffer", "SharedArrayBuffer", "DataView", "Float32Array", "Float64Array",
    "Int8Array", "Int16Array", "Int32Array", "Uint8Array", "Uint16Array", "Uint32Array",
    "Uint8ClampedArray", "BigInt", "BigInt64Array", "BigUint64Array", "FinalizationRegistry",
    "AggregateError", "structuredClone", "atob", "btoa", "TextEncoder", "TextDecoder", "URL",
    "URLSearchParams", "AbortController", "AbortSignal", "EventTarget", "Event", "CustomEvent",
    "ReadableStream", "WritableStream", "TransformStream", "Blob", "File", "FormData",
    "Headers", "Request", "Response",
];

/// Suffixes tried, in order, for extensionless relative specifiers.
pub const RESOLVE_EXTENSIONS: &[&str] =
    &[".js", ".jsx", ".mjs", ".cjs", ".ts", ".tsx", ".mts", ".cts"];

#[derive(Debug, Clone, Copy, Default)]
pub struct JavascriptRules;

impl ResolutionRules for JavascriptRules {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn is_opaque_receiver(&self, object: &str) -> bool {
        matches!(object, "this" | "super")
    }

    fn is_builtin(&self, name: &str) -> bool {
        JS_GLOBALS.contains(&name)
    }

    fn is_stdlib_module(&self, import_path: &str) -> bool {
        if import_path.starts_with("node:") {
            return true;
        }
        if NODE_BUILTINS.contains(&import_path) {
            return true;
        }
        let root = import_path.split('/').next().unwrap_or(import_path);
        NODE_BUILTINS.contains(&root)
    }

    fn resolve_module_path(
        &self,
        import_path: &str,
        from_file: &str,
        files: &HashSet<String>,
    ) -> Option<String> {
        if !(import_path.starts_with("./") || import_path.starts_with("../") || import_path == ".")
        {
            return None;
        }
        let target =
            util::normalize_slash_path(&util::join_rel(util::parent_dir(from_file), import_path))?;
        candidates(&target)
            .into_iter()
            .find(|candidate| files.contains(candidate))
    }
}

fn candidates(target: &str) -> Vec<String> {
    let mut out = Vec::new();
    if !target.is_empty() {
        out.push(target.to_string());
        // Compiled-output specifiers (`./a.js`) written against TS sources.
        if let Some(stem) = target.strip_suffix(".js") {
            out.push(format!("{stem}.ts"));
            out.push(format!("{stem}.tsx"));
        }
        out.extend(RESOLVE_EXTENSIONS.iter().map(|ext| format!("{target}{ext}")));
    }
    let index = util::join_rel(target, "index");
    out.extend(RESOLVE_EXTENSIONS.iter().map(|ext| format!("{index}{ext}")));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|path| path.to_string()).collect()
    }

    #[test]
    fn relative_specifiers_resolve_from_caller_dir() {
        let files = files(&["src/lib/util.ts", "src/components/index.tsx", "src/app.js"]);
        let rules = JavascriptRules;
        assert_eq!(
            rules.resolve_module_path("./lib/util", "src/main.ts", &files).as_deref(),
            Some("src/lib/util.ts")
        );
        assert_eq!(
            rules.resolve_module_path("../components", "src/lib/util.ts", &files).as_deref(),
            Some("src/components/index.tsx")
        );
        assert_eq!(
            rules.resolve_module_path("./app.js", "src/main.ts", &files).as_deref(),
            Some("src/app.js")
        );
        assert_eq!(
            rules.resolve_module_path("./lib/util.js", "src/main.ts", &files).as_deref(),
            Some("src/lib/util.ts")
        );
    }

    #[test]
    fn bare_and_escaping_specifiers_are_external() {
        let files = files(&["react.js", "util.js"]);
        let rules = JavascriptRules;
        assert_eq!(rules.resolve_module_path("react", "main.js", &files), None);
        assert_eq!(rules.resolve_module_path("../util", "main.js", &files), None);
    }

    #[test]
    fn node_core_modules_are_stdlib() {
        let rules = JavascriptRules;
        assert!(rules.is_stdlib_module("fs"));
        assert!(rules.is_stdlib_module("fs/promises"));
        assert!(rules.is_stdlib_module("node:sqlite"));
        assert!(!rules.is_stdlib_module("lodash/fp"));
        assert!(!rules.is_stdlib_module("./fs"));
    }
}
