//! Cross-file call resolution.
//!
//! Runs after extraction over the complete symbol and import lists of a
//! scanned tree. Each call is resolved with the precedence same file,
//! builtin, module attribute, namespace bindings, star imports. Anything
//! left over is counted as stdlib, builtin receiver, dynamic or external.

use crate::model::{Call, ExtractionResult, Import, ImportKind, ResolutionStats, Symbol};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

pub mod javascript;
pub mod python;

pub use javascript::JavascriptRules;
pub use python::PythonRules;

/// Language-specific tables and module-path rules.
pub trait ResolutionRules {
    fn language(&self) -> &'static str;

    /// Receivers whose type the resolver cannot know (`self`, `this`).
    fn is_opaque_receiver(&self, object: &str) -> bool;

    /// Names available without an import.
    fn is_builtin(&self, name: &str) -> bool;

    /// Import specifiers naming the language's standard library.
    fn is_stdlib_module(&self, import_path: &str) -> bool;

    /// Maps an import specifier written in `from_file` to a scanned file.
    fn resolve_module_path(
        &self,
        import_path: &str,
        from_file: &str,
        files: &HashSet<String>,
    ) -> Option<String>;

    /// Name bound by a whole-module import that carries no explicit alias.
    fn default_module_alias(&self, _import_path: &str) -> Option<String> {
        None
    }

    /// Specifier of `name` imported from `import_path` when it may itself
    /// be a module (`from pkg import mod`).
    fn submodule_path(&self, _import_path: &str, _name: &str) -> Option<String> {
        None
    }

    /// Extra names an import of a stdlib module makes visible.
    fn stdlib_names(&self, _import: &Import) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub file: String,
    /// Name as declared in `file`, before any `as` alias.
    pub name: String,
}

/// Names one file's imports make visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedNamespace {
    pub bindings: HashMap<String, Binding>,
    pub module_aliases: HashMap<String, String>,
    /// Searched in import order for names missing from `bindings`.
    pub star_imports: Vec<String>,
    pub stdlib_names: HashSet<String>,
}

/// Per-run namespace cache, keyed by caller file.
#[derive(Debug, Default)]
pub struct NamespaceCache {
    entries: HashMap<String, ResolvedNamespace>,
}

impl NamespaceCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, file: &str) -> Option<&ResolvedNamespace> {
        self.entries.get(file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    SameFile(String),
    ModuleAttr(String),
    CrossFile(String),
    Builtin,
    Stdlib,
    Dynamic,
    External,
}

impl Outcome {
    fn file(self) -> Option<String> {
        match self {
            Outcome::SameFile(file) | Outcome::ModuleAttr(file) | Outcome::CrossFile(file) => {
                Some(file)
            }
            _ => None,
        }
    }
}

pub struct CallResolver<R> {
    rules: R,
    symbols_by_file: HashMap<String, HashSet<String>>,
    imports_by_file: HashMap<String, Vec<Import>>,
    files: HashSet<String>,
    cache: NamespaceCache,
    stats: ResolutionStats,
}

pub type PythonCallResolver = CallResolver<PythonRules>;
pub type JsCallResolver = CallResolver<JavascriptRules>;

impl CallResolver<PythonRules> {
    pub fn python(symbols: &[Symbol], imports: &[Import]) -> Self {
        Self::new(PythonRules, symbols, imports)
    }
}

impl CallResolver<JavascriptRules> {
    pub fn javascript(symbols: &[Symbol], imports: &[Import]) -> Self {
        Self::new(JavascriptRules, symbols, imports)
    }
}

impl<R: ResolutionRules> CallResolver<R> {
    pub fn new(rules: R, symbols: &[Symbol], imports: &[Import]) -> Self {
        let mut symbols_by_file: HashMap<String, HashSet<String>> = HashMap::new();
        for symbol in symbols {
            symbols_by_file
                .entry(symbol.path.clone())
                .or_default()
                .insert(symbol.name.clone());
        }
        let mut imports_by_file: HashMap<String, Vec<Import>> = HashMap::new();
        for import in imports {
            imports_by_file
                .entry(import.file.clone())
                .or_default()
                .push(import.clone());
        }
        let files = symbols_by_file.keys().cloned().collect();
        Self {
            rules,
            symbols_by_file,
            imports_by_file,
            files,
            cache: NamespaceCache::default(),
            stats: ResolutionStats::default(),
        }
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    pub fn cache(&self) -> &NamespaceCache {
        &self.cache
    }

    /// Returns `calls` with `callee_file` set wherever a target was found.
    /// Statistics cover this run only.
    pub fn resolve(&mut self, calls: &[Call]) -> Vec<Call> {
        self.stats = ResolutionStats {
            total_calls: calls.len() as u64,
            ..ResolutionStats::default()
        };
        calls
            .iter()
            .map(|call| {
                let callee_file = self.resolve_call(call);
                Call {
                    callee_file,
                    ..call.clone()
                }
            })
            .collect()
    }

    pub fn resolve_call(&mut self, call: &Call) -> Option<String> {
        let outcome = self.classify(call);
        let stats = &mut self.stats;
        match &outcome {
            Outcome::SameFile(_) => stats.resolved_same_file += 1,
            Outcome::ModuleAttr(_) => stats.resolved_module_attr += 1,
            Outcome::CrossFile(_) => stats.resolved_cross_file += 1,
            Outcome::Builtin => stats.unresolved_builtin += 1,
            Outcome::Stdlib => stats.unresolved_stdlib += 1,
            Outcome::Dynamic => stats.unresolved_dynamic += 1,
            Outcome::External => stats.unresolved_external += 1,
        }
        outcome.file()
    }

    /// Namespace for `file`, built on first use.
    pub fn namespace(&mut self, file: &str) -> &ResolvedNamespace {
        if !self.cache.entries.contains_key(file) {
            let namespace = build_namespace(
                &self.rules,
                self.imports_by_file.get(file).map(Vec::as_slice).unwrap_or(&[]),
                file,
                &self.files,
            );
            self.cache.entries.insert(file.to_string(), namespace);
        }
        &self.cache.entries[file]
    }

    fn declares(&self, file: &str, name: &str) -> bool {
        self.symbols_by_file
            .get(file)
            .is_some_and(|names| names.contains(name))
    }

    fn classify(&mut self, call: &Call) -> Outcome {
        let callee = call.callee_symbol.as_str();
        let caller_file = call.caller_file.as_str();
        let receiver = call.callee_object.as_deref();

        if receiver.is_some_and(|object| self.rules.is_opaque_receiver(object)) {
            return Outcome::Dynamic;
        }
        if self.declares(caller_file, callee) {
            return Outcome::SameFile(caller_file.to_string());
        }
        if self.rules.is_builtin(callee) {
            return Outcome::Builtin;
        }

        self.namespace(caller_file);
        let namespace = &self.cache.entries[caller_file];

        if let Some(object) = receiver {
            if let Some(module_file) = namespace.module_aliases.get(object) {
                if self.declares(module_file, callee) {
                    return Outcome::ModuleAttr(module_file.clone());
                }
            }
        }
        if let Some(binding) = namespace.bindings.get(callee) {
            if self.declares(&binding.file, &binding.name) {
                return Outcome::CrossFile(binding.file.clone());
            }
        }
        for star_file in &namespace.star_imports {
            if self.declares(star_file, callee) {
                return Outcome::CrossFile(star_file.clone());
            }
        }

        let stdlib_bound = namespace.stdlib_names.contains(callee)
            || receiver.is_some_and(|object| namespace.stdlib_names.contains(object));
        if stdlib_bound {
            Outcome::Stdlib
        } else if receiver.is_some_and(|object| self.rules.is_builtin(object)) {
            Outcome::Builtin
        } else if call.is_member_call() {
            Outcome::Dynamic
        } else {
            Outcome::External
        }
    }
}

fn build_namespace<R: ResolutionRules>(
    rules: &R,
    imports: &[Import],
    file: &str,
    files: &HashSet<String>,
) -> ResolvedNamespace {
    let mut namespace = ResolvedNamespace::default();
    for import in imports {
        if rules.is_stdlib_module(&import.imported_path) {
            namespace.stdlib_names.extend(stdlib_bound_names(rules, import));
            continue;
        }
        if import.kind == ImportKind::Dynamic {
            continue;
        }
        let resolved = rules.resolve_module_path(&import.imported_path, file, files);
        match import.imported_symbols.as_deref() {
            None => {
                let alias = import
                    .module_alias
                    .clone()
                    .or_else(|| rules.default_module_alias(&import.imported_path));
                if let (Some(alias), Some(resolved)) = (alias, resolved) {
                    namespace.module_aliases.insert(alias, resolved);
                }
            }
            Some("*") => {
                let Some(resolved) = resolved else {
                    continue;
                };
                if let Some(alias) = &import.module_alias {
                    namespace.module_aliases.insert(alias.clone(), resolved.clone());
                }
                namespace.star_imports.push(resolved);
            }
            Some(symbols) => {
                for (name, alias) in split_imported_symbols(symbols) {
                    let submodule = rules
                        .submodule_path(&import.imported_path, name)
                        .and_then(|path| rules.resolve_module_path(&path, file, files));
                    if let Some(submodule) = submodule {
                        namespace.module_aliases.insert(alias.to_string(), submodule);
                    }
                    if let Some(resolved) = &resolved {
                        namespace.bindings.insert(
                            alias.to_string(),
                            Binding {
                                file: resolved.clone(),
                                name: name.to_string(),
                            },
                        );
                    }
                }
            }
        }
    }
    namespace
}

fn stdlib_bound_names<R: ResolutionRules>(rules: &R, import: &Import) -> Vec<String> {
    let mut names = rules.stdlib_names(import);
    if let Some(alias) = &import.module_alias {
        names.push(alias.clone());
    }
    if let Some(symbols) = import.imported_symbols.as_deref().filter(|_| !import.is_star()) {
        names.extend(split_imported_symbols(symbols).map(|(_, alias)| alias.to_string()));
    }
    names
}

/// `"a, b as c"` → `[("a", "a"), ("b", "c")]`.
pub fn split_imported_symbols(raw: &str) -> impl Iterator<Item = (&str, &str)> {
    raw.split(',').filter_map(|part| {
        let part = part.trim();
        if part.is_empty() {
            return None;
        }
        match part.split_once(" as ") {
            Some((name, alias)) => Some((name.trim(), alias.trim())),
            None => Some((part, part)),
        }
    })
}

/// Resolves `result.calls` in place with the resolver for `language` and
/// records the statistics. Languages without a resolver are left alone.
pub fn resolve_for_language(language: &str, result: &mut ExtractionResult) {
    match language {
        "python" => {
            let resolver = CallResolver::python(&result.symbols, &result.imports);
            apply(resolver, result);
        }
        "javascript" | "typescript" => {
            let resolver = CallResolver::javascript(&result.symbols, &result.imports);
            apply(resolver, result);
        }
        other => tracing::debug!("no call resolver for {other}"),
    }
}

fn apply<R: ResolutionRules>(mut resolver: CallResolver<R>, result: &mut ExtractionResult) {
    let started = Instant::now();
    result.calls = resolver.resolve(&result.calls);
    let stats = resolver.stats();
    tracing::info!(
        language = resolver.rules.language(),
        calls = stats.total_calls,
        resolved = stats.total_resolved(),
        rate = %format!("{:.1}%", stats.resolution_rate() * 100.0),
        builtin = stats.unresolved_builtin,
        stdlib = stats.unresolved_stdlib,
        external = stats.unresolved_external,
        dynamic = stats.unresolved_dynamic,
        namespaces = resolver.cache().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "resolved calls"
    );
    result.resolution_stats = Some(stats);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_aliases() {
        let parts: Vec<_> = split_imported_symbols("a, b as c,, d").collect();
        assert_eq!(parts, vec![("a", "a"), ("b", "c"), ("d", "d")]);
    }

    #[test]
    fn namespace_is_cached_per_file() {
        let imports = vec![Import {
            file: "main.py".to_string(),
            imported_path: "os".to_string(),
            imported_symbols: None,
            kind: ImportKind::Static,
            line_number: 1,
            module_alias: None,
        }];
        let mut resolver = CallResolver::python(&[], &imports);
        assert!(resolver.cache().is_empty());
        assert!(resolver.namespace("main.py").stdlib_names.contains("os"));
        resolver.namespace("main.py");
        assert_eq!(resolver.cache().len(), 1);
    }
}
