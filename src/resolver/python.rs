use super::ResolutionRules;
use crate::model::Import;
use crate::util;
use std::collections::HashSet;

/// Functions callable without an import.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "abs", "aiter", "all", "anext", "any", "ascii", "bin", "bool", "breakpoint", "bytearray",
    "bytes", "callable", "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir",
    "divmod", "enumerate", "eval", "exec", "filter", "float", "format", "frozenset", "getattr",
    "globals", "hasattr", "hash", "help", "hex", "id", "input", "int", "isinstance",
    "issubclass", "iter", "len", "list", "locals", "map", "max", "memoryview", "min", "next",
    "object", "oct", "open", "ord", "pow", "print", "property", "range", "repr", "reversed",
    "round", "set", "setattr", "slice", "sorted", "staticmethod", "str", "sum", "super",
    "tuple", "type", "vars", "zip", "__import__",
];

/// Top-level standard library modules (3.10+), plus typing shims.
pub const STDLIB_MODULES: &[&str] = &[
    "abc", "aifc", "argparse", "array", "ast", "asynchat", "asyncio", "asyncore", "atexit",
    "audioop", "base64", "bdb", "binascii", "binhex", "bisect", "builtins", "bz2", "calendar",
    "cgi", "cgitb", "chunk", "cmath", "cmd", "code", "codecs", "codeop", "collections",
    "colorsys", "compileall", "concurrent", "configparser", "contextlib", "contextvars", "copy",
    "copyreg", "cProfile", "crypt", "csv", "ctypes", "curses", "dataclasses", "datetime", "dbm",
    "decimal", "difflib", "dis", "distutils", "doctest", "email", "encodings", "enum", "errno",
    "faulthandler", "fcntl", "filecmp", "fileinput", "fnmatch", "fractions", "ftplib",
    "functools", "gc", "getopt", "getpass", "gettext", "glob", "graphlib", "grp", "gzip",
    "hashlib", "heapq", "hmac", "html", "http", "idlelib", "imaplib", "imghdr", "imp",
    "importlib", "inspect", "io", "ipaddress", "itertools", "json", "keyword", "lib2to3",
    "linecache", "locale", "logging", "lzma", "mailbox", "mailcap", "marshal", "math",
    "mimetypes", "mmap", "modulefinder", "multiprocessing", "netrc", "nis", "nntplib",
    "numbers", "operator", "optparse", "os", "ossaudiodev", "pathlib", "pdb", "pickle",
    "pickletools", "pipes", "pkgutil", "platform", "plistlib", "poplib", "posix", "posixpath",
    "pprint", "profile", "pstats", "pty", "pwd", "py_compile", "pyclbr", "pydoc", "queue",
    "quopri", "random", "re", "readline", "reprlib", "resource", "rlcompleter", "runpy",
    "sched", "secrets", "select", "selectors", "shelve", "shlex", "shutil", "signal", "site",
    "smtpd", "smtplib", "sndhdr", "socket", "socketserver", "spwd", "sqlite3", "ssl", "stat",
    "statistics", "string", "stringprep", "struct", "subprocess", "sunau", "symtable", "sys",
    "sysconfig", "syslog", "tabnanny", "tarfile", "telnetlib", "tempfile", "termios", "test",
    "textwrap", "threading", "time", "timeit", "tkinter", "token", "tokenize", "tomllib",
    "trace", "traceback", "tracemalloc", "tty", "turtle", "turtledemo", "types", "typing",
    "unicodedata", "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave", "weakref",
    "webbrowser", "winreg", "winsound", "wsgiref", "xdrlib", "xml", "xmlrpc", "zipapp",
    "zipfile", "zipimport", "zlib", "zoneinfo", "_typeshed", "typing_extensions",
    "__future__",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonRules;

impl ResolutionRules for PythonRules {
    fn language(&self) -> &'static str {
        "python"
    }

    fn is_opaque_receiver(&self, object: &str) -> bool {
        matches!(object, "self" | "cls")
    }

    fn is_builtin(&self, name: &str) -> bool {
        BUILTIN_FUNCTIONS.contains(&name)
    }

    fn is_stdlib_module(&self, import_path: &str) -> bool {
        if import_path.starts_with('.') {
            return false;
        }
        let root = import_path.split('.').next().unwrap_or(import_path);
        STDLIB_MODULES.contains(&root)
    }

    fn resolve_module_path(
        &self,
        import_path: &str,
        from_file: &str,
        files: &HashSet<String>,
    ) -> Option<String> {
        let target = if import_path.starts_with('.') {
            relative_target(import_path, from_file)?
        } else {
            if import_path.is_empty() || self.is_stdlib_module(import_path) {
                return None;
            }
            import_path.replace('.', "/")
        };
        module_candidates(&target)
            .into_iter()
            .find(|candidate| files.contains(candidate))
    }

    fn default_module_alias(&self, import_path: &str) -> Option<String> {
        import_path
            .rsplit('.')
            .next()
            .filter(|part| !part.is_empty())
            .map(str::to_string)
    }

    fn submodule_path(&self, import_path: &str, name: &str) -> Option<String> {
        if name == "*" || name.is_empty() {
            return None;
        }
        if import_path.ends_with('.') {
            Some(format!("{import_path}{name}"))
        } else {
            Some(format!("{import_path}.{name}"))
        }
    }

    fn stdlib_names(&self, import: &Import) -> Vec<String> {
        if import.imported_symbols.is_some() || import.module_alias.is_some() {
            return Vec::new();
        }
        import
            .imported_path
            .split('.')
            .next()
            .map(|root| vec![root.to_string()])
            .unwrap_or_default()
    }
}

/// Slash path (without suffix) named by a relative import, walking up one
/// directory per dot past the first. Returns None above the scanned root.
fn relative_target(import_path: &str, from_file: &str) -> Option<String> {
    let level = import_path.chars().take_while(|ch| *ch == '.').count();
    let module_part = &import_path[level..];
    let mut dir = util::parent_dir(from_file).to_string();
    for _ in 1..level {
        if dir.is_empty() {
            return None;
        }
        dir = util::parent_dir(&dir).to_string();
    }
    if module_part.is_empty() {
        return Some(dir);
    }
    Some(util::join_rel(&dir, &module_part.replace('.', "/")))
}

fn module_candidates(target: &str) -> Vec<String> {
    if target.is_empty() {
        return vec!["__init__.py".to_string()];
    }
    vec![format!("{target}.py"), format!("{target}/__init__.py")]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|path| path.to_string()).collect()
    }

    #[test]
    fn dotted_paths_prefer_module_then_package() {
        let files = files(&["utils/helper.py", "pkg/__init__.py", "pkg/sub/__init__.py"]);
        let rules = PythonRules;
        assert_eq!(
            rules.resolve_module_path("utils.helper", "main.py", &files).as_deref(),
            Some("utils/helper.py")
        );
        assert_eq!(
            rules.resolve_module_path("pkg.sub", "main.py", &files).as_deref(),
            Some("pkg/sub/__init__.py")
        );
        assert_eq!(rules.resolve_module_path("requests", "main.py", &files), None);
    }

    #[test]
    fn relative_imports_walk_up_per_dot() {
        let files = files(&["pkg/b.py", "pkg/__init__.py", "shared.py"]);
        let rules = PythonRules;
        assert_eq!(
            rules.resolve_module_path(".b", "pkg/a.py", &files).as_deref(),
            Some("pkg/b.py")
        );
        assert_eq!(
            rules.resolve_module_path(".", "pkg/a.py", &files).as_deref(),
            Some("pkg/__init__.py")
        );
        assert_eq!(
            rules.resolve_module_path("..shared", "pkg/a.py", &files).as_deref(),
            Some("shared.py")
        );
        assert_eq!(rules.resolve_module_path("...shared", "pkg/a.py", &files), None);
    }

    #[test]
    fn stdlib_roots_are_never_resolved_locally() {
        let files = files(&["os/path.py"]);
        let rules = PythonRules;
        assert!(rules.is_stdlib_module("os.path"));
        assert!(!rules.is_stdlib_module(".os"));
        assert_eq!(rules.resolve_module_path("os.path", "main.py", &files), None);
    }

    #[test]
    fn submodule_specifiers_follow_relative_dots() {
        let rules = PythonRules;
        assert_eq!(rules.submodule_path(".", "b").as_deref(), Some(".b"));
        assert_eq!(rules.submodule_path("pkg", "mod").as_deref(), Some("pkg.mod"));
        assert_eq!(rules.default_module_alias("a.b.c").as_deref(), Some("c"));
    }
}
