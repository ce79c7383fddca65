use anyhow::{Result, bail};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub language: &'static str,
}

#[derive(Debug, Clone)]
pub struct ScanFailure {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub files: Vec<ScannedFile>,
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug, Clone)]
pub struct LanguageSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub exclude_dirs: Vec<String>,
    pub respect_ignore_files: bool,
}

impl ScanOptions {
    pub fn new(exclude_dirs: Vec<String>) -> Self {
        Self {
            exclude_dirs,
            respect_ignore_files: false,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new(crate::config::Config::get().exclude_dirs.clone())
    }
}

pub const PYTHON_EXTENSIONS: &[&str] = &["py"];
pub const JAVASCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];
pub const TYPESCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];
pub const CSHARP_EXTENSIONS: &[&str] = &["cs"];

static LANGUAGE_SPECS: &[LanguageSpec] = &[
    LanguageSpec {
        name: "python",
        extensions: PYTHON_EXTENSIONS,
    },
    LanguageSpec {
        name: "javascript",
        extensions: JAVASCRIPT_EXTENSIONS,
    },
    LanguageSpec {
        name: "typescript",
        extensions: TYPESCRIPT_EXTENSIONS,
    },
    LanguageSpec {
        name: "csharp",
        extensions: CSHARP_EXTENSIONS,
    },
];

/// Walks every file whose extension belongs to a known language.
pub fn scan_repo_with_options(repo_root: &Path, options: &ScanOptions) -> Result<ScanReport> {
    scan_matching(repo_root, options, |path| detect_language(path))
}

/// Walks only files carrying one of `extensions` (without leading dots).
pub fn scan_extensions(
    repo_root: &Path,
    extensions: &[&str],
    options: &ScanOptions,
) -> Result<ScanReport> {
    scan_matching(repo_root, options, |path| {
        let ext = path.extension().and_then(|ext| ext.to_str())?;
        if extensions.iter().any(|candidate| *candidate == ext) {
            detect_language(path).or(Some("unknown"))
        } else {
            None
        }
    })
}

fn scan_matching<F>(repo_root: &Path, options: &ScanOptions, classify: F) -> Result<ScanReport>
where
    F: Fn(&Path) -> Option<&'static str>,
{
    if !repo_root.is_dir() {
        bail!("not a directory: {}", repo_root.display());
    }
    let mut report = ScanReport::default();
    let excluded: HashSet<String> = options.exclude_dirs.iter().cloned().collect();
    let mut builder = WalkBuilder::new(repo_root);
    builder
        .ignore(options.respect_ignore_files)
        .git_ignore(options.respect_ignore_files)
        .git_global(options.respect_ignore_files)
        .git_exclude(options.respect_ignore_files)
        .parents(options.respect_ignore_files)
        .require_git(false);
    let walker = builder
        .hidden(false)
        .filter_entry(move |entry| !is_excluded_entry(entry, &excluded))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                report.failures.push(ScanFailure {
                    path: walk_error_path(&err, repo_root),
                    message: err.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let Some(language) = classify(path) else {
            continue;
        };
        let rel_path = crate::util::normalize_rel_path(repo_root, path)?;
        report.files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
            language,
        });
    }
    report.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(report)
}

/// Path named by a walk error, relative to the root when possible.
fn walk_error_path(err: &ignore::Error, repo_root: &Path) -> String {
    match err {
        ignore::Error::WithPath { path, .. } | ignore::Error::Loop { child: path, .. } => {
            crate::util::normalize_rel_path(repo_root, path)
                .unwrap_or_else(|_| crate::util::display_path(path))
        }
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err, repo_root)
        }
        _ => crate::util::display_path(repo_root),
    }
}

fn is_excluded_entry(entry: &ignore::DirEntry, excluded: &HashSet<String>) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    if !entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| excluded.contains(name))
        .unwrap_or(false)
}

pub fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    for spec in LANGUAGE_SPECS {
        if spec.extensions.iter().any(|candidate| *candidate == ext) {
            return Some(spec.name);
        }
    }
    None
}
