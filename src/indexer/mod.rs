use crate::model::{ErrorCode, ExtractionError, ExtractionResult};
use crate::{resolver, util};
use anyhow::Result;
use clap::ValueEnum;
use std::path::Path;
use std::time::Instant;

pub mod csharp;
pub mod csharp_hybrid;
pub mod hybrid;
pub mod javascript;
pub mod python;
pub mod python_ast;
pub mod roslyn;
pub mod scan;

/// Language families a repository run can cover.
#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Csharp,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::Javascript,
        Language::Typescript,
        Language::Csharp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Csharp => "csharp",
        }
    }
}

/// One strategy turning source files of a single language into records.
pub trait Extractor {
    fn language(&self) -> &'static str;

    /// Extensions claimed by this extractor, without the leading dot.
    fn file_extensions(&self) -> &'static [&'static str];

    /// Extracts one file. `rel_path` is the path recorded on every record.
    fn extract_file(&mut self, path: &Path, rel_path: &str) -> ExtractionResult;

    /// Walks `root` skipping the configured directory names plus
    /// `exclude_dirs`.
    fn extract_directory(
        &mut self,
        root: &Path,
        exclude_dirs: &[String],
        resolve_calls: bool,
    ) -> ExtractionResult {
        let mut options = scan::ScanOptions::default();
        for dir in exclude_dirs {
            if !options.exclude_dirs.contains(dir) {
                options.exclude_dirs.push(dir.clone());
            }
        }
        self.extract_directory_with(root, &options, resolve_calls)
    }

    /// Walks `root`, extracts every matching file in path order and
    /// optionally resolves calls over the combined records.
    fn extract_directory_with(
        &mut self,
        root: &Path,
        options: &scan::ScanOptions,
        resolve_calls: bool,
    ) -> ExtractionResult {
        let started = Instant::now();
        let report = match scan::scan_extensions(root, self.file_extensions(), options) {
            Ok(report) => report,
            Err(err) => {
                return ExtractionResult::with_error(ExtractionError::fatal(
                    util::normalize_path(root),
                    ErrorCode::ReadError,
                    format!("{err:#}"),
                ));
            }
        };
        let mut result = ExtractionResult::default();
        for failure in report.failures {
            result.errors.push(ExtractionError::recoverable(
                failure.path,
                ErrorCode::ReadError,
                failure.message,
            ));
        }
        for file in &report.files {
            let file_result = self.extract_file(&file.abs_path, &file.rel_path);
            result.merge(file_result);
        }
        tracing::debug!(
            language = self.language(),
            files = report.files.len(),
            symbols = result.symbols.len(),
            calls = result.calls.len(),
            errors = result.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extracted directory"
        );
        if resolve_calls {
            resolver::resolve_for_language(self.language(), &mut result);
        }
        result
    }
}

/// Reads `path` and hands the text to `extract`, turning read and decode
/// failures into recoverable error records.
pub(crate) fn extract_with<F>(path: &Path, rel_path: &str, extract: F) -> ExtractionResult
where
    F: FnOnce(&str) -> ExtractionResult,
{
    match util::read_source(path) {
        Ok(source) => extract(&source),
        Err(err) => {
            tracing::debug!("skipping {rel_path}: {err}");
            ExtractionResult::with_error(err.into_record(rel_path))
        }
    }
}

/// Picks the preferred extractor for a single file by extension.
pub fn extractor_for_path(path: &Path) -> Result<Option<Box<dyn Extractor>>> {
    let extractor: Box<dyn Extractor> = match scan::detect_language(path) {
        Some("python") => Box::new(hybrid::HybridExtractor::new()),
        Some("javascript") => Box::new(javascript::JavascriptExtractor::new()?),
        Some("typescript") => Box::new(javascript::TypescriptExtractor::new()?),
        Some("csharp") => Box::new(csharp_hybrid::CSharpHybridExtractor::new()?),
        _ => return Ok(None),
    };
    Ok(Some(extractor))
}

#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    pub languages: Vec<Language>,
    pub scan: scan::ScanOptions,
    pub resolve_calls: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            languages: Language::ALL.to_vec(),
            scan: scan::ScanOptions::default(),
            resolve_calls: true,
        }
    }
}

impl RepositoryOptions {
    fn wants(&self, language: Language) -> bool {
        self.languages.is_empty() || self.languages.contains(&language)
    }
}

/// Runs every requested language family over `root`.
///
/// Python calls are resolved on their own; JavaScript and TypeScript share
/// one resolution pass so imports across the two dialects resolve.
pub fn extract_repository(root: &Path, options: &RepositoryOptions) -> Result<ExtractionResult> {
    let started = Instant::now();
    let mut result = ExtractionResult::default();

    if options.wants(Language::Python) {
        let mut extractor = hybrid::HybridExtractor::new();
        let part = extractor.extract_directory_with(root, &options.scan, options.resolve_calls);
        if extractor.fallback_count() > 0 {
            tracing::info!(
                files = extractor.fallback_count(),
                "python files extracted with the tree-sitter fallback"
            );
        }
        result.merge(part);
    }

    let mut web = ExtractionResult::default();
    if options.wants(Language::Javascript) {
        let mut extractor = javascript::JavascriptExtractor::new()?;
        web.merge(extractor.extract_directory_with(root, &options.scan, false));
    }
    if options.wants(Language::Typescript) {
        let mut extractor = javascript::TypescriptExtractor::new()?;
        web.merge(extractor.extract_directory_with(root, &options.scan, false));
    }
    if options.resolve_calls && !web.calls.is_empty() {
        resolver::resolve_for_language("javascript", &mut web);
    }
    result.merge(web);

    if options.wants(Language::Csharp) {
        let mut extractor = csharp_hybrid::CSharpHybridExtractor::new()?;
        result.merge(extractor.extract_directory_with(root, &options.scan, false));
    }

    tracing::info!(
        symbols = result.symbols.len(),
        calls = result.calls.len(),
        imports = result.imports.len(),
        errors = result.errors.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "repository extraction finished"
    );
    Ok(result)
}
