use crate::indexer::python::PythonTreeSitterExtractor;
use crate::indexer::python_ast::PythonAstExtractor;
use crate::indexer::{Extractor, scan};
use crate::model::{ErrorCode, ExtractionError, ExtractionResult};
use std::path::Path;

/// Python extraction that prefers the native syntax tree and re-extracts
/// a file with tree-sitter only when the native parse reports a syntax error.
pub struct HybridExtractor {
    ast: PythonAstExtractor,
    treesitter: Option<PythonTreeSitterExtractor>,
    fallback_files: Vec<String>,
}

impl Default for HybridExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridExtractor {
    pub fn new() -> Self {
        Self {
            ast: PythonAstExtractor::new(),
            treesitter: None,
            fallback_files: Vec::new(),
        }
    }

    /// Files re-extracted with tree-sitter since the last reset, in order.
    pub fn fallback_files(&self) -> &[String] {
        &self.fallback_files
    }

    pub fn fallback_count(&self) -> usize {
        self.fallback_files.len()
    }

    pub fn reset_fallback_tracking(&mut self) {
        self.fallback_files.clear();
    }

    pub fn extract_source(&mut self, source: &str, rel_path: &str) -> ExtractionResult {
        let primary = self.ast.extract_source(source, rel_path);
        if !primary.has_error_code(&ErrorCode::SyntaxError) {
            return primary;
        }
        self.fall_back(rel_path, primary, |extractor| {
            extractor.extract_source(source, rel_path)
        })
    }

    fn fall_back<F>(&mut self, rel_path: &str, primary: ExtractionResult, run: F) -> ExtractionResult
    where
        F: FnOnce(&mut PythonTreeSitterExtractor) -> ExtractionResult,
    {
        if self.treesitter.is_none() {
            match PythonTreeSitterExtractor::new() {
                Ok(extractor) => self.treesitter = Some(extractor),
                Err(err) => {
                    tracing::warn!("tree-sitter fallback unavailable for {rel_path}: {err:#}");
                    let mut result = primary;
                    result.errors.push(ExtractionError::recoverable(
                        rel_path,
                        ErrorCode::ExtractionError,
                        format!("tree-sitter fallback unavailable: {err:#}"),
                    ));
                    return result;
                }
            }
        }
        let Some(treesitter) = self.treesitter.as_mut() else {
            return primary;
        };
        tracing::debug!("syntax error in {rel_path}, retrying with tree-sitter");
        let result = run(treesitter);
        self.fallback_files.push(rel_path.to_string());
        result
    }
}

impl Extractor for HybridExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        scan::PYTHON_EXTENSIONS
    }

    fn extract_file(&mut self, path: &Path, rel_path: &str) -> ExtractionResult {
        let primary = self.ast.extract_file(path, rel_path);
        if !primary.has_error_code(&ErrorCode::SyntaxError) {
            return primary;
        }
        self.fall_back(rel_path, primary, |extractor| {
            extractor.extract_file(path, rel_path)
        })
    }
}
