use crate::indexer::csharp::CSharpExtractor;
use crate::indexer::roslyn::RoslynExtractor;
use crate::indexer::{Extractor, scan};
use crate::model::{ErrorCode, ExtractionError, ExtractionResult};
use crate::{resolver, util};
use anyhow::Result;
use std::path::Path;

pub const EXTRACTOR_ROSLYN: &str = "roslyn";
pub const EXTRACTOR_TREESITTER: &str = "treesitter";

/// C# extraction preferring Roslyn for directories, with tree-sitter as
/// the fallback and the only strategy for single files.
pub struct CSharpHybridExtractor {
    roslyn: RoslynExtractor,
    treesitter: CSharpExtractor,
    roslyn_available: Option<bool>,
}

impl CSharpHybridExtractor {
    pub fn new() -> Result<Self> {
        Self::with_roslyn(RoslynExtractor::new())
    }

    pub fn with_roslyn(roslyn: RoslynExtractor) -> Result<Self> {
        Ok(Self {
            roslyn,
            treesitter: CSharpExtractor::new()?,
            roslyn_available: None,
        })
    }

    /// Checks Roslyn once; later calls reuse the answer.
    pub fn roslyn_available(&mut self) -> bool {
        if let Some(available) = self.roslyn_available {
            return available;
        }
        let available = self.roslyn.is_available();
        tracing::debug!(available, "checked roslyn availability");
        self.roslyn_available = Some(available);
        available
    }

    pub fn extract_source(&mut self, source: &str, rel_path: &str) -> ExtractionResult {
        let mut result = self.treesitter.extract_source(source, rel_path);
        result.extractor = Some(EXTRACTOR_TREESITTER.to_string());
        result
    }

    fn fall_back(
        &mut self,
        root: &Path,
        options: &scan::ScanOptions,
        reason: String,
    ) -> ExtractionResult {
        tracing::info!("{reason}; using tree-sitter for {}", root.display());
        let mut result = ExtractionResult::with_error(ExtractionError::recoverable(
            util::display_path(root),
            ErrorCode::RoslynFallback,
            reason,
        ));
        result.merge(self.treesitter.extract_directory_with(root, options, false));
        result.extractor = Some(EXTRACTOR_TREESITTER.to_string());
        result
    }
}

impl Extractor for CSharpHybridExtractor {
    fn language(&self) -> &'static str {
        "csharp"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        scan::CSHARP_EXTENSIONS
    }

    fn extract_file(&mut self, path: &Path, rel_path: &str) -> ExtractionResult {
        let mut result = self.treesitter.extract_file(path, rel_path);
        result.extractor = Some(EXTRACTOR_TREESITTER.to_string());
        result
    }

    fn extract_directory_with(
        &mut self,
        root: &Path,
        options: &scan::ScanOptions,
        resolve_calls: bool,
    ) -> ExtractionResult {
        let mut result = if !self.roslyn_available() {
            self.fall_back(root, options, "Roslyn unavailable".to_string())
        } else {
            let attempt = self.roslyn.extract_directory_with(root, options, false);
            if attempt.has_fatal_error() {
                let causes: Vec<String> = attempt
                    .errors
                    .iter()
                    .filter(|error| !error.recoverable)
                    .map(|error| format!("{}: {}", error.code, error.message))
                    .collect();
                let reason = format!("Roslyn extraction failed ({})", causes.join("; "));
                self.fall_back(root, options, reason)
            } else {
                let mut attempt = attempt;
                attempt.extractor = Some(EXTRACTOR_ROSLYN.to_string());
                attempt
            }
        };
        if resolve_calls {
            resolver::resolve_for_language(self.language(), &mut result);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn availability_is_checked_once() {
        let roslyn = RoslynExtractor::with_tool(
            "/nonexistent/roslyn-tool",
            "dotnet",
            Duration::from_secs(1),
        );
        let mut extractor = CSharpHybridExtractor::with_roslyn(roslyn).unwrap();
        assert!(!extractor.roslyn_available());
        assert_eq!(extractor.roslyn_available, Some(false));
    }

    #[test]
    fn single_source_uses_treesitter() {
        let roslyn = RoslynExtractor::with_tool("/nonexistent", "dotnet", Duration::from_secs(1));
        let mut extractor = CSharpHybridExtractor::with_roslyn(roslyn).unwrap();
        let result = extractor.extract_source("class A { void B() {} }", "A.cs");
        assert_eq!(result.extractor.as_deref(), Some(EXTRACTOR_TREESITTER));
        assert_eq!(result.symbols.len(), 2);
        assert_eq!(extractor.roslyn_available, None);
    }
}
