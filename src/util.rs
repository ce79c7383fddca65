use crate::error::ExtractError;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};

/// Reads a source file, keeping read and decode failures apart.
pub fn read_source(path: &Path) -> Result<String, ExtractError> {
    let bytes = fs::read(path)?;
    let source = String::from_utf8(bytes)?;
    Ok(source)
}

pub fn normalize_rel_path(repo_root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(repo_root).with_context(|| {
        format!(
            "strip prefix {} from {}",
            repo_root.display(),
            path.display()
        )
    })?;
    Ok(normalize_path(rel))
}

pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            _ => {}
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Path as shown in error records: forward slashes, nothing dropped.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Normalizes a slash-separated path string, folding `.` and `..` segments.
/// Returns `None` when `..` would climb above the root.
pub fn normalize_slash_path(raw: &str) -> Option<String> {
    let raw = raw.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Directory portion of a slash-separated relative path ("" for top level).
pub fn parent_dir(rel_path: &str) -> &str {
    match rel_path.rfind('/') {
        Some(idx) => &rel_path[..idx],
        None => "",
    }
}

pub fn join_rel(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

pub fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut idx = 0;
    for (offset, ch) in trimmed.char_indices() {
        if ch.is_ascii_alphabetic() {
            idx = offset + ch.len_utf8();
        } else {
            break;
        }
    }
    let rest = &trimmed[idx..];
    for quote in ["'''", "\"\"\""] {
        if rest.starts_with(quote) && rest.ends_with(quote) && rest.len() >= 6 {
            return Some(rest[3..rest.len() - 3].to_string());
        }
    }
    for quote in ['"', '\'', '`'] {
        if rest.starts_with(quote) && rest.ends_with(quote) && rest.len() >= 2 {
            return Some(rest[1..rest.len() - 1].to_string());
        }
    }
    None
}

/// Trims a docstring and removes the common indentation of its continuation
/// lines. Empty docstrings become `None`.
pub fn clean_docstring(raw: &str) -> Option<String> {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return None;
    };
    let indent = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut out = vec![first.trim().to_string()];
    for line in rest {
        let stripped = line.get(indent..).unwrap_or_else(|| line.trim_start());
        out.push(stripped.trim_end().to_string());
    }
    while out.last().is_some_and(|line| line.is_empty()) {
        out.pop();
    }
    while out.first().is_some_and(|line| line.is_empty()) {
        out.remove(0);
    }
    if out.is_empty() {
        None
    } else {
        Some(out.join("\n"))
    }
}

/// Byte offsets of line starts, for mapping AST offsets to 1-based lines.
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(offset + 1);
            }
        }
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> i64 {
        self.starts.partition_point(|start| *start <= offset) as i64
    }

    /// Line of the last character in `start..end`.
    pub fn end_line_of(&self, start: usize, end: usize) -> i64 {
        self.line_of(end.saturating_sub(1).max(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_paths_fold_parent_segments() {
        assert_eq!(normalize_slash_path("pkg/./sub/../b.js").as_deref(), Some("pkg/b.js"));
        assert_eq!(normalize_slash_path("a\\b.py").as_deref(), Some("a/b.py"));
        assert_eq!(normalize_slash_path("../outside.js"), None);
        assert_eq!(parent_dir("pkg/a.py"), "pkg");
        assert_eq!(parent_dir("a.py"), "");
        assert_eq!(join_rel("", "a.py"), "a.py");
    }

    #[test]
    fn docstrings_are_dedented() {
        let raw = "Summary line.\n\n    Details here.\n      indented\n    ";
        assert_eq!(
            clean_docstring(raw).as_deref(),
            Some("Summary line.\n\nDetails here.\n  indented")
        );
        assert_eq!(clean_docstring("   "), None);
    }

    #[test]
    fn line_index_maps_offsets() {
        let index = LineIndex::new("a\nbc\n\nd");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(2), 2);
        assert_eq!(index.line_of(5), 3);
        assert_eq!(index.line_of(6), 4);
        assert_eq!(index.end_line_of(2, 5), 2);
    }

    #[test]
    fn unquotes_prefixed_literals() {
        assert_eq!(unquote_string_literal("r'''x'''").as_deref(), Some("x"));
        assert_eq!(unquote_string_literal("\"./mod\"").as_deref(), Some("./mod"));
        assert_eq!(unquote_string_literal("name"), None);
    }
}
