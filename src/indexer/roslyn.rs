use crate::config::Config;
use crate::error::ExtractError;
use crate::indexer::{Extractor, scan};
use crate::model::{
    Call, CallKind, ErrorCode, ExtractionError, ExtractionResult, Import, ImportKind, MODULE_SCOPE,
    Symbol, SymbolKind,
};
use crate::{resolver, util};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

const TOOL_ASSEMBLY: &str = "SymbolExtractor.dll";
const TOOL_SOURCES: &[&str] = &["SymbolExtractor.csproj", "Program.cs"];
const SCHEMA_ERROR_FILE: &str = "<roslyn-output>";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shape the .NET tool prints on stdout.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RoslynOutput {
    pub symbols: Vec<Symbol>,
    pub calls: Vec<Call>,
    pub imports: Vec<Import>,
    #[serde(default)]
    pub errors: Vec<ExtractionError>,
}

/// JSON Schema the tool output is validated against.
pub fn output_schema() -> Value {
    let schema = schemars::schema_for!(RoslynOutput);
    serde_json::to_value(schema).unwrap_or_default()
}

/// Semantic C# extraction through an external .NET process.
pub struct RoslynExtractor {
    tool_dir: PathBuf,
    dotnet: String,
    timeout: Duration,
    built: bool,
}

impl Default for RoslynExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RoslynExtractor {
    pub fn new() -> Self {
        let config = Config::get();
        Self::with_tool(
            config.roslyn_tool_dir.clone(),
            config.dotnet.clone(),
            config.roslyn_timeout(),
        )
    }

    pub fn with_tool(tool_dir: impl Into<PathBuf>, dotnet: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tool_dir: tool_dir.into(),
            dotnet: dotnet.into(),
            timeout,
            built: false,
        }
    }

    pub fn tool_dir(&self) -> &Path {
        &self.tool_dir
    }

    /// True when the tool project exists and the dotnet CLI answers.
    pub fn is_available(&self) -> bool {
        if !self.tool_dir.is_dir() {
            tracing::debug!("roslyn tool directory {} missing", self.tool_dir.display());
            return false;
        }
        let version = Command::new(&self.dotnet)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match version {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::debug!("`{} --version` exited with {status}", self.dotnet);
                false
            }
            Err(err) => {
                tracing::debug!("`{} --version` failed: {err}", self.dotnet);
                false
            }
        }
    }

    /// Runs the tool over `directory`; record paths are prefixed with `rel_prefix`.
    pub fn extract_tree(&mut self, directory: &Path, rel_prefix: &str) -> ExtractionResult {
        let started = Instant::now();
        let label = util::display_path(directory);
        if let Err(err) = self.ensure_built() {
            tracing::warn!("roslyn tool unavailable: {err}");
            return ExtractionResult::with_error(err.into_record(&label));
        }
        let stdout = match self.run_tool(directory) {
            Ok(stdout) => stdout,
            Err(err) => {
                tracing::warn!("roslyn extraction of {label} failed: {err}");
                return ExtractionResult::with_error(err.into_record(&label));
            }
        };
        let result = parse_output(&stdout, &label, rel_prefix);
        tracing::debug!(
            directory = %label,
            symbols = result.symbols.len(),
            calls = result.calls.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "roslyn extraction finished"
        );
        result
    }

    fn ensure_built(&mut self) -> Result<(), ExtractError> {
        if self.built {
            return Ok(());
        }
        if !self.tool_dir.is_dir() {
            return Err(ExtractError::Roslyn {
                code: ErrorCode::RoslynError,
                message: format!("Roslyn tool not found at {}", self.tool_dir.display()),
            });
        }
        if self.needs_build() {
            tracing::info!("building roslyn tool in {}", self.tool_dir.display());
            let output = Command::new(&self.dotnet)
                .args(["build", "-c", "Release"])
                .current_dir(&self.tool_dir)
                .stdin(Stdio::null())
                .output()
                .map_err(|err| spawn_error(&self.dotnet, err))?;
            if !output.status.success() {
                return Err(ExtractError::Roslyn {
                    code: ErrorCode::RoslynError,
                    message: format!(
                        "Failed to build Roslyn tool:\n{}",
                        String::from_utf8_lossy(&output.stderr)
                    ),
                });
            }
        }
        self.built = true;
        Ok(())
    }

    fn needs_build(&self) -> bool {
        let bin = self.tool_dir.join("bin");
        let Some(bin_modified) = modified(&bin) else {
            return true;
        };
        let has_assembly = ignore::WalkBuilder::new(&bin)
            .standard_filters(false)
            .build()
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_name() == TOOL_ASSEMBLY);
        if !has_assembly {
            return true;
        }
        TOOL_SOURCES
            .iter()
            .filter_map(|name| modified(&self.tool_dir.join(name)))
            .any(|source_modified| source_modified > bin_modified)
    }

    fn run_tool(&self, directory: &Path) -> Result<String, ExtractError> {
        let mut child = Command::new(&self.dotnet)
            .arg("run")
            .arg("--project")
            .arg(&self.tool_dir)
            .args(["--no-build", "-c", "Release", "--"])
            .arg(directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(&self.dotnet, err))?;

        let stdout = child.stdout.take().map(|pipe| thread::spawn(move || read_pipe(pipe)));
        let stderr = child.stderr.take().map(|pipe| thread::spawn(move || read_pipe(pipe)));

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ExtractError::Roslyn {
                        code: ErrorCode::TimeoutError,
                        message: format!(
                            "Roslyn tool timed out after {}",
                            describe_timeout(self.timeout)
                        ),
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    return Err(ExtractError::Roslyn {
                        code: ErrorCode::RoslynError,
                        message: format!("Roslyn tool failed: {err}"),
                    });
                }
            }
        };
        let stdout = stdout
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(ExtractError::Roslyn {
                code: ErrorCode::RoslynError,
                message: format!("Roslyn tool failed: {stderr}"),
            });
        }
        Ok(stdout)
    }
}

impl Extractor for RoslynExtractor {
    fn language(&self) -> &'static str {
        "csharp"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        scan::CSHARP_EXTENSIONS
    }

    /// The tool only analyzes directories, so a file is extracted together
    /// with its siblings.
    fn extract_file(&mut self, path: &Path, rel_path: &str) -> ExtractionResult {
        let directory = path.parent().unwrap_or(Path::new("."));
        self.extract_tree(directory, util::parent_dir(rel_path))
    }

    fn extract_directory_with(
        &mut self,
        root: &Path,
        _options: &scan::ScanOptions,
        resolve_calls: bool,
    ) -> ExtractionResult {
        let mut result = self.extract_tree(root, "");
        if resolve_calls {
            resolver::resolve_for_language(self.language(), &mut result);
        }
        result
    }
}

fn spawn_error(dotnet: &str, err: std::io::Error) -> ExtractError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return ExtractError::Roslyn {
            code: ErrorCode::DotnetNotFound,
            message: "dotnet CLI not found. Please install .NET SDK.".to_string(),
        };
    }
    ExtractError::Roslyn {
        code: ErrorCode::RoslynError,
        message: format!("failed to start {dotnet}: {err}"),
    }
}

fn read_pipe(mut pipe: impl Read) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn modified(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|meta| meta.modified()).ok()
}

fn describe_timeout(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else {
        format!("{secs} seconds")
    }
}

/// Converts tool stdout into records.
///
/// Output that is not JSON is fatal. The JSON is then checked by
/// deserializing it into [`RoslynOutput`], the same shape
/// [`output_schema`] derives; there is no separate JSON Schema validator.
/// A mismatch gets a recoverable `SCHEMA_ERROR` and the records are read
/// field by field with defaults.
pub fn parse_output(stdout: &str, label: &str, rel_prefix: &str) -> ExtractionResult {
    let data: Value = match serde_json::from_str(stdout) {
        Ok(data) => data,
        Err(err) => {
            return ExtractionResult::with_error(ExtractionError::fatal(
                label,
                ErrorCode::JsonParseError,
                format!("Failed to parse Roslyn output: {err}"),
            ));
        }
    };
    let mut result = ExtractionResult::default();
    if let Err(err) = serde_json::from_value::<RoslynOutput>(data.clone()) {
        result.errors.push(ExtractionError::recoverable(
            SCHEMA_ERROR_FILE,
            ErrorCode::SchemaError,
            format!("Schema validation failed: {err}"),
        ));
    }
    let rebase = |raw: &str| -> String {
        let path = raw.replace('\\', "/");
        if rel_prefix.is_empty() {
            path
        } else {
            util::join_rel(rel_prefix, &path)
        }
    };

    for item in array(&data, "symbols") {
        let raw_kind = str_field(item, "symbol_type").unwrap_or_default();
        let Some(kind) = SymbolKind::parse(&raw_kind) else {
            tracing::debug!("skipping roslyn symbol with type {raw_kind:?}");
            continue;
        };
        result.symbols.push(Symbol {
            path: rebase(&str_field(item, "path").unwrap_or_default()),
            name: str_field(item, "symbol_name").unwrap_or_default(),
            kind,
            line_start: int_field(item, "line_start").unwrap_or(1),
            line_end: int_field(item, "line_end").unwrap_or(1),
            is_exported: bool_field(item, "is_exported").unwrap_or(true),
            parameter_count: int_field(item, "parameters"),
            parent_symbol: str_field(item, "parent_symbol"),
            doc_comment: str_field(item, "docstring"),
        });
    }

    for item in array(&data, "calls") {
        result.calls.push(Call {
            caller_file: rebase(&str_field(item, "caller_file").unwrap_or_default()),
            caller_symbol: str_field(item, "caller_symbol")
                .unwrap_or_else(|| MODULE_SCOPE.to_string()),
            callee_symbol: str_field(item, "callee_symbol").unwrap_or_default(),
            callee_file: str_field(item, "callee_file")
                .filter(|file| !file.is_empty())
                .map(|file| rebase(&file)),
            line_number: int_field(item, "line_number").unwrap_or(1),
            kind: str_field(item, "call_type")
                .and_then(|raw| CallKind::parse(&raw))
                .unwrap_or(CallKind::Direct),
            is_dynamic_code_execution: bool_field(item, "is_dynamic_code_execution")
                .unwrap_or(false),
            callee_object: str_field(item, "callee_object"),
        });
    }

    for item in array(&data, "imports") {
        result.imports.push(Import {
            file: rebase(&str_field(item, "file").unwrap_or_default()),
            imported_path: str_field(item, "imported_path").unwrap_or_default(),
            imported_symbols: str_field(item, "imported_symbols"),
            kind: str_field(item, "import_type")
                .and_then(|raw| ImportKind::parse(&raw))
                .unwrap_or(ImportKind::Static),
            line_number: int_field(item, "line_number").unwrap_or(1),
            module_alias: str_field(item, "module_alias"),
        });
    }

    for item in array(&data, "errors") {
        let code = str_field(item, "code").unwrap_or_else(|| "UNKNOWN_ERROR".to_string());
        result.errors.push(ExtractionError::new(
            str_field(item, "file").unwrap_or_default().replace('\\', "/"),
            ErrorCode::from(code),
            str_field(item, "message").unwrap_or_default(),
            bool_field(item, "recoverable").unwrap_or(true),
        ));
    }
    result
}

fn array<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

fn int_field(item: &Value, key: &str) -> Option<i64> {
    item.get(key).and_then(Value::as_i64)
}

fn bool_field(item: &Value, key: &str) -> Option<bool> {
    item.get(key).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_uses_minutes_when_even() {
        assert_eq!(describe_timeout(Duration::from_secs(300)), "5 minutes");
        assert_eq!(describe_timeout(Duration::from_secs(60)), "1 minute");
        assert_eq!(describe_timeout(Duration::from_secs(90)), "90 seconds");
    }

    #[test]
    fn schema_lists_record_arrays() {
        let schema = output_schema();
        let properties = schema.get("properties").unwrap();
        for key in ["symbols", "calls", "imports", "errors"] {
            assert!(properties.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn rebases_paths_under_prefix() {
        let stdout = r#"{"symbols":[{"path":"Sub\\A.cs","symbol_name":"A","symbol_type":"class",
            "line_start":1,"line_end":3,"is_exported":true,"parameters":null,
            "parent_symbol":null,"docstring":null}],"calls":[],"imports":[],"errors":[]}"#;
        let result = parse_output(stdout, "src", "src");
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.symbols[0].path, "src/Sub/A.cs");
    }
}
