use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Caller name used for calls made outside any function or method.
pub const MODULE_SCOPE: &str = "<module>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Property,
    Field,
    Event,
    Variable,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Property => "property",
            SymbolKind::Field => "field",
            SymbolKind::Event => "event",
            SymbolKind::Variable => "variable",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw {
            "function" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "class" => SymbolKind::Class,
            "property" => SymbolKind::Property,
            "field" => SymbolKind::Field,
            "event" => SymbolKind::Event,
            "variable" => SymbolKind::Variable,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Direct,
    Dynamic,
    Constructor,
    Async,
    Event,
}

impl CallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Direct => "direct",
            CallKind::Dynamic => "dynamic",
            CallKind::Constructor => "constructor",
            CallKind::Async => "async",
            CallKind::Event => "event",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw {
            "direct" => CallKind::Direct,
            "dynamic" => CallKind::Dynamic,
            "constructor" => CallKind::Constructor,
            "async" => CallKind::Async,
            "event" => CallKind::Event,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Static,
    Dynamic,
    #[serde(alias = "type_checking")]
    TypeCheckingOnly,
    SideEffect,
    Global,
    Extern,
    UsingStatic,
}

impl ImportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportKind::Static => "static",
            ImportKind::Dynamic => "dynamic",
            ImportKind::TypeCheckingOnly => "type_checking_only",
            ImportKind::SideEffect => "side_effect",
            ImportKind::Global => "global",
            ImportKind::Extern => "extern",
            ImportKind::UsingStatic => "using_static",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw {
            "static" => ImportKind::Static,
            "dynamic" => ImportKind::Dynamic,
            "type_checking_only" | "type_checking" => ImportKind::TypeCheckingOnly,
            "side_effect" => ImportKind::SideEffect,
            "global" => ImportKind::Global,
            "extern" => ImportKind::Extern,
            "using_static" => ImportKind::UsingStatic,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Symbol {
    pub path: String,
    #[serde(rename = "symbol_name")]
    pub name: String,
    #[serde(rename = "symbol_type")]
    pub kind: SymbolKind,
    pub line_start: i64,
    pub line_end: i64,
    pub is_exported: bool,
    #[serde(rename = "parameters")]
    pub parameter_count: Option<i64>,
    pub parent_symbol: Option<String>,
    #[serde(rename = "docstring")]
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Call {
    pub caller_file: String,
    pub caller_symbol: String,
    pub callee_symbol: String,
    pub callee_file: Option<String>,
    pub line_number: i64,
    #[serde(rename = "call_type")]
    pub kind: CallKind,
    pub is_dynamic_code_execution: bool,
    pub callee_object: Option<String>,
}

impl Call {
    pub fn is_member_call(&self) -> bool {
        self.callee_object.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Import {
    pub file: String,
    pub imported_path: String,
    pub imported_symbols: Option<String>,
    #[serde(rename = "import_type")]
    pub kind: ImportKind,
    pub line_number: i64,
    pub module_alias: Option<String>,
}

impl Import {
    pub fn is_star(&self) -> bool {
        self.imported_symbols.as_deref() == Some("*")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    SyntaxError,
    EncodingError,
    ReadError,
    ExtractionError,
    SchemaError,
    TimeoutError,
    DotnetNotFound,
    RoslynError,
    JsonParseError,
    RoslynFallback,
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::SyntaxError => "SYNTAX_ERROR",
            ErrorCode::EncodingError => "ENCODING_ERROR",
            ErrorCode::ReadError => "READ_ERROR",
            ErrorCode::ExtractionError => "EXTRACTION_ERROR",
            ErrorCode::SchemaError => "SCHEMA_ERROR",
            ErrorCode::TimeoutError => "TIMEOUT_ERROR",
            ErrorCode::DotnetNotFound => "DOTNET_NOT_FOUND",
            ErrorCode::RoslynError => "ROSLYN_ERROR",
            ErrorCode::JsonParseError => "JSON_PARSE_ERROR",
            ErrorCode::RoslynFallback => "ROSLYN_FALLBACK",
            ErrorCode::Other(code) => code.as_str(),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "SYNTAX_ERROR" => ErrorCode::SyntaxError,
            "ENCODING_ERROR" => ErrorCode::EncodingError,
            "READ_ERROR" => ErrorCode::ReadError,
            "EXTRACTION_ERROR" => ErrorCode::ExtractionError,
            "SCHEMA_ERROR" => ErrorCode::SchemaError,
            "TIMEOUT_ERROR" => ErrorCode::TimeoutError,
            "DOTNET_NOT_FOUND" => ErrorCode::DotnetNotFound,
            "ROSLYN_ERROR" => ErrorCode::RoslynError,
            "JSON_PARSE_ERROR" => ErrorCode::JsonParseError,
            "ROSLYN_FALLBACK" => ErrorCode::RoslynFallback,
            _ => ErrorCode::Other(raw),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionError {
    pub file: String,
    pub message: String,
    #[schemars(with = "String")]
    pub code: ErrorCode,
    pub recoverable: bool,
}

impl ExtractionError {
    pub fn new(file: impl Into<String>, code: ErrorCode, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
            code,
            recoverable,
        }
    }

    pub fn recoverable(file: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(file, code, message, true)
    }

    pub fn fatal(file: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(file, code, message, false)
    }
}

/// Counters recorded by one call-resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub total_calls: u64,
    pub resolved_same_file: u64,
    pub resolved_cross_file: u64,
    pub resolved_module_attr: u64,
    pub unresolved_builtin: u64,
    pub unresolved_stdlib: u64,
    pub unresolved_external: u64,
    pub unresolved_dynamic: u64,
}

impl ResolutionStats {
    pub fn total_resolved(&self) -> u64 {
        self.resolved_same_file + self.resolved_cross_file + self.resolved_module_attr
    }

    pub fn total_unresolved(&self) -> u64 {
        self.unresolved_builtin
            + self.unresolved_stdlib
            + self.unresolved_external
            + self.unresolved_dynamic
    }

    pub fn resolution_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.total_resolved() as f64 / self.total_calls as f64
    }

    pub fn merge(&mut self, other: &ResolutionStats) {
        self.total_calls += other.total_calls;
        self.resolved_same_file += other.resolved_same_file;
        self.resolved_cross_file += other.resolved_cross_file;
        self.resolved_module_attr += other.resolved_module_attr;
        self.unresolved_builtin += other.unresolved_builtin;
        self.unresolved_stdlib += other.unresolved_stdlib;
        self.unresolved_external += other.unresolved_external;
        self.unresolved_dynamic += other.unresolved_dynamic;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub symbols: Vec<Symbol>,
    pub calls: Vec<Call>,
    pub imports: Vec<Import>,
    pub errors: Vec<ExtractionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_stats: Option<ResolutionStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
}

impl ExtractionResult {
    pub fn with_error(error: ExtractionError) -> Self {
        Self {
            errors: vec![error],
            ..Default::default()
        }
    }

    /// Appends `other` after the current records, keeping both orders intact.
    pub fn merge(&mut self, other: ExtractionResult) {
        self.symbols.extend(other.symbols);
        self.calls.extend(other.calls);
        self.imports.extend(other.imports);
        self.errors.extend(other.errors);
        if let Some(stats) = other.resolution_stats {
            self.resolution_stats
                .get_or_insert_with(ResolutionStats::default)
                .merge(&stats);
        }
        if self.extractor.is_none() {
            self.extractor = other.extractor;
        }
    }

    pub fn has_error_code(&self, code: &ErrorCode) -> bool {
        self.errors.iter().any(|error| &error.code == code)
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|error| !error.recoverable)
    }

    pub fn summary(&self) -> Summary {
        let mut symbols_by_type = BTreeMap::new();
        for symbol in &self.symbols {
            *symbols_by_type.entry(symbol.kind.as_str().to_string()).or_insert(0) += 1;
        }
        let mut calls_by_type = BTreeMap::new();
        for call in &self.calls {
            *calls_by_type.entry(call.kind.as_str().to_string()).or_insert(0) += 1;
        }
        let mut imports_by_type = BTreeMap::new();
        for import in &self.imports {
            *imports_by_type.entry(import.kind.as_str().to_string()).or_insert(0) += 1;
        }
        let mut errors_by_code = BTreeMap::new();
        for error in &self.errors {
            *errors_by_code.entry(error.code.as_str().to_string()).or_insert(0) += 1;
        }
        Summary {
            total_symbols: self.symbols.len(),
            symbols_by_type,
            total_calls: self.calls.len(),
            calls_by_type,
            total_imports: self.imports.len(),
            imports_by_type,
            total_errors: self.errors.len(),
            errors_by_code,
            resolved_calls: self.calls.iter().filter(|call| call.callee_file.is_some()).count(),
            resolution_stats: self.resolution_stats,
            extractor: self.extractor.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_symbols: usize,
    pub symbols_by_type: BTreeMap<String, usize>,
    pub total_calls: usize,
    pub calls_by_type: BTreeMap<String, usize>,
    pub total_imports: usize,
    pub imports_by_type: BTreeMap<String, usize>,
    pub total_errors: usize,
    pub errors_by_code: BTreeMap<String, usize>,
    pub resolved_calls: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_stats: Option<ResolutionStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
}
