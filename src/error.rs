use crate::model::{ErrorCode, ExtractionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("{message}")]
    Roslyn { code: ErrorCode, message: String },
}

impl ExtractError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExtractError::Read(_) => ErrorCode::ReadError,
            ExtractError::Encoding(_) => ErrorCode::EncodingError,
            ExtractError::Syntax(_) => ErrorCode::SyntaxError,
            ExtractError::Parser(_) => ErrorCode::ExtractionError,
            ExtractError::Roslyn { code, .. } => code.clone(),
        }
    }

    /// Roslyn failures end the attempt; everything else only affects one file.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ExtractError::Roslyn { .. })
    }

    pub fn into_record(self, file: &str) -> ExtractionError {
        ExtractionError::new(file, self.code(), self.to_string(), self.is_recoverable())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_codes() {
        let err = ExtractError::Syntax("line 3".to_string());
        let record = err.into_record("a.py");
        assert_eq!(record.code, ErrorCode::SyntaxError);
        assert!(record.recoverable);
        assert_eq!(record.message, "Syntax error: line 3");

        let err = ExtractError::Roslyn {
            code: ErrorCode::TimeoutError,
            message: "timed out".to_string(),
        };
        let record = err.into_record("src");
        assert_eq!(record.code, ErrorCode::TimeoutError);
        assert!(!record.recoverable);
    }

    #[test]
    fn io_errors_become_read_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ExtractError = io.into();
        assert_eq!(err.code(), ErrorCode::ReadError);
    }
}
