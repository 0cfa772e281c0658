//! SDK error types

use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    ConfigError(#[from] serde_yaml::Error),

    /// Message registry or schema construction failed
    #[error("Registry error: {0}")]
    RegistryError(#[from] arbor_core::CoreError),

    /// Compiler error
    #[error("Compiler error: {0}")]
    CompileError(#[from] arbor_compiler::CompileError),

    /// Evaluation error
    #[error("Evaluation error: {0}")]
    EvalError(#[from] arbor_runtime::EvalError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SdkError {
    /// Returns true if the error is a caller-requested cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SdkError::EvalError(e) if e.is_cancelled())
    }
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_runtime::EvalError;

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let sdk_error: SdkError = io_error.into();
        assert!(sdk_error.to_string().contains("I/O error"));
        assert!(sdk_error.to_string().contains("File not found"));
    }

    #[test]
    fn test_config_error_conversion() {
        let yaml_error = serde_yaml::from_str::<Vec<u32>>("{ not: a list }").unwrap_err();
        let sdk_error: SdkError = yaml_error.into();
        assert!(sdk_error.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_cancelled() {
        let error: SdkError = EvalError::Cancelled.into();
        assert!(error.is_cancelled());
        assert_eq!(error.to_string(), "Evaluation error: Evaluation cancelled");

        let error: SdkError = EvalError::DiagnosticsRequestedWithoutTracing.into();
        assert!(!error.is_cancelled());
    }

    #[test]
    fn test_error_debug_format() {
        let error: SdkError = EvalError::WorkerFailure("panicked".into()).into();
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("EvalError"));
    }
}
