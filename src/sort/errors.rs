//! Sort service error types
//!
//! Error codes:
//! - SORT_IO_ERROR (ERROR)
//! - SORT_ENCODING_FAILED (ERROR)
//! - SORT_CONTAINER_CORRUPTION (FATAL)

use std::fmt;
use std::io;

use crate::storage::Severity;

/// Sort-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortErrorCode {
    /// Writing or reading a container failed
    SortIoError,
    /// An entry could not be encoded or decoded
    SortEncodingFailed,
    /// A container record failed its checksum
    SortContainerCorruption,
}

impl SortErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SortErrorCode::SortIoError => "SORT_IO_ERROR",
            SortErrorCode::SortEncodingFailed => "SORT_ENCODING_FAILED",
            SortErrorCode::SortContainerCorruption => "SORT_CONTAINER_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SortErrorCode::SortContainerCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for SortErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Sort error with code and context
#[derive(Debug)]
pub struct SortError {
    code: SortErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl SortError {
    /// Create an I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SortErrorCode::SortIoError,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an encoding error
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self {
            code: SortErrorCode::SortEncodingFailed,
            message: message.into(),
            source: None,
        }
    }

    /// Create a container corruption error (FATAL)
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: SortErrorCode::SortContainerCorruption,
            message: message.into(),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SortErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref source) = self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for SortError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for sort operations
pub type SortResult<T> = Result<T, SortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_is_fatal() {
        let err = SortError::corruption("checksum mismatch");
        assert!(err.is_fatal());
        assert_eq!(err.code().code(), "SORT_CONTAINER_CORRUPTION");
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;
        let err = SortError::io_error(
            "spill failed",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert!(!err.is_fatal());
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk full"));
    }
}
