//! Storage error types
//!
//! Error codes:
//! - STORAGE_READ_FAILED (ERROR)
//! - STORAGE_WRITE_FAILED (ERROR)
//! - STORAGE_DOCUMENT_NOT_FOUND (ERROR)
//! - STORAGE_SAFEPOINT_FAILED (ERROR)
//! - STORAGE_PAGE_PINNED (FATAL)

use std::fmt;

use super::address::{PageId, StorageAddress};

/// Severity levels shared by storage and sort errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, engine continues
    Error,
    /// Cache or on-disk state can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Reading a data block failed
    StorageReadFailed,
    /// Storing a document failed
    StorageWriteFailed,
    /// No document lives at the requested address
    StorageDocumentNotFound,
    /// The transaction could not reach a safepoint
    StorageSafepointFailed,
    /// A page was evicted while a document still pinned it
    StoragePagePinned,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::StorageReadFailed => "STORAGE_READ_FAILED",
            StorageErrorCode::StorageWriteFailed => "STORAGE_WRITE_FAILED",
            StorageErrorCode::StorageDocumentNotFound => "STORAGE_DOCUMENT_NOT_FOUND",
            StorageErrorCode::StorageSafepointFailed => "STORAGE_SAFEPOINT_FAILED",
            StorageErrorCode::StoragePagePinned => "STORAGE_PAGE_PINNED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::StoragePagePinned => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with code and context
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    address: Option<StorageAddress>,
}

impl StorageError {
    /// Create a read failure
    pub fn read_failed(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::StorageReadFailed,
            message: message.into(),
            address: None,
        }
    }

    /// Create a write failure
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::StorageWriteFailed,
            message: message.into(),
            address: None,
        }
    }

    /// Create a not-found error for an address
    pub fn document_not_found(address: StorageAddress) -> Self {
        Self {
            code: StorageErrorCode::StorageDocumentNotFound,
            message: format!("No document at address {}", address),
            address: Some(address),
        }
    }

    /// Create a safepoint failure
    pub fn safepoint_failed(reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::StorageSafepointFailed,
            message: reason.into(),
            address: None,
        }
    }

    /// Create a pinned-page eviction error (FATAL)
    pub fn page_pinned(collection: &str, page_id: PageId, pins: usize) -> Self {
        Self {
            code: StorageErrorCode::StoragePagePinned,
            message: format!(
                "Page {} of '{}' evicted with {} live document(s)",
                page_id, collection, pins
            ),
            address: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
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

    /// Returns the address involved, if any
    pub fn address(&self) -> Option<StorageAddress> {
        self.address
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for StorageError {}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
