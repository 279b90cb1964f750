//! Error type for firmware update operations
//!
//! Platform failures (open, read, write, erase ioctl, external tools) are
//! wrapped into [`UpgradeError`] where they are observed. The message names
//! the device and the operation; the original OS error is kept as the
//! error source for diagnostics but never changes the message.

use core::fmt;
use std::io;
use thiserror::Error;

/// Numeric outcome of an update, used as the process exit status
///
/// Status 1 is left to the caller for a user-canceled update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// Operation completed
    Success = 0,
    /// Caller supplied unusable input (bad stream, bad argument)
    InvalidInput = 2,
    /// The firmware image does not fit or cannot be interpreted
    InvalidFirmware = 3,
    /// Generic failure
    #[default]
    Failed = 4,
}

impl ErrorCode {
    /// Numeric value of the code
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::InvalidInput => write!(f, "invalid input"),
            Self::InvalidFirmware => write!(f, "invalid firmware"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The single error type of the firmware updater
///
/// `Display` renders exactly the message; the code is carried separately.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UpgradeError {
    message: String,
    code: ErrorCode,
    #[source]
    source: Option<io::Error>,
}

impl UpgradeError {
    /// Create an error with the default [`ErrorCode::Failed`] code
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_code(message, ErrorCode::default())
    }

    /// Create an error with an explicit code
    pub fn with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Wrap a platform I/O failure
    ///
    /// The message is used verbatim; `err` is only reachable through
    /// [`std::error::Error::source`].
    pub fn io(message: impl Into<String>, err: io::Error) -> Self {
        Self {
            message: message.into(),
            code: ErrorCode::Failed,
            source: Some(err),
        }
    }

    /// Replace the error code, keeping message and source
    pub fn coded(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    /// The human readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error code
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The underlying OS error, if one was wrapped
    pub fn os_error(&self) -> Option<&io::Error> {
        self.source.as_ref()
    }
}

/// Result type alias using [`UpgradeError`]
pub type Result<T> = std::result::Result<T, UpgradeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_default_code_is_failed() {
        let err = UpgradeError::new("Test error");
        assert_eq!(err.message(), "Test error");
        assert_eq!(err.code(), ErrorCode::Failed);
        assert!(err.source().is_none());
    }

    #[test]
    fn test_custom_code() {
        let err = UpgradeError::with_code("Test error", ErrorCode::Success);
        assert_eq!(err.message(), "Test error");
        assert_eq!(err.code(), ErrorCode::Success);
        assert_eq!(err.code().value(), 0);
    }

    #[test]
    fn test_display_is_message_only() {
        let err = UpgradeError::with_code("Test error", ErrorCode::InvalidFirmware);
        assert_eq!(err.to_string(), "Test error");
    }

    #[test]
    fn test_io_keeps_message_and_source() {
        let os = io::Error::new(io::ErrorKind::NotFound, "no such device");
        let err = UpgradeError::io("Opening /dev/mtd0 failed", os);
        assert_eq!(err.to_string(), "Opening /dev/mtd0 failed");
        assert_eq!(err.code(), ErrorCode::Failed);
        assert_eq!(err.os_error().map(|e| e.kind()), Some(io::ErrorKind::NotFound));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("no such device"));
    }

    #[test]
    fn test_coded_replaces_code_only() {
        let os = io::Error::new(io::ErrorKind::InvalidData, "bad seek");
        let err = UpgradeError::io("Firmware image is not seekable", os).coded(ErrorCode::InvalidInput);
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(err.message(), "Firmware image is not seekable");
        assert!(err.os_error().is_some());
    }

    #[test]
    fn test_code_values() {
        assert_eq!(ErrorCode::Success.value(), 0);
        assert_eq!(ErrorCode::InvalidInput.value(), 2);
        assert_eq!(ErrorCode::InvalidFirmware.value(), 3);
        assert_eq!(ErrorCode::Failed.value(), 4);
    }
}
