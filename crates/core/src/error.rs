//! Closed-set error kind shared by every layer of the open/recover pipeline.
//!
//! Mirrors the status kinds a recovery path needs to distinguish: whether a
//! failure is recoverable by a WAL recovery policy (`Corruption`), rejected
//! before any disk mutation (`InvalidArgument`, `NotSupported`), or fatal to
//! the open call (`IoError`, `Aborted`).

use std::fmt;

/// Primary + optional secondary message, matching the two-message shape
/// every `Status` carries in the source system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Requested entity (key, column family, file) does not exist.
    #[error("not found: {msg}{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    NotFound {
        /// Primary message.
        msg: String,
        /// Optional secondary message (underlying cause).
        detail: Option<String>,
    },

    /// On-disk data failed a checksum or structural check.
    #[error("corruption: {msg}{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Corruption {
        /// Primary message.
        msg: String,
        /// Optional secondary message.
        detail: Option<String>,
    },

    /// The request names a real but unimplemented/incompatible capability.
    ///
    /// Never downgraded to `Corruption` — it signals an incompatible file
    /// format rather than a torn write.
    #[error("not supported: {msg}{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    NotSupported {
        /// Primary message.
        msg: String,
        /// Optional secondary message.
        detail: Option<String>,
    },

    /// The caller supplied an invalid option or combination of options.
    #[error("invalid argument: {msg}{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    InvalidArgument {
        /// Primary message.
        msg: String,
        /// Optional secondary message.
        detail: Option<String>,
    },

    /// An I/O operation failed.
    #[error("I/O error: {msg}{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    IoError {
        /// Primary message.
        msg: String,
        /// Optional secondary message.
        detail: Option<String>,
    },

    /// The operation was aborted partway through and unwound cleanly.
    #[error("aborted: {msg}{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Aborted {
        /// Primary message.
        msg: String,
        /// Optional secondary message.
        detail: Option<String>,
    },

    /// The resource is transiently unavailable (e.g. the db lock is held).
    #[error("busy: {msg}{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Busy {
        /// Primary message.
        msg: String,
        /// Optional secondary message.
        detail: Option<String>,
    },
}

impl Error {
    /// Build a `NotFound` with no secondary message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound { msg: msg.into(), detail: None }
    }

    /// Build a `Corruption` with no secondary message.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption { msg: msg.into(), detail: None }
    }

    /// Build a `Corruption` with a secondary message.
    pub fn corruption_with(msg: impl Into<String>, detail: impl fmt::Display) -> Self {
        Error::Corruption { msg: msg.into(), detail: Some(detail.to_string()) }
    }

    /// Build a `NotSupported` with no secondary message.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Error::NotSupported { msg: msg.into(), detail: None }
    }

    /// Build an `InvalidArgument` with no secondary message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument { msg: msg.into(), detail: None }
    }

    /// Build an `InvalidArgument` with a secondary message.
    pub fn invalid_argument_with(msg: impl Into<String>, detail: impl fmt::Display) -> Self {
        Error::InvalidArgument { msg: msg.into(), detail: Some(detail.to_string()) }
    }

    /// Build an `IoError` with a secondary message (the underlying cause).
    pub fn io_with(msg: impl Into<String>, detail: impl fmt::Display) -> Self {
        Error::IoError { msg: msg.into(), detail: Some(detail.to_string()) }
    }

    /// Build an `Aborted`.
    pub fn aborted(msg: impl Into<String>) -> Self {
        Error::Aborted { msg: msg.into(), detail: None }
    }

    /// Build a `Busy`.
    pub fn busy(msg: impl Into<String>) -> Self {
        Error::Busy { msg: msg.into(), detail: None }
    }

    /// True for variants a `WALRecoveryMode` policy is allowed to downgrade
    /// (i.e. everything except `NotSupported`, which signals an
    /// incompatible format rather than a torn record).
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError { msg: e.to_string(), detail: None }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::IoError { .. }));
    }

    #[test]
    fn not_supported_is_not_corruption() {
        let err = Error::not_supported("incompatible format");
        assert!(!err.is_corruption());
    }

    #[test]
    fn secondary_message_renders() {
        let err = Error::corruption_with("bad checksum", "offset 128");
        let rendered = err.to_string();
        assert!(rendered.contains("bad checksum"));
        assert!(rendered.contains("offset 128"));
    }
}
