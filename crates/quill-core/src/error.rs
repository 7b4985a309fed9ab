//! Error handling
//!
//! One typed error enum for the whole store. The repository lifecycle maps
//! lower-level failures (crypto, HTTP, filesystem) onto the kinds callers
//! need to distinguish: a wrong password is not a network outage, and a
//! skipped upload is not a failed one.
//!
//! The three close-time variants carry the exact user-visible message as
//! their `Display` text; the CLI prints them verbatim.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the quill store
#[derive(Error, Debug)]
pub enum Error {
    /// No configuration on disk and not enough input to create one
    #[error("no configuration found; a username is required for first-time setup")]
    ConfigMissing,

    /// Sync target is neither an http(s) URL nor an ssh target
    #[error("sync method must be an http or ssh target, got '{0}'")]
    BadMethod(String),

    /// Probe decryption failed at open
    #[error("wrong password")]
    WrongPassword,

    /// Pull or MD5 check failed; the session ran offline
    #[error("No internet, changes will be uploaded next time.")]
    NetworkUnavailable,

    /// Push at close failed; local state is preserved
    #[error("Cannot connect, local changes saved.")]
    UploadFailed,

    /// Archive hash matches the server; upload skipped
    #[error("No changes, not uploading.")]
    NoChanges,

    /// A local blob failed to decrypt or parse
    #[error("cannot read entry blob '{path}': {details}")]
    ParseCorrupt { path: PathBuf, details: String },

    /// Entry or document name not resolvable
    #[error("'{0}' is not a known entry or document")]
    NotFound(String),

    /// The entry exists but its current version is a tombstone
    #[error("entry deleted")]
    Tombstoned,

    /// A supplied timestamp matched none of the accepted forms
    #[error("unrecognized timestamp '{0}'")]
    InvalidTimestamp(String),

    /// An operation that needs the session password ran before `open`
    #[error("repository is not open")]
    NotOpen,

    /// The PIN shortcut was requested but no key file exists
    #[error("no pin has been set")]
    NoPin,

    /// AEAD failure: wrong key, truncation, or tampering
    #[error("decryption failed: {0}")]
    Crypto(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this is one of the informational close outcomes rather
    /// than a genuine failure (the CLI prints these and exits zero).
    pub fn is_close_report(&self) -> bool {
        matches!(
            self,
            Error::NetworkUnavailable | Error::NoChanges | Error::UploadFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_messages_are_stable() {
        assert_eq!(
            Error::NetworkUnavailable.to_string(),
            "No internet, changes will be uploaded next time."
        );
        assert_eq!(Error::NoChanges.to_string(), "No changes, not uploading.");
        assert_eq!(
            Error::UploadFailed.to_string(),
            "Cannot connect, local changes saved."
        );
    }

    #[test]
    fn close_report_classification() {
        assert!(Error::NoChanges.is_close_report());
        assert!(Error::NetworkUnavailable.is_close_report());
        assert!(Error::UploadFailed.is_close_report());
        assert!(!Error::WrongPassword.is_close_report());
        assert!(!Error::ConfigMissing.is_close_report());
    }
}
