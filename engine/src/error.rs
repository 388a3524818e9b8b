//! Error types for the verification engine.
//!
//! Errors here stop an operation outright: a manifest that cannot be loaded,
//! or a verification that cannot be started. Per-file outcomes (a missing or
//! corrupt file) are not errors; they are recorded as an `EntryStatus` on the
//! manifest entry.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a manifest from being loaded.
///
/// No entries are produced when either of these is returned.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The file name matches none of the known manifest kinds
    #[error("Unrecognized checksum file format: {}", path.display())]
    UnrecognizedFormat { path: PathBuf },

    /// The manifest could not be opened or read
    #[error("Failed to read checksum file: {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ManifestError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Unreadable { source, .. } => source.raw_os_error(),
            Self::UnrecognizedFormat { .. } => None,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            Self::UnrecognizedFormat { path } | Self::Unreadable { path, .. } => path,
        }
    }
}

/// Precondition failures reported synchronously by `Verifier::start`.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The manifest carries no hash algorithm (nothing has been loaded)
    #[error("Cannot verify: the checksum type is unknown")]
    UnknownAlgorithm,

    /// A session is already active on this verifier
    #[error("A verification is already in progress")]
    AlreadyRunning,

    /// The background worker thread could not be created
    #[error("Failed to start verification worker")]
    WorkerSpawn {
        #[source]
        source: io::Error,
    },
}

/// Failure to checksum a single file outside a verification session.
#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("Failed to read file: {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An algorithm name that matches none of the supported algorithms.
#[derive(Debug, Error)]
#[error("Unknown hash algorithm '{name}'. Must be one of crc32, md5, sha224, sha256, sha384, sha512")]
pub struct UnknownAlgorithmName {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_manifest_error_messages() {
        let err = ManifestError::UnrecognizedFormat {
            path: PathBuf::from("/data/files.txt"),
        };
        assert_eq!(err.to_string(), "Unrecognized checksum file format: /data/files.txt");
        assert!(err.raw_os_error().is_none());
    }

    #[test]
    fn test_unreadable_keeps_io_source() {
        let err = ManifestError::Unreadable {
            path: PathBuf::from("/data/files.sfv"),
            source: io::Error::from_raw_os_error(2),
        };
        assert_eq!(err.raw_os_error(), Some(2));
        assert!(err.source().is_some());
        assert_eq!(err.path(), &PathBuf::from("/data/files.sfv"));
    }
}
