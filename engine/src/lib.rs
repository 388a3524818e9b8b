//! # sumcheck Engine - Checksum Manifest Verification Library
//!
//! A headless library for checking files against SFV, MD5SUM and SHA256SUM
//! manifests. Designed as the foundation for multiple front ends (CLI, GUI,
//! automation).
//!
//! ## Overview
//!
//! The engine provides:
//! - Streaming CRC32, MD5, SHA-224, SHA-256, SHA-384 and SHA-512 engines,
//!   implemented from scratch
//! - Manifest detection and best-effort line parsing
//! - Background verification with bounded status batches, throttled progress
//!   and cooperative cancellation
//! - Progress reporting via a listener trait (decoupled from UI technology)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use sumcheck_engine::{load_manifest, EntryStatus, Verifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load and parse the manifest
//! let mut manifest = load_manifest("/data/disc.sfv")?;
//! println!("{} entries", manifest.len());
//!
//! // Verify on a background thread, blocking until done
//! let mut verifier = Verifier::default();
//! verifier.start(&manifest)?;
//! verifier.run(&mut manifest, &mut ());
//!
//! // Check results
//! for (path, status) in manifest.snapshot() {
//!     if status != EntryStatus::Good {
//!         println!("{}: {}", path, status);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **checksums**: Hash engines, digests and file checksum helpers
//! - **manifest**: Manifest detection, parsing and entry state
//! - **verify**: Verification sessions
//! - **progress**: Listener trait and event types
//! - **error**: Error types and handling

mod bits;
pub mod checksums;
pub mod error;
pub mod manifest;
pub mod progress;
pub mod verify;

// Re-export main types and functions
pub use checksums::{
    compute_file_checksum, hash_bytes, hash_file, Digest, HashAlgorithm, Hasher, DEFAULT_CHUNK_SIZE,
};
pub use error::{ChecksumError, ManifestError, UnknownAlgorithmName, VerificationError};
pub use manifest::{
    load_manifest, EntryFilter, EntryStatus, Manifest, ManifestEntry, ManifestKind, StatusCounts,
};
pub use progress::{Progress, SessionOutcome, StatusChange, VerificationSummary, VerifyListener};
pub use verify::{CancelHandle, SessionHandle, SessionState, Verifier, VerifyOptions};
