//! Streaming checksum engines.
//!
//! This module provides:
//! - The six supported algorithms (CRC32, MD5, SHA-224, SHA-256, SHA-384, SHA-512),
//!   each implemented from scratch with an `init / update / finalize` contract
//! - [`Hasher`], a closed enum dispatching to the engine for an algorithm
//! - [`Digest`], a fixed-length digest tagged with its algorithm
//! - File-level checksum computation
//!
//! # Streaming contract
//!
//! Every engine produces the same digest no matter how its input is split
//! across `update` calls. `finalize` is idempotent: calling it again without
//! an intervening `update` returns the cached digest.
//!
//! Calling `update` after `finalize` silently starts a fresh computation, as
//! though `init` had been called first. Callers that want to keep hashing the
//! same stream must not finalize early.

mod buffer;
pub mod crc32;
pub mod md5;
pub mod sha2_32;
pub mod sha2_64;

use crate::error::{ChecksumError, UnknownAlgorithmName};
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

pub use crc32::Crc32;
pub use md5::Md5;
pub use sha2_32::{Sha2_32, Sha2_32Variant};
pub use sha2_64::{Sha2_64, Sha2_64Variant};

/// Longest digest any supported algorithm produces (SHA-512).
pub const MAX_DIGEST_LEN: usize = 64;

/// Read size used when streaming files through an engine.
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// CRC32 (SFV files)
    Crc32,
    /// MD5 (MD5SUM files)
    Md5,
    Sha224,
    /// SHA-256 (SHA256SUM files)
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 6] = [
        Self::Crc32,
        Self::Md5,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
    ];

    /// Lowercase name, as accepted by `from_str`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Crc32 => "crc32",
            Self::Md5 => "md5",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Input block size consumed by the compression function, in bytes.
    ///
    /// CRC32 has no block structure; it reports 64 to match MD5.
    pub fn block_size(self) -> usize {
        match self {
            Self::Crc32 | Self::Md5 => md5::BLOCK_SIZE,
            Self::Sha224 | Self::Sha256 => sha2_32::BLOCK_SIZE,
            Self::Sha384 | Self::Sha512 => sha2_64::BLOCK_SIZE,
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Crc32 => 4,
            Self::Md5 => md5::DIGEST_LEN,
            Self::Sha224 => Sha2_32Variant::Sha224.digest_len(),
            Self::Sha256 => Sha2_32Variant::Sha256.digest_len(),
            Self::Sha384 => Sha2_64Variant::Sha384.digest_len(),
            Self::Sha512 => Sha2_64Variant::Sha512.digest_len(),
        }
    }

    /// Digest length in hex characters, as written in checksum files.
    pub fn hex_len(self) -> usize {
        self.digest_len() * 2
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithmName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase().replace('-', "");
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == lowered)
            .ok_or_else(|| UnknownAlgorithmName {
                name: s.to_string(),
            })
    }
}

/// A computed or expected digest.
///
/// The byte length always equals `algorithm.digest_len()`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: HashAlgorithm,
    bytes: [u8; MAX_DIGEST_LEN],
}

impl Digest {
    /// Wrap raw digest bytes; `None` if the length does not match the algorithm.
    pub fn from_slice(algorithm: HashAlgorithm, raw: &[u8]) -> Option<Self> {
        if raw.len() != algorithm.digest_len() {
            return None;
        }
        let mut bytes = [0u8; MAX_DIGEST_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Some(Digest { algorithm, bytes })
    }

    /// Decode exactly `algorithm.hex_len()` hex digits (either case).
    pub fn from_hex(algorithm: HashAlgorithm, text: &str) -> Option<Self> {
        let len = algorithm.digest_len();
        if text.len() != len * 2 {
            return None;
        }
        let mut bytes = [0u8; MAX_DIGEST_LEN];
        hex::decode_to_slice(text, &mut bytes[..len]).ok()?;
        Some(Digest { algorithm, bytes })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.algorithm.digest_len()]
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// True iff both digests use the same algorithm and are byte-for-byte equal.
    ///
    /// Not constant-time; this is an integrity check, not authentication.
    pub fn matches(&self, other: &Digest) -> bool {
        self.algorithm == other.algorithm && self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}:{})", self.algorithm, self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A streaming hasher for one of the supported algorithms.
///
/// The algorithm is chosen once, when the hasher is created; every call
/// after that dispatches through a single `match`.
#[derive(Clone)]
pub enum Hasher {
    Crc32(Crc32),
    Md5(Md5),
    Sha224(Sha2_32),
    Sha256(Sha2_32),
    Sha384(Sha2_64),
    Sha512(Sha2_64),
}

impl Hasher {
    /// Create a hasher in the algorithm's initial state.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Crc32 => Hasher::Crc32(Crc32::new()),
            HashAlgorithm::Md5 => Hasher::Md5(Md5::new()),
            HashAlgorithm::Sha224 => Hasher::Sha224(Sha2_32::sha224()),
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha2_32::sha256()),
            HashAlgorithm::Sha384 => Hasher::Sha384(Sha2_64::sha384()),
            HashAlgorithm::Sha512 => Hasher::Sha512(Sha2_64::sha512()),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Hasher::Crc32(_) => HashAlgorithm::Crc32,
            Hasher::Md5(_) => HashAlgorithm::Md5,
            Hasher::Sha224(_) => HashAlgorithm::Sha224,
            Hasher::Sha256(_) => HashAlgorithm::Sha256,
            Hasher::Sha384(_) => HashAlgorithm::Sha384,
            Hasher::Sha512(_) => HashAlgorithm::Sha512,
        }
    }

    /// Reset to the initial state, discarding buffered input and any digest.
    pub fn init(&mut self) {
        match self {
            Hasher::Crc32(h) => h.init(),
            Hasher::Md5(h) => h.init(),
            Hasher::Sha224(h) | Hasher::Sha256(h) => h.init(),
            Hasher::Sha384(h) | Hasher::Sha512(h) => h.init(),
        }
    }

    /// Feed more input. Empty input is a no-op; input after `finalize`
    /// begins a new computation.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Crc32(h) => h.update(data),
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha224(h) | Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) | Hasher::Sha512(h) => h.update(data),
        }
    }

    /// Pad, finish and return the digest. Idempotent until the next `update`.
    pub fn finalize(&mut self) -> Digest {
        let algorithm = self.algorithm();
        let mut bytes = [0u8; MAX_DIGEST_LEN];
        let len = algorithm.digest_len();
        match self {
            Hasher::Crc32(h) => bytes[..len].copy_from_slice(&h.finalize()),
            Hasher::Md5(h) => bytes[..len].copy_from_slice(&h.finalize()),
            Hasher::Sha224(h) | Hasher::Sha256(h) => bytes[..len].copy_from_slice(h.finalize()),
            Hasher::Sha384(h) | Hasher::Sha512(h) => bytes[..len].copy_from_slice(h.finalize()),
        }
        Digest { algorithm, bytes }
    }

    /// Bytes consumed since the last `init`.
    pub fn total_len(&self) -> u64 {
        match self {
            Hasher::Crc32(h) => h.total_len(),
            Hasher::Md5(h) => h.total_len(),
            Hasher::Sha224(h) | Hasher::Sha256(h) => h.total_len(),
            Hasher::Sha384(h) | Hasher::Sha512(h) => h.total_len(),
        }
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("algorithm", &self.algorithm())
            .field("total_len", &self.total_len())
            .finish()
    }
}

/// Compute the digest of an in-memory buffer.
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Digest {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compute the digest of a file with the default read size.
pub fn hash_file<P: AsRef<Path>>(algorithm: HashAlgorithm, path: P) -> Result<Digest, ChecksumError> {
    compute_file_checksum(path.as_ref(), algorithm, DEFAULT_CHUNK_SIZE)
}

/// Compute checksum for a file, reading `chunk_size` bytes at a time.
pub fn compute_file_checksum(
    path: &Path,
    algorithm: HashAlgorithm,
    chunk_size: usize,
) -> Result<Digest, ChecksumError> {
    let read_error = |source| ChecksumError::ReadError {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_error)?;
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut hasher = Hasher::new(algorithm);

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        }
    }

    Ok(hasher.finalize())
}
