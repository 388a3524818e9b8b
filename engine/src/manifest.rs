//! Checksum manifest parsing.
//!
//! A manifest is a text file listing files and their expected digests.
//! Three kinds are understood, chosen by the manifest's file name:
//!
//! | File name                            | Kind        | Line layout                      |
//! |--------------------------------------|-------------|----------------------------------|
//! | `*.sfv`                              | SFV (CRC32) | `<name> <8 hex digits>`          |
//! | `*.md5`, `MD5SUM`, `MD5SUMS`         | MD5SUM      | `<32 hex digits><2 chars><name>` |
//! | `*.sha256`, `SHA256SUM`, `SHA256SUMS`| SHA256SUM   | `<64 hex digits><2 chars><name>` |
//!
//! Extensions are matched case-insensitively; the literal names are
//! case-sensitive. Malformed lines are skipped, never reported as errors.

use crate::checksums::{Digest, HashAlgorithm};
use crate::error::ManifestError;
use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The manifest formats that can be detected and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Sfv,
    Md5Sum,
    Sha256Sum,
}

/// Where the digest sits on a manifest line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestPosition {
    /// `<name> <digest>`: the digest follows the last space
    AfterName,
    /// `<digest><gap><name>`: the digest starts the line
    BeforeName,
}

/// Line layout rules for one manifest kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestFormat {
    pub algorithm: HashAlgorithm,
    /// Digest length in hex characters
    pub hex_len: usize,
    pub position: DigestPosition,
    /// Characters between the digest and the name (`BeforeName` only)
    pub separator_gap: usize,
    /// Lines starting with this byte are comments
    pub comment: u8,
}

impl ManifestKind {
    /// Determine the kind from the final component of `path`.
    pub fn detect(path: &Path) -> Option<ManifestKind> {
        let file_name = path.file_name()?.to_string_lossy();

        match file_name.as_ref() {
            "MD5SUM" | "MD5SUMS" => return Some(ManifestKind::Md5Sum),
            "SHA256SUM" | "SHA256SUMS" => return Some(ManifestKind::Sha256Sum),
            _ => {}
        }

        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "sfv" => Some(ManifestKind::Sfv),
            "md5" => Some(ManifestKind::Md5Sum),
            "sha256" => Some(ManifestKind::Sha256Sum),
            _ => None,
        }
    }

    pub fn algorithm(self) -> HashAlgorithm {
        self.format().algorithm
    }

    pub fn format(self) -> ManifestFormat {
        match self {
            ManifestKind::Sfv => ManifestFormat {
                algorithm: HashAlgorithm::Crc32,
                hex_len: HashAlgorithm::Crc32.hex_len(),
                position: DigestPosition::AfterName,
                separator_gap: 1,
                comment: b';',
            },
            ManifestKind::Md5Sum => ManifestFormat {
                algorithm: HashAlgorithm::Md5,
                hex_len: HashAlgorithm::Md5.hex_len(),
                position: DigestPosition::BeforeName,
                separator_gap: 2,
                comment: b'#',
            },
            ManifestKind::Sha256Sum => ManifestFormat {
                algorithm: HashAlgorithm::Sha256,
                hex_len: HashAlgorithm::Sha256.hex_len(),
                position: DigestPosition::BeforeName,
                separator_gap: 2,
                comment: b'#',
            },
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestKind::Sfv => write!(f, "SFV"),
            ManifestKind::Md5Sum => write!(f, "MD5SUM"),
            ManifestKind::Sha256Sum => write!(f, "SHA256SUM"),
        }
    }
}

/// Verification state of one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// File exists but has not been (fully) checked
    NotVerified,
    /// Digest matched
    Good,
    /// Digest did not match
    Bad,
    /// File missing or unreadable
    NotFound,
}

impl EntryStatus {
    pub const ALL: [EntryStatus; 4] = [
        EntryStatus::NotVerified,
        EntryStatus::Good,
        EntryStatus::Bad,
        EntryStatus::NotFound,
    ];

    /// Returns true for outcomes that indicate a damaged or incomplete set.
    pub fn is_failure(&self) -> bool {
        matches!(self, EntryStatus::Bad | EntryStatus::NotFound)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::NotVerified => write!(f, "Not verified"),
            EntryStatus::Good => write!(f, "Good"),
            EntryStatus::Bad => write!(f, "Bad"),
            EntryStatus::NotFound => write!(f, "Not found"),
        }
    }
}

/// The immutable part of an entry, shared with verification workers.
#[derive(Debug)]
pub struct EntryTarget {
    /// File name as written in the manifest, decoded lossily for display
    pub relative_path: String,
    /// The raw file name bytes joined onto the manifest's directory
    pub resolved_path: PathBuf,
    pub expected_digest: Digest,
}

/// One file named in a manifest.
///
/// Only the status changes after parsing.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    target: Arc<EntryTarget>,
    status: EntryStatus,
}

impl ManifestEntry {
    pub fn new(relative_path: String, resolved_path: PathBuf, expected_digest: Digest) -> Self {
        let status = if resolved_path.exists() {
            EntryStatus::NotVerified
        } else {
            EntryStatus::NotFound
        };
        ManifestEntry {
            target: Arc::new(EntryTarget {
                relative_path,
                resolved_path,
                expected_digest,
            }),
            status,
        }
    }

    pub fn relative_path(&self) -> &str {
        &self.target.relative_path
    }

    pub fn resolved_path(&self) -> &Path {
        &self.target.resolved_path
    }

    pub fn expected_digest(&self) -> &Digest {
        &self.target.expected_digest
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub(crate) fn target(&self) -> &Arc<EntryTarget> {
        &self.target
    }

    pub(crate) fn set_status(&mut self, status: EntryStatus) {
        self.status = status;
    }
}

/// Tally of entries by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub not_verified: usize,
    pub good: usize,
    pub bad: usize,
    pub not_found: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: EntryStatus) {
        match status {
            EntryStatus::NotVerified => self.not_verified += 1,
            EntryStatus::Good => self.good += 1,
            EntryStatus::Bad => self.bad += 1,
            EntryStatus::NotFound => self.not_found += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.not_verified + self.good + self.bad + self.not_found
    }

    pub fn failures(&self) -> usize {
        self.bad + self.not_found
    }
}

/// Selects entries by status and, optionally, by a substring of the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    status_mask: u8,
    substring: Option<String>,
}

impl EntryFilter {
    /// Matches every entry.
    pub fn all() -> Self {
        EntryFilter {
            status_mask: EntryStatus::ALL.iter().fold(0, |mask, s| mask | s.bit()),
            substring: None,
        }
    }

    /// Matches entries whose status is one of `statuses`.
    pub fn only(statuses: &[EntryStatus]) -> Self {
        EntryFilter {
            status_mask: statuses.iter().fold(0, |mask, s| mask | s.bit()),
            substring: None,
        }
    }

    pub fn with_substring(mut self, substring: impl Into<String>) -> Self {
        let substring = substring.into();
        self.substring = if substring.is_empty() {
            None
        } else {
            Some(substring)
        };
        self
    }

    pub fn matches(&self, entry: &ManifestEntry) -> bool {
        if self.status_mask & entry.status().bit() == 0 {
            return false;
        }
        match &self.substring {
            Some(needle) => entry.relative_path().contains(needle.as_str()),
            None => true,
        }
    }
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// A parsed checksum manifest.
///
/// `Manifest::default()` is the empty manifest a front end holds before any
/// file is loaded; it has no algorithm and cannot be verified.
#[derive(Debug, Clone)]
pub struct Manifest {
    id: Uuid,
    kind: Option<ManifestKind>,
    path: Option<PathBuf>,
    base_dir: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            id: Uuid::new_v4(),
            kind: None,
            path: None,
            base_dir: PathBuf::new(),
            entries: Vec::new(),
        }
    }
}

impl Manifest {
    /// Detect the manifest kind from `path` and parse the file.
    ///
    /// # Errors
    /// - `UnrecognizedFormat` if the file name matches no known kind
    /// - `Unreadable` if the file cannot be opened
    ///
    /// A read error part-way through keeps the entries parsed so far.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Manifest, ManifestError> {
        let path = path.as_ref();

        let kind = ManifestKind::detect(path).ok_or_else(|| ManifestError::UnrecognizedFormat {
            path: path.to_path_buf(),
        })?;

        let file = File::open(path).map_err(|source| ManifestError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut manifest = Manifest::from_reader(kind, base_dir, BufReader::new(file));
        manifest.path = Some(path.to_path_buf());

        info!(
            manifest = %path.display(),
            kind = %kind,
            entries = manifest.entries.len(),
            "Loaded checksum file"
        );
        Ok(manifest)
    }

    /// Parse manifest lines from `reader`, resolving names against `base_dir`.
    pub fn from_reader<R: BufRead>(kind: ManifestKind, base_dir: PathBuf, reader: R) -> Manifest {
        let format = kind.format();
        let mut entries = Vec::new();

        for (index, line) in reader.split(b'\n').enumerate() {
            let line_number = index + 1;
            let raw = match line {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(line = line_number, error = %e, "Stopped reading checksum file");
                    break;
                }
            };

            match parse_line(&format, &raw) {
                Ok((name, digest)) => {
                    let resolved_path = base_dir.join(name_to_path(name));
                    let relative_path = String::from_utf8_lossy(name).into_owned();
                    entries.push(ManifestEntry::new(relative_path, resolved_path, digest));
                }
                Err(reason) => {
                    debug!(line = line_number, reason = %reason, "Skipped checksum line");
                }
            }
        }

        Manifest {
            id: Uuid::new_v4(),
            kind: Some(kind),
            path: None,
            base_dir,
            entries,
        }
    }

    /// Identity of this manifest; a fresh id is assigned on every load.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> Option<ManifestKind> {
        self.kind
    }

    /// The algorithm every entry's digest uses, if a manifest has been loaded.
    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        self.kind.map(ManifestKind::algorithm)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The manifest's file name, for display.
    pub fn display_name(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Entries in file order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered `(relative_path, status)` pairs.
    pub fn snapshot(&self) -> Vec<(String, EntryStatus)> {
        self.entries
            .iter()
            .map(|e| (e.relative_path().to_string(), e.status()))
            .collect()
    }

    /// Entries accepted by `filter`, with their manifest index.
    pub fn filtered<'a>(
        &'a self,
        filter: &'a EntryFilter,
    ) -> impl Iterator<Item = (usize, &'a ManifestEntry)> + 'a {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, entry)| filter.matches(entry))
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in &self.entries {
            counts.add(entry.status());
        }
        counts
    }

    /// Set the status of the entry at `index`. Returns false if out of range.
    pub(crate) fn set_status(&mut self, index: usize, status: EntryStatus) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.set_status(status);
                true
            }
            None => false,
        }
    }
}

/// Load a manifest; see [`Manifest::load`].
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Manifest, ManifestError> {
    Manifest::load(path)
}

/// Why a line was not turned into an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    TooShort,
    Comment,
    Blank,
    NoSeparator,
    EmptyName,
    BadDigest,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::TooShort => "line too short",
            SkipReason::Comment => "comment",
            SkipReason::Blank => "blank line",
            SkipReason::NoSeparator => "no separator before checksum",
            SkipReason::EmptyName => "empty file name",
            SkipReason::BadDigest => "checksum is not valid hex",
        };
        f.write_str(text)
    }
}

/// Split one line into `(name, digest)`.
///
/// Works on raw bytes so names in legacy encodings still resolve to the
/// files on disk. A trailing `\r` is dropped so manifests written with CRLF
/// line endings parse the same as LF ones.
fn parse_line<'a>(format: &ManifestFormat, line: &'a [u8]) -> Result<(&'a [u8], Digest), SkipReason> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    match line.first() {
        None | Some(b'\r') => return Err(SkipReason::Blank),
        Some(&first) if first == format.comment => return Err(SkipReason::Comment),
        Some(_) => {}
    }
    if line.len() < format.hex_len + 2 {
        return Err(SkipReason::TooShort);
    }

    let (name, digest_field) = match format.position {
        DigestPosition::AfterName => {
            let space = line
                .iter()
                .rposition(|&b| b == b' ')
                .ok_or(SkipReason::NoSeparator)?;
            (&line[..space], &line[space + 1..])
        }
        DigestPosition::BeforeName => {
            let name = line
                .get(format.hex_len + format.separator_gap..)
                .ok_or(SkipReason::EmptyName)?;
            (name, &line[..format.hex_len])
        }
    };

    if name.is_empty() {
        return Err(SkipReason::EmptyName);
    }

    // Anything after the first `hex_len` characters of the digest field is ignored.
    let digest_text = digest_field.get(..format.hex_len).ok_or(SkipReason::BadDigest)?;
    if !digest_text.iter().all(u8::is_ascii_hexdigit) {
        return Err(SkipReason::BadDigest);
    }
    let digest = std::str::from_utf8(digest_text)
        .ok()
        .and_then(|text| Digest::from_hex(format.algorithm, text))
        .ok_or(SkipReason::BadDigest)?;

    Ok((name, digest))
}

#[cfg(unix)]
fn name_to_path(name: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(name))
}

#[cfg(not(unix))]
fn name_to_path(name: &[u8]) -> PathBuf {
    PathBuf::from(OsStr::new(String::from_utf8_lossy(name).as_ref()))
}

/// Parse manifest text held in memory.
pub fn parse_str(kind: ManifestKind, base_dir: &Path, content: &str) -> Manifest {
    Manifest::from_reader(kind, base_dir.to_path_buf(), io::Cursor::new(content.as_bytes()))
}
