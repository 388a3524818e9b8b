//! sumcheck - Command-line interface for the verification engine.
//!
//! Verifies files against SFV, MD5SUM and SHA256SUM checksum files and
//! computes digests of individual files. Results go to stdout, progress and
//! diagnostics to stderr.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use sumcheck_engine::{
    hash_file, load_manifest, CancelHandle, Digest, EntryFilter, EntryStatus, HashAlgorithm, Manifest, ManifestKind,
    Progress, SessionOutcome, StatusChange, VerificationSummary, Verifier, VerifyListener, VerifyOptions,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// sumcheck - verify files against checksum manifests
#[derive(Parser, Debug)]
#[command(name = "sumcheck")]
#[command(version = "0.1.0")]
#[command(about = "Verify files against SFV, MD5SUM and SHA256SUM checksum files")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Increase log output (-v for info, -vv for debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify every file listed in a checksum file
    Verify(VerifyArgs),
    /// Print the digest of one or more files
    Hash(HashArgs),
}

#[derive(clap::Args, Debug)]
struct VerifyArgs {
    /// Checksum file (*.sfv, *.md5, *.sha256, MD5SUMS, SHA256SUMS)
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,

    /// Do not show progress
    #[arg(short, long)]
    quiet: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Only list entries with these statuses (comma separated)
    #[arg(long, value_name = "STATUSES", value_enum, value_delimiter = ',')]
    show: Vec<StatusArg>,

    /// Only list entries whose name contains this text
    #[arg(long, value_name = "SUBSTR")]
    filter: Option<String>,

    /// Read size in KiB
    #[arg(long, value_name = "N", default_value_t = 512)]
    chunk_kib: usize,

    /// Stop at the first bad or missing file
    #[arg(long)]
    fail_fast: bool,
}

#[derive(clap::Args, Debug)]
struct HashArgs {
    /// Hash algorithm: crc32, md5, sha224, sha256, sha384 or sha512
    #[arg(short, long, value_name = "NAME", default_value = "sha256")]
    algorithm: String,

    /// Files to hash
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum StatusArg {
    NotVerified,
    Good,
    Bad,
    NotFound,
}

impl From<StatusArg> for EntryStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::NotVerified => EntryStatus::NotVerified,
            StatusArg::Good => EntryStatus::Good,
            StatusArg::Bad => EntryStatus::Bad,
            StatusArg::NotFound => EntryStatus::NotFound,
        }
    }
}

/// Result of a successful run, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    /// Everything checked out
    Clean,
    /// Some files were bad, missing, unreadable or left unverified
    Failures,
}

impl RunOutcome {
    fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::Failures => 1,
        }
    }
}

/// CLI implementation of VerifyListener for displaying verification progress
struct CliProgress {
    quiet: bool,
    good: usize,
    failed: usize,
    drew_progress: bool,
    /// Cancelled on the first failure when `--fail-fast` is set
    stop_on_failure: Option<CancelHandle>,
}

impl CliProgress {
    fn new(quiet: bool, stop_on_failure: Option<CancelHandle>) -> Self {
        CliProgress {
            quiet,
            good: 0,
            failed: 0,
            drew_progress: false,
            stop_on_failure,
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn print_progress_bar(percent: u32) -> String {
        let percent = percent.min(100);
        let filled = (percent / 5) as usize;
        let empty = 20 - filled;
        format!(
            "[{}{}] {}%",
            "=".repeat(filled),
            " ".repeat(empty),
            percent
        )
    }

    fn end_progress_line(&mut self) {
        if self.drew_progress {
            eprintln!();
            self.drew_progress = false;
        }
    }
}

impl VerifyListener for CliProgress {
    fn on_status_batch(&mut self, changes: &[StatusChange]) {
        for change in changes {
            match change.status {
                EntryStatus::Good => self.good += 1,
                EntryStatus::NotVerified => {}
                EntryStatus::Bad | EntryStatus::NotFound => self.failed += 1,
            }
        }

        if self.failed > 0 {
            if let Some(cancel) = self.stop_on_failure.take() {
                info!("Failure found; stopping verification");
                cancel.cancel();
            }
        }
    }

    fn on_progress(&mut self, progress: &Progress) {
        if self.quiet {
            return;
        }

        let percent = (progress.fraction * 100.0) as u32;
        eprint!(
            "\rVerifying: {} | {}/{} | file {}/{} | {}/s | {} ok, {} failed ",
            Self::print_progress_bar(percent),
            Self::format_bytes(progress.bytes_verified),
            Self::format_bytes(progress.bytes_total),
            (progress.files_done + 1).min(progress.files_total),
            progress.files_total,
            Self::format_bytes((progress.speed_kib_per_sec * 1024.0) as u64),
            self.good,
            self.failed
        );
        let _ = std::io::stderr().flush();
        self.drew_progress = true;
    }

    fn on_cancelled(&mut self) {
        self.end_progress_line();
        if !self.quiet {
            eprintln!("Verification cancelled");
        }
    }

    fn on_complete(&mut self, summary: &VerificationSummary) {
        self.end_progress_line();
        if self.quiet {
            return;
        }

        let counts = &summary.counts;
        eprintln!(
            "Summary: {} good, {} bad, {} not found, {} not verified",
            counts.good, counts.bad, counts.not_found, counts.not_verified
        );
        eprintln!(
            "Bytes verified: {}",
            Self::format_bytes(summary.bytes_verified)
        );
        eprintln!(
            "Elapsed: {}",
            Self::format_duration(Duration::from_secs_f64(summary.elapsed_secs))
        );
    }
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    path: &'a str,
    status: EntryStatus,
    expected: &'a Digest,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    manifest: String,
    kind: Option<ManifestKind>,
    algorithm: Option<HashAlgorithm>,
    summary: &'a VerificationSummary,
    entries: Vec<JsonEntry<'a>>,
}

/// Parse arguments, set up logging, then run the requested command
fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Exit code tracking
    let exit_code = match run_cli(&args) {
        Ok(outcome) => outcome.exit_code(),
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Install the stderr log subscriber. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be installed (tests); keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<RunOutcome, String> {
    match &args.command {
        Command::Verify(verify) => run_verify(verify),
        Command::Hash(hash) => run_hash(hash),
    }
}

fn run_verify(args: &VerifyArgs) -> Result<RunOutcome, String> {
    let chunk_size = match args.chunk_kib.checked_mul(1024) {
        Some(bytes) if bytes > 0 => bytes,
        _ => return Err(format!("Chunk size out of range: {} KiB", args.chunk_kib)),
    };

    let mut manifest = load_manifest(&args.manifest).map_err(|e| describe(&e))?;
    if manifest.is_empty() {
        warn!(manifest = %args.manifest.display(), "No valid checksum lines found");
    }

    let options = VerifyOptions::default().with_chunk_size(chunk_size);
    let mut verifier = Verifier::new(options);
    let session = verifier
        .start(&manifest)
        .map_err(|e| format!("Verification failed to start: {}", describe(&e)))?;

    let stop_on_failure = args.fail_fast.then(|| session.cancel_handle());
    let mut progress = CliProgress::new(args.quiet || args.json, stop_on_failure);
    let summary = verifier
        .run(&mut manifest, &mut progress)
        .ok_or_else(|| "Verification did not complete".to_string())?;

    let filter = build_filter(args);
    if args.json {
        print_json(&manifest, &summary, &filter)?;
    } else {
        for (_, entry) in manifest.filtered(&filter) {
            println!("{}: {}", entry.relative_path(), entry.status());
        }
    }

    let outcome = if summary.outcome == SessionOutcome::Completed && summary.counts.failures() == 0 {
        RunOutcome::Clean
    } else {
        RunOutcome::Failures
    };
    info!(outcome = ?outcome, "Done");
    Ok(outcome)
}

fn build_filter(args: &VerifyArgs) -> EntryFilter {
    let filter = if args.show.is_empty() {
        EntryFilter::all()
    } else {
        let statuses: Vec<EntryStatus> = args.show.iter().map(|s| EntryStatus::from(*s)).collect();
        EntryFilter::only(&statuses)
    };
    match &args.filter {
        Some(substring) => filter.with_substring(substring.as_str()),
        None => filter,
    }
}

fn print_json(
    manifest: &Manifest,
    summary: &VerificationSummary,
    filter: &EntryFilter,
) -> Result<(), String> {
    let report = JsonReport {
        manifest: manifest.display_name().unwrap_or_default(),
        kind: manifest.kind(),
        algorithm: manifest.algorithm(),
        summary,
        entries: manifest
            .filtered(filter)
            .map(|(_, entry)| JsonEntry {
                path: entry.relative_path(),
                status: entry.status(),
                expected: entry.expected_digest(),
            })
            .collect(),
    };
    let text = serde_json::to_string_pretty(&report)
        .map_err(|e| format!("Failed to encode report: {}", e))?;
    println!("{}", text);
    Ok(())
}

fn run_hash(args: &HashArgs) -> Result<RunOutcome, String> {
    let algorithm: HashAlgorithm = args.algorithm.parse().map_err(|e| describe(&e))?;

    let mut outcome = RunOutcome::Clean;
    for path in &args.files {
        match hash_file(algorithm, path) {
            // SFV lists the name first; the *SUM formats list the digest first.
            Ok(digest) if algorithm == HashAlgorithm::Crc32 => {
                println!("{} {}", path.display(), digest)
            }
            Ok(digest) => println!("{}  {}", digest, path.display()),
            Err(e) => {
                eprintln!("{}", describe(&e));
                outcome = RunOutcome::Failures;
            }
        }
    }
    Ok(outcome)
}

/// Render an error with its chain of causes.
fn describe(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use sumcheck_engine::hash_bytes;
    use tempfile::TempDir;

    fn verify_args(manifest: PathBuf) -> Args {
        Args {
            command: Command::Verify(VerifyArgs {
                manifest,
                quiet: true,
                json: false,
                show: Vec::new(),
                filter: None,
                chunk_kib: 512,
                fail_fast: false,
            }),
            verbose: 0,
        }
    }

    fn write_sha256sums(dir: &TempDir, files: &[(&str, &[u8])]) -> PathBuf {
        let mut content = String::new();
        for (name, data) in files {
            content.push_str(&format!("{}  {}\n", hash_bytes(HashAlgorithm::Sha256, data), name));
        }
        let path = dir.path().join("SHA256SUMS");
        std::fs::write(&path, content).expect("Failed to write manifest");
        path
    }

    #[test]
    fn test_cli_verify_clean_set() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("a.txt"), "hello").expect("Failed to write file");
        std::fs::write(dir.path().join("b.txt"), "world").expect("Failed to write file");
        let manifest = write_sha256sums(&dir, &[("a.txt", b"hello"), ("b.txt", b"world")]);

        let result = run_cli(&verify_args(manifest));
        assert_eq!(result, Ok(RunOutcome::Clean));
    }

    #[test]
    fn test_cli_verify_reports_failures() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("a.txt"), "tampered").expect("Failed to write file");
        let manifest = write_sha256sums(&dir, &[("a.txt", b"hello"), ("gone.txt", b"x")]);

        let result = run_cli(&verify_args(manifest));
        assert_eq!(result, Ok(RunOutcome::Failures));
        assert_eq!(RunOutcome::Failures.exit_code(), 1);
    }

    #[test]
    fn test_cli_verify_json_with_filter() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("a.txt"), "hello").expect("Failed to write file");
        let manifest = write_sha256sums(&dir, &[("a.txt", b"hello"), ("gone.txt", b"x")]);

        let mut args = verify_args(manifest);
        if let Command::Verify(verify) = &mut args.command {
            verify.json = true;
            verify.show = vec![StatusArg::NotFound];
            verify.filter = Some("gone".to_string());
        }
        let result = run_cli(&args);
        assert_eq!(result, Ok(RunOutcome::Failures));
    }

    #[test]
    fn test_cli_rejects_unknown_manifest_format() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("checksums.txt");
        std::fs::write(&path, "irrelevant").expect("Failed to write file");

        let result = run_cli(&verify_args(path));
        let message = result.expect_err("CLI should reject unknown format");
        assert!(message.contains("Unrecognized checksum file format"));
    }

    #[test]
    fn test_cli_rejects_missing_manifest() {
        let result = run_cli(&verify_args(PathBuf::from("/nonexistent/path/set.sfv")));
        assert!(result.is_err(), "CLI should reject missing manifest");
    }

    #[test]
    fn test_cli_rejects_zero_chunk_size() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let manifest = write_sha256sums(&dir, &[]);

        let mut args = verify_args(manifest);
        if let Command::Verify(verify) = &mut args.command {
            verify.chunk_kib = 0;
        }
        assert!(run_cli(&args).is_err());
    }

    #[test]
    fn test_cli_rejects_overflowing_chunk_size() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let manifest = write_sha256sums(&dir, &[]);

        let mut args = verify_args(manifest);
        if let Command::Verify(verify) = &mut args.command {
            verify.chunk_kib = usize::MAX;
        }
        let message = run_cli(&args).expect_err("CLI should reject an overflowing chunk size");
        assert!(message.contains("Chunk size"));
    }

    #[test]
    fn test_cli_fail_fast_stops_after_failure() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("b.txt"), "fine").expect("Failed to write file");
        let manifest = write_sha256sums(&dir, &[("gone.txt", b"x"), ("b.txt", b"fine")]);

        let mut args = verify_args(manifest);
        if let Command::Verify(verify) = &mut args.command {
            verify.fail_fast = true;
        }
        assert_eq!(run_cli(&args), Ok(RunOutcome::Failures));
    }

    #[test]
    fn test_progress_cancels_on_first_failure() {
        let cancel = CancelHandle::default();
        let mut progress = CliProgress::new(true, Some(cancel.clone()));

        progress.on_status_batch(&[StatusChange {
            index: 0,
            status: EntryStatus::Good,
        }]);
        assert!(!cancel.is_cancelled());

        progress.on_status_batch(&[StatusChange {
            index: 1,
            status: EntryStatus::Bad,
        }]);
        assert!(cancel.is_cancelled());
        assert_eq!(progress.failed, 1);

        let mut without = CliProgress::new(true, None);
        without.on_status_batch(&[StatusChange {
            index: 0,
            status: EntryStatus::NotFound,
        }]);
        assert_eq!(without.failed, 1);
    }

    #[test]
    fn test_cli_hash_files() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("data.bin");
        std::fs::write(&path, "123456789").expect("Failed to write file");

        for algorithm in ["crc32", "md5", "SHA-512"] {
            let args = Args {
                command: Command::Hash(HashArgs {
                    algorithm: algorithm.to_string(),
                    files: vec![path.clone()],
                }),
                verbose: 0,
            };
            assert_eq!(run_cli(&args), Ok(RunOutcome::Clean), "{algorithm}");
        }
    }

    #[test]
    fn test_cli_hash_missing_file_is_failure() {
        let args = Args {
            command: Command::Hash(HashArgs {
                algorithm: "md5".to_string(),
                files: vec![PathBuf::from("/nonexistent/file.bin")],
            }),
            verbose: 0,
        };
        assert_eq!(run_cli(&args), Ok(RunOutcome::Failures));
    }

    #[test]
    fn test_cli_rejects_invalid_hash_algorithm() {
        let args = Args {
            command: Command::Hash(HashArgs {
                algorithm: "blake3".to_string(),
                files: vec![PathBuf::from("whatever")],
            }),
            verbose: 0,
        };
        let result = run_cli(&args);
        assert!(result.is_err(), "CLI should reject invalid hash algorithm");
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(CliProgress::format_bytes(512), "512.00 B");
        assert_eq!(CliProgress::format_bytes(1536), "1.50 KB");
        assert_eq!(CliProgress::format_duration(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(CliProgress::format_duration(Duration::from_secs(61)), "1m 1s");
        assert_eq!(CliProgress::print_progress_bar(50), "[==========          ] 50%");
        assert_eq!(CliProgress::print_progress_bar(250), format!("[{}] 100%", "=".repeat(20)));
    }

    #[test]
    fn test_args_parse_show_list() {
        let args = Args::try_parse_from([
            "sumcheck",
            "-vv",
            "verify",
            "files.sfv",
            "--show",
            "bad,not-found",
            "--filter",
            "disc",
        ])
        .expect("Arguments should parse");

        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Verify(verify) => {
                assert_eq!(verify.show, vec![StatusArg::Bad, StatusArg::NotFound]);
                assert_eq!(verify.filter.as_deref(), Some("disc"));
                assert_eq!(verify.chunk_kib, 512);
            }
            Command::Hash(_) => panic!("Expected verify command"),
        }
    }
}
