//! Progress reporting trait.
//!
//! This module defines the `VerifyListener` trait, which decouples the
//! verification pipeline from any specific front end (CLI, GUI, etc.), along
//! with the event types delivered through it.

use crate::manifest::{EntryStatus, StatusCounts};
use serde::Serialize;
use uuid::Uuid;

/// A status update for the entry at `index` in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub index: usize,
    pub status: EntryStatus,
}

/// Periodic progress of a running verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    /// `bytes_verified / bytes_total`, never above 1.0
    pub fraction: f64,
    /// Smoothed throughput in KiB per second
    pub speed_kib_per_sec: f64,
    /// Entries whose final status has been decided
    pub files_done: usize,
    pub files_total: usize,
    pub bytes_verified: u64,
    pub bytes_total: u64,
    /// Index of the entry currently being hashed
    pub current_index: Option<usize>,
    pub current_path: Option<String>,
}

impl Progress {
    pub fn kib_verified(&self) -> u64 {
        self.bytes_verified >> 10
    }

    pub fn kib_total(&self) -> u64 {
        self.bytes_total >> 10
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Cancelled,
}

/// Final report of a verification session.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    pub session_id: Uuid,
    pub outcome: SessionOutcome,
    /// Status tally over all entries after the session's changes were applied
    pub counts: StatusCounts,
    pub files_total: usize,
    pub bytes_verified: u64,
    pub bytes_total: u64,
    pub elapsed_secs: f64,
}

impl VerificationSummary {
    /// Returns true if every entry verified as good.
    pub fn all_good(&self) -> bool {
        self.outcome == SessionOutcome::Completed && self.counts.good == self.counts.total()
    }
}

/// Trait for receiving events from a verification session.
///
/// Events are delivered on the thread that drives the session (the one
/// calling `Verifier::tick` or `Verifier::run`), never on the worker, so
/// implementations need not be `Send`. Every method has an empty default.
pub trait VerifyListener {
    /// Called with each drained batch of status changes, in the order the
    /// worker produced them.
    fn on_status_batch(&mut self, _changes: &[StatusChange]) {}

    /// Called on the progress interval while bytes remain to be verified.
    fn on_progress(&mut self, _progress: &Progress) {}

    /// Called once, before `on_complete`, when the session was cancelled.
    fn on_cancelled(&mut self) {}

    /// Called exactly once per session, after the last status batch.
    fn on_complete(&mut self, _summary: &VerificationSummary) {}
}

/// A listener that ignores every event.
impl VerifyListener for () {}
