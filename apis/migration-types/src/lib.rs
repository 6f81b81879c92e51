// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Shared types for the object migration manager.
//!
//! These are the records kept in the directory ledger and the payloads
//! returned by the control API.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, VariantNames};

// ============================================================================
// Type Aliases
// ============================================================================

/// Directory identifier, used verbatim as the object key prefix
pub type DirectoryId = String;

// ============================================================================
// Ledger Types
// ============================================================================

/// Migration status of a directory in the ledger.
///
/// Transitions only move forward: `pending -> in_progress -> completed`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
    EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DirectoryStatus {
    /// Not yet attempted, or left untouched by a stopped run
    #[default]
    Pending,
    /// A run started copying this directory
    InProgress,
    /// Every listed object was attempted and the completion was recorded
    Completed,
}

impl DirectoryStatus {
    /// Whether moving from `self` to `next` keeps the status monotonic.
    pub fn can_advance_to(self, next: DirectoryStatus) -> bool {
        next >= self
    }
}

/// One row of the directory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    /// Surrogate identity assigned by the ledger
    pub id: i64,
    /// Stable external identifier and key prefix on both stores
    pub did: DirectoryId,
    /// Advisory object count, not used to decide completion
    pub total_files: Option<i64>,
    /// Current migration status
    pub status: DirectoryStatus,
    /// When the directory entered `in_progress`
    pub started_at: Option<DateTime<Utc>>,
    /// When the directory entered `completed`
    pub completed_at: Option<DateTime<Utc>>,
}

impl DirectoryRecord {
    /// Create a pending record with no timestamps.
    pub fn pending(id: i64, did: impl Into<DirectoryId>) -> Self {
        Self {
            id,
            did: did.into(),
            total_files: None,
            status: DirectoryStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Number of ledger rows in each status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DirectoryCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
}

impl DirectoryCounts {
    /// Add `count` rows to the bucket for `status`.
    pub fn add(&mut self, status: DirectoryStatus, count: i64) {
        match status {
            DirectoryStatus::Pending => self.pending += count,
            DirectoryStatus::InProgress => self.in_progress += count,
            DirectoryStatus::Completed => self.completed += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.in_progress + self.completed
    }
}

// ============================================================================
// Run Types
// ============================================================================

/// Terminal outcome of one migration run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every fetched directory was processed
    Completed,
    /// The run was cancelled before processing every directory
    Stopped,
    /// The pending directory list could not be fetched
    Failed,
}

/// Transfer counters for the current (or most recent) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransferStats {
    /// Directories recorded as completed during the run
    pub directories_completed: u64,
    /// Directories abandoned because their listing failed
    pub directories_failed: u64,
    /// Directories interrupted by a stop request
    pub directories_cancelled: u64,
    /// Objects copied successfully
    pub objects_migrated: u64,
    /// Objects that failed to copy and were written to the failure log
    pub objects_failed: u64,
    /// Bytes copied successfully
    pub bytes_migrated: u64,
}

/// Response body for `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MigrationStatus {
    /// Whether a run is active
    pub running: bool,
    /// Identifier of the active or most recent run
    pub run_id: Option<String>,
    /// Outcome of the most recent finished run
    pub last_outcome: Option<RunOutcome>,
    /// Ledger rows by status
    pub directories: DirectoryCounts,
    /// Counters for the active or most recent run
    pub transfers: TransferStats,
}

// ============================================================================
// Tests
// ============================================================================
