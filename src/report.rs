//! # Run Ledger
//!
//! Accumulates per-entity-type counters and per-record issues across one
//! reconciliation run, tolerant of partial failure. The ledger is the only
//! component that observes results across entity types; the types
//! themselves never see each other's outcome.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Lifecycle of a run: `InProgress` until finalized, then exactly one of
/// the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Success,
    Partial,
    Failed,
}

/// How much an issue weighs on the run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Audit-grade note; does not affect the terminal status.
    Warning,
    /// Excludes the record from the run and counts toward failure.
    Error,
}

/// One per-record problem observed during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIssue {
    pub entity_type: String,
    pub record: String,
    pub reason: String,
    pub severity: IssueSeverity,
}

/// Counters for one entity type. A record increments exactly one of the
/// outcome counters, or the error counter, never both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounters {
    pub created: u64,
    pub updated: u64,
    pub archived: u64,
    pub errors: u64,
    /// Set when the whole collection step failed (e.g. allocator
    /// exhaustion); the outcome counters then stay at their last value
    /// and the collection is excluded from the run output.
    pub step_failed: bool,
}

impl TypeCounters {
    /// An entity type counts as errored for the terminal-status rule when
    /// its step failed outright or it produced errors and nothing else.
    fn errored(&self) -> bool {
        self.step_failed
            || (self.errors > 0 && self.created + self.updated + self.archived == 0)
    }
}

/// Structured report for one reconciliation run.
///
/// Created at run start, mutated only through the ledger methods during
/// the run, and finalized by [`RunReport::finish`]. Timestamps are UTC
/// epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    status: RunStatus,
    started_at: i64,
    finished_at: Option<i64>,
    per_type: BTreeMap<String, TypeCounters>,
    issues: Vec<RecordIssue>,
}

impl RunReport {
    /// Start a new in-progress report stamped with the current time.
    pub fn begin() -> Self {
        Self::begin_at(OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Start a new in-progress report with an explicit start timestamp.
    pub fn begin_at(started_at: i64) -> Self {
        Self {
            status: RunStatus::InProgress,
            started_at,
            finished_at: None,
            per_type: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    /// Ensure an entity type appears in the report even when it ends the
    /// run with zero activity.
    pub fn touch(&mut self, entity_type: &str) {
        self.counters_mut(entity_type);
    }

    /// Count a record created locally with a fresh identifier.
    pub fn record_created(&mut self, entity_type: &str) {
        self.counters_mut(entity_type).created += 1;
    }

    /// Count a record updated from its canonical counterpart.
    pub fn record_updated(&mut self, entity_type: &str) {
        self.counters_mut(entity_type).updated += 1;
    }

    /// Count a record matched to an archived canonical counterpart.
    pub fn record_archived(&mut self, entity_type: &str) {
        self.counters_mut(entity_type).archived += 1;
    }

    /// Record a per-record error. The record is excluded from the outcome
    /// counters; the error both counts and carries a reason.
    pub fn record_error(&mut self, entity_type: &str, record: String, reason: String) {
        self.counters_mut(entity_type).errors += 1;
        self.issues.push(RecordIssue {
            entity_type: entity_type.to_string(),
            record,
            reason,
            severity: IssueSeverity::Error,
        });
    }

    /// Record an audit-grade warning that does not affect the outcome.
    pub fn record_warning(&mut self, entity_type: &str, record: String, reason: String) {
        self.issues.push(RecordIssue {
            entity_type: entity_type.to_string(),
            record,
            reason,
            severity: IssueSeverity::Warning,
        });
    }

    /// Mark a whole collection step as failed. Other collections proceed;
    /// the run can still finish `Partial`.
    pub fn record_step_failure(&mut self, entity_type: &str, reason: String) {
        let counters = self.counters_mut(entity_type);
        counters.errors += 1;
        counters.step_failed = true;
        self.issues.push(RecordIssue {
            entity_type: entity_type.to_string(),
            record: "*".to_string(),
            reason,
            severity: IssueSeverity::Error,
        });
    }

    /// Finalize the report: stamp the end time and compute the terminal
    /// status. `Failed` when every entity type errored, `Success` when no
    /// entity type errored, `Partial` otherwise.
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(OffsetDateTime::now_utc().unix_timestamp());
        let errored = self
            .per_type
            .values()
            .filter(|counters| counters.errored())
            .count();
        self.status = if self.total_errors() == 0 {
            RunStatus::Success
        } else if errored == self.per_type.len() {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        };
        self
    }

    fn counters_mut(&mut self, entity_type: &str) -> &mut TypeCounters {
        self.per_type.entry(entity_type.to_string()).or_default()
    }

    /// Current status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Start of the run, UTC epoch seconds.
    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    /// End of the run, UTC epoch seconds; `None` while in progress.
    pub fn finished_at(&self) -> Option<i64> {
        self.finished_at
    }

    /// Run duration in seconds; `None` while in progress.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    /// Counters per entity type, in name order.
    pub fn per_type(&self) -> &BTreeMap<String, TypeCounters> {
        &self.per_type
    }

    /// Counters for one entity type, if it was touched during the run.
    pub fn counters(&self, entity_type: &str) -> Option<&TypeCounters> {
        self.per_type.get(entity_type)
    }

    /// Every per-record issue, warnings and errors alike, in the order
    /// they were observed.
    pub fn issues(&self) -> &[RecordIssue] {
        &self.issues
    }

    /// Total records created across entity types.
    pub fn total_created(&self) -> u64 {
        self.per_type.values().map(|c| c.created).sum()
    }

    /// Total records updated across entity types.
    pub fn total_updated(&self) -> u64 {
        self.per_type.values().map(|c| c.updated).sum()
    }

    /// Total records archived across entity types.
    pub fn total_archived(&self) -> u64 {
        self.per_type.values().map(|c| c.archived).sum()
    }

    /// Total errors across entity types.
    pub fn total_errors(&self) -> u64 {
        self.per_type.values().map(|c| c.errors).sum()
    }

    /// Whether any entity type recorded an error.
    pub fn has_errors(&self) -> bool {
        self.total_errors() > 0
    }
}
