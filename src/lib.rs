//! # Catsync
//!
//! A catalog reconciliation and override-aware synchronization engine.
//!
//! This library merges externally sourced catalog records with locally
//! curated ones while guaranteeing globally unique, stable identifiers
//! across repeated runs, protecting manually edited fields from being
//! silently overwritten, and keeping cross-entity foreign-key references
//! consistent whenever identifiers are remapped.
//!
//! The engine consumes collections of local and canonical records plus a
//! declarative schema of the entity graph; transport, credentials, and
//! storage are the caller's concern.

pub mod allocator;
pub mod config;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod report;
pub mod resolve;
pub mod rewrite;
pub mod schema;

// Re-export main types for convenience
pub use config::{MatchTuning, TieBreak};
pub use merge::{MergeAction, MergeDecision};
pub use model::{CanonicalRecord, EntityId, FieldMap, Record};
pub use report::{IssueSeverity, RecordIssue, RunReport, RunStatus, TypeCounters};
pub use resolve::Reassignment;
pub use rewrite::{DanglingRef, IdentityMapping};
pub use schema::{EntityType, ReferenceRule, Schema, catalog_schema};

use crate::allocator::IdAllocator;
use crate::matcher::{CanonicalIndex, IndexNote, MatchResult, match_records};
use crate::merge::merge_record;
use crate::model::NameValue;
use crate::resolve::resolve_conflicts;
use crate::rewrite::rewrite_references;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One entity-type collection to reconcile: the locally curated records
/// and the canonical records fetched by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInput {
    pub entity_type: String,
    pub local: Vec<Record>,
    #[serde(default)]
    pub canonical: Vec<CanonicalRecord>,
}

impl CollectionInput {
    /// Create a collection input.
    pub fn new(
        entity_type: String,
        local: Vec<Record>,
        canonical: Vec<CanonicalRecord>,
    ) -> Self {
        Self {
            entity_type,
            local,
            canonical,
        }
    }
}

/// Audit detail for one local record's identity outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetail {
    pub local_name: String,
    pub old_id: Option<EntityId>,
    pub new_id: EntityId,
    pub is_archived: bool,
}

/// The merge audit trail for one matched record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMergeAudit {
    pub id: EntityId,
    pub decisions: Vec<MergeDecision>,
}

/// Result of reconciling one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub entity_type: String,
    /// The reconciled collection: all identifiers final and unique,
    /// `protected_fields` unchanged.
    pub records: Vec<Record>,
    /// Old-to-final identifier mapping, exported so callers can apply it
    /// to dependent collections the schema does not know about.
    pub mapping: IdentityMapping,
    /// Identifier reassignments performed by conflict resolution.
    pub reassignments: Vec<Reassignment>,
    /// Per-record merge decisions for every matched pair.
    pub merges: Vec<RecordMergeAudit>,
    /// Local records that adopted a canonical identity.
    pub matched: Vec<MatchDetail>,
    /// Local records that received a freshly allocated identifier.
    pub created: Vec<MatchDetail>,
    /// Identifiers of records matched to archived canonical records.
    pub archived_ids: Vec<EntityId>,
}

/// Result of one reconciliation run across entity-type collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub collections: Vec<CollectionOutcome>,
    pub report: RunReport,
}

impl RunOutcome {
    /// Look up a collection outcome by entity type.
    pub fn collection(&self, entity_type: &str) -> Option<&CollectionOutcome> {
        self.collections
            .iter()
            .find(|outcome| outcome.entity_type == entity_type)
    }
}

/// Main API for catalog reconciliation.
///
/// Holds the entity-graph schema and the matching tuning; each call to
/// [`Catsync::reconcile`] is one self-contained run that owns all of its
/// intermediate state. Nothing is retained across runs: any knowledge of
/// previous results arrives as input.
#[derive(Debug, Clone)]
pub struct Catsync {
    schema: Schema,
    tuning: MatchTuning,
}

impl Catsync {
    /// Create an engine with default tuning.
    pub fn new(schema: Schema) -> Self {
        Self::with_tuning(schema, MatchTuning::default())
    }

    /// Create an engine with explicit tuning.
    pub fn with_tuning(schema: Schema, tuning: MatchTuning) -> Self {
        Self { schema, tuning }
    }

    /// The entity-graph schema this engine reconciles against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Reconcile a set of entity-type collections in one run.
    ///
    /// Collections are processed in schema declaration order (undeclared
    /// types follow, in input order). After each collection's identity
    /// mapping is finalized, every dependent collection named by the
    /// reference table is rewritten before processing resumes, so a
    /// dependent never reconciles against stale identifiers.
    ///
    /// A collection whose step fails is recorded in the ledger and
    /// excluded from the output; the other collections proceed. The run
    /// itself only fails on malformed orchestration input, never because
    /// one collection did.
    pub fn reconcile(&self, inputs: Vec<CollectionInput>) -> Result<RunOutcome> {
        let mut report = RunReport::begin();

        let mut pending = inputs;
        pending.sort_by_key(|input| {
            self.schema
                .position(&input.entity_type)
                .unwrap_or(usize::MAX)
        });

        let mut outcomes: Vec<CollectionOutcome> = Vec::new();
        while !pending.is_empty() {
            let input = pending.remove(0);
            let entity_type = input.entity_type.clone();
            report.touch(&entity_type);

            match self.reconcile_one(input, &mut report) {
                Ok(outcome) => {
                    self.cascade(&outcome, &mut pending, &mut outcomes, &mut report);
                    outcomes.push(outcome);
                }
                Err(error) => {
                    report.record_step_failure(&entity_type, error.to_string());
                }
            }
        }

        Ok(RunOutcome {
            collections: outcomes,
            report: report.finish(),
        })
    }

    /// Reconcile a single collection as its own run.
    ///
    /// Dependent collections known to the schema are not available here;
    /// apply the returned [`IdentityMapping`] to them with
    /// [`rewrite::rewrite_references`].
    pub fn reconcile_collection(&self, input: CollectionInput) -> Result<RunOutcome> {
        self.reconcile(vec![input])
    }

    /// Propagate a finalized mapping to every dependent collection, both
    /// the ones still waiting to reconcile and the ones already done.
    fn cascade(
        &self,
        outcome: &CollectionOutcome,
        pending: &mut [CollectionInput],
        outcomes: &mut [CollectionOutcome],
        report: &mut RunReport,
    ) {
        for rule in self.schema.rules_referencing(&outcome.entity_type) {
            for input in pending
                .iter_mut()
                .filter(|input| input.entity_type == rule.collection)
            {
                let dangling = rewrite_references(&mut input.local, &rule.field, &outcome.mapping);
                record_dangling(report, rule, &dangling);
            }
            for done in outcomes
                .iter_mut()
                .filter(|done| done.entity_type == rule.collection)
            {
                let dangling = rewrite_references(&mut done.records, &rule.field, &outcome.mapping);
                record_dangling(report, rule, &dangling);
            }
        }
    }

    fn reconcile_one(
        &self,
        input: CollectionInput,
        report: &mut RunReport,
    ) -> Result<CollectionOutcome> {
        let CollectionInput {
            entity_type,
            local,
            canonical,
        } = input;

        // Malformed records are skipped up front; they can neither match
        // nor carry a usable audit identity.
        let mut well_formed = Vec::with_capacity(local.len());
        for record in local {
            match record.name_value() {
                NameValue::WrongShape(field) => {
                    report.record_error(
                        &entity_type,
                        describe_record(&record),
                        format!("malformed record: `{field}` is not a string"),
                    );
                }
                _ => well_formed.push(record),
            }
        }

        // Identifier mappings key off the ids records entered with, so
        // snapshot them before conflict resolution rewrites any.
        let original_ids: Vec<Option<EntityId>> =
            well_formed.iter().map(|record| record.id).collect();

        let resolution = resolve_conflicts(well_formed, self.tuning.start_id)?;

        let mut index = CanonicalIndex::build(&canonical, self.tuning.tie_break);
        for note in index.notes() {
            match note {
                IndexNote::DuplicateName {
                    name,
                    kept,
                    shadowed,
                } => report.record_warning(
                    &entity_type,
                    name.clone(),
                    format!("duplicate canonical name: kept id {kept}, shadowed id {shadowed}"),
                ),
                IndexNote::MalformedName { id, field } => report.record_error(
                    &entity_type,
                    format!("canonical {id}"),
                    format!("malformed canonical record: `{field}` is not a string"),
                ),
            }
        }

        let mut records = resolution.records;
        let match_outcome = match_records(&records, &mut index);
        for shared in &match_outcome.shared_names {
            report.record_warning(
                &entity_type,
                shared.name.clone(),
                "canonical identity already claimed by an earlier local record".to_string(),
            );
        }

        // Fresh identifiers start strictly above every canonical one, so a
        // new local record can never collide with canonical identifiers
        // missing from this fetch.
        let start_id = self.tuning.start_id.max(index.max_id().saturating_add(1));
        let mut allocator = IdAllocator::with_used(start_id, index.ids());

        let mut mapping = IdentityMapping::new();
        let mut merges = Vec::new();
        let mut matched = Vec::new();
        let mut created = Vec::new();
        let mut archived_ids = Vec::new();

        for ((record, original_id), result) in records
            .iter_mut()
            .zip(original_ids)
            .zip(match_outcome.results)
        {
            let local_name = record.display_name().unwrap_or_default().to_string();
            let final_id = match result {
                MatchResult::Matched(canonical) => {
                    let decisions = merge_record(record, canonical);
                    merges.push(RecordMergeAudit {
                        id: canonical.id,
                        decisions,
                    });
                    if canonical.is_archived {
                        report.record_archived(&entity_type);
                        archived_ids.push(canonical.id);
                    } else {
                        report.record_updated(&entity_type);
                    }
                    matched.push(MatchDetail {
                        local_name,
                        old_id: original_id,
                        new_id: canonical.id,
                        is_archived: canonical.is_archived,
                    });
                    canonical.id
                }
                MatchResult::New => {
                    let id = allocator.next_id()?;
                    report.record_created(&entity_type);
                    created.push(MatchDetail {
                        local_name,
                        old_id: original_id,
                        new_id: id,
                        is_archived: false,
                    });
                    id
                }
            };
            record.id = Some(final_id);
            mapping.record(original_id, final_id);
        }

        if let Some(sort_field) = self
            .schema
            .entity_type(&entity_type)
            .and_then(|entity| entity.sort_order_field.as_ref())
        {
            records.sort_by_key(|record| record.id);
            for (position, record) in records.iter_mut().enumerate() {
                record
                    .fields
                    .insert(sort_field.clone(), Value::from(position as i64 + 1));
            }
        }

        debug!(
            entity_type = %entity_type,
            matched = matched.len(),
            created = created.len(),
            archived = archived_ids.len(),
            "collection reconciled"
        );

        Ok(CollectionOutcome {
            entity_type,
            records,
            mapping,
            reassignments: resolution.reassignments,
            merges,
            matched,
            created,
            archived_ids,
        })
    }
}

fn describe_record(record: &Record) -> String {
    match record.display_name() {
        Some(name) => name.to_string(),
        None => match record.id {
            Some(id) => format!("id {id}"),
            None => "unknown".to_string(),
        },
    }
}

fn record_dangling(report: &mut RunReport, rule: &ReferenceRule, dangling: &[DanglingRef]) {
    for reference in dangling {
        report.record_warning(
            &rule.collection,
            reference.record_name.clone(),
            format!(
                "`{}` references unknown {} {}",
                reference.field, rule.references, reference.value
            ),
        );
    }
}
