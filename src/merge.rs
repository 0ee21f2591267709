//! # Override-Aware Merging
//!
//! Field-by-field merge of a matched local/canonical pair. Manually pinned
//! fields always keep their local value; everything the canonical source
//! carries otherwise wins. Fields the canonical source does not carry are
//! never touched.

use crate::model::{CanonicalRecord, Record};
use serde::{Deserialize, Serialize};

/// What happened to one field during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    /// The field is protected; the local value stays.
    KeptLocal,
    /// The canonical value differed and replaced the local value.
    AdoptedCanonical,
    /// Local and canonical values were already identical.
    Unchanged,
}

/// Audit entry for one field of one merged record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDecision {
    pub field: String,
    pub action: MergeAction,
}

impl MergeDecision {
    /// Create a new merge decision.
    pub fn new(field: String, action: MergeAction) -> Self {
        Self { field, action }
    }
}

/// Merge a canonical record into a matched local record in place.
///
/// Walks the canonical fields in source order and returns one decision per
/// field, which is the authoritative audit trail for what changed and why.
/// Local-only fields are left alone, no local field is ever deleted, and
/// `protected_fields` itself is never modified: protection status changes
/// only by explicit external instruction.
pub fn merge_record(local: &mut Record, canonical: &CanonicalRecord) -> Vec<MergeDecision> {
    let mut decisions = Vec::with_capacity(canonical.fields.len());

    for (field, canonical_value) in &canonical.fields {
        let action = if local.is_field_protected(field) {
            MergeAction::KeptLocal
        } else if local.fields.get(field) == Some(canonical_value) {
            MergeAction::Unchanged
        } else {
            local
                .fields
                .insert(field.clone(), canonical_value.clone());
            MergeAction::AdoptedCanonical
        };
        decisions.push(MergeDecision::new(field.clone(), action));
    }

    decisions
}
