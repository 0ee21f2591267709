//! # Reference Rewriting
//!
//! Applies an identity mapping to foreign-key-bearing records so that
//! every reference to a remapped entity follows it to the new identifier.
//! Rewriting is a single eager pass per (collection, field) pair and is
//! driven by the schema's declarative reference table.

use crate::model::{EntityId, Record};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One-to-one mapping of old local identifiers to final identifiers,
/// produced by one reconciliation pass over one collection.
///
/// Created fresh per run, applied to every dependent collection in the
/// same run, then discarded; it is never persisted independently of its
/// effects, though callers may export it for collections the engine does
/// not know about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityMapping {
    forward: FxHashMap<i64, i64>,
    finals: FxHashSet<i64>,
}

impl IdentityMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the final identifier of one reconciled record.
    ///
    /// Records that entered with an identifier contribute an
    /// old-to-final entry; records that entered without one only extend
    /// the final-identifier space (nothing can have referenced them).
    /// When a conflict group shared an old identifier, the kept record is
    /// reconciled first and owns the entry; later claims on the same old
    /// identifier are ignored.
    pub fn record(&mut self, old_id: Option<EntityId>, final_id: EntityId) {
        if let Some(old) = old_id {
            self.forward.entry(old.0).or_insert(final_id.0);
        }
        self.finals.insert(final_id.0);
    }

    /// Look up the final identifier for an old one.
    pub fn get(&self, old_id: EntityId) -> Option<EntityId> {
        self.forward.get(&old_id.0).copied().map(EntityId)
    }

    /// Whether an identifier belongs to the final identifier space of the
    /// reconciled collection.
    pub fn is_final(&self, id: EntityId) -> bool {
        self.finals.contains(&id.0)
    }

    /// Number of old-to-final entries.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the mapping carries no entries.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// All old-to-final entries.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.forward
            .iter()
            .map(|(&old, &new)| (EntityId(old), EntityId(new)))
    }

    /// Entries whose identifier actually changed.
    pub fn changes(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.iter().filter(|(old, new)| old != new)
    }
}

/// A foreign-key value that is neither an old identifier in the mapping
/// nor a member of the final identifier space. Left unrewritten: the
/// referenced entity may legitimately live outside the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingRef {
    pub field: String,
    pub value: i64,
    pub record_name: String,
}

/// Rewrite one foreign-key field across a dependent collection.
///
/// Every record whose `field` holds an old identifier from the mapping is
/// rewritten to the final identifier. Values already in the final space
/// pass silently; values in neither space are left untouched and returned
/// as warnings. Non-integer values are outside the identifier contract and
/// are skipped. The pass always visits every record before returning.
pub fn rewrite_references(
    records: &mut [Record],
    field: &str,
    mapping: &IdentityMapping,
) -> Vec<DanglingRef> {
    let mut dangling = Vec::new();

    for record in records.iter_mut() {
        let reference = match record.fields.get(field) {
            Some(Value::Number(number)) => match number.as_i64() {
                Some(value) => value,
                None => continue,
            },
            _ => continue,
        };

        match mapping.get(EntityId(reference)) {
            Some(final_id) => {
                if final_id.0 != reference {
                    record
                        .fields
                        .insert(field.to_string(), Value::from(final_id.0));
                }
            }
            None if mapping.is_final(EntityId(reference)) => {}
            None => {
                let record_name = record.display_name().unwrap_or("unknown").to_string();
                warn!(
                    field,
                    value = reference,
                    record = %record_name,
                    "reference to unknown entity left unrewritten"
                );
                dangling.push(DanglingRef {
                    field: field.to_string(),
                    value: reference,
                    record_name,
                });
            }
        }
    }

    dangling
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dependent(category_id: i64) -> Record {
        serde_json::from_value(json!({
            "id": 1,
            "name": "Service",
            "category_id": category_id
        }))
        .unwrap()
    }

    fn mapping(entries: &[(i64, i64)]) -> IdentityMapping {
        let mut mapping = IdentityMapping::new();
        for &(old, new) in entries {
            mapping.record(Some(EntityId(old)), EntityId(new));
        }
        mapping
    }

    #[test]
    fn test_remapped_reference_is_rewritten() {
        let mut records = vec![dependent(5)];
        let dangling = rewrite_references(&mut records, "category_id", &mapping(&[(5, 12)]));

        assert_eq!(records[0].fields["category_id"], json!(12));
        assert!(dangling.is_empty());
    }

    #[test]
    fn test_unknown_reference_is_left_and_flagged() {
        let mut records = vec![dependent(99)];
        let dangling = rewrite_references(&mut records, "category_id", &mapping(&[(5, 12)]));

        assert_eq!(records[0].fields["category_id"], json!(99));
        assert_eq!(
            dangling,
            vec![DanglingRef {
                field: "category_id".to_string(),
                value: 99,
                record_name: "Service".to_string(),
            }]
        );
    }

    #[test]
    fn test_reference_already_final_passes_silently() {
        let mut records = vec![dependent(12)];
        let dangling = rewrite_references(&mut records, "category_id", &mapping(&[(5, 12)]));

        assert_eq!(records[0].fields["category_id"], json!(12));
        assert!(dangling.is_empty());
    }

    #[test]
    fn test_identity_entries_are_noops() {
        let mut records = vec![dependent(5)];
        let dangling = rewrite_references(&mut records, "category_id", &mapping(&[(5, 5)]));

        assert_eq!(records[0].fields["category_id"], json!(5));
        assert!(dangling.is_empty());
    }

    #[test]
    fn test_single_lookup_semantics_for_chained_entries() {
        // {1 -> 2, 2 -> 3}: a reference to 1 lands on 2, not 3.
        let mut records = vec![dependent(1), dependent(2)];
        let dangling =
            rewrite_references(&mut records, "category_id", &mapping(&[(1, 2), (2, 3)]));

        assert_eq!(records[0].fields["category_id"], json!(2));
        assert_eq!(records[1].fields["category_id"], json!(3));
        assert!(dangling.is_empty());
    }

    #[test]
    fn test_absent_and_non_integer_fields_are_skipped() {
        let mut records = vec![
            serde_json::from_value(json!({"id": 1, "name": "no fk"})).unwrap(),
            serde_json::from_value(json!({"id": 2, "name": "odd fk", "category_id": "x"}))
                .unwrap(),
        ];
        let dangling = rewrite_references(&mut records, "category_id", &mapping(&[(5, 12)]));

        assert!(dangling.is_empty());
        assert_eq!(records[1].fields["category_id"], json!("x"));
    }

    #[test]
    fn test_duplicate_old_id_keeps_first_entry() {
        let mut mapping = IdentityMapping::new();
        mapping.record(Some(EntityId(1)), EntityId(1));
        mapping.record(Some(EntityId(1)), EntityId(7));

        assert_eq!(mapping.get(EntityId(1)), Some(EntityId(1)));
        assert!(mapping.is_final(EntityId(7)));
    }

    #[test]
    fn test_fresh_records_extend_final_space_only() {
        let mut mapping = IdentityMapping::new();
        mapping.record(None, EntityId(13));

        assert!(mapping.is_empty());
        assert!(mapping.is_final(EntityId(13)));
    }
}
