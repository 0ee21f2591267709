//! # Identifier Conflict Resolution
//!
//! Detects duplicate identifiers inside one local collection and reassigns
//! all but the first record of each conflict group, so that every record
//! enters matching with a unique, non-null identifier.

use crate::allocator::IdAllocator;
use crate::model::{EntityId, Record};
use anyhow::Result;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// Audit entry for one identifier assignment.
///
/// `old_id` is `None` for records that entered with no identifier at all,
/// and `Some` for records that lost a conflicting identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub old_id: Option<EntityId>,
    pub new_id: EntityId,
    pub display_name: String,
}

impl Reassignment {
    /// Create a new reassignment entry.
    pub fn new(old_id: Option<EntityId>, new_id: EntityId, display_name: String) -> Self {
        Self {
            old_id,
            new_id,
            display_name,
        }
    }
}

/// Result of resolving one collection.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The collection with every identifier present and pairwise distinct.
    pub records: Vec<Record>,
    /// One entry per identifier handed out, in assignment order.
    pub reassignments: Vec<Reassignment>,
}

/// Resolve duplicate and missing identifiers in a collection.
///
/// Records are partitioned by identifier; within a conflict group the first
/// record in input order keeps its identifier and the rest are reassigned.
/// Records without an identifier are assigned one. The allocator is seeded
/// with every identifier seen in the input (conflicting ones included), so
/// a fresh identifier can never collide with a kept one.
///
/// The operation is idempotent: on an already-resolved collection it finds
/// no conflicts and returns the records unchanged with an empty audit list.
///
/// # Errors
/// Fails only on allocator exhaustion, which callers treat as a failure of
/// the whole collection step.
pub fn resolve_conflicts(records: Vec<Record>, start_id: i64) -> Result<Resolution> {
    let mut seen: HashSet<i64> = HashSet::with_capacity(records.len());
    let mut needs_new_id: Vec<usize> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let keeps_own_id = match record.id {
            Some(id) => seen.insert(id.0),
            None => false,
        };
        if !keeps_own_id {
            needs_new_id.push(index);
        }
    }

    let mut records = records;
    let mut reassignments = Vec::with_capacity(needs_new_id.len());
    let mut allocator = IdAllocator::with_used(start_id, seen.iter().copied());

    for index in needs_new_id {
        let new_id = allocator.next_id()?;
        let record = &mut records[index];
        let display_name = record.display_name().unwrap_or("unknown").to_string();
        reassignments.push(Reassignment::new(record.id, new_id, display_name));
        record.id = Some(new_id);
    }

    Ok(Resolution {
        records,
        reassignments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldMap;
    use serde_json::json;

    fn named_record(id: Option<i64>, name: &str) -> Record {
        let mut fields = FieldMap::new();
        fields.insert("name".to_string(), json!(name));
        Record {
            id: id.map(EntityId),
            protected_fields: Vec::new(),
            fields,
        }
    }

    #[test]
    fn test_keeps_first_occurrence_of_conflicting_id() {
        let records = vec![
            named_record(Some(1), "Skin Care"),
            named_record(Some(1), "Body Care"),
        ];
        let resolution = resolve_conflicts(records, 1).unwrap();

        assert_eq!(resolution.records[0].id, Some(EntityId(1)));
        assert_eq!(resolution.records[1].id, Some(EntityId(2)));
        assert_eq!(
            resolution.reassignments,
            vec![Reassignment::new(
                Some(EntityId(1)),
                EntityId(2),
                "Body Care".to_string()
            )]
        );
    }

    #[test]
    fn test_assigns_ids_to_null_records() {
        let records = vec![
            named_record(None, "First"),
            named_record(Some(3), "Third"),
            named_record(None, "Second"),
        ];
        let resolution = resolve_conflicts(records, 1).unwrap();

        assert_eq!(resolution.records[0].id, Some(EntityId(1)));
        assert_eq!(resolution.records[1].id, Some(EntityId(3)));
        assert_eq!(resolution.records[2].id, Some(EntityId(2)));
        assert_eq!(resolution.reassignments.len(), 2);
        assert_eq!(resolution.reassignments[0].old_id, None);
    }

    #[test]
    fn test_all_ids_unique_after_resolution() {
        let records = vec![
            named_record(Some(7), "a"),
            named_record(Some(7), "b"),
            named_record(Some(7), "c"),
            named_record(None, "d"),
            named_record(Some(1), "e"),
        ];
        let resolution = resolve_conflicts(records, 1).unwrap();

        let mut ids: Vec<i64> = resolution
            .records
            .iter()
            .map(|record| record.id.unwrap().0)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), resolution.records.len());
    }

    #[test]
    fn test_idempotent_on_resolved_collection() {
        let records = vec![
            named_record(Some(1), "a"),
            named_record(Some(1), "b"),
            named_record(None, "c"),
        ];
        let first = resolve_conflicts(records, 1).unwrap();
        let second = resolve_conflicts(first.records.clone(), 1).unwrap();

        assert_eq!(first.records, second.records);
        assert!(second.reassignments.is_empty());
    }

    #[test]
    fn test_fresh_ids_fill_gaps_above_start() {
        let records = vec![
            named_record(Some(2), "kept"),
            named_record(Some(2), "bumped"),
        ];
        let resolution = resolve_conflicts(records, 1).unwrap();
        // 1 is free and above the start candidate, so the bumped record
        // takes it rather than jumping past the kept id.
        assert_eq!(resolution.records[1].id, Some(EntityId(1)));
    }
}
