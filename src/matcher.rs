//! # Entity Matching
//!
//! Pairs local records with canonical records by normalized name. The
//! canonical collection is reduced to an immutable name index built once
//! per run; each local record either claims a canonical identity or is
//! routed to `New` for fresh allocation above the canonical space.

use crate::config::TieBreak;
use crate::model::{CanonicalRecord, EntityId, NameValue, Record};
use crate::normalize::normalize_name;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Match tag for one local record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult<'a> {
    /// The local record matched this canonical record and adopts its
    /// identifier.
    Matched(&'a CanonicalRecord),
    /// No canonical counterpart; a fresh identifier will be allocated.
    New,
}

/// Audit note produced while building the canonical index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexNote {
    /// Two canonical records normalize to the same name. Resolved by the
    /// configured tie-break, never an error.
    DuplicateName {
        name: String,
        kept: EntityId,
        shadowed: EntityId,
    },
    /// A canonical record carries a name field of the wrong shape and is
    /// excluded from matching.
    MalformedName { id: EntityId, field: String },
}

/// A local record whose name points at a canonical record that an earlier
/// local record already claimed. Routed to `New` to keep final identifiers
/// unique and the identity mapping one-to-one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedName {
    pub name: String,
    pub local_id: Option<EntityId>,
}

/// Immutable lookup from normalized canonical name to canonical record,
/// built once per collection per run.
#[derive(Debug)]
pub struct CanonicalIndex<'a> {
    by_name: FxHashMap<String, &'a CanonicalRecord>,
    claimed: FxHashSet<String>,
    ids: FxHashSet<i64>,
    max_id: i64,
    notes: Vec<IndexNote>,
}

impl<'a> CanonicalIndex<'a> {
    /// Build the index over a canonical collection.
    ///
    /// Records whose names normalize to the empty string are unmatchable
    /// and stay out of the index; their identifiers still count toward the
    /// canonical identifier space. Duplicate normalized names resolve by
    /// `tie_break` and are recorded as audit notes.
    pub fn build(canonical: &'a [CanonicalRecord], tie_break: TieBreak) -> Self {
        let mut index = Self {
            by_name: FxHashMap::default(),
            claimed: FxHashSet::default(),
            ids: FxHashSet::default(),
            max_id: 0,
            notes: Vec::new(),
        };

        for record in canonical {
            index.ids.insert(record.id.0);
            index.max_id = index.max_id.max(record.id.0);

            let name = match record.name_value() {
                NameValue::Text(name) => name,
                NameValue::Missing => continue,
                NameValue::WrongShape(field) => {
                    index.notes.push(IndexNote::MalformedName {
                        id: record.id,
                        field: field.to_string(),
                    });
                    continue;
                }
            };
            let key = normalize_name(name);
            if key.is_empty() {
                continue;
            }

            match index.by_name.get(&key) {
                Some(existing) => {
                    let (kept, shadowed) = match tie_break {
                        TieBreak::LastWins => {
                            let shadowed = existing.id;
                            index.by_name.insert(key.clone(), record);
                            (record.id, shadowed)
                        }
                        TieBreak::FirstWins => (existing.id, record.id),
                    };
                    debug!(name = %key, %kept, %shadowed, "duplicate canonical name");
                    index.notes.push(IndexNote::DuplicateName {
                        name: key,
                        kept,
                        shadowed,
                    });
                }
                None => {
                    index.by_name.insert(key, record);
                }
            }
        }

        index
    }

    /// Largest identifier observed in the canonical collection, or 0 when
    /// the collection is empty.
    pub fn max_id(&self) -> i64 {
        self.max_id
    }

    /// Every canonical identifier, including those of unmatchable records.
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }

    /// Audit notes gathered while building the index.
    pub fn notes(&self) -> &[IndexNote] {
        &self.notes
    }

    fn claim(&mut self, key: &str) -> Claim<'a> {
        match self.by_name.remove(key) {
            Some(record) => {
                self.claimed.insert(key.to_string());
                Claim::Matched(record)
            }
            None if self.claimed.contains(key) => Claim::AlreadyClaimed,
            None => Claim::Unknown,
        }
    }
}

enum Claim<'a> {
    Matched(&'a CanonicalRecord),
    AlreadyClaimed,
    Unknown,
}

/// Outcome of matching one local collection against a canonical index.
#[derive(Debug)]
pub struct MatchOutcome<'a> {
    /// One tag per local record, in input order.
    pub results: Vec<MatchResult<'a>>,
    /// Local records that lost a canonical identity to an earlier local
    /// record with the same normalized name.
    pub shared_names: Vec<SharedName>,
}

/// Match each local record against the canonical index.
///
/// Empty or missing names never match, even against an empty-named
/// canonical record. Each canonical record is claimed by at most one local
/// record; later locals with the same normalized name are routed to `New`
/// and reported in `shared_names`. Malformed locals are the caller's
/// concern and must be filtered out beforehand.
pub fn match_records<'a>(
    locals: &[Record],
    index: &mut CanonicalIndex<'a>,
) -> MatchOutcome<'a> {
    let mut results = Vec::with_capacity(locals.len());
    let mut shared_names = Vec::new();

    for record in locals {
        let key = match record.name_value() {
            NameValue::Text(name) => normalize_name(name),
            _ => String::new(),
        };
        if key.is_empty() {
            results.push(MatchResult::New);
            continue;
        }
        match index.claim(&key) {
            Claim::Matched(canonical) => results.push(MatchResult::Matched(canonical)),
            Claim::AlreadyClaimed => {
                shared_names.push(SharedName {
                    name: key,
                    local_id: record.id,
                });
                results.push(MatchResult::New);
            }
            Claim::Unknown => results.push(MatchResult::New),
        }
    }

    MatchOutcome {
        results,
        shared_names,
    }
}
