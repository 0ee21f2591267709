//! # Data Model
//!
//! Core data structures for catalog reconciliation: identifiers, local and
//! canonical records, and the contractual name-field access shared by both.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A catalog field map: field name to opaque JSON value.
///
/// Insertion order is preserved so that merge audit output follows the
/// field order of the source data.
pub type FieldMap = serde_json::Map<String, Value>;

/// Identifier for a catalog entity.
///
/// Identifiers are plain integers shared with the canonical source; the
/// canonical side of the identifier space is authoritative and immutable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A locally curated catalog record.
///
/// The identifier may be absent (not yet assigned), reused by accident, or
/// locally scoped; reconciliation makes it final and globally unique.
/// `protected_fields` lists field names that manual edits have pinned:
/// synchronization never overwrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protected_fields: Vec<String>,
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Record {
    /// Create a record with no identifier.
    pub fn new(fields: FieldMap) -> Self {
        Self {
            id: None,
            protected_fields: Vec::new(),
            fields,
        }
    }

    /// Create a record with an identifier already assigned.
    pub fn with_id(id: EntityId, fields: FieldMap) -> Self {
        Self {
            id: Some(id),
            protected_fields: Vec::new(),
            fields,
        }
    }

    /// Attach protected field names.
    pub fn with_protected_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a field is pinned by a manual edit.
    pub fn is_field_protected(&self, field: &str) -> bool {
        self.protected_fields.iter().any(|name| name == field)
    }

    /// Read the contractual name field. See [`name_value`].
    pub fn name_value(&self) -> NameValue<'_> {
        name_value(&self.fields)
    }

    /// The display name, if a usable one is present.
    pub fn display_name(&self) -> Option<&str> {
        match self.name_value() {
            NameValue::Text(name) => Some(name),
            _ => None,
        }
    }
}

/// A record originating from the canonical/remote source.
///
/// Its identifier is authoritative; the engine never rewrites it. The
/// archived flag is carried separately from the opaque fields so that
/// merging never copies source bookkeeping into local records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: EntityId,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl CanonicalRecord {
    /// Create a canonical record.
    pub fn new(id: EntityId, fields: FieldMap) -> Self {
        Self {
            id,
            is_archived: false,
            fields,
        }
    }

    /// Mark the record as archived at the source.
    pub fn archived(mut self, is_archived: bool) -> Self {
        self.is_archived = is_archived;
        self
    }

    /// Read the contractual name field. See [`name_value`].
    pub fn name_value(&self) -> NameValue<'_> {
        name_value(&self.fields)
    }

    /// The display name, if a usable one is present.
    pub fn display_name(&self) -> Option<&str> {
        match self.name_value() {
            NameValue::Text(name) => Some(name),
            _ => None,
        }
    }
}

/// Outcome of reading the contractual name field from a field map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameValue<'a> {
    /// A usable display string.
    Text(&'a str),
    /// Neither `name` nor `name_i18n.en` is present.
    Missing,
    /// A name field exists but does not hold a string; the named path is
    /// the offending field.
    WrongShape(&'static str),
}

/// Read a record's display name from its field map.
///
/// The contract follows the wire format: a plain `name` string, or a
/// `name_i18n` object with an `en` entry. A field that is present with the
/// wrong JSON type is reported as [`NameValue::WrongShape`] so the caller
/// can treat the record as malformed rather than silently nameless.
pub fn name_value(fields: &FieldMap) -> NameValue<'_> {
    match fields.get("name") {
        Some(Value::String(name)) => return NameValue::Text(name),
        Some(_) => return NameValue::WrongShape("name"),
        None => {}
    }
    match fields.get("name_i18n") {
        Some(Value::Object(translations)) => match translations.get("en") {
            Some(Value::String(name)) => NameValue::Text(name),
            Some(_) => NameValue::WrongShape("name_i18n.en"),
            None => NameValue::Missing,
        },
        Some(_) => NameValue::WrongShape("name_i18n"),
        None => NameValue::Missing,
    }
}
