//! # Catalog Schema
//!
//! Declarative description of the entity graph for one deployment: which
//! entity types exist, in what order they reconcile, and which foreign-key
//! fields reference which collections. The reference table drives the
//! generic rewrite pass instead of hand-written per-pair code.

use serde::{Deserialize, Serialize};

/// One reconcilable entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    /// Collection name, e.g. `categories`.
    pub name: String,
    /// When set, records are ordered by final identifier after
    /// reconciliation and this field is renumbered 1..=n.
    pub sort_order_field: Option<String>,
}

impl EntityType {
    /// Create an entity type with no sort-order handling.
    pub fn new(name: String) -> Self {
        Self {
            name,
            sort_order_field: None,
        }
    }

    /// Create an entity type whose display order follows its identifiers.
    pub fn with_sort_order(name: String, sort_order_field: String) -> Self {
        Self {
            name,
            sort_order_field: Some(sort_order_field),
        }
    }
}

/// A foreign-key edge in the entity graph: `collection.field` holds
/// identifiers of records in `references`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRule {
    /// The dependent collection, e.g. `services`.
    pub collection: String,
    /// The foreign-key field, e.g. `category_id`.
    pub field: String,
    /// The referenced collection, e.g. `categories`.
    pub references: String,
}

impl ReferenceRule {
    /// Create a new reference rule.
    pub fn new(collection: String, field: String, references: String) -> Self {
        Self {
            collection,
            field,
            references,
        }
    }
}

/// The entity graph for one deployment.
///
/// Entity types are reconciled in declaration order; a dependent
/// collection must be declared after every collection it references so
/// that its rewrites see finalized mappings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub entity_types: Vec<EntityType>,
    pub reference_rules: Vec<ReferenceRule>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity type.
    pub fn add_entity_type(&mut self, entity_type: EntityType) {
        self.entity_types.push(entity_type);
    }

    /// Declare a foreign-key edge.
    pub fn add_reference(&mut self, rule: ReferenceRule) {
        self.reference_rules.push(rule);
    }

    /// Look up an entity type by collection name.
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.iter().find(|entity| entity.name == name)
    }

    /// Position of a collection in the reconciliation order, if declared.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entity_types.iter().position(|entity| entity.name == name)
    }

    /// Every rule whose foreign key points at the given collection.
    pub fn rules_referencing<'a>(
        &'a self,
        referenced: &'a str,
    ) -> impl Iterator<Item = &'a ReferenceRule> {
        self.reference_rules
            .iter()
            .filter(move |rule| rule.references == referenced)
    }
}

/// The catalog graph of the production deployment: categories first, then
/// practitioners, then services and the service-practitioner link table.
pub fn catalog_schema() -> Schema {
    let mut schema = Schema::new();
    schema.add_entity_type(EntityType::with_sort_order(
        "categories".to_string(),
        "sort_order".to_string(),
    ));
    schema.add_entity_type(EntityType::new("practitioners".to_string()));
    schema.add_entity_type(EntityType::new("services".to_string()));
    schema.add_entity_type(EntityType::new("service_practitioners".to_string()));
    schema.add_reference(ReferenceRule::new(
        "services".to_string(),
        "category_id".to_string(),
        "categories".to_string(),
    ));
    schema.add_reference(ReferenceRule::new(
        "service_practitioners".to_string(),
        "service_id".to_string(),
        "services".to_string(),
    ));
    schema.add_reference(ReferenceRule::new(
        "service_practitioners".to_string(),
        "practitioner_id".to_string(),
        "practitioners".to_string(),
    ));
    schema
}
