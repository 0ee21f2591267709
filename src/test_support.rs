use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use catsync_rs::model::{CanonicalRecord, EntityId, FieldMap, Record};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct GeneratedCatalog {
    pub local: Vec<Record>,
    pub canonical: Vec<CanonicalRecord>,
}

/// Build a record with the wire-format name field.
#[allow(dead_code)]
pub fn local_record(id: Option<i64>, name: &str) -> Record {
    let mut fields = FieldMap::new();
    fields.insert("name_i18n".to_string(), json!({ "en": name }));
    Record {
        id: id.map(EntityId),
        protected_fields: Vec::new(),
        fields,
    }
}

#[allow(dead_code)]
pub fn canonical_record(id: i64, name: &str) -> CanonicalRecord {
    let mut fields = FieldMap::new();
    fields.insert("name_i18n".to_string(), json!({ "en": name }));
    CanonicalRecord::new(EntityId(id), fields)
}

/// Generate a local/canonical collection pair with controllable overlap.
///
/// Roughly `match_probability` of the local records carry a name that
/// normalizes to a canonical one (with random casing and spacing noise);
/// the rest are local-only. A fifth of the local records have no
/// identifier and a tenth reuse identifier 1 to exercise conflict
/// resolution.
#[allow(dead_code)]
pub fn generate_catalog(count: u32, match_probability: f64, seed: u64) -> GeneratedCatalog {
    let mut rng = StdRng::seed_from_u64(seed);

    let canonical: Vec<CanonicalRecord> = (1..=count)
        .map(|i| {
            let record = canonical_record(i as i64, &format!("Service {i}"));
            record.archived(i % 7 == 0)
        })
        .collect();

    let mut local = Vec::with_capacity(count as usize);
    for i in 1..=count {
        let name = if rng.random_bool(match_probability) {
            noisy_name(&mut rng, i)
        } else {
            format!("Local Only {i}")
        };

        let id = if rng.random_bool(0.2) {
            None
        } else if rng.random_bool(0.1) {
            Some(1)
        } else {
            Some(i as i64)
        };

        let mut record = local_record(id, &name);
        if rng.random_bool(0.15) {
            record.fields.insert("price_min".to_string(), json!(100));
            record = record.with_protected_fields(["price_min"]);
        }
        local.push(record);
    }

    GeneratedCatalog { local, canonical }
}

fn noisy_name(rng: &mut StdRng, i: u32) -> String {
    match rng.random_range(0..4) {
        0 => format!("Service {i}"),
        1 => format!("  service {i} "),
        2 => format!("SERVICE   {i}"),
        _ => format!("Service {i}!!"),
    }
}
