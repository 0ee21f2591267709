use catsync_rs::merge::{MergeAction, merge_record};
use catsync_rs::{Catsync, CollectionInput, Schema, schema::EntityType};
use serde_json::json;

fn engine() -> Catsync {
    let mut schema = Schema::new();
    schema.add_entity_type(EntityType::new("services".to_string()));
    Catsync::new(schema)
}

fn local(value: serde_json::Value) -> catsync_rs::Record {
    serde_json::from_value(value).unwrap()
}

fn canonical(value: serde_json::Value) -> catsync_rs::CanonicalRecord {
    serde_json::from_value(value).unwrap()
}

#[test]
fn protected_price_survives_sync() -> anyhow::Result<()> {
    let input = CollectionInput::new(
        "services".to_string(),
        vec![local(json!({
            "id": 5,
            "name": "Massage",
            "price_min": 100,
            "protected_fields": ["price_min"]
        }))],
        vec![canonical(json!({"id": 5, "name": "Massage", "price_min": 150}))],
    );

    let outcome = engine().reconcile_collection(input)?;

    let services = outcome.collection("services").unwrap();
    assert_eq!(services.records[0].fields["price_min"], json!(100));
    assert_eq!(
        services.records[0].protected_fields,
        vec!["price_min".to_string()]
    );

    let decisions = &services.merges[0].decisions;
    let price = decisions.iter().find(|d| d.field == "price_min").unwrap();
    assert_eq!(price.action, MergeAction::KeptLocal);
    Ok(())
}

#[test]
fn unprotected_fields_adopt_canonical_values() -> anyhow::Result<()> {
    let input = CollectionInput::new(
        "services".to_string(),
        vec![local(json!({
            "id": 5,
            "name": "Massage",
            "duration_minutes": 30,
            "price_min": 100,
            "protected_fields": ["price_min"]
        }))],
        vec![canonical(json!({
            "id": 5,
            "name": "Massage",
            "duration_minutes": 45,
            "price_min": 150
        }))],
    );

    let outcome = engine().reconcile_collection(input)?;
    let record = &outcome.collection("services").unwrap().records[0];

    assert_eq!(record.fields["duration_minutes"], json!(45));
    assert_eq!(record.fields["price_min"], json!(100));
    Ok(())
}

#[test]
fn merge_decisions_cover_every_canonical_field() {
    let mut record = local(json!({
        "id": 5,
        "name": "Facial",
        "price_min": 100,
        "internal_note": "local only",
        "protected_fields": ["price_min"]
    }));
    let source = canonical(json!({
        "id": 5,
        "name": "Facial",
        "price_min": 120,
        "duration_minutes": 60
    }));

    let decisions = merge_record(&mut record, &source);

    let actions: Vec<(&str, MergeAction)> = decisions
        .iter()
        .map(|d| (d.field.as_str(), d.action))
        .collect();
    assert_eq!(
        actions,
        vec![
            ("name", MergeAction::Unchanged),
            ("price_min", MergeAction::KeptLocal),
            ("duration_minutes", MergeAction::AdoptedCanonical),
        ]
    );
    // Local-only fields are not the canonical source's to judge.
    assert_eq!(record.fields["internal_note"], json!("local only"));
}

#[test]
fn protected_invariant_holds_for_any_canonical_value() -> anyhow::Result<()> {
    for canonical_price in [json!(0), json!(999.5), json!("call us"), json!(null)] {
        let input = CollectionInput::new(
            "services".to_string(),
            vec![local(json!({
                "id": 1,
                "name": "Massage",
                "price_min": 100,
                "protected_fields": ["price_min"]
            }))],
            vec![canonical(json!({
                "id": 1,
                "name": "Massage",
                "price_min": canonical_price
            }))],
        );

        let outcome = engine().reconcile_collection(input)?;
        let record = &outcome.collection("services").unwrap().records[0];
        assert_eq!(record.fields["price_min"], json!(100));
    }
    Ok(())
}

#[test]
fn second_sync_reports_unchanged_fields() -> anyhow::Result<()> {
    let source = vec![canonical(json!({
        "id": 5,
        "name": "Massage",
        "duration_minutes": 45
    }))];
    let first = engine().reconcile_collection(CollectionInput::new(
        "services".to_string(),
        vec![local(json!({"id": 5, "name": "Massage", "duration_minutes": 30}))],
        source.clone(),
    ))?;
    let merged = first.collection("services").unwrap().records.clone();

    let second = engine().reconcile_collection(CollectionInput::new(
        "services".to_string(),
        merged,
        source,
    ))?;

    let decisions = &second.collection("services").unwrap().merges[0].decisions;
    assert!(
        decisions
            .iter()
            .all(|d| d.action == MergeAction::Unchanged)
    );
    Ok(())
}
