//! Record Store Tests
//!
//! Table lifecycle, validated inserts, deletes and filtered queries against
//! the JSON-backed store.

use ledger_core::*;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn scratch() -> (TempDir, JsonDatabase) {
    let dir = TempDir::new().unwrap();
    let db = JsonDatabase::open(dir.path().join("store.json"));
    (dir, db)
}

fn amount_schema() -> SchemaDefinition {
    SchemaDefinition::new(vec![FieldSchema::new("amount", FieldType::Number).required()])
}

fn tagged_schema() -> SchemaDefinition {
    SchemaDefinition::new(vec![
        FieldSchema::new("a", FieldType::Number),
        FieldSchema::new("tags", FieldType::List),
    ])
}

fn ids(rows: &Rows) -> BTreeSet<RowId> {
    rows.keys().cloned().collect()
}

#[test]
fn test_insert_read_delete_roundtrip() {
    let (_dir, db) = scratch();
    assert!(db.create_table("T", &amount_schema()).unwrap());

    let id = db
        .insert_row("T", values! { "amount" => 5 }, None)
        .unwrap()
        .expect("table exists");

    let rows = db.all_rows("T").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[&id], values! { "amount" => 5.0 });

    assert!(db.delete_row("T", &id).unwrap());
    assert!(db.all_rows("T").unwrap().is_empty());
}

#[test]
fn test_duplicate_table_leaves_store_unchanged() {
    let (_dir, db) = scratch();
    db.create_table("T", &amount_schema()).unwrap();
    db.insert_row("T", values! { "amount" => 1 }, None).unwrap();

    let before = db.read_document();
    assert!(!db.create_table("T", &tagged_schema()).unwrap());
    assert_eq!(db.read_document(), before);
    assert_eq!(db.table_schema("T").unwrap(), amount_schema().into_fields());
}

#[test]
fn test_missing_table_sentinels() {
    let (_dir, db) = scratch();
    assert!(db.all_rows("nope").is_none());
    assert!(db.query_rows("nope", None).is_none());
    assert_eq!(db.insert_row("nope", values! { "amount" => 1 }, None).unwrap(), None);
    assert!(matches!(
        db.table_schema("nope"),
        Err(LedgerError::UnknownTable { .. })
    ));
}

#[test]
fn test_delete_nonexistent_leaves_store_unchanged() {
    let (_dir, db) = scratch();
    db.create_table("T", &amount_schema()).unwrap();
    let id = db.insert_row("T", values! { "amount" => 3 }, None).unwrap().unwrap();

    let before = db.read_document();
    assert!(!db.delete_row("T", &RowId::from("missing")).unwrap());
    assert!(!db.delete_row("nope", &id).unwrap());
    assert_eq!(db.read_document(), before);
}

#[test]
fn test_non_finite_numbers_rejected() {
    let (_dir, db) = scratch();
    db.create_table("T", &amount_schema()).unwrap();

    for raw in ["nan", "NaN", "NAN", "inf", "Inf", "INF", "infinity", "Infinity", "-inf", "+NaN"] {
        let err = db.insert_row("T", values! { "amount" => raw }, None).unwrap_err();
        assert!(
            matches!(err, LedgerError::TypeMismatch { .. }),
            "{raw} should be a type mismatch, got {err:?}"
        );
    }
    assert!(db.all_rows("T").unwrap().is_empty());
}

#[test]
fn test_non_finite_pass_through_value_rejected() {
    let (_dir, db) = scratch();
    db.create_table("T", &amount_schema()).unwrap();
    let before = db.read_document();

    let err = db
        .insert_row("T", values! { "amount" => 1, "x" => f64::NAN }, None)
        .unwrap_err();
    assert!(matches!(err, LedgerError::TypeMismatch { field, .. } if field == "x"));
    assert_eq!(db.read_document(), before);
}

#[test]
fn test_missing_required_field_rejected() {
    let (_dir, db) = scratch();
    db.create_table("T", &amount_schema()).unwrap();

    let err = db.insert_row("T", values! { "other" => "x" }, None).unwrap_err();
    assert!(matches!(err, LedgerError::MissingRequiredFields { fields } if fields == vec!["amount".to_string()]));
}

#[test]
fn test_values_stored_in_canonical_form() {
    let (_dir, db) = scratch();
    db.create_table(
        "T",
        &SchemaDefinition::new(vec![
            FieldSchema::new("amount", FieldType::Number),
            FieldSchema::new("when", FieldType::Date),
            FieldSchema::new("tags", FieldType::List),
        ]),
    )
    .unwrap();

    let id = db
        .insert_row(
            "T",
            values! { "amount" => "12.5", "when" => "2021/06/02", "tags" => "a,b" },
            None,
        )
        .unwrap()
        .unwrap();

    let row = &db.all_rows("T").unwrap()[&id];
    assert_eq!(row["amount"], FieldValue::Number(12.5));
    assert_eq!(row["when"], FieldValue::from("2021-06-02"));
    assert_eq!(row["tags"], FieldValue::from(vec!["a", "b"]));
}

#[test]
fn test_unfiltered_query_matches_all_rows() {
    let (_dir, db) = scratch();
    db.create_table("T", &tagged_schema()).unwrap();
    for a in 0..5 {
        db.insert_row("T", values! { "a" => a }, None).unwrap();
    }

    let all = db.all_rows("T").unwrap();
    assert_eq!(ids(&db.query_rows("T", None).unwrap()), ids(&all));
    assert_eq!(ids(&db.query_rows("T", Some(&VisualizeFilters::new())).unwrap()), ids(&all));
}

#[test]
fn test_contains_and_negated_complement() {
    let (_dir, db) = scratch();
    db.create_table("T", &tagged_schema()).unwrap();
    let with_tag: BTreeSet<RowId> = [
        db.insert_row("T", values! { "tags" => vec!["tag1", "tag2"] }, None).unwrap().unwrap(),
        db.insert_row("T", values! { "tags" => "tag3,tag1" }, None).unwrap().unwrap(),
    ]
    .into_iter()
    .collect();
    let without_tag: BTreeSet<RowId> = [
        db.insert_row("T", values! { "tags" => vec!["tag2"] }, None).unwrap().unwrap(),
        db.insert_row("T", values! { "tags" => Vec::<String>::new() }, None).unwrap().unwrap(),
    ]
    .into_iter()
    .collect();

    let contains = FilterCondition::contains("tag1").unwrap();
    let hit = db
        .query_rows("T", Some(&VisualizeFilters::new().with("tags", contains.clone())))
        .unwrap();
    assert_eq!(ids(&hit), with_tag);

    let miss = db
        .query_rows("T", Some(&VisualizeFilters::new().with("tags", contains.negated())))
        .unwrap();
    assert_eq!(ids(&miss), without_tag);
}

#[test]
fn test_conditions_combine_with_and() {
    let (_dir, db) = scratch();
    db.create_table("T", &tagged_schema()).unwrap();
    let first = db.insert_row("T", values! { "a" => 9, "tags" => vec!["t1", "t2"] }, None).unwrap().unwrap();
    let second = db.insert_row("T", values! { "a" => 8, "tags" => vec!["t2", "t3"] }, None).unwrap().unwrap();
    db.insert_row("T", values! { "a" => 7, "tags" => vec!["t3", "t4"] }, None).unwrap();

    let filters = VisualizeFilters::new()
        .with("a", FilterCondition::greater(7).unwrap())
        .with("tags", FilterCondition::contains("t2").unwrap());
    let rows = db.query_rows("T", Some(&filters)).unwrap();

    assert_eq!(ids(&rows), [first, second].into_iter().collect());
}

#[test]
fn test_reset_drops_every_table() {
    let (_dir, db) = scratch();
    db.create_table("T", &amount_schema()).unwrap();
    db.create_table("U", &tagged_schema()).unwrap();
    assert_eq!(db.table_names(), vec!["T".to_string(), "U".to_string()]);

    db.reset().unwrap();
    assert!(db.table_names().is_empty());
    assert_eq!(db.read_document(), StoreDocument::default());
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let id = {
        let db = JsonDatabase::open(&path);
        db.create_table("T", &amount_schema()).unwrap();
        db.insert_row("T", values! { "amount" => 42 }, None).unwrap().unwrap()
    };

    let db = JsonDatabase::new(StoreConfig::new(&path).with_pretty(false));
    assert_eq!(db.all_rows("T").unwrap()[&id], values! { "amount" => 42.0 });
}
