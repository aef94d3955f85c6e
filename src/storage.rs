//! Persistent storage engine backed by a single JSON document
//!
//! Every operation reads the whole document from disk, mutates it in memory
//! and writes the whole document back. Nothing is cached between calls, so
//! each call observes the latest persisted state. There is no locking: with
//! two writers the last one wins.
//!
//! An unreadable or corrupt backing file reads as an empty document.

use crate::config::StoreConfig;
use crate::error::{LedgerError, Result};
use crate::filter::{build_composite_predicate, VisualizeFilters};
use crate::schema::{FieldSchema, SchemaDefinition};
use crate::types::{RowId, Rows, Values};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// One table: its schema and its rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(rename = "SCHEMA_DEFINITION", default)]
    pub schema: SchemaDefinition,
    #[serde(rename = "ROWS", default)]
    pub rows: Rows,
}

/// The whole persisted document: table name -> table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreDocument {
    pub tables: BTreeMap<String, Table>,
}

/// Abstract record store contract
pub trait Database {
    /// Replace the entire document with an empty one
    fn reset(&self) -> Result<()>;

    /// Create a table; `false` if the name is taken (store left unchanged)
    fn create_table(&self, name: &str, schema: &SchemaDefinition) -> Result<bool>;

    fn table_names(&self) -> Vec<String>;

    /// Stored field list of a table; `UnknownTable` if absent
    fn table_schema(&self, name: &str) -> Result<Vec<FieldSchema>>;

    /// Validate and persist a row; `None` if the table is absent
    ///
    /// An explicit id is used verbatim and replaces any row under that id.
    fn insert_row(&self, table: &str, values: Values, id: Option<RowId>) -> Result<Option<RowId>>;

    /// `false` if the table or the id is absent
    fn delete_row(&self, table: &str, id: &RowId) -> Result<bool>;

    fn all_rows(&self, table: &str) -> Option<Rows>;

    /// Rows satisfying every condition; no ordering guarantee
    fn query_rows(&self, table: &str, filters: Option<&VisualizeFilters>) -> Option<Rows> {
        let predicate = build_composite_predicate(filters);
        self.all_rows(table).map(|rows| {
            rows.into_iter()
                .filter(|(_, values)| predicate(values))
                .collect()
        })
    }
}

/// Record store over one JSON file
#[derive(Debug, Clone)]
pub struct JsonDatabase {
    config: StoreConfig,
    next_id: fn() -> RowId,
}

impl JsonDatabase {
    pub fn new(config: StoreConfig) -> Self {
        JsonDatabase {
            config,
            next_id: RowId::generate,
        }
    }

    /// Same store with ids drawn from `next_id` instead of at random
    #[cfg(test)]
    fn with_id_source(mut self, next_id: fn() -> RowId) -> Self {
        self.next_id = next_id;
        self
    }

    /// Store at `path` with default settings
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::new(StoreConfig::new(path.as_ref()))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Load the document; any read or parse failure yields an empty one
    pub fn read_document(&self) -> StoreDocument {
        let contents = match fs::read_to_string(&self.config.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.config.path.display(), "backing file missing, starting empty");
                return StoreDocument::default();
            }
            Err(e) => {
                warn!(path = %self.config.path.display(), error = %e, "backing file unreadable, treating as empty");
                return StoreDocument::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %self.config.path.display(), error = %e, "backing file corrupt, treating as empty");
                StoreDocument::default()
            }
        }
    }

    /// Replace the document on disk
    ///
    /// Written to a uniquely named temp file beside the target, then renamed
    /// over it. The temp file is removed if any step fails.
    pub fn write_document(&self, document: &StoreDocument) -> Result<()> {
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(document)?
        } else {
            serde_json::to_vec(document)?
        };

        let parent = match self.config.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.config.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Database for JsonDatabase {
    fn reset(&self) -> Result<()> {
        self.write_document(&StoreDocument::default())?;
        info!(path = %self.config.path.display(), "store reset");
        Ok(())
    }

    fn create_table(&self, name: &str, schema: &SchemaDefinition) -> Result<bool> {
        let mut document = self.read_document();
        if document.tables.contains_key(name) {
            debug!(table = name, "table already exists");
            return Ok(false);
        }

        document.tables.insert(
            name.to_string(),
            Table {
                schema: schema.clone(),
                rows: Rows::new(),
            },
        );
        self.write_document(&document)?;
        debug!(table = name, fields = schema.fields().len(), "table created");
        Ok(true)
    }

    fn table_names(&self) -> Vec<String> {
        self.read_document().tables.into_keys().collect()
    }

    fn table_schema(&self, name: &str) -> Result<Vec<FieldSchema>> {
        self.read_document()
            .tables
            .remove(name)
            .map(|table| table.schema.into_fields())
            .ok_or_else(|| LedgerError::UnknownTable {
                table: name.to_string(),
            })
    }

    fn insert_row(&self, table: &str, values: Values, id: Option<RowId>) -> Result<Option<RowId>> {
        let mut document = self.read_document();
        let Some(entry) = document.tables.get_mut(table) else {
            debug!(table, "insert into unknown table");
            return Ok(None);
        };

        // Validate before an id is assigned or anything is written
        let coerced = entry.schema.to_entity(table).coerce_and_validate(values)?;

        let id = match id {
            Some(id) => id,
            None => loop {
                let candidate = (self.next_id)();
                if !entry.rows.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        entry.rows.insert(id.clone(), coerced);
        self.write_document(&document)?;
        debug!(table, id = %id, "row inserted");
        Ok(Some(id))
    }

    fn delete_row(&self, table: &str, id: &RowId) -> Result<bool> {
        let mut document = self.read_document();
        let removed = document
            .tables
            .get_mut(table)
            .and_then(|entry| entry.rows.remove(id))
            .is_some();
        if !removed {
            debug!(table, id = %id, "nothing to delete");
            return Ok(false);
        }

        self.write_document(&document)?;
        debug!(table, id = %id, "row deleted");
        Ok(true)
    }

    fn all_rows(&self, table: &str) -> Option<Rows> {
        self.read_document().tables.remove(table).map(|t| t.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use crate::types::FieldValue;
    use crate::values;
    use tempfile::TempDir;

    fn amount_schema() -> SchemaDefinition {
        SchemaDefinition::new(vec![FieldSchema::new("amount", FieldType::Number).required()])
    }

    fn scratch() -> (TempDir, JsonDatabase) {
        let temp_dir = TempDir::new().unwrap();
        let db = JsonDatabase::open(temp_dir.path().join("ledger.json"));
        (temp_dir, db)
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let (_dir, db) = scratch();
        assert_eq!(db.read_document(), StoreDocument::default());
        assert!(db.table_names().is_empty());
    }

    #[test]
    fn test_corrupt_file_reads_empty() {
        let (_dir, db) = scratch();
        fs::write(db.path(), "{ not json").unwrap();
        assert_eq!(db.read_document(), StoreDocument::default());
        assert!(db.all_rows("T").is_none());
    }

    #[test]
    fn test_document_layout_on_disk() {
        let (_dir, db) = scratch();
        db.create_table("T", &amount_schema()).unwrap();
        let id = db.insert_row("T", values! { "amount" => "5" }, Some("abc".into())).unwrap();
        assert_eq!(id, Some(RowId::from("abc")));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(db.path()).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "T": {
                    "SCHEMA_DEFINITION": {
                        "amount": { "SCHEMA_TYPE": "NUMBER", "SCHEMA_REQUIRED": true }
                    },
                    "ROWS": { "abc": { "amount": 5.0 } }
                }
            })
        );
    }

    fn dir_entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let (dir, db) = scratch();
        db.create_table("T", &amount_schema()).unwrap();
        db.insert_row("T", values! { "amount" => 1 }, None).unwrap();
        assert_eq!(dir_entries(&dir), vec!["ledger.json".to_string()]);
    }

    #[test]
    fn test_failed_write_cleans_up_temp_file() {
        let (dir, db) = scratch();
        // A directory at the backing path makes the final rename fail
        fs::create_dir(db.path()).unwrap();

        assert!(matches!(
            db.create_table("T", &amount_schema()),
            Err(LedgerError::Io(_))
        ));
        assert_eq!(dir_entries(&dir), vec!["ledger.json".to_string()]);
    }

    #[test]
    fn test_colliding_id_is_regenerated() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn colliding_ids() -> RowId {
            if CALLS.fetch_add(1, Ordering::SeqCst) < 2 {
                RowId::from("taken")
            } else {
                RowId::from("fresh")
            }
        }

        let (_dir, db) = scratch();
        let db = db.with_id_source(colliding_ids);
        db.create_table("T", &amount_schema()).unwrap();
        db.insert_row("T", values! { "amount" => 1 }, Some("taken".into())).unwrap();

        let id = db.insert_row("T", values! { "amount" => 2 }, None).unwrap();
        assert_eq!(id, Some(RowId::from("fresh")));
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);

        let rows = db.all_rows("T").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[&RowId::from("taken")]["amount"], FieldValue::Number(1.0));
    }

    #[test]
    fn test_rejected_insert_leaves_store_unchanged() {
        let (_dir, db) = scratch();
        db.create_table("T", &amount_schema()).unwrap();
        let before = db.read_document();

        assert!(matches!(
            db.insert_row("T", values! { "amount" => "nan" }, None),
            Err(LedgerError::TypeMismatch { .. })
        ));
        assert!(matches!(
            db.insert_row("T", values! { "other" => 1 }, None),
            Err(LedgerError::MissingRequiredFields { .. })
        ));
        assert_eq!(db.read_document(), before);
    }

    #[test]
    fn test_explicit_id_replaces_row() {
        let (_dir, db) = scratch();
        db.create_table("T", &amount_schema()).unwrap();
        let id = db.insert_row("T", values! { "amount" => 1 }, None).unwrap().unwrap();
        db.insert_row("T", values! { "amount" => 2 }, Some(id.clone())).unwrap();

        let rows = db.all_rows("T").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[&id]["amount"], FieldValue::Number(2.0));
    }

    #[test]
    fn test_legacy_table_without_rows_key() {
        let (_dir, db) = scratch();
        fs::write(
            db.path(),
            r#"{"PLO": {"SCHEMA_DEFINITION": {"people": {"SCHEMA_TYPE": "list", "SCHEMA_REQUIRED": false}}}}"#,
        )
        .unwrap();

        assert_eq!(db.table_names(), vec!["PLO".to_string()]);
        let schema = db.table_schema("PLO").unwrap();
        assert_eq!(schema, vec![FieldSchema::new("people", FieldType::List)]);
        assert_eq!(db.all_rows("PLO"), Some(Rows::new()));
    }
}
