//! Schema System for the session ledger
//!
//! A [`FieldSchema`] describes one typed column and knows how to coerce raw
//! input into its canonical form. An [`EntitySchema`] is the ordered field set
//! of one entity (a game), always seeded with the default session fields.

use crate::error::{LedgerError, Result};
use crate::types::{FieldValue, Values};
use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Well-known field names
pub mod field_names {
    pub const NET_EARN: &str = "Net Earn";
    pub const DATE: &str = "Date";
    pub const LENGTH: &str = "Length";
    pub const TAGS: &str = "Tags";
    pub const NOTE: &str = "Note";

    pub const OCCASION: &str = "Occasion";
    pub const PEOPLE: &str = "People";
    pub const CURRENCY: &str = "Currency";
}

/// Numeric spellings that would produce non-finite numbers
pub const DISALLOWED_NUMBER_INPUTS: [&str; 3] = ["nan", "inf", "infinity"];

/// Accepted date layouts, tried in order
const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// Canonical stored date layout
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Supported field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum FieldType {
    Number,
    Date,
    Text,
    List,
}

impl FieldType {
    /// Persisted type name
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Number => "NUMBER",
            FieldType::Date => "DATE",
            FieldType::Text => "TEXT",
            FieldType::List => "LIST",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NUMBER" => Ok(FieldType::Number),
            "DATE" => Ok(FieldType::Date),
            "TEXT" => Ok(FieldType::Text),
            "LIST" => Ok(FieldType::List),
            _ => Err(LedgerError::SchemaDefinition {
                field_type: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Field definition within an entity
///
/// Immutable once built: the builder methods consume and return `self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    name: String,
    field_type: FieldType,
    required: bool,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldSchema {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Build from a type name such as `"NUMBER"` or `"list"`
    pub fn parse(name: impl Into<String>, field_type: &str, required: bool) -> Result<Self> {
        Ok(FieldSchema {
            name: name.into(),
            field_type: field_type.parse()?,
            required,
        })
    }

    /// Mark the field as required for every record
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Coerce a raw value into this field's canonical form
    pub fn parse_entry(&self, value: &FieldValue) -> Result<FieldValue> {
        if value.is_null() {
            if self.required {
                return Err(LedgerError::RequiredField {
                    field: self.name.clone(),
                });
            }
            return Ok(FieldValue::Null);
        }

        match self.field_type {
            FieldType::Text => match value {
                FieldValue::Text(_) => Ok(value.clone()),
                _ => Err(self.mismatch(value)),
            },
            FieldType::Number => self.parse_number(value),
            FieldType::Date => self.parse_date(value),
            FieldType::List => match value {
                FieldValue::List(_) => Ok(value.clone()),
                FieldValue::Text(s) => Ok(FieldValue::List(
                    s.split(',').map(|part| FieldValue::Text(part.to_string())).collect(),
                )),
                _ => Err(self.mismatch(value)),
            },
        }
    }

    fn parse_number(&self, value: &FieldValue) -> Result<FieldValue> {
        let number = match value {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => {
                if is_disallowed_number_str(s) {
                    return Err(self.mismatch(value));
                }
                s.trim().parse::<f64>().map_err(|_| self.mismatch(value))?
            }
            _ => return Err(self.mismatch(value)),
        };

        // Overflowing literals such as "1e999" parse to infinity
        if !number.is_finite() {
            return Err(self.mismatch(value));
        }
        Ok(FieldValue::Number(number))
    }

    fn parse_date(&self, value: &FieldValue) -> Result<FieldValue> {
        let FieldValue::Text(raw) = value else {
            return Err(self.mismatch(value));
        };

        let day = raw
            .trim()
            .split(|c: char| c == ' ' || c == 'T')
            .next()
            .unwrap_or_default();

        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(day, format).ok())
            .map(|date| FieldValue::Text(date.format(CANONICAL_DATE_FORMAT).to_string()))
            .ok_or_else(|| self.mismatch(value))
    }

    fn mismatch(&self, value: &FieldValue) -> LedgerError {
        LedgerError::TypeMismatch {
            field: self.name.clone(),
            expected: self.field_type.to_string(),
            value: value.to_string(),
        }
    }
}

fn is_disallowed_number_str(s: &str) -> bool {
    let lowered = s.trim().to_ascii_lowercase();
    let unsigned = lowered.trim_start_matches(&['+', '-'][..]);
    DISALLOWED_NUMBER_INPUTS.contains(&unsigned)
}

/// Default fields present on every entity unless overridden
///
/// Returns a fresh vector each call so entities never share field storage.
pub fn default_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::new(field_names::NET_EARN, FieldType::Number).required(),
        FieldSchema::new(field_names::DATE, FieldType::Date),
        FieldSchema::new(field_names::LENGTH, FieldType::Number),
        FieldSchema::new(field_names::TAGS, FieldType::List),
        FieldSchema::new(field_names::NOTE, FieldType::Text),
    ]
}

/// Schema definition for an entity (a game)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    fields: Vec<FieldSchema>,
}

impl EntitySchema {
    /// Merge custom fields onto the default field set
    ///
    /// A custom field replaces any earlier field of the same name, so the
    /// result never holds duplicates. The replacement moves to the end of
    /// the field list, after the remaining defaults.
    pub fn new(name: impl Into<String>, custom_fields: Vec<FieldSchema>) -> Result<Self> {
        let mut schema = EntitySchema {
            name: name.into(),
            fields: default_fields(),
        };

        for field in custom_fields {
            if field.name.trim().is_empty() {
                return Err(LedgerError::InvalidField {
                    reason: format!("field of type {} has an empty name", field.field_type),
                });
            }
            schema.add_field(field);
        }

        Ok(schema)
    }

    /// Rebuild an entity from the field list the store holds, without defaults
    pub fn from_stored(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        let mut schema = EntitySchema {
            name: name.into(),
            fields: Vec::with_capacity(fields.len()),
        };
        for field in fields {
            schema.add_field(field);
        }
        schema
    }

    fn add_field(&mut self, field: FieldSchema) {
        self.fields.retain(|existing| existing.name != field.name);
        self.fields.push(field);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Get field definition by name
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_field_names(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Coerce raw values into canonical form and enforce required fields
    ///
    /// Keys that match no declared field pass through unchanged, except that
    /// NaN or infinite numbers anywhere in a value are rejected.
    pub fn coerce_and_validate(&self, raw: Values) -> Result<Values> {
        let missing: Vec<String> = self
            .required_field_names()
            .into_iter()
            .filter(|name| !raw.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::MissingRequiredFields { fields: missing });
        }

        raw.into_iter()
            .map(|(key, value)| {
                let parsed = match self.field(&key) {
                    Some(field) => field.parse_entry(&value)?,
                    None => value,
                };
                // JSON has no NaN or infinity; they would be stored as null
                if !parsed.is_finite() {
                    return Err(LedgerError::TypeMismatch {
                        field: key,
                        expected: "finite number".to_string(),
                        value: parsed.to_string(),
                    });
                }
                Ok((key, parsed))
            })
            .collect()
    }

    pub fn serialize_schema(&self) -> SchemaDefinition {
        SchemaDefinition(self.fields.clone())
    }
}

/// On-disk shape of one field: `{"SCHEMA_TYPE": ..., "SCHEMA_REQUIRED": ...}`
#[derive(Debug, Serialize, Deserialize)]
struct FieldSpec {
    #[serde(rename = "SCHEMA_TYPE")]
    field_type: FieldType,
    #[serde(rename = "SCHEMA_REQUIRED", default)]
    required: bool,
}

/// Ordered field list as persisted under `SCHEMA_DEFINITION`
///
/// Serialized as a map from field name to [`FieldSpec`]; map order is the
/// field order and survives a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDefinition(Vec<FieldSchema>);

impl SchemaDefinition {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        SchemaDefinition(fields)
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.0
    }

    pub fn into_fields(self) -> Vec<FieldSchema> {
        self.0
    }

    /// Entity view over the stored fields
    pub fn to_entity(&self, name: &str) -> EntitySchema {
        EntitySchema::from_stored(name, self.0.clone())
    }
}

impl Serialize for SchemaDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in &self.0 {
            map.serialize_entry(
                &field.name,
                &FieldSpec {
                    field_type: field.field_type,
                    required: field.required,
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SchemaDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DefinitionVisitor;

        impl<'de> Visitor<'de> for DefinitionVisitor {
            type Value = SchemaDefinition;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to field specs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut fields: Vec<FieldSchema> = Vec::new();
                while let Some((name, spec)) = map.next_entry::<String, FieldSpec>()? {
                    let field = FieldSchema {
                        name,
                        field_type: spec.field_type,
                        required: spec.required,
                    };
                    match fields.iter_mut().find(|f| f.name == field.name) {
                        Some(existing) => *existing = field,
                        None => fields.push(field),
                    }
                }
                Ok(SchemaDefinition(fields))
            }
        }

        deserializer.deserialize_map(DefinitionVisitor)
    }
}
