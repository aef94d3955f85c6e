//! Error types for the session ledger
//!
//! Validation failures are errors. Absence (missing table, missing row,
//! duplicate table) is reported through `bool`/`Option` returns instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("'{field_type}' is not an accepted field type")]
    SchemaDefinition { field_type: String },

    #[error("Invalid field definition: {reason}")]
    InvalidField { reason: String },

    #[error("Field '{field}' is required but null was provided")]
    RequiredField { field: String },

    #[error("Required fields not provided: {}", fields.join(", "))]
    MissingRequiredFields { fields: Vec<String> },

    #[error("Value {value} for field '{field}' is incompatible with type {expected}")]
    TypeMismatch {
        field: String,
        expected: String,
        value: String,
    },

    #[error("Table '{table}' does not exist")]
    UnknownTable { table: String },

    #[error("Operator {operator} is incompatible with operand {operand}")]
    FilterOperandType { operator: String, operand: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
