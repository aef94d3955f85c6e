//! Session Ledger - Core Engine
//!
//! Personal record keeping for recurring activity sessions (poker games and
//! the like). Each game carries its own schema of typed fields; sessions are
//! validated against it and persisted to a single JSON document.
//!
//! # Architecture
//!
//! - Schema Layer: typed fields, value coercion, default session fields
//! - Storage Layer: whole-document JSON store with schema validation on write
//! - Filter Layer: composable predicates (comparison, containment, negation, AND)
//! - Backend Layer: game and session operations over any [`Database`]
//! - Reporting: date-ordered series, cumulative sums, currency-converted summaries

pub mod config;
pub mod error;
pub mod types;
pub mod schema;
pub mod filter;
pub mod storage;
pub mod session;
pub mod backend;
pub mod rates;
pub mod report;

pub use config::{init_tracing, StoreConfig};
pub use error::{LedgerError, Result};
pub use types::{FieldValue, RowId, Rows, Values};
pub use schema::{default_fields, field_names, EntitySchema, FieldSchema, FieldType, SchemaDefinition};
pub use filter::{build_composite_predicate, build_predicate, FilterCondition, FilterOperator, Predicate, VisualizeFilters};
pub use storage::{Database, JsonDatabase, StoreDocument, Table};
pub use session::Session;
pub use backend::{Backend, Sessions};
pub use rates::{ExchangeRateCache, DEFAULT_RMB_EXCHANGE_RATE, RATES_TABLE};
pub use report::{column_series, cumulative_sum, net_series, CurrencyRates, Summary};
