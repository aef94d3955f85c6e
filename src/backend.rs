//! Backend facade
//!
//! Ties games (entity schemas), sessions and the record store together. The
//! store is the source of truth: games are always rebuilt from the stored
//! schema rather than kept in memory.

use crate::config::StoreConfig;
use crate::error::Result;
use crate::filter::VisualizeFilters;
use crate::rates::{ExchangeRateCache, DEFAULT_RMB_EXCHANGE_RATE, RATES_TABLE, USD_RMB};
use crate::schema::{EntitySchema, FieldSchema};
use crate::session::Session;
use crate::storage::{Database, JsonDatabase};
use crate::types::{RowId, Values};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Sessions of one game keyed by row id
pub type Sessions = BTreeMap<RowId, Session>;

pub struct Backend<D: Database = JsonDatabase> {
    db: D,
}

impl Backend<JsonDatabase> {
    /// Backend over the JSON store described by `config`
    pub fn open(config: StoreConfig) -> Self {
        Backend::new(JsonDatabase::new(config))
    }
}

impl<D: Database> Backend<D> {
    pub fn new(db: D) -> Self {
        Backend { db }
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn reset_database(&self) -> Result<()> {
        self.db.reset()
    }

    /// Define a game; `None` if a game by that name already exists
    pub fn add_game(&self, name: &str, custom_fields: Vec<FieldSchema>) -> Result<Option<EntitySchema>> {
        let game = EntitySchema::new(name, custom_fields)?;
        if self.db.create_table(name, &game.serialize_schema())? {
            Ok(Some(game))
        } else {
            debug!(game = name, "game already defined");
            Ok(None)
        }
    }

    /// Names of all games (the rate cache table is not a game)
    pub fn games(&self) -> Vec<String> {
        self.db
            .table_names()
            .into_iter()
            .filter(|name| name != RATES_TABLE)
            .collect()
    }

    /// Rebuild a game from its stored schema
    pub fn game(&self, name: &str) -> Result<EntitySchema> {
        Ok(EntitySchema::from_stored(name, self.db.table_schema(name)?))
    }

    pub fn add_session(&self, session: &Session) -> Result<Option<RowId>> {
        self.db
            .insert_row(session.game(), session.values().clone(), None)
    }

    /// Overwrite the given fields of a stored session
    ///
    /// Returns `false` if the game or the session does not exist. The merged
    /// values are validated before anything is written.
    pub fn edit_session(&self, game: &str, id: &RowId, changes: Values) -> Result<bool> {
        let Some(mut values) = self.db.all_rows(game).and_then(|mut rows| rows.remove(id)) else {
            return Ok(false);
        };
        values.extend(changes);
        Ok(self.db.insert_row(game, values, Some(id.clone()))?.is_some())
    }

    pub fn delete_session(&self, game: &str, id: &RowId) -> Result<bool> {
        self.db.delete_row(game, id)
    }

    /// Sessions of `game` matching `filters`; `None` if the game is unknown
    pub fn sessions(&self, game: &str, filters: Option<&VisualizeFilters>) -> Option<Sessions> {
        self.db.query_rows(game, filters).map(|rows| {
            rows.into_iter()
                .map(|(id, values)| (id, Session::from_stored(game, values)))
                .collect()
        })
    }

    /// Exchange rate for `pair` on `today`, cached in the store
    pub fn conversion_rate<F>(&self, pair: &str, today: NaiveDate, fetch: F) -> Result<f64>
    where
        F: FnOnce() -> Option<f64>,
    {
        ExchangeRateCache::new(&self.db, DEFAULT_RMB_EXCHANGE_RATE).rate(pair, today, fetch)
    }

    /// USD to RMB rate for today
    pub fn rmb_conversion_rate<F>(&self, fetch: F) -> Result<f64>
    where
        F: FnOnce() -> Option<f64>,
    {
        ExchangeRateCache::new(&self.db, DEFAULT_RMB_EXCHANGE_RATE).rate_today(USD_RMB, fetch)
    }
}
