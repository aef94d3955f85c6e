//! Daily exchange-rate cache
//!
//! Rates live in an ordinary table of the store. The network lookup itself is
//! the caller's business: it is handed in as a closure and only invoked when
//! no rate has been recorded for the requested pair today.

use crate::error::Result;
use crate::filter::{FilterCondition, VisualizeFilters};
use crate::schema::{FieldSchema, FieldType, SchemaDefinition};
use crate::storage::Database;
use crate::types::{FieldValue, Values};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Reserved table holding cached rates
pub const RATES_TABLE: &str = "CONVERSION_RATES";

/// Stock fallback for the `USD/RMB` pair
pub const DEFAULT_RMB_EXCHANGE_RATE: f64 = 6.5;

pub const USD_RMB: &str = "USD/RMB";

pub mod rate_fields {
    pub const RATE: &str = "Rate";
    pub const DATE: &str = "Date";
    pub const CURRENCY: &str = "Currency";
}

pub fn rates_schema() -> SchemaDefinition {
    SchemaDefinition::new(vec![
        FieldSchema::new(rate_fields::RATE, FieldType::Number).required(),
        FieldSchema::new(rate_fields::DATE, FieldType::Date).required(),
        FieldSchema::new(rate_fields::CURRENCY, FieldType::Text).required(),
    ])
}

/// Rate cache over any [`Database`]
pub struct ExchangeRateCache<'a, D: Database> {
    db: &'a D,
    fallback: f64,
}

impl<'a, D: Database> ExchangeRateCache<'a, D> {
    /// `fallback` is returned when nothing is cached and the fetch fails
    pub fn new(db: &'a D, fallback: f64) -> Self {
        ExchangeRateCache { db, fallback }
    }

    /// Rate for `pair` on `today`, fetching at most once per day
    pub fn rate<F>(&self, pair: &str, today: NaiveDate, fetch: F) -> Result<f64>
    where
        F: FnOnce() -> Option<f64>,
    {
        self.db.create_table(RATES_TABLE, &rates_schema())?;

        let today_value = FieldValue::from(today);
        let filters = VisualizeFilters::new()
            .with(rate_fields::CURRENCY, FilterCondition::equal(pair)?)
            .with(rate_fields::DATE, FilterCondition::equal(today_value.clone())?);

        if let Some(rate) = self
            .db
            .query_rows(RATES_TABLE, Some(&filters))
            .and_then(|rows| rows.values().find_map(rate_of))
        {
            debug!(pair, rate, "exchange rate served from cache");
            return Ok(rate);
        }

        match fetch().filter(|rate| rate.is_finite() && *rate > 0.0) {
            Some(rate) => {
                self.forget(pair)?;
                let mut row = Values::new();
                row.insert(rate_fields::RATE.to_string(), FieldValue::Number(rate));
                row.insert(rate_fields::DATE.to_string(), today_value);
                row.insert(rate_fields::CURRENCY.to_string(), FieldValue::from(pair));
                self.db.insert_row(RATES_TABLE, row, None)?;
                info!(pair, rate, "exchange rate refreshed");
                Ok(rate)
            }
            None => {
                let cached = self.latest_cached(pair);
                warn!(pair, ?cached, fallback = self.fallback, "exchange rate fetch failed");
                Ok(cached.unwrap_or(self.fallback))
            }
        }
    }

    /// Same as [`rate`](Self::rate) for the local calendar date
    pub fn rate_today<F>(&self, pair: &str, fetch: F) -> Result<f64>
    where
        F: FnOnce() -> Option<f64>,
    {
        self.rate(pair, chrono::Local::now().date_naive(), fetch)
    }

    fn pair_filter(pair: &str) -> Result<VisualizeFilters> {
        Ok(VisualizeFilters::new().with(rate_fields::CURRENCY, FilterCondition::equal(pair)?))
    }

    fn latest_cached(&self, pair: &str) -> Option<f64> {
        let filters = Self::pair_filter(pair).ok()?;
        self.db
            .query_rows(RATES_TABLE, Some(&filters))?
            .into_values()
            .filter_map(|row| {
                let date = row.get(rate_fields::DATE)?.as_str()?.to_string();
                Some((date, rate_of(&row)?))
            })
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, rate)| rate)
    }

    fn forget(&self, pair: &str) -> Result<()> {
        let filters = Self::pair_filter(pair)?;
        let stale = self.db.query_rows(RATES_TABLE, Some(&filters)).unwrap_or_default();
        for id in stale.keys() {
            self.db.delete_row(RATES_TABLE, id)?;
        }
        Ok(())
    }
}

fn rate_of(row: &Values) -> Option<f64> {
    row.get(rate_fields::RATE).and_then(FieldValue::as_f64)
}
