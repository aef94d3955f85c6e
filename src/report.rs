//! Reporting helpers
//!
//! Turns query results into series for plotting and simple aggregates.
//! Results from the store carry no order; everything here sorts by date
//! itself where order matters.

use crate::backend::Sessions;
use crate::schema::field_names;
use crate::session::Session;
use crate::types::FieldValue;
use std::collections::BTreeMap;
use tracing::warn;

/// Per-column value vectors, one entry per session in id order
///
/// A session lacking a column contributes `Null` for it.
pub fn column_series(sessions: &Sessions, columns: &[&str]) -> Vec<Vec<FieldValue>> {
    columns
        .iter()
        .map(|column| {
            sessions
                .values()
                .map(|s| s.get(column).cloned().unwrap_or(FieldValue::Null))
                .collect()
        })
        .collect()
}

/// Running total of `data`
pub fn cumulative_sum(data: &[f64]) -> Vec<f64> {
    data.iter()
        .scan(0.0, |total, x| {
            *total += x;
            Some(*total)
        })
        .collect()
}

/// Conversion table into a base currency
///
/// A rate is the number of units of that currency per one unit of base.
#[derive(Debug, Clone)]
pub struct CurrencyRates {
    base: String,
    rates: BTreeMap<String, f64>,
}

impl CurrencyRates {
    pub fn new(base: impl Into<String>) -> Self {
        CurrencyRates {
            base: base.into(),
            rates: BTreeMap::new(),
        }
    }

    pub fn with_rate(mut self, currency: impl Into<String>, rate: f64) -> Self {
        self.rates.insert(currency.into(), rate);
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `amount` in base currency; `None` for unknown currencies
    pub fn to_base(&self, amount: f64, currency: &str) -> Option<f64> {
        if currency == self.base {
            return Some(amount);
        }
        self.rates
            .get(currency)
            .filter(|rate| **rate > 0.0)
            .map(|rate| amount / rate)
    }
}

/// Net earn of a session in base currency
///
/// Sessions without a currency are taken to be in the base currency.
fn net_in_base(session: &Session, rates: &CurrencyRates) -> Option<f64> {
    let amount = session.get(field_names::NET_EARN)?.as_f64()?;
    let currency = session
        .get(field_names::CURRENCY)
        .and_then(FieldValue::as_str)
        .unwrap_or(rates.base());

    let converted = rates.to_base(amount, currency);
    if converted.is_none() {
        warn!(game = session.game(), currency, "no rate for currency, session skipped");
    }
    converted
}

/// `(date, net earn in base currency)` pairs sorted by date
///
/// Sessions missing a date or a net earn are skipped.
pub fn net_series(sessions: &Sessions, rates: &CurrencyRates) -> Vec<(String, f64)> {
    let mut series: Vec<(String, f64)> = sessions
        .values()
        .filter_map(|session| {
            let date = session.get(field_names::DATE)?.as_str()?.to_string();
            Some((date, net_in_base(session, rates)?))
        })
        .collect();
    series.sort_by(|a, b| a.0.cmp(&b.0));
    series
}

/// Aggregate figures over a set of sessions
///
/// Money figures cover only sessions whose net earn could be converted to
/// the base currency; `counted` is how many those were. `hours` covers every
/// session with a length.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub counted: usize,
    pub total: f64,
    pub mean: f64,
    pub best: Option<f64>,
    pub worst: Option<f64>,
    pub hours: f64,
}

impl Summary {
    pub fn from_sessions(sessions: &Sessions, rates: &CurrencyRates) -> Self {
        let amounts: Vec<f64> = sessions
            .values()
            .filter_map(|s| net_in_base(s, rates))
            .collect();
        let hours: f64 = sessions
            .values()
            .filter_map(|s| s.get(field_names::LENGTH).and_then(FieldValue::as_f64))
            .sum();

        let total: f64 = amounts.iter().sum();
        let mean = if amounts.is_empty() {
            0.0
        } else {
            total / amounts.len() as f64
        };

        Summary {
            counted: amounts.len(),
            total,
            mean,
            best: amounts.iter().copied().reduce(f64::max),
            worst: amounts.iter().copied().reduce(f64::min),
            hours,
        }
    }
}
