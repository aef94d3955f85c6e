//! Session records
//!
//! A session is one recorded play of a game. Its values are coerced against
//! the game's schema when the session is built, so a `Session` always holds
//! canonical values.

use crate::error::Result;
use crate::schema::EntitySchema;
use crate::types::{FieldValue, Values};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    game: String,
    values: Values,
}

impl Session {
    /// Validate `raw` against `game` and build the session
    pub fn new(game: &EntitySchema, raw: Values) -> Result<Self> {
        Ok(Session {
            game: game.name().to_string(),
            values: game.coerce_and_validate(raw)?,
        })
    }

    /// Wrap values already read back from the store
    pub(crate) fn from_stored(game: &str, values: Values) -> Self {
        Session {
            game: game.to_string(),
            values,
        }
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn into_values(self) -> Values {
        self.values
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }
}
