//! Row images exchanged with the entity manager.
//!
//! The Dao facade is generic over the mapped type; the entity-manager seam
//! is an object-safe trait. [`Record`] bridges the two: an ordered set of
//! `(column, Value)` pairs produced from an entity via serde and turned
//! back into one on the way out.

use crate::{SteleError, SteleResult, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// An ordered column/value row image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes an entity into a record.
    ///
    /// The entity must serialize to a JSON object (a flat column set).
    pub fn from_entity<M: Serialize>(entity: &M) -> SteleResult<Self> {
        match serde_json::to_value(entity)? {
            JsonValue::Object(map) => Ok(Self {
                fields: map
                    .into_iter()
                    .map(|(column, json)| (column, Value::from_json(json)))
                    .collect(),
            }),
            other => Err(SteleError::mapping(format!(
                "entity must serialize to an object, got {other}"
            ))),
        }
    }

    /// Deserializes the record back into an entity.
    pub fn into_entity<M: DeserializeOwned>(self) -> SteleResult<M> {
        let map: Map<String, JsonValue> = self
            .fields
            .into_iter()
            .map(|(column, value)| (column, value.into_json()))
            .collect();
        Ok(serde_json::from_value(JsonValue::Object(map))?)
    }

    /// Sets a column value, replacing any existing one.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(c, _)| *c == column) {
            slot.1 = value;
        } else {
            self.fields.push((column, value));
        }
    }

    /// Returns the value of a column, if present.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter()
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
