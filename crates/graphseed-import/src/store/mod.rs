//! Persistence backends consumed by the importer.

mod memory;

use graphseed_core::{Criteria, Record, ScalarKind, Value};
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStore;

/// Errors reported by a [`DataStore`].
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("no {type_name} matching {criteria}")]
    NotFound { type_name: String, criteria: String },
    #[error("{matches} rows of {type_name} match {criteria}")]
    Ambiguous {
        type_name: String,
        criteria: String,
        matches: usize,
    },
    #[error("type '{0}' is not managed by the store")]
    Unmanaged(String),
    #[error("{type_name} is missing its identifier '{property}'")]
    MissingIdentifier { type_name: String, property: String },
    #[error("{0}")]
    Backend(String),
}

/// Persistence backend: identifier lookup, criteria lookup, save and flush.
///
/// Criteria queries only need to see writes that were flushed; the importer
/// flushes before each of them.
pub trait DataStore {
    fn find_by_id(&mut self, type_name: &str, id: &Value) -> Result<Option<Record>, StoreError>;

    /// The single row matching `criteria`; fails on zero or several.
    fn find_one_matching(
        &mut self,
        type_name: &str,
        criteria: &Criteria,
    ) -> Result<Record, StoreError> {
        let mut rows = self.find_all_matching(type_name, criteria)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(StoreError::NotFound {
                type_name: type_name.to_string(),
                criteria: graphseed_core::describe_criteria(criteria),
            }),
            matches => Err(StoreError::Ambiguous {
                type_name: type_name.to_string(),
                criteria: graphseed_core::describe_criteria(criteria),
                matches,
            }),
        }
    }

    fn find_all_matching(
        &mut self,
        type_name: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, StoreError>;

    /// Persist `record`, assigning its identifier when new.
    fn save(&mut self, record: Record) -> Result<Record, StoreError>;

    fn flush(&mut self) -> Result<(), StoreError>;

    fn is_managed(&self, type_name: &str) -> bool;

    fn identifier_kind(&self, type_name: &str) -> Option<ScalarKind>;
}

/// One call recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOperation {
    Save {
        type_name: String,
        id: Value,
        created: bool,
    },
    FindById {
        type_name: String,
        id: Value,
    },
    FindMatching {
        type_name: String,
        criteria: String,
    },
    Flush,
}

impl StoreOperation {
    /// Type touched by the operation; `None` for flushes.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            StoreOperation::Save { type_name, .. }
            | StoreOperation::FindById { type_name, .. }
            | StoreOperation::FindMatching { type_name, .. } => Some(type_name.as_str()),
            StoreOperation::Flush => None,
        }
    }
}
