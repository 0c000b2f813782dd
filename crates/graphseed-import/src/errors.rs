use graphseed_core::ParseError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors emitted by the importer.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("no record source registered for type '{0}'")]
    UnknownProvider(String),
    #[error("type '{type_name}' has no property '{property}'")]
    SchemaMismatch { type_name: String, property: String },
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("no unique {type_name} matching {criteria} ({matches} matches)")]
    LookupNotFound {
        type_name: String,
        criteria: String,
        matches: usize,
    },
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    #[error("failed to generate type '{type_name}': {source}")]
    Generation {
        type_name: String,
        #[source]
        source: Box<ImportError>,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl ImportError {
    pub(crate) fn mismatch(type_name: &str, property: &str) -> Self {
        ImportError::SchemaMismatch {
            type_name: type_name.to_string(),
            property: property.to_string(),
        }
    }

    /// Innermost error, unwrapping the per-type context.
    pub fn root_cause(&self) -> &ImportError {
        match self {
            ImportError::Generation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;
