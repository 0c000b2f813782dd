//! Core contracts and helpers for graphseed.
//!
//! This crate defines the hierarchical record tree, the typed model that
//! records are materialized into, scalar coercion, and the dependency graph
//! helpers shared by the plan, import and CLI crates.

pub mod entry;
pub mod error;
pub mod graph;
pub mod model;
pub mod scalar;
pub mod validation;
pub mod value;

pub use entry::{Entry, EntryBuilder, Node};
pub use error::{Error, ParseError, Result};
pub use graph::{DependencyGraphSummary, DependencyReport, build_dependency_report};
pub use model::{
    IdentifierDef, ModelDocument, PropertyDef, PropertyKind, ScalarKind, TypeDef, TypeModel,
};
pub use scalar::{Formats, is_null_literal, parse_scalar};
pub use validation::validate_model;
pub use value::{Criteria, ObjectRef, Record, Value, describe_criteria};

/// Current contract version for `model.json` artifacts.
pub const MODEL_VERSION: &str = "0.1";

/// Emit the JSON Schema for `model.json`.
pub fn model_json_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(ModelDocument)
}
