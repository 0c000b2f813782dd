//! Import plan contracts, loading and validation.
//!
//! An [`ImportPlan`] is the declarative per-type schema the importer reads
//! through the [`SchemaProvider`] trait: property rules, dependency lists and
//! date formats.

pub mod errors;
pub mod model;
pub mod provider;
pub mod schema;
pub mod validate;

pub use errors::{IssueSeverity, PlanError, Result, ValidationIssue, ValidationReport};
pub use model::{ImportPlan, LookupKey, LookupRule, PropertyRule, RuleSet, TypePlan};
pub use provider::{EMPTY_RULES, SchemaProvider};
pub use schema::plan_json_schema;
pub use validate::{
    ValidatedPlan, load_plan_value, validate_plan, validate_plan_against_model, validate_plan_json,
};
