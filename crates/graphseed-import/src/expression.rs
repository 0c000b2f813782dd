//! Deferred expressions and path projection.
//!
//! Expressions are `this`, `this.<path>` or `<path>`, where a path is a
//! dotted property chain starting at the owner. References along the path
//! are loaded from the store.

use graphseed_core::{ObjectRef, ParseError, PropertyKind, Record, TypeModel, Value};
use tracing::debug;

use crate::engine::Importer;
use crate::errors::{ImportError, Result};
use crate::owner::{PendingAction, target_record_mut};
use crate::store::DataStore;

const SELF_KEYWORD: &str = "this";

impl<'a, S: DataStore> Importer<'a, S> {
    /// Evaluate `action` against the saved owner, assign the result and save
    /// the owner again.
    pub(crate) fn apply_pending(&mut self, owner: Record, action: &PendingAction) -> Result<Record> {
        let value = self.evaluate(&owner, &action.expression)?;

        let model = self.model;
        let mut owner = owner;
        let target = target_record_mut(&mut owner, &action.target).ok_or_else(|| {
            ImportError::Configuration(format!(
                "deferred target {} does not exist",
                action.describe_target()
            ))
        })?;
        let type_def = self.type_def(target.type_name())?;
        let property = type_def
            .property(&action.property)
            .ok_or_else(|| ImportError::mismatch(&type_def.name, &action.property))?;

        let coerced = coerce(model, &property.kind, value, property.get(target))
            .ok_or_else(|| ParseError::UnexpectedShape {
                property: action.property.clone(),
                expected: "an expression result matching its declared kind",
            })?;
        property.set(target, coerced)?;

        debug!(
            target = %action.describe_target(),
            expression = %action.expression,
            "deferred expression applied"
        );
        self.save(owner)
    }

    fn evaluate(&mut self, owner: &Record, expression: &str) -> Result<Value> {
        if expression == SELF_KEYWORD {
            return self.reference_to(owner.clone());
        }
        let path = expression
            .strip_prefix(SELF_KEYWORD)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(expression);
        self.project(owner, path)
    }

    /// Follow a dotted property path from `record`. Unset properties and
    /// dangling references yield `Null`.
    pub(crate) fn project(&mut self, record: &Record, path: &str) -> Result<Value> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        let mut current = record.clone();

        for (idx, segment) in segments.iter().enumerate() {
            let type_def = self.type_def(current.type_name())?;
            if segment.is_empty() || type_def.property(segment).is_none() {
                return Err(ImportError::mismatch(&type_def.name, segment));
            }

            let value = current.get(segment).cloned().unwrap_or(Value::Null);
            if idx + 1 == segments.len() {
                return Ok(value);
            }

            current = match value {
                Value::Null => return Ok(Value::Null),
                Value::Ref(reference) => {
                    match self.store.find_by_id(&reference.type_name, &reference.id)? {
                        Some(row) => row,
                        None => return Ok(Value::Null),
                    }
                }
                Value::Object(nested) => *nested,
                other => {
                    return Err(ImportError::Configuration(format!(
                        "path '{path}' cannot follow '{segment}' into the value {other}"
                    )));
                }
            };
        }

        Ok(Value::Null)
    }
}

/// Fit an expression result to `kind`. Identifiers become references and
/// references become identifiers; set properties accumulate.
fn coerce(
    model: &TypeModel,
    kind: &PropertyKind,
    value: Value,
    existing: Option<&Value>,
) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }

    match kind {
        PropertyKind::Scalar(scalar) => match value {
            Value::Ref(reference) if scalar.accepts(&reference.id) => Some(*reference.id),
            other if scalar.accepts(&other) => Some(other),
            _ => None,
        },
        PropertyKind::Reference(target) => match value {
            Value::Ref(_) | Value::Object(_) => kind.accepts(&value).then_some(value),
            Value::Set(_) | Value::Map(_) => None,
            id if model.is_managed(target) => Some(Value::Ref(ObjectRef::new(target.clone(), id))),
            _ => None,
        },
        PropertyKind::Set(element) => {
            let mut set = match existing {
                Some(Value::Set(items)) => Value::Set(items.clone()),
                _ => Value::Set(Vec::new()),
            };
            let items = match value {
                Value::Set(items) => items,
                single => vec![single],
            };
            for item in items {
                set.insert_unique(coerce(model, element, item, None)?);
            }
            Some(set)
        }
        PropertyKind::Map { .. } => kind.accepts(&value).then_some(value),
    }
}

#[cfg(test)]
mod tests {
    use graphseed_core::ScalarKind;

    use super::*;

    fn model() -> TypeModel {
        TypeModel::from_json_str(
            r#"{
              "types": [
                {
                  "name": "Person",
                  "identifier": { "property": "id", "kind": "long" },
                  "properties": [ { "name": "name", "kind": { "scalar": "text" } } ]
                }
              ]
            }"#,
        )
        .expect("model")
    }

    fn person(id: i64) -> Value {
        Value::Ref(ObjectRef::new("Person", Value::Long(id)))
    }

    #[test]
    fn references_and_identifiers_convert() {
        let model = model();
        assert_eq!(
            coerce(&model, &PropertyKind::Scalar(ScalarKind::Long), person(3), None),
            Some(Value::Long(3))
        );
        assert_eq!(
            coerce(
                &model,
                &PropertyKind::Reference("Person".to_string()),
                Value::Long(3),
                None
            ),
            Some(person(3))
        );
        assert_eq!(
            coerce(&model, &PropertyKind::Scalar(ScalarKind::Bool), person(3), None),
            None
        );
    }

    #[test]
    fn set_targets_accumulate() {
        let model = model();
        let kind = PropertyKind::Set(Box::new(PropertyKind::Reference("Person".to_string())));
        let existing = Value::Set(vec![person(1)]);
        assert_eq!(
            coerce(&model, &kind, person(2), Some(&existing)),
            Some(Value::Set(vec![person(1), person(2)]))
        );
        assert_eq!(
            coerce(&model, &kind, person(1), Some(&existing)),
            Some(Value::Set(vec![person(1)]))
        );
    }
}
