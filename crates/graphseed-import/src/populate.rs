//! Field population: maps one entry onto one record by the property rules.

use graphseed_core::{
    Entry, Node, ParseError, PropertyKind, Record, ScalarKind, TypeDef, Value, is_null_literal,
    parse_scalar,
};
use graphseed_plan::{EMPTY_RULES, PropertyRule, RuleSet};
use tracing::debug;

use crate::engine::Importer;
use crate::errors::{ImportError, Result};
use crate::owner::{Cursor, PathSegment, PendingAction};
use crate::store::DataStore;

impl<'a, S: DataStore> Importer<'a, S> {
    /// Assign every field of `entry` to `record`.
    pub(crate) fn populate(
        &mut self,
        record: &mut Record,
        type_def: &'a TypeDef,
        entry: &Entry,
        rules: &'a RuleSet,
        cursor: &Cursor,
    ) -> Result<()> {
        for (field, node) in entry.fields() {
            let property = type_def
                .property(field)
                .ok_or_else(|| ImportError::mismatch(&type_def.name, field))?;

            if node.as_scalar().is_some_and(is_null_literal) {
                continue;
            }

            let value = match rules.get(field) {
                Some(PropertyRule::Expression) => {
                    self.defer_expression(field, node, cursor)?;
                    continue;
                }
                Some(PropertyRule::Lookup(lookup)) => {
                    self.resolve_lookup(lookup, &property.kind, node)?
                }
                Some(PropertyRule::Plain { properties }) => self.value_for_kind(
                    &property.kind,
                    node,
                    properties,
                    &cursor.child(PathSegment::Property(field.to_string())),
                    field,
                )?,
                None => self.value_for_kind(
                    &property.kind,
                    node,
                    &EMPTY_RULES,
                    &cursor.child(PathSegment::Property(field.to_string())),
                    field,
                )?,
            };

            if !value.is_null() {
                property.set(record, value)?;
            }
        }
        Ok(())
    }

    fn defer_expression(&mut self, field: &str, node: &Node, cursor: &Cursor) -> Result<()> {
        let expression = node.as_scalar().ok_or_else(|| ParseError::UnexpectedShape {
            property: field.to_string(),
            expected: "an expression",
        })?;

        let Cursor::Attached(target) = cursor else {
            return Err(ImportError::Configuration(format!(
                "expression '{expression}' for '{field}' cannot be used inside a lookup key"
            )));
        };

        let action = PendingAction {
            target: target.clone(),
            property: field.to_string(),
            expression: expression.trim().to_string(),
        };
        debug!(target = %action.describe_target(), expression = %action.expression, "expression deferred");
        if !self.owners.defer(action) {
            return Err(ImportError::Configuration(format!(
                "expression for '{field}' has no owner record"
            )));
        }
        Ok(())
    }

    /// Value of `kind` built from `node`. Null literals and nodes without
    /// data produce `Null`.
    pub(crate) fn value_for_kind(
        &mut self,
        kind: &'a PropertyKind,
        node: &Node,
        rules: &'a RuleSet,
        cursor: &Cursor,
        property: &str,
    ) -> Result<Value> {
        if node.is_empty() || node.as_scalar().is_some_and(is_null_literal) {
            return Ok(Value::Null);
        }

        match kind {
            PropertyKind::Scalar(scalar) => match node {
                Node::Scalar(text) => Ok(parse_scalar(*scalar, text, &self.formats)?),
                other => Err(shape_error(property, "a scalar", other)),
            },
            PropertyKind::Reference(target) => {
                let target = self.type_def(target)?;
                match node {
                    Node::Scalar(text) if self.is_managed(&target.name) => {
                        self.fetch_by_id(target, text)
                    }
                    Node::Group(entry) => self.build_nested(target, entry, rules, cursor),
                    other => Err(shape_error(property, "a group", other)),
                }
            }
            PropertyKind::Set(element) => {
                let items = match node {
                    Node::Collection(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };

                let mut values: Vec<Value> = Vec::new();
                for item in items {
                    let item_cursor = cursor.child(PathSegment::Element(values.len()));
                    let value = self.value_for_kind(element, item, rules, &item_cursor, property)?;
                    if value.is_null() {
                        continue;
                    }
                    match values.iter().position(|existing| *existing == value) {
                        Some(pos) => {
                            let kept = cursor.child(PathSegment::Element(pos));
                            self.retarget_pending(&item_cursor, &kept);
                        }
                        None => values.push(value),
                    }
                }
                Ok(non_empty(Value::Set(values)))
            }
            PropertyKind::Map { key, value } => {
                let Node::Group(entry) = node else {
                    return Err(shape_error(property, "a group of map entries", node));
                };

                let mut pairs: Vec<(Value, Value)> = Vec::new();
                for (raw_key, value_node) in entry.fields() {
                    let map_key = self.map_key(key, raw_key, property)?;
                    let value_cursor = cursor.child(PathSegment::MapValue(pairs.len()));
                    let map_value =
                        self.value_for_kind(value, value_node, rules, &value_cursor, property)?;
                    match pairs.iter().position(|(existing, _)| *existing == map_key) {
                        Some(pos) => {
                            // The later value replaces the earlier one in place.
                            let kept = cursor.child(PathSegment::MapValue(pos));
                            self.discard_pending(&kept);
                            self.retarget_pending(&value_cursor, &kept);
                            pairs[pos].1 = map_value;
                        }
                        None => pairs.push((map_key, map_value)),
                    }
                }
                Ok(non_empty(Value::Map(pairs)))
            }
        }
    }

    fn retarget_pending(&mut self, from: &Cursor, to: &Cursor) {
        if let (Cursor::Attached(from), Cursor::Attached(to)) = (from, to) {
            self.owners.retarget(from, to);
        }
    }

    fn discard_pending(&mut self, at: &Cursor) {
        if let Cursor::Attached(path) = at {
            self.owners.discard(path);
        }
    }

    /// Build a nested record: managed types are saved and referenced,
    /// unmanaged ones are embedded.
    fn build_nested(
        &mut self,
        target: &'a TypeDef,
        entry: &Entry,
        rules: &'a RuleSet,
        cursor: &Cursor,
    ) -> Result<Value> {
        let rules = if rules.is_empty() {
            self.rules(&target.name)
        } else {
            rules
        };

        if self.is_managed(&target.name) {
            let saved = self.materialize(target, entry, rules)?;
            return self.reference_to(saved);
        }

        let mut nested = Record::new(target.name.clone());
        self.populate(&mut nested, target, entry, rules, cursor)?;
        Ok(Value::Object(Box::new(nested)))
    }

    /// Resolve a foreign identifier. A missing row leaves the property unset.
    fn fetch_by_id(&mut self, target: &'a TypeDef, text: &str) -> Result<Value> {
        let id = self.parse_identifier(target, text)?;
        self.ensure_generated(&target.name)?;
        match self.store.find_by_id(&target.name, &id)? {
            Some(row) => self.reference_to(row),
            None => {
                debug!(type_name = %target.name, id = %id, "foreign id not found; left unset");
                Ok(Value::Null)
            }
        }
    }

    /// Resolve a foreign identifier that must exist.
    pub(crate) fn require_by_id(&mut self, target: &'a TypeDef, text: &str) -> Result<Value> {
        let id = self.parse_identifier(target, text)?;
        self.ensure_generated(&target.name)?;
        match self.store.find_by_id(&target.name, &id)? {
            Some(row) => self.reference_to(row),
            None => Err(ImportError::LookupNotFound {
                type_name: target.name.clone(),
                criteria: format!("{{id={id}}}"),
                matches: 0,
            }),
        }
    }

    fn map_key(&mut self, kind: &'a PropertyKind, raw: &str, property: &str) -> Result<Value> {
        let key = match kind {
            PropertyKind::Scalar(scalar) => parse_scalar(*scalar, raw, &self.formats)?,
            PropertyKind::Reference(target) => {
                let target = self.type_def(target)?;
                self.require_by_id(target, raw)?
            }
            _ => Value::Null,
        };

        if key.is_null() {
            return Err(ParseError::UnexpectedShape {
                property: property.to_string(),
                expected: "a non-null scalar or identifier map key",
            }
            .into());
        }
        Ok(key)
    }

    pub(crate) fn parse_identifier(&self, target: &TypeDef, text: &str) -> Result<Value> {
        let kind = self
            .store
            .identifier_kind(&target.name)
            .unwrap_or(ScalarKind::Text);
        Ok(parse_scalar(kind, text, &self.formats)?)
    }

    pub(crate) fn reference_to(&self, row: Record) -> Result<Value> {
        self.model
            .reference_of(&row)
            .map(Value::Ref)
            .ok_or_else(|| {
                let property = self
                    .model
                    .type_def(row.type_name())
                    .and_then(|type_def| type_def.identifier.as_ref())
                    .map(|identifier| identifier.property.clone())
                    .unwrap_or_default();
                ImportError::Persistence(crate::store::StoreError::MissingIdentifier {
                    type_name: row.type_name().to_string(),
                    property,
                })
            })
    }
}

fn shape_error(property: &str, expected: &'static str, node: &Node) -> ImportError {
    debug!(property, found = node.shape(), "unexpected node shape");
    ImportError::Parse(ParseError::UnexpectedShape {
        property: property.to_string(),
        expected,
    })
}

fn non_empty(value: Value) -> Value {
    match &value {
        Value::Set(items) if items.is_empty() => Value::Null,
        Value::Map(pairs) if pairs.is_empty() => Value::Null,
        _ => value,
    }
}
