//! Lookup resolution: associations matched by business keys.

use graphseed_core::{
    Criteria, Node, ParseError, PropertyDef, PropertyKind, Record, TypeDef, Value,
    describe_criteria, is_null_literal,
};
use graphseed_plan::{EMPTY_RULES, LookupKey, LookupRule};
use tracing::debug;

use crate::engine::Importer;
use crate::errors::{ImportError, Result};
use crate::owner::Cursor;
use crate::store::{DataStore, StoreError};

impl<'a, S: DataStore> Importer<'a, S> {
    /// Value assigned to a property with a lookup rule. Set properties take
    /// one match per collection element, skipping elements without data.
    pub(crate) fn resolve_lookup(
        &mut self,
        lookup: &'a LookupRule,
        kind: &PropertyKind,
        node: &Node,
    ) -> Result<Value> {
        if !matches!(kind, PropertyKind::Set(_)) {
            return self.lookup_value(lookup, node);
        }

        let items = match node {
            Node::Collection(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };

        let mut values = Value::Set(Vec::new());
        for item in items {
            if item.is_empty() || item.as_scalar().is_some_and(is_null_literal) {
                continue;
            }
            let value = self.lookup_value(lookup, item)?;
            if !value.is_null() {
                values.insert_unique(value);
            }
        }

        Ok(match values {
            Value::Set(items) if items.is_empty() => Value::Null,
            other => other,
        })
    }

    /// The matched row as a reference, or the value at the rule's `fetch`
    /// path.
    pub(crate) fn lookup_value(&mut self, lookup: &'a LookupRule, node: &Node) -> Result<Value> {
        let row = self.lookup_one(lookup, node)?;
        match &lookup.fetch {
            Some(path) => self.project(&row, path),
            None => self.reference_to(row),
        }
    }

    /// Exactly one row of `lookup.from` matching the criteria in `node`.
    pub(crate) fn lookup_one(&mut self, lookup: &'a LookupRule, node: &Node) -> Result<Record> {
        let from = self.type_def(&lookup.from)?;
        self.ensure_generated(&from.name)?;

        let criteria = self.lookup_criteria(lookup, from, node)?;
        self.store.flush()?;

        debug!(
            type_name = %from.name,
            criteria = %describe_criteria(&criteria),
            "resolving lookup"
        );
        match self.store.find_one_matching(&from.name, &criteria) {
            Ok(row) => Ok(row),
            Err(StoreError::NotFound { .. }) => Err(ImportError::LookupNotFound {
                type_name: from.name.clone(),
                criteria: describe_criteria(&criteria),
                matches: 0,
            }),
            Err(StoreError::Ambiguous { matches, .. }) => Err(ImportError::LookupNotFound {
                type_name: from.name.clone(),
                criteria: describe_criteria(&criteria),
                matches,
            }),
            Err(other) => Err(other.into()),
        }
    }

    fn lookup_criteria(
        &mut self,
        lookup: &'a LookupRule,
        from: &'a TypeDef,
        node: &Node,
    ) -> Result<Criteria> {
        if lookup.by.is_empty() {
            return Err(ImportError::Configuration(format!(
                "lookup on '{}' declares no keys",
                from.name
            )));
        }

        let mut criteria = Criteria::new();
        for key in &lookup.by {
            let property = from
                .property(&key.property)
                .ok_or_else(|| ImportError::mismatch(&from.name, &key.property))?;

            let key_node = match node {
                Node::Scalar(_) if lookup.by.len() == 1 => node,
                Node::Scalar(_) => {
                    return Err(ImportError::Configuration(format!(
                        "lookup on '{}' has {} keys and needs a group, got a scalar",
                        from.name,
                        lookup.by.len()
                    )));
                }
                Node::Group(entry) => match entry.get(&key.property) {
                    Some(key_node) => key_node,
                    None => {
                        return Err(ImportError::LookupNotFound {
                            type_name: from.name.clone(),
                            criteria: format!(
                                "{} with '{}' missing",
                                describe_criteria(&criteria),
                                key.property
                            ),
                            matches: 0,
                        });
                    }
                },
                Node::Collection(_) => {
                    return Err(ParseError::UnexpectedShape {
                        property: key.property.clone(),
                        expected: "a scalar or group lookup key",
                    }
                    .into());
                }
            };

            let value = self.criterion_value(key, property, key_node)?;
            criteria.insert(key.property.clone(), value);
        }
        Ok(criteria)
    }

    fn criterion_value(
        &mut self,
        key: &'a LookupKey,
        property: &'a PropertyDef,
        node: &Node,
    ) -> Result<Value> {
        if let Some(nested) = &key.lookup {
            return self.lookup_value(nested, node);
        }

        if key.composite {
            let embedded = property
                .kind
                .referenced_type()
                .map(|name| self.type_def(name))
                .transpose()?
                .filter(|type_def| !self.is_managed(&type_def.name))
                .ok_or_else(|| {
                    ImportError::Configuration(format!(
                        "composite key '{}' must reference an unmanaged type",
                        key.property
                    ))
                })?;
            let Node::Group(entry) = node else {
                return Err(ParseError::UnexpectedShape {
                    property: key.property.clone(),
                    expected: "a group for a composite key",
                }
                .into());
            };

            let rules = if key.properties.is_empty() {
                self.rules(&embedded.name)
            } else {
                &key.properties
            };
            let mut value = Record::new(embedded.name.clone());
            self.populate(&mut value, embedded, entry, rules, &Cursor::Detached)?;
            return Ok(Value::Object(Box::new(value)));
        }

        if let PropertyKind::Reference(target) = &property.kind {
            if self.is_managed(target) {
                match node {
                    Node::Group(_) => {
                        return Err(ImportError::Configuration(format!(
                            "key '{}' references {target} and needs a nested lookup",
                            key.property
                        )));
                    }
                    // An unknown foreign id must not widen the criteria to null.
                    Node::Scalar(text) if !is_null_literal(text) => {
                        let target = self.type_def(target)?;
                        return self.require_by_id(target, text);
                    }
                    _ => {}
                }
            }
        }

        self.value_for_kind(
            &property.kind,
            node,
            &EMPTY_RULES,
            &Cursor::Detached,
            &key.property,
        )
    }
}
