use std::collections::{BTreeMap, HashMap};

use graphseed_core::{Criteria, Record, ScalarKind, TypeModel, Value, describe_criteria};
use tracing::debug;
use uuid::Uuid;

use super::{DataStore, StoreError, StoreOperation};

/// In-memory store driven by the type model.
///
/// Rows saved since the last flush are visible to identifier lookups but not
/// to criteria queries.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    model: TypeModel,
    tables: BTreeMap<String, Table>,
    journal: Vec<StoreOperation>,
}

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<StoredRow>,
    by_id: HashMap<String, usize>,
    sequence: i64,
}

#[derive(Debug, Clone)]
struct StoredRow {
    record: Record,
    flushed: bool,
}

impl MemoryStore {
    pub fn new(model: &TypeModel) -> Self {
        Self {
            model: model.clone(),
            tables: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    /// Every operation performed so far, in call order.
    pub fn journal(&self) -> &[StoreOperation] {
        &self.journal
    }

    /// Rows of `type_name` in insertion order.
    pub fn rows(&self, type_name: &str) -> Vec<&Record> {
        self.tables
            .get(type_name)
            .map(|table| table.rows.iter().map(|row| &row.record).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, type_name: &str) -> usize {
        self.tables
            .get(type_name)
            .map(|table| table.rows.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|table| table.rows.is_empty())
    }

    /// Types with at least one stored row.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .filter(|(_, table)| !table.rows.is_empty())
            .map(|(name, _)| name.as_str())
    }

    pub fn model(&self) -> &TypeModel {
        &self.model
    }

    pub fn saves(&self) -> u64 {
        self.count_operations(|op| matches!(op, StoreOperation::Save { .. }))
    }

    pub fn flushes(&self) -> u64 {
        self.count_operations(|op| matches!(op, StoreOperation::Flush))
    }

    fn count_operations(&self, predicate: impl Fn(&StoreOperation) -> bool) -> u64 {
        self.journal.iter().filter(|op| predicate(op)).count() as u64
    }

    fn identifier(&self, type_name: &str) -> Result<(String, ScalarKind), StoreError> {
        let type_def = self
            .model
            .type_def(type_name)
            .filter(|type_def| type_def.managed)
            .ok_or_else(|| StoreError::Unmanaged(type_name.to_string()))?;
        let identifier = type_def
            .identifier
            .as_ref()
            .ok_or_else(|| StoreError::Unmanaged(type_name.to_string()))?;
        Ok((identifier.property.clone(), identifier.kind))
    }
}

impl Table {
    fn next_id(&mut self, kind: ScalarKind) -> Option<Value> {
        match kind {
            ScalarKind::Int => {
                self.sequence += 1;
                i32::try_from(self.sequence).ok().map(Value::Int)
            }
            ScalarKind::Long => {
                self.sequence += 1;
                Some(Value::Long(self.sequence))
            }
            ScalarKind::Uuid => Some(Value::Uuid(Uuid::new_v4())),
            _ => None,
        }
    }

    // Keep generated ids clear of explicitly supplied ones.
    fn observe_id(&mut self, id: &Value) {
        if let Some(id) = id.as_i64() {
            self.sequence = self.sequence.max(id);
        }
    }
}

impl DataStore for MemoryStore {
    fn find_by_id(&mut self, type_name: &str, id: &Value) -> Result<Option<Record>, StoreError> {
        self.journal.push(StoreOperation::FindById {
            type_name: type_name.to_string(),
            id: id.clone(),
        });
        let found = self.tables.get(type_name).and_then(|table| {
            table
                .by_id
                .get(&id.key())
                .and_then(|idx| table.rows.get(*idx))
                .map(|row| row.record.clone())
        });
        Ok(found)
    }

    fn find_all_matching(
        &mut self,
        type_name: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, StoreError> {
        self.journal.push(StoreOperation::FindMatching {
            type_name: type_name.to_string(),
            criteria: describe_criteria(criteria),
        });
        let rows = self
            .tables
            .get(type_name)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .filter(|row| row.flushed && row.record.matches(criteria))
                    .map(|row| row.record.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    fn save(&mut self, mut record: Record) -> Result<Record, StoreError> {
        let type_name = record.type_name().to_string();
        let (property, kind) = self.identifier(&type_name)?;
        let table = self.tables.entry(type_name.clone()).or_default();

        let supplied = record.get(&property).filter(|id| !id.is_null()).cloned();
        let id = match supplied {
            Some(id) => {
                table.observe_id(&id);
                id
            }
            None => {
                let id = table
                    .next_id(kind)
                    .ok_or_else(|| StoreError::MissingIdentifier {
                        type_name: type_name.clone(),
                        property: property.clone(),
                    })?;
                record.set(property.clone(), id.clone());
                id
            }
        };

        let key = id.key();
        let created = match table.by_id.get(&key) {
            Some(idx) => {
                table.rows[*idx] = StoredRow {
                    record: record.clone(),
                    flushed: false,
                };
                false
            }
            None => {
                table.by_id.insert(key, table.rows.len());
                table.rows.push(StoredRow {
                    record: record.clone(),
                    flushed: false,
                });
                true
            }
        };

        debug!(type_name = %type_name, id = %id, created, "row saved");
        self.journal.push(StoreOperation::Save {
            type_name,
            id,
            created,
        });
        Ok(record)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        for table in self.tables.values_mut() {
            for row in &mut table.rows {
                row.flushed = true;
            }
        }
        self.journal.push(StoreOperation::Flush);
        Ok(())
    }

    fn is_managed(&self, type_name: &str) -> bool {
        self.model.is_managed(type_name)
    }

    fn identifier_kind(&self, type_name: &str) -> Option<ScalarKind> {
        self.model
            .type_def(type_name)
            .and_then(|type_def| type_def.identifier_kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> TypeModel {
        TypeModel::from_json_str(
            r#"{
              "types": [
                {
                  "name": "Country",
                  "identifier": { "property": "code", "kind": "text" },
                  "properties": [ { "name": "name", "kind": { "scalar": "text" } } ]
                },
                {
                  "name": "City",
                  "identifier": { "property": "id", "kind": "long" },
                  "properties": [ { "name": "name", "kind": { "scalar": "text" } } ]
                },
                { "name": "Address", "managed": false }
              ]
            }"#,
        )
        .expect("model")
    }

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    #[test]
    fn assigns_sequence_identifiers() {
        let mut store = MemoryStore::new(&model());
        let mut city = Record::new("City");
        city.set("name", text("Berlin"));

        let first = store.save(city.clone()).expect("save");
        let second = store.save(city).expect("save");
        assert_eq!(first.get("id"), Some(&Value::Long(1)));
        assert_eq!(second.get("id"), Some(&Value::Long(2)));

        let mut explicit = Record::new("City");
        explicit.set("id", Value::Long(10));
        store.save(explicit).expect("save");
        let next = store.save(Record::new("City")).expect("save");
        assert_eq!(next.get("id"), Some(&Value::Long(11)));
    }

    #[test]
    fn text_identifiers_must_be_supplied() {
        let mut store = MemoryStore::new(&model());
        let err = store.save(Record::new("Country")).expect_err("missing code");
        assert!(matches!(err, StoreError::MissingIdentifier { .. }));

        let err = store.save(Record::new("Address")).expect_err("unmanaged");
        assert!(matches!(err, StoreError::Unmanaged(_)));
    }

    #[test]
    fn criteria_queries_see_only_flushed_rows() {
        let mut store = MemoryStore::new(&model());
        let mut country = Record::new("Country");
        country.set("code", text("DE"));
        country.set("name", text("Germany"));
        store.save(country).expect("save");

        let mut criteria = Criteria::new();
        criteria.insert("name".to_string(), text("Germany"));

        assert!(matches!(
            store.find_one_matching("Country", &criteria),
            Err(StoreError::NotFound { .. })
        ));
        assert!(
            store
                .find_by_id("Country", &text("DE"))
                .expect("find")
                .is_some()
        );

        store.flush().expect("flush");
        let found = store.find_one_matching("Country", &criteria).expect("found");
        assert_eq!(found.get("code"), Some(&text("DE")));
    }

    #[test]
    fn resave_updates_in_place() {
        let mut store = MemoryStore::new(&model());
        let saved = store.save(Record::new("City")).expect("save");
        let mut updated = saved.clone();
        updated.set("name", text("Hamburg"));
        store.save(updated).expect("resave");

        assert_eq!(store.len("City"), 1);
        assert_eq!(store.rows("City")[0].get("name"), Some(&text("Hamburg")));
        assert!(matches!(
            store.journal().last(),
            Some(StoreOperation::Save { created: false, .. })
        ));
    }

    #[test]
    fn ambiguous_criteria_are_rejected() {
        let mut store = MemoryStore::new(&model());
        for _ in 0..2 {
            let mut city = Record::new("City");
            city.set("name", text("Springfield"));
            store.save(city).expect("save");
        }
        store.flush().expect("flush");

        let mut criteria = Criteria::new();
        criteria.insert("name".to_string(), text("Springfield"));
        assert!(matches!(
            store.find_one_matching("City", &criteria),
            Err(StoreError::Ambiguous { matches: 2, .. })
        ));
        assert_eq!(
            store
                .find_all_matching("City", &criteria)
                .expect("all")
                .len(),
            2
        );
    }
}
