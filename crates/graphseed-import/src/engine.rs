use std::collections::HashMap;
use std::time::Instant;

use graphseed_core::{Entry, Formats, Record, TypeDef, TypeModel};
use graphseed_plan::{RuleSet, SchemaProvider};
use tracing::{debug, info, warn};

use crate::errors::{ImportError, Result};
use crate::model::{GenerationLedger, ImportOptions, TypeReport};
use crate::owner::{Cursor, OwnerStack};
use crate::source::RecordSource;
use crate::store::DataStore;

/// Materializes record sources into a store, one type at a time and in
/// dependency order.
///
/// All run state lives here; an importer must not be shared between
/// concurrent callers.
pub struct Importer<'a, S: DataStore> {
    pub(crate) model: &'a TypeModel,
    pub(crate) schema: &'a dyn SchemaProvider,
    pub(crate) store: S,
    pub(crate) formats: Formats,
    options: ImportOptions,
    sources: HashMap<String, Box<dyn RecordSource + 'a>>,
    registration_order: Vec<String>,
    ledger: GenerationLedger,
    in_progress: Vec<String>,
    pub(crate) owners: OwnerStack,
    saves: u64,
}

impl<'a, S: DataStore> Importer<'a, S> {
    pub fn new(model: &'a TypeModel, schema: &'a dyn SchemaProvider, store: S) -> Self {
        let mut options = ImportOptions::default();
        if let Some(flush_interval) = schema.flush_interval() {
            options.flush_interval = flush_interval;
        }

        Self {
            model,
            schema,
            store,
            formats: Formats::new(schema.date_format(), schema.date_time_format()),
            options,
            sources: HashMap::new(),
            registration_order: Vec::new(),
            ledger: GenerationLedger::default(),
            in_progress: Vec::new(),
            owners: OwnerStack::default(),
            saves: 0,
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Register the source for the type it names.
    pub fn register<R>(&mut self, source: R) -> Result<()>
    where
        R: RecordSource + 'a,
    {
        let type_name = source.target_type_name().to_string();
        let type_def = self
            .model
            .type_def(&type_name)
            .ok_or_else(|| ImportError::UnknownType(type_name.clone()))?;

        if self.registration_order.contains(&type_name) {
            return Err(ImportError::Configuration(format!(
                "a record source for type '{type_name}' is already registered"
            )));
        }

        for field in source.field_names() {
            if type_def.property(field).is_none() {
                warn!(
                    type_name = %type_name,
                    field = %field,
                    "source field has no matching property"
                );
            }
        }

        debug!(type_name = %type_name, fields = source.field_names().len(), "source registered");
        self.registration_order.push(type_name.clone());
        self.sources.insert(type_name, Box::new(source));
        Ok(())
    }

    /// Types with a registered source, in registration order.
    pub fn registered_types(&self) -> &[String] {
        &self.registration_order
    }

    /// Generate every registered type that is not complete yet.
    pub fn generate_all(&mut self) -> Result<&GenerationLedger> {
        let order = self.registration_order.clone();
        for type_name in &order {
            if !self.ledger.is_complete(type_name) {
                self.generate_for(type_name)?;
            }
        }
        Ok(&self.ledger)
    }

    /// Generate `type_name` after its dependencies. Completed and unmanaged
    /// types return immediately.
    pub fn generate_for(&mut self, type_name: &str) -> Result<()> {
        self.generate_type(type_name)
            .map_err(|source| ImportError::Generation {
                type_name: type_name.to_string(),
                source: Box::new(source),
            })
    }

    pub fn ledger(&self) -> &GenerationLedger {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Saves performed so far, re-saves included.
    pub fn saves(&self) -> u64 {
        self.saves
    }

    /// Type definition with the model's lifetime.
    pub(crate) fn type_def(&self, type_name: &str) -> Result<&'a TypeDef> {
        let model = self.model;
        model
            .type_def(type_name)
            .ok_or_else(|| ImportError::UnknownType(type_name.to_string()))
    }

    /// Whether the store persists `type_name` on its own.
    pub(crate) fn is_managed(&self, type_name: &str) -> bool {
        self.store.is_managed(type_name)
    }

    pub(crate) fn rules(&self, type_name: &str) -> &'a RuleSet {
        let schema = self.schema;
        schema.property_rules(type_name)
    }

    /// Make rows of `type_name` visible to lookups. A type that is being
    /// generated right now is flushed instead of recursed into.
    pub(crate) fn ensure_generated(&mut self, type_name: &str) -> Result<()> {
        if self.in_progress.iter().any(|name| name == type_name) {
            debug!(type_name = %type_name, "type in progress; flushing saved rows");
            self.store.flush()?;
            return Ok(());
        }
        self.generate_type(type_name)
    }

    fn generate_type(&mut self, type_name: &str) -> Result<()> {
        let type_def = self.type_def(type_name)?;
        if !self.is_managed(type_name) || self.ledger.is_complete(type_name) {
            return Ok(());
        }

        if let Some(pos) = self.in_progress.iter().position(|name| name == type_name) {
            let mut path = self.in_progress[pos..].to_vec();
            path.push(type_name.to_string());
            return Err(ImportError::CyclicDependency(path));
        }

        self.in_progress.push(type_name.to_string());
        let result = self.generate_in_progress(type_def);
        self.in_progress.pop();
        result
    }

    fn generate_in_progress(&mut self, type_def: &'a TypeDef) -> Result<()> {
        let schema = self.schema;
        for dependency in schema.dependencies(&type_def.name) {
            self.generate_type(dependency)?;
        }

        let mut source = self
            .sources
            .remove(&type_def.name)
            .ok_or_else(|| ImportError::UnknownProvider(type_def.name.clone()))?;

        let start = Instant::now();
        info!(type_name = %type_def.name, "generating type");

        let rules = self.rules(&type_def.name);
        let mut records = 0_u64;
        while let Some(entry) = source.next_entry()? {
            self.materialize(type_def, &entry, rules)?;
            records += 1;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        self.ledger.complete(TypeReport {
            type_name: type_def.name.clone(),
            records,
            duration_ms,
        });
        info!(
            type_name = %type_def.name,
            records,
            duration_ms,
            "type generated"
        );
        Ok(())
    }

    /// Build, save and finish one managed record: populate it under its own
    /// owner frame, save it, then run the actions it deferred.
    pub(crate) fn materialize(
        &mut self,
        type_def: &'a TypeDef,
        entry: &Entry,
        rules: &'a RuleSet,
    ) -> Result<Record> {
        let mut record = Record::new(type_def.name.clone());

        self.owners.push(&type_def.name);
        let populated = self.populate(&mut record, type_def, entry, rules, &Cursor::root());
        let frame = self.owners.pop();
        populated?;

        let mut saved = self.save(record)?;
        if let Some(frame) = frame {
            for action in &frame.pending {
                saved = self.apply_pending(saved, action)?;
            }
        }
        Ok(saved)
    }

    pub(crate) fn save(&mut self, record: Record) -> Result<Record> {
        let saved = self.store.save(record)?;
        self.saves += 1;

        let interval = self.options.flush_interval.max(1) as u64;
        if self.saves % interval == 0 {
            debug!(saves = self.saves, "periodic flush");
            self.store.flush()?;
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use graphseed_core::{Criteria, EntryBuilder, ScalarKind, Value};
    use graphseed_plan::ImportPlan;

    use super::*;
    use crate::source::MemorySource;
    use crate::store::{MemoryStore, StoreError, StoreOperation};

    /// Memory store that owns no `Tag` rows and keys tags by long ids.
    struct ForeignTags(MemoryStore);

    impl DataStore for ForeignTags {
        fn find_by_id(
            &mut self,
            type_name: &str,
            id: &Value,
        ) -> std::result::Result<Option<Record>, StoreError> {
            self.0.find_by_id(type_name, id)
        }

        fn find_all_matching(
            &mut self,
            type_name: &str,
            criteria: &Criteria,
        ) -> std::result::Result<Vec<Record>, StoreError> {
            self.0.find_all_matching(type_name, criteria)
        }

        fn save(&mut self, record: Record) -> std::result::Result<Record, StoreError> {
            self.0.save(record)
        }

        fn flush(&mut self) -> std::result::Result<(), StoreError> {
            self.0.flush()
        }

        fn is_managed(&self, type_name: &str) -> bool {
            type_name != "Tag" && self.0.is_managed(type_name)
        }

        fn identifier_kind(&self, type_name: &str) -> Option<ScalarKind> {
            match type_name {
                "Tag" => Some(ScalarKind::Long),
                other => self.0.identifier_kind(other),
            }
        }
    }

    fn model() -> TypeModel {
        TypeModel::from_json_str(
            r#"{
              "types": [
                {
                  "name": "Tag",
                  "identifier": { "property": "id", "kind": "int" },
                  "properties": [ { "name": "label", "kind": { "scalar": "text" } } ]
                },
                { "name": "Note", "managed": false }
              ]
            }"#,
        )
        .expect("model")
    }

    fn tags(count: usize) -> MemorySource {
        let entries = (0..count)
            .map(|idx| EntryBuilder::new().scalar("label", format!("tag-{idx}")).build())
            .collect();
        MemorySource::new("Tag", entries)
    }

    #[test]
    fn rejects_unknown_and_duplicate_sources() {
        let model = model();
        let plan = ImportPlan::default();
        let mut importer = Importer::new(&model, &plan, MemoryStore::new(&model));

        let err = importer
            .register(MemorySource::new("Street", Vec::new()))
            .expect_err("unknown type");
        assert!(matches!(err, ImportError::UnknownType(name) if name == "Street"));

        importer.register(tags(1)).expect("register");
        let err = importer.register(tags(1)).expect_err("duplicate");
        assert!(matches!(err, ImportError::Configuration(_)));
    }

    #[test]
    fn flushes_after_interval() {
        let model = model();
        let plan = ImportPlan {
            flush_interval: Some(2),
            ..ImportPlan::default()
        };
        let mut importer = Importer::new(&model, &plan, MemoryStore::new(&model));
        importer.register(tags(5)).expect("register");
        importer.generate_all().expect("generate");

        let flushes = importer
            .store()
            .journal()
            .iter()
            .filter(|op| matches!(op, StoreOperation::Flush))
            .count();
        assert_eq!(flushes, 2);
        assert_eq!(importer.saves(), 5);
        assert_eq!(importer.ledger().report("Tag").map(|r| r.records), Some(5));
    }

    #[test]
    fn unmanaged_types_are_skipped() {
        let model = model();
        let plan = ImportPlan::default();
        let mut importer = Importer::new(&model, &plan, MemoryStore::new(&model));
        importer.generate_for("Note").expect("unmanaged type");
        assert!(importer.store().journal().is_empty());
        assert!(!importer.ledger().is_complete("Note"));
    }

    #[test]
    fn store_decides_which_types_are_generated() {
        let model = model();
        let plan = ImportPlan::default();
        let mut importer = Importer::new(&model, &plan, ForeignTags(MemoryStore::new(&model)));
        importer.register(tags(3)).expect("register");

        importer.generate_all().expect("generate");
        assert!(!importer.ledger().is_complete("Tag"));
        assert_eq!(importer.saves(), 0);
        assert!(importer.store().0.journal().is_empty());

        let tag = importer.type_def("Tag").expect("tag type");
        assert_eq!(importer.parse_identifier(tag, "7").expect("id"), Value::Long(7));
    }

    #[test]
    fn missing_source_is_reported_with_type_context() {
        let model = model();
        let plan = ImportPlan::default();
        let mut importer = Importer::new(&model, &plan, MemoryStore::new(&model));
        let err = importer.generate_for("Tag").expect_err("no source");
        assert!(matches!(
            err,
            ImportError::Generation { ref type_name, .. } if type_name == "Tag"
        ));
        assert!(matches!(err.root_cause(), ImportError::UnknownProvider(name) if name == "Tag"));
        assert!(importer.owners.is_empty());
    }
}
