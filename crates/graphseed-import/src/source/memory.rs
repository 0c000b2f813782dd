use std::collections::VecDeque;

use graphseed_core::Entry;

use super::RecordSource;
use crate::errors::Result;

/// Source over entries held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    type_name: String,
    field_names: Vec<String>,
    entries: VecDeque<Entry>,
}

impl MemorySource {
    /// Field names are collected from the entries in first-seen order.
    pub fn new(type_name: impl Into<String>, entries: Vec<Entry>) -> Self {
        let mut field_names: Vec<String> = Vec::new();
        for entry in &entries {
            for (name, _) in entry.fields() {
                if !field_names.iter().any(|known| known == name) {
                    field_names.push(name.to_string());
                }
            }
        }

        Self {
            type_name: type_name.into(),
            field_names,
            entries: entries.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl RecordSource for MemorySource {
    fn target_type_name(&self) -> &str {
        &self.type_name
    }

    fn field_names(&self) -> &[String] {
        &self.field_names
    }

    fn next_entry(&mut self) -> Result<Option<Entry>> {
        Ok(self.entries.pop_front())
    }
}
