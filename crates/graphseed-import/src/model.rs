use serde::{Deserialize, Serialize};

/// Saves between opportunistic flushes when the plan sets none.
pub const DEFAULT_FLUSH_INTERVAL: usize = 10;

/// Options for the importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Flush the store after this many saves.
    pub flush_interval: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Summary of a generated type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeReport {
    pub type_name: String,
    pub records: u64,
    pub duration_ms: u64,
}

/// Completed types of one importer, in completion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationLedger {
    completed: Vec<TypeReport>,
}

impl GenerationLedger {
    pub fn is_complete(&self, type_name: &str) -> bool {
        self.completed
            .iter()
            .any(|report| report.type_name == type_name)
    }

    pub(crate) fn complete(&mut self, report: TypeReport) {
        if !self.is_complete(&report.type_name) {
            self.completed.push(report);
        }
    }

    pub fn report(&self, type_name: &str) -> Option<&TypeReport> {
        self.completed
            .iter()
            .find(|report| report.type_name == type_name)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.completed.iter().map(|report| report.type_name.as_str())
    }

    pub fn reports(&self) -> &[TypeReport] {
        &self.completed
    }

    pub fn total_records(&self) -> u64 {
        self.completed.iter().map(|report| report.records).sum()
    }
}

/// Report for an import run, written by harnesses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub types: Vec<TypeReport>,
    pub records_total: u64,
    pub saves: u64,
    pub flushes: u64,
    pub duration_ms: u64,
    pub bytes_written: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportReport {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            types: Vec::new(),
            records_total: 0,
            saves: 0,
            flushes: 0,
            duration_ms: 0,
            bytes_written: 0,
            error: None,
        }
    }

    pub fn record_ledger(&mut self, ledger: &GenerationLedger) {
        self.types = ledger.reports().to_vec();
        self.records_total = ledger.total_records();
    }
}
