use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use graphseed_core::{Record, TypeDef};
use serde::Serialize;
use tracing::debug;

use crate::errors::ImportError;
use crate::store::MemoryStore;

/// One exported file.
#[derive(Debug, Clone, Serialize)]
pub struct TypeExport {
    pub type_name: String,
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

/// Write rows of one type as `;`-delimited text, columns in declaration
/// order. References are written as their identifier.
pub fn write_type_csv(path: &Path, type_def: &TypeDef, rows: &[&Record]) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(counting);

    let header: Vec<&str> = type_def
        .properties
        .iter()
        .map(|property| property.name.as_str())
        .collect();
    writer.write_record(&header)?;

    for row in rows {
        let record: Vec<String> = type_def
            .properties
            .iter()
            .map(|property| {
                property
                    .get(row)
                    .map(|value| value.to_csv())
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

/// Export every managed type held by `store` into `dir`, one `<Type>.csv`
/// per type with rows.
pub fn export_memory_store(store: &MemoryStore, dir: &Path) -> Result<Vec<TypeExport>, ImportError> {
    std::fs::create_dir_all(dir)?;

    let mut exports = Vec::new();
    for type_def in store.model().types() {
        let rows = store.rows(&type_def.name);
        if rows.is_empty() {
            continue;
        }

        let path = dir.join(format!("{}.csv", type_def.name));
        let bytes = write_type_csv(&path, type_def, &rows)?;
        debug!(type_name = %type_def.name, rows = rows.len(), bytes, "type exported");
        exports.push(TypeExport {
            type_name: type_def.name.clone(),
            path,
            rows: rows.len(),
            bytes,
        });
    }
    Ok(exports)
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
