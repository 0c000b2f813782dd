use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use graphseed_core::Entry;
use tracing::{debug, warn};

use super::RecordSource;
use super::parser::parse_cell;
use crate::errors::{ImportError, Result};

const DELIMITER: u8 = b';';
const ESCAPE: u8 = b'\\';

/// `;`-separated source whose first line names the fields.
///
/// The quote character is `'` when the header line starts with it and `"`
/// otherwise. Cells starting with `{` are parsed as nested blocks.
pub struct DelimitedSource<R: Read> {
    type_name: String,
    headers: Vec<String>,
    reader: csv::Reader<BufReader<R>>,
    record: csv::StringRecord,
}

impl DelimitedSource<File> {
    /// Open `path`; the file stem names the target type.
    pub fn open(path: &Path) -> Result<Self> {
        let type_name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                ImportError::Configuration(format!(
                    "cannot derive a type name from {}",
                    path.display()
                ))
            })?
            .to_string();
        let file = File::open(path)?;
        Self::from_reader(type_name, file)
    }
}

impl<R: Read> DelimitedSource<R> {
    pub fn from_reader(type_name: impl Into<String>, reader: R) -> Result<Self> {
        let mut buffered = BufReader::new(reader);
        let quote = detect_quote(&mut buffered)?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .quote(quote)
            .double_quote(false)
            .escape(Some(ESCAPE))
            .flexible(true)
            .has_headers(true)
            .from_reader(buffered);

        let headers = reader
            .headers()?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();

        Ok(Self {
            type_name: type_name.into(),
            headers,
            reader,
            record: csv::StringRecord::new(),
        })
    }
}

impl<R: Read> RecordSource for DelimitedSource<R> {
    fn target_type_name(&self) -> &str {
        &self.type_name
    }

    fn field_names(&self) -> &[String] {
        &self.headers
    }

    fn next_entry(&mut self) -> Result<Option<Entry>> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        let line = self.record.position().map(|pos| pos.line()).unwrap_or(0);

        let mut fields = Vec::with_capacity(self.headers.len());
        for (header, cell) in self.headers.iter().zip(self.record.iter()) {
            let node = parse_cell(cell).map_err(|err| {
                warn!(
                    type_name = %self.type_name,
                    line,
                    field = %header,
                    error = %err,
                    "malformed record text"
                );
                ImportError::Parse(err)
            })?;
            fields.push((header.clone(), node));
        }

        if self.record.len() > self.headers.len() {
            debug!(
                type_name = %self.type_name,
                line,
                extra = self.record.len() - self.headers.len(),
                "ignoring cells without a header"
            );
        }

        Ok(Some(Entry::from_fields(fields)))
    }
}

fn detect_quote<R: Read>(reader: &mut BufReader<R>) -> Result<u8> {
    let buffer = reader.fill_buf()?;
    Ok(match buffer.first() {
        Some(b'\'') => b'\'',
        _ => b'"',
    })
}

/// Open one source per `*.csv` file in `dir`, sorted by file name.
pub fn discover_sources(dir: &Path) -> Result<Vec<DelimitedSource<File>>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    paths.iter().map(|path| DelimitedSource::open(path)).collect()
}
