//! Record sources feeding the importer.

mod delimited;
mod memory;
pub mod parser;

use graphseed_core::Entry;

use crate::errors::Result;

pub use delimited::{DelimitedSource, discover_sources};
pub use memory::MemorySource;
pub use parser::parse_cell;

/// Sequential, single-pass producer of entries for one target type.
pub trait RecordSource {
    /// Name of the type this source materializes.
    fn target_type_name(&self) -> &str;

    /// Field names in source order.
    fn field_names(&self) -> &[String];

    /// Next entry, or `None` once the source is exhausted.
    fn next_entry(&mut self) -> Result<Option<Entry>>;
}

impl<R: RecordSource + ?Sized> RecordSource for Box<R> {
    fn target_type_name(&self) -> &str {
        (**self).target_type_name()
    }

    fn field_names(&self) -> &[String] {
        (**self).field_names()
    }

    fn next_entry(&mut self) -> Result<Option<Entry>> {
        (**self).next_entry()
    }
}
