pub mod csv;

pub use self::csv::{TypeExport, export_memory_store, write_type_csv};
