//! Hierarchical record import for graphseed.
//!
//! Record sources yield entries of nested text; the [`Importer`] maps them
//! onto the type model, resolves lookups and associations against a
//! [`DataStore`] and persists each type after the types it depends on.

pub mod engine;
pub mod errors;
mod expression;
mod lookup;
pub mod model;
pub mod output;
pub mod owner;
mod populate;
pub mod source;
pub mod store;

pub use engine::Importer;
pub use errors::ImportError;
pub use model::{DEFAULT_FLUSH_INTERVAL, GenerationLedger, ImportOptions, ImportReport, TypeReport};
pub use output::{TypeExport, export_memory_store, write_type_csv};
pub use owner::{OwnerStack, PathSegment, PendingAction};
pub use source::{DelimitedSource, MemorySource, RecordSource, discover_sources, parse_cell};
pub use store::{DataStore, MemoryStore, StoreError, StoreOperation};
