//! Bar, reference and group-membership stores.

pub mod csv_store;
pub mod memory;
pub mod parquet;
pub mod store;
pub mod synthetic;

pub use csv_store::CsvStore;
pub use memory::InMemoryStore;
pub use parquet::{ImportSummary, ParquetStore, PartitionMeta};
pub use store::{DataError, DataStore, WindowMap};
pub use synthetic::SyntheticUniverse;
