pub mod catalog;
pub mod engine;
pub mod memory;

pub use catalog::{CatalogFixture, NodeRow, PartitionRow, ShardRow};
pub use engine::{CatalogReader, CatalogWriter, ExtensionState};
pub use memory::{InMemoryCatalog, ScanCounts, ScanKind};
