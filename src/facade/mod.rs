pub mod service;

pub use service::{CacheStats, MetadataCacheService};
