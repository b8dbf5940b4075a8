//! MTProto Proxy Harvester
//!
//! Continuously crawls a catalog of public sources, extracts MTProto proxy
//! endpoints with an ordered pattern catalog, deduplicates them by content hash
//! and checkpoints the result as JSON and plain text.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod scheduler;
pub mod shutdown;
pub mod stats;
pub mod store;

pub use checkpoint::CheckpointWriter;
pub use config::HarvestConfig;
pub use error::{ConfigError, FetchError, Rejection};
pub use proxy::*;
pub use scheduler::{HarvestContext, Harvester};
pub use stats::{Statistics, StatsSnapshot};
pub use store::{MergeOutcome, RecordStore};

/// Application result type
pub type Result<T> = anyhow::Result<T>;
