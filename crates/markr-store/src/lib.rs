//! markr-store: Result repositories and configuration.
//!
//! Implements the `ResultRepository` trait in memory, with optional JSON
//! snapshot persistence, and builds the configured repository for the CLI.

pub mod config;
pub mod memory;
pub mod snapshot;

pub use config::{
    create_repository, load_config, load_config_from, MarkrConfig, StoreBackend, StoreConfig,
};
pub use memory::MemoryRepository;
pub use snapshot::SnapshotFile;
