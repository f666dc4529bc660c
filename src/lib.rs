pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::client::ApiClient;
pub use adapters::http::{router, AppState};
pub use adapters::memory::MemoryStore;
pub use adapters::storage::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ServiceConfig;
pub use crate::core::{
    links::CableLinkManager, path::PathResolver, records::RecordService, schema::SchemaRegistry,
};
pub use utils::error::{InventoryError, Result};
