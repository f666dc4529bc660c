// Adapters layer: concrete implementations for external systems (storage, http, client).

pub mod client;
pub mod http;
pub mod memory;
pub mod storage;
