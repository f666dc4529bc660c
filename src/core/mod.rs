pub mod graph;
pub mod links;
pub mod path;
pub mod records;
pub mod schema;

pub use crate::domain::model::{CableLink, CablingPath, Collection, Document, Side};
pub use crate::domain::ports::{ConfigProvider, EntityStore, Storage};
pub use crate::utils::error::Result;
