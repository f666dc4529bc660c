// Domain layer: document model, typed cabling views and ports (interfaces).

pub mod model;
pub mod ports;
