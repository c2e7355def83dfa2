pub mod api;
pub mod assistant;
