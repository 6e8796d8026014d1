pub mod api;
pub mod core;
pub mod planner;
pub mod records;
pub mod store;
