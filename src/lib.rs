pub mod browse;
pub mod catalog;
pub mod config;
pub mod favorites;
pub mod model;
pub mod store;
pub mod summary;
