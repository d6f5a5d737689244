pub mod consolidation;
pub mod grid;
pub mod models;
pub mod summary;
