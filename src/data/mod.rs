//! Warehouse models and queries.

pub mod applications;
pub mod batch;
pub mod commencements;
pub mod completions;
pub mod models;
