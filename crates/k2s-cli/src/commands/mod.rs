//! CLI command implementations.

pub mod audit;
pub mod ingest;
pub mod validate;
