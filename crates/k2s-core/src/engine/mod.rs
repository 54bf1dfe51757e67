//! Invocation engine: the ingestion loop, flush, and the invocation response.

mod ingestion;
mod response;

pub use ingestion::{FlushReport, IngestionEngine, InvocationFailure, InvocationSummary};
pub use response::InvocationResponse;
