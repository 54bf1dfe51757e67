//! Invocation response returned to the caller of an invocation.

use super::ingestion::{IngestionEngine, InvocationFailure, InvocationSummary};
use crate::source::KinesisEvent;
use serde::{Deserialize, Serialize};
use serde_json::json;

const SUCCESS_MESSAGE: &str = "Processing completed successfully";
const FAILURE_MESSAGE: &str = "Error processing records";

/// Status code plus a JSON-encoded body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    /// 200 on success, 500 on a flush failure
    pub status_code: u16,
    /// JSON document as a string
    pub body: String,
}

impl InvocationResponse {
    /// Response for a completed invocation.
    pub fn success(summary: &InvocationSummary) -> Self {
        let body = json!({
            "message": SUCCESS_MESSAGE,
            "recordsProcessed": summary.records_processed,
            "flushesPerformed": summary.flushes_performed,
            "malformedRecords": summary.malformed_records,
        });

        Self {
            status_code: 200,
            body: body.to_string(),
        }
    }

    /// Response for an invocation aborted by a flush failure.
    pub fn failure(failure: &InvocationFailure) -> Self {
        let body = json!({
            "error": failure.error.to_string(),
            "message": FAILURE_MESSAGE,
            "recordsProcessed": failure.records_processed,
            "flushesPerformed": failure.flushes_performed,
        });

        Self {
            status_code: 500,
            body: body.to_string(),
        }
    }

    /// Response for the outcome of [`IngestionEngine::run`].
    pub fn from_outcome(outcome: &Result<InvocationSummary, InvocationFailure>) -> Self {
        match outcome {
            Ok(summary) => Self::success(summary),
            Err(failure) => Self::failure(failure),
        }
    }

    /// Whether the invocation succeeded.
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Parse the body back into JSON.
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}

impl IngestionEngine {
    /// Run one invocation over `event` and build its response.
    pub async fn handle(&self, event: &KinesisEvent) -> InvocationResponse {
        InvocationResponse::from_outcome(&self.run(&event.records).await)
    }
}
