//! Job DTOs for inter-service communication

use serde::{Deserialize, Serialize};

/// Request to create a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// The kind of work, matching a registered service type
    pub job_type: String,

    /// Sub-kind of work within the type
    pub operation: String,

    #[serde(default)]
    pub arguments: Vec<String>,

    /// Opaque work descriptor carried along with the job
    #[serde(default)]
    pub payload: Option<String>,

    /// Create the job already in Running state, skipping the queue
    #[serde(default)]
    pub start: bool,
}

impl CreateJob {
    pub fn new(job_type: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            operation: operation.into(),
            arguments: Vec::new(),
            payload: None,
            start: false,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn started(mut self) -> Self {
        self.start = true;
        self
    }
}
