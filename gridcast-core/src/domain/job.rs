//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of dispatched work.
///
/// Structure shared between the registry (persists) and the services that
/// report progress on the work. The registry is a passive ledger: callers
/// drive jobs through their lifecycle via `update_job`, the registry enforces
/// legality and stamps the timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique, monotonically assigned by the store.
    pub id: i64,
    /// The kind of work, matching a service type.
    pub job_type: String,
    /// Sub-kind of work within the type.
    pub operation: String,
    pub arguments: Vec<String>,
    /// Opaque work descriptor, e.g. a serialized media package.
    pub payload: Option<String>,
    pub status: JobStatus,
    /// Base URL of the host the job was dispatched to, once assigned.
    pub host: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_started: Option<DateTime<Utc>>,
    pub date_completed: Option<DateTime<Utc>>,
    /// Milliseconds spent queued, stamped when the job enters Running.
    pub queue_time: Option<i64>,
    /// Milliseconds spent running, stamped when the job completes.
    pub run_time: Option<i64>,
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    /// Whether a job may move from `self` into `next`.
    ///
    /// Queued -> Running -> {Finished, Failed}. Terminal states admit no
    /// exit, and a running job cannot be re-queued.
    pub fn can_transition(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Finished)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    /// Finished and Failed are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Running => "Running",
            JobStatus::Finished => "Finished",
            JobStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "Queued" => Some(JobStatus::Queued),
            "Running" => Some(JobStatus::Running),
            "Finished" => Some(JobStatus::Finished),
            "Failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
