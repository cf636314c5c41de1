//! Service and host registration records
//!
//! A registration says "host H can perform job type T at path P". Hosts also
//! carry a capacity record used as a concurrency hint by operators.

use serde::{Deserialize, Serialize};

/// The record that a host can perform a given job type at a given path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    /// Identifier of the kind of work, e.g. "encode" or "distribute"
    pub service_type: String,

    /// Base URL of the host offering the service
    pub host: String,

    /// Routing suffix under which the service is reachable on the host
    pub path: String,

    /// Whether this service can originate new jobs, as opposed to only
    /// executing them
    pub job_producer: bool,

    /// Operator-set flag excluding the registration from load-based
    /// selection without deleting it
    pub maintenance: bool,
}

impl ServiceRegistration {
    /// Create a fresh registration, not in maintenance mode.
    pub fn new(
        service_type: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        job_producer: bool,
    ) -> Self {
        Self {
            service_type: service_type.into(),
            host: host.into(),
            path: path.into(),
            job_producer,
            maintenance: false,
        }
    }
}

/// A host's concurrency capacity hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRegistration {
    /// Base URL of the host
    pub host: String,

    /// Maximum number of jobs the host is willing to run concurrently
    pub max_jobs: i32,
}

/// Job figures for one service registration
///
/// Counts cover the registration's job type on its host; the mean times are
/// averaged over finished jobs and absent until any work has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatistics {
    pub registration: ServiceRegistration,

    /// Jobs currently waiting to run
    pub queued_jobs: u64,

    /// Jobs currently running
    pub running_jobs: u64,

    /// Mean milliseconds finished jobs spent queued
    pub mean_queue_time: Option<i64>,

    /// Mean milliseconds finished jobs spent running
    pub mean_run_time: Option<i64>,
}
