//! Registration DTOs for inter-service communication

use serde::{Deserialize, Serialize};

/// Request to create or refresh a service registration
///
/// Re-registering an existing `(service_type, host)` pair overwrites the
/// path and producer flag but preserves the registration's maintenance mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterService {
    pub service_type: String,

    /// Base URL of the host offering the service
    pub host: String,

    /// Routing suffix under which the service is reachable
    pub path: String,

    /// Whether this service can originate new jobs
    #[serde(default)]
    pub job_producer: bool,
}

/// Request to record a host's concurrency capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterHost {
    pub host: String,
    pub max_jobs: i32,
}

/// Request to flip maintenance mode on a host's registrations
///
/// When `service_type` is absent the flag applies to every registration on
/// the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetMaintenance {
    #[serde(default)]
    pub service_type: Option<String>,
    pub host: String,
    pub maintenance: bool,
}
