//! Storage layer for the registry
//!
//! The registry is written against the [`RegistryStore`] contract rather
//! than a concrete database. Any store with transactional single-record
//! semantics and the query shapes below suffices; the store's own atomicity
//! is the only consistency primitive the registry relies on.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gridcast_core::domain::job::{Job, JobStatus};
use gridcast_core::domain::registration::{HostRegistration, ServiceRegistration};
use thiserror::Error;

/// Error raised when the durable store cannot complete an operation
#[derive(Debug, Error)]
#[error("store operation failed: {message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::with_source("database error", err)
    }
}

/// Grouped job figures for one `(job_type, host)` pair, backing the
/// per-registration statistics view
#[derive(Debug, Clone, Copy, Default)]
pub struct JobStats {
    pub queued: u64,
    pub running: u64,
    /// Mean milliseconds finished jobs spent queued
    pub mean_queue_time: Option<i64>,
    /// Mean milliseconds finished jobs spent running
    pub mean_run_time: Option<i64>,
}

/// Fields of a job that has not yet been assigned an id
///
/// The store allocates the id so that ids stay unique and monotonic across
/// every node sharing the store.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub operation: String,
    pub arguments: Vec<String>,
    pub payload: Option<String>,
    pub status: JobStatus,
    pub host: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_started: Option<DateTime<Utc>>,
}

/// Abstract durable store for registrations and jobs
///
/// All filter parameters follow the same convention: `None` matches
/// anything.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    // Host capacity records

    async fn upsert_host(&self, host: &HostRegistration) -> Result<(), StoreError>;

    async fn remove_host(&self, host: &str) -> Result<(), StoreError>;

    async fn get_host(&self, host: &str) -> Result<Option<HostRegistration>, StoreError>;

    // Service registrations

    /// Create or overwrite the registration for its `(service_type, host)`
    /// pair. An overwrite keeps the pair's original registration order.
    async fn put_registration(&self, registration: &ServiceRegistration)
    -> Result<(), StoreError>;

    async fn get_registration(
        &self,
        service_type: &str,
        host: &str,
    ) -> Result<Option<ServiceRegistration>, StoreError>;

    async fn remove_registration(&self, service_type: &str, host: &str)
    -> Result<(), StoreError>;

    async fn remove_registrations_by_host(&self, host: &str) -> Result<(), StoreError>;

    /// All registrations for a type, in registration order, maintenance
    /// entries included.
    async fn registrations_by_type(
        &self,
        service_type: &str,
    ) -> Result<Vec<ServiceRegistration>, StoreError>;

    async fn registrations_by_host(
        &self,
        host: &str,
    ) -> Result<Vec<ServiceRegistration>, StoreError>;

    /// Every registration in the store, in registration order.
    async fn all_registrations(&self) -> Result<Vec<ServiceRegistration>, StoreError>;

    // Jobs

    /// Persist a new job, assigning the next monotonic id.
    async fn insert_job(&self, job: NewJob) -> Result<Job, StoreError>;

    /// Overwrite the stored job with the given state. Returns false when the
    /// id is unknown.
    async fn update_job(&self, job: &Job) -> Result<bool, StoreError>;

    async fn get_job(&self, id: i64) -> Result<Option<Job>, StoreError>;

    async fn find_jobs(
        &self,
        job_type: Option<&str>,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, StoreError>;

    async fn count_jobs(
        &self,
        job_type: Option<&str>,
        status: Option<JobStatus>,
        host: Option<&str>,
    ) -> Result<u64, StoreError>;

    /// Per-host count of jobs of the given type in any of the given
    /// statuses. Hosts with no matching jobs are absent from the map.
    async fn job_counts_by_host(
        &self,
        job_type: &str,
        statuses: &[JobStatus],
    ) -> Result<HashMap<String, u64>, StoreError>;

    /// Grouped job figures per `(job_type, host)` pair. Pairs with no
    /// host-attributed jobs at all are absent from the map.
    async fn job_statistics(&self) -> Result<HashMap<(String, String), JobStats>, StoreError>;
}
