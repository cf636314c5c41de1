//! Postgres store
//!
//! Handles all database operations behind the [`RegistryStore`] contract.
//! Every operation is a single statement, so the database's per-statement
//! atomicity is all the registry leans on; nodes sharing the database share
//! the registrations and the job ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use gridcast_core::domain::job::{Job, JobStatus};
use gridcast_core::domain::registration::{HostRegistration, ServiceRegistration};
use sqlx::PgPool;

use super::{JobStats, NewJob, RegistryStore, StoreError};

/// Postgres implementation of [`RegistryStore`]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistryStore for PgStore {
    async fn upsert_host(&self, host: &HostRegistration) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO hosts (host, max_jobs)
            VALUES ($1, $2)
            ON CONFLICT (host) DO UPDATE SET max_jobs = EXCLUDED.max_jobs
            "#,
        )
        .bind(&host.host)
        .bind(host.max_jobs)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_host(&self, host: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM hosts WHERE host = $1")
            .bind(host)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_host(&self, host: &str) -> Result<Option<HostRegistration>, StoreError> {
        let row = sqlx::query_as::<_, HostRow>(
            "SELECT host, max_jobs FROM hosts WHERE host = $1",
        )
        .bind(host)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn put_registration(
        &self,
        registration: &ServiceRegistration,
    ) -> Result<(), StoreError> {
        // The serial id column records registration order; ON CONFLICT keeps
        // the original row, and with it the original order.
        sqlx::query(
            r#"
            INSERT INTO service_registrations (service_type, host, path, job_producer, maintenance)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (service_type, host) DO UPDATE SET
                path = EXCLUDED.path,
                job_producer = EXCLUDED.job_producer,
                maintenance = EXCLUDED.maintenance
            "#,
        )
        .bind(&registration.service_type)
        .bind(&registration.host)
        .bind(&registration.path)
        .bind(registration.job_producer)
        .bind(registration.maintenance)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_registration(
        &self,
        service_type: &str,
        host: &str,
    ) -> Result<Option<ServiceRegistration>, StoreError> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT service_type, host, path, job_producer, maintenance
            FROM service_registrations
            WHERE service_type = $1 AND host = $2
            "#,
        )
        .bind(service_type)
        .bind(host)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn remove_registration(
        &self,
        service_type: &str,
        host: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM service_registrations WHERE service_type = $1 AND host = $2")
            .bind(service_type)
            .bind(host)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove_registrations_by_host(&self, host: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM service_registrations WHERE host = $1")
            .bind(host)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn registrations_by_type(
        &self,
        service_type: &str,
    ) -> Result<Vec<ServiceRegistration>, StoreError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT service_type, host, path, job_producer, maintenance
            FROM service_registrations
            WHERE service_type = $1
            ORDER BY id ASC
            "#,
        )
        .bind(service_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn registrations_by_host(
        &self,
        host: &str,
    ) -> Result<Vec<ServiceRegistration>, StoreError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT service_type, host, path, job_producer, maintenance
            FROM service_registrations
            WHERE host = $1
            ORDER BY id ASC
            "#,
        )
        .bind(host)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn all_registrations(&self) -> Result<Vec<ServiceRegistration>, StoreError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT service_type, host, path, job_producer, maintenance
            FROM service_registrations
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn insert_job(&self, job: NewJob) -> Result<Job, StoreError> {
        let arguments = serde_json::to_value(&job.arguments)
            .map_err(|e| StoreError::with_source("failed to encode job arguments", e))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (job_type, operation, arguments, payload, status, host,
                              date_created, date_started)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&job.job_type)
        .bind(&job.operation)
        .bind(arguments)
        .bind(&job.payload)
        .bind(job.status.as_str())
        .bind(&job.host)
        .bind(job.date_created)
        .bind(job.date_started)
        .fetch_one(&self.pool)
        .await?;

        Ok(Job {
            id,
            job_type: job.job_type,
            operation: job.operation,
            arguments: job.arguments,
            payload: job.payload,
            status: job.status,
            host: job.host,
            date_created: job.date_created,
            date_started: job.date_started,
            date_completed: None,
            queue_time: None,
            run_time: None,
        })
    }

    async fn update_job(&self, job: &Job) -> Result<bool, StoreError> {
        let arguments = serde_json::to_value(&job.arguments)
            .map_err(|e| StoreError::with_source("failed to encode job arguments", e))?;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET job_type = $1, operation = $2, arguments = $3, payload = $4, status = $5,
                host = $6, date_started = $7, date_completed = $8, queue_time = $9,
                run_time = $10
            WHERE id = $11
            "#,
        )
        .bind(&job.job_type)
        .bind(&job.operation)
        .bind(arguments)
        .bind(&job.payload)
        .bind(job.status.as_str())
        .bind(&job.host)
        .bind(job.date_started)
        .bind(job.date_completed)
        .bind(job.queue_time)
        .bind(job.run_time)
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_job(&self, id: i64) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_type, operation, arguments, payload, status, host,
                   date_created, date_started, date_completed, queue_time, run_time
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn find_jobs(
        &self,
        job_type: Option<&str>,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_type, operation, arguments, payload, status, host,
                   date_created, date_started, date_completed, queue_time, run_time
            FROM jobs
            WHERE ($1::text IS NULL OR job_type = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY id ASC
            "#,
        )
        .bind(job_type)
        .bind(status.map(JobStatus::as_str))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn count_jobs(
        &self,
        job_type: Option<&str>,
        status: Option<JobStatus>,
        host: Option<&str>,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM jobs
            WHERE ($1::text IS NULL OR job_type = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR host = $3)
            "#,
        )
        .bind(job_type)
        .bind(status.map(JobStatus::as_str))
        .bind(host)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn job_counts_by_host(
        &self,
        job_type: &str,
        statuses: &[JobStatus],
    ) -> Result<HashMap<String, u64>, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT host, COUNT(*)
            FROM jobs
            WHERE job_type = $1 AND status = ANY($2) AND host IS NOT NULL
            GROUP BY host
            "#,
        )
        .bind(job_type)
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(host, count)| (host, count as u64))
            .collect())
    }

    async fn job_statistics(&self) -> Result<HashMap<(String, String), JobStats>, StoreError> {
        let rows = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT job_type, host,
                   COUNT(*) FILTER (WHERE status = $1) AS queued,
                   COUNT(*) FILTER (WHERE status = $2) AS running,
                   CAST(AVG(queue_time) FILTER (WHERE status = $3) AS BIGINT) AS mean_queue_time,
                   CAST(AVG(run_time) FILTER (WHERE status = $3) AS BIGINT) AS mean_run_time
            FROM jobs
            WHERE host IS NOT NULL
            GROUP BY job_type, host
            "#,
        )
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::Running.as_str())
        .bind(JobStatus::Finished.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let stats = JobStats {
                    queued: r.queued as u64,
                    running: r.running as u64,
                    mean_queue_time: r.mean_queue_time,
                    mean_run_time: r.mean_run_time,
                };
                ((r.job_type, r.host), stats)
            })
            .collect())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct HostRow {
    host: String,
    max_jobs: i32,
}

impl From<HostRow> for HostRegistration {
    fn from(row: HostRow) -> Self {
        HostRegistration {
            host: row.host,
            max_jobs: row.max_jobs,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    service_type: String,
    host: String,
    path: String,
    job_producer: bool,
    maintenance: bool,
}

impl From<RegistrationRow> for ServiceRegistration {
    fn from(row: RegistrationRow) -> Self {
        ServiceRegistration {
            service_type: row.service_type,
            host: row.host,
            path: row.path,
            job_producer: row.job_producer,
            maintenance: row.maintenance,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    job_type: String,
    host: String,
    queued: i64,
    running: i64,
    mean_queue_time: Option<i64>,
    mean_run_time: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    job_type: String,
    operation: String,
    arguments: serde_json::Value,
    payload: Option<String>,
    status: String,
    host: Option<String>,
    date_created: chrono::DateTime<chrono::Utc>,
    date_started: Option<chrono::DateTime<chrono::Utc>>,
    date_completed: Option<chrono::DateTime<chrono::Utc>>,
    queue_time: Option<i64>,
    run_time: Option<i64>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, StoreError> {
        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| StoreError::new(format!("unknown job status '{}'", row.status)))?;
        let arguments = serde_json::from_value(row.arguments)
            .map_err(|e| StoreError::with_source("failed to decode job arguments", e))?;

        Ok(Job {
            id: row.id,
            job_type: row.job_type,
            operation: row.operation,
            arguments,
            payload: row.payload,
            status,
            host: row.host,
            date_created: row.date_created,
            date_started: row.date_started,
            date_completed: row.date_completed,
            queue_time: row.queue_time,
            run_time: row.run_time,
        })
    }
}
