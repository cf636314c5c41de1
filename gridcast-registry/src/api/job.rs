//! Job API Handlers
//!
//! HTTP endpoints for the job ledger.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use gridcast_core::domain::job::{Job, JobStatus};
use gridcast_core::dto::job::CreateJob;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::registry::ServiceRegistry;

#[derive(Debug, Deserialize)]
pub struct JobFilter {
    pub job_type: Option<String>,
    pub status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CountFilter {
    pub job_type: Option<String>,
    pub status: Option<JobStatus>,
    pub host: Option<String>,
}

/// An empty filter value wildcards the same way an absent one does.
fn non_empty(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().filter(|s| !s.is_empty())
}

/// POST /jobs
pub async fn create_job(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(req): Json<CreateJob>,
) -> ApiResult<Json<Job>> {
    let job = registry.create_job(req).await?;
    Ok(Json(job))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(registry): State<Arc<ServiceRegistry>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Job>> {
    let job = registry.get_job(id).await?;
    Ok(Json(job))
}

/// PUT /jobs/{id}
pub async fn update_job(
    State(registry): State<Arc<ServiceRegistry>>,
    Path(id): Path<i64>,
    Json(job): Json<Job>,
) -> ApiResult<Json<Job>> {
    if job.id != id {
        return Err(ApiError::BadRequest(format!(
            "job id {} does not match path id {}",
            job.id, id
        )));
    }

    let updated = registry.update_job(&job).await?;
    Ok(Json(updated))
}

/// GET /jobs?job_type=...&status=...
pub async fn list_jobs(
    State(registry): State<Arc<ServiceRegistry>>,
    Query(filter): Query<JobFilter>,
) -> ApiResult<Json<Vec<Job>>> {
    let jobs = registry
        .get_jobs(non_empty(&filter.job_type), filter.status)
        .await?;
    Ok(Json(jobs))
}

/// GET /jobs/count?job_type=...&status=...&host=...
pub async fn count_jobs(
    State(registry): State<Arc<ServiceRegistry>>,
    Query(filter): Query<CountFilter>,
) -> ApiResult<Json<serde_json::Value>> {
    let count = registry
        .count_jobs(
            non_empty(&filter.job_type),
            filter.status,
            non_empty(&filter.host),
        )
        .await?;
    Ok(Json(serde_json::json!({ "count": count })))
}
