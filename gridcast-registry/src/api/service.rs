//! Registration API Handlers
//!
//! HTTP endpoints for host and service registration management.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use gridcast_core::domain::registration::{ServiceRegistration, ServiceStatistics};
use gridcast_core::dto::service::{RegisterHost, RegisterService, SetMaintenance};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::registry::ServiceRegistry;

#[derive(Debug, Deserialize)]
pub struct UnregisterHost {
    pub host: String,
}

#[derive(Debug, Deserialize)]
pub struct UnregisterService {
    pub service_type: String,
    pub host: String,
}

/// Hosts are base URLs, so they travel in query strings and bodies rather
/// than path segments.
#[derive(Debug, Deserialize)]
pub struct ServiceQuery {
    pub host: Option<String>,
}

// =============================================================================
// Host Capacity
// =============================================================================

/// POST /hosts/register
pub async fn register_host(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(req): Json<RegisterHost>,
) -> ApiResult<StatusCode> {
    registry.register_host(&req.host, req.max_jobs).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /hosts/unregister
pub async fn unregister_host(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(req): Json<UnregisterHost>,
) -> ApiResult<StatusCode> {
    registry.unregister_host(&req.host).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Service Registrations
// =============================================================================

/// POST /services/register
pub async fn register_service(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(req): Json<RegisterService>,
) -> ApiResult<Json<ServiceRegistration>> {
    let registration = registry.register_service(req).await?;
    Ok(Json(registration))
}

/// POST /services/unregister
pub async fn unregister_service(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(req): Json<UnregisterService>,
) -> ApiResult<StatusCode> {
    registry
        .unregister_service(&req.service_type, &req.host)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /services/maintenance
pub async fn set_maintenance(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(req): Json<SetMaintenance>,
) -> ApiResult<StatusCode> {
    registry
        .set_maintenance(req.service_type.as_deref(), &req.host, req.maintenance)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /services/types/{service_type}
pub async fn list_by_type(
    State(registry): State<Arc<ServiceRegistry>>,
    Path(service_type): Path<String>,
) -> ApiResult<Json<Vec<ServiceRegistration>>> {
    let registrations = registry.registrations_by_type(&service_type).await?;
    Ok(Json(registrations))
}

/// GET /services/available/{service_type}
///
/// The load-ranked, dispatch-ready list.
pub async fn list_by_load(
    State(registry): State<Arc<ServiceRegistry>>,
    Path(service_type): Path<String>,
) -> ApiResult<Json<Vec<ServiceRegistration>>> {
    let registrations = registry.registrations_by_load(&service_type).await?;
    Ok(Json(registrations))
}

/// GET /services?host=...
///
/// Without the host filter this lists every registration in the cluster.
pub async fn list_services(
    State(registry): State<Arc<ServiceRegistry>>,
    Query(query): Query<ServiceQuery>,
) -> ApiResult<Json<Vec<ServiceRegistration>>> {
    let registrations = match &query.host {
        Some(host) => registry.registrations_by_host(host).await?,
        None => registry.registrations().await?,
    };
    Ok(Json(registrations))
}

/// GET /services/statistics
pub async fn statistics(
    State(registry): State<Arc<ServiceRegistry>>,
) -> ApiResult<Json<Vec<ServiceStatistics>>> {
    let statistics = registry.service_statistics().await?;
    Ok(Json(statistics))
}
