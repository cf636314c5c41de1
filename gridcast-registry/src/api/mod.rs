//! API Module
//!
//! HTTP endpoint layer for the registry. The call contract lives in
//! [`crate::registry::ServiceRegistry`]; these routes are a thin JSON
//! projection of it for the other service modules in the cluster.

pub mod error;
pub mod health;
pub mod job;
pub mod service;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::registry::ServiceRegistry;

/// Create the main API router with all endpoints
pub fn create_router(registry: Arc<ServiceRegistry>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Host capacity endpoints
        .route("/hosts/register", post(service::register_host))
        .route("/hosts/unregister", post(service::unregister_host))
        // Service registration endpoints
        .route("/services/register", post(service::register_service))
        .route("/services/unregister", post(service::unregister_service))
        .route("/services/maintenance", post(service::set_maintenance))
        .route("/services/types/{service_type}", get(service::list_by_type))
        .route(
            "/services/available/{service_type}",
            get(service::list_by_load),
        )
        .route("/services", get(service::list_services))
        .route("/services/statistics", get(service::statistics))
        // Job endpoints
        .route("/jobs", post(job::create_job))
        .route("/jobs", get(job::list_jobs))
        .route("/jobs/count", get(job::count_jobs))
        .route("/jobs/{id}", get(job::get_job))
        .route("/jobs/{id}", put(job::update_job))
        // Add state and middleware
        .with_state(registry)
        .layer(TraceLayer::new_for_http())
}
