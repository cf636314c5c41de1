//! Gridcast Remote Dispatch
//!
//! Walks the load-ranked host list for a service type, attempting a request
//! against each host until one answers with an acceptable outcome. A host
//! that fails (network error, timeout, unacceptable status) is recorded and
//! the sweep moves on; one unreachable host never aborts the attempt.
//!
//! A sweep tries each host at most once and never waits between hosts. Any
//! retry policy across sweeps belongs to the caller.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gridcast_dispatch::{HttpTransport, ServiceDispatcher, ServiceRequest};
//! use gridcast_registry::ServiceRegistry;
//! use gridcast_registry::store::MemoryStore;
//!
//! # async fn example() -> gridcast_dispatch::Result<()> {
//! let registry = Arc::new(ServiceRegistry::new(Arc::new(MemoryStore::new())));
//! let transport = Arc::new(HttpTransport::new(Duration::from_secs(10)).unwrap());
//! let dispatcher = ServiceDispatcher::new(registry, transport);
//!
//! let outcome = dispatcher
//!     .dispatch_default("encode", &ServiceRequest::post("/jobs", "track=presenter"))
//!     .await?;
//! println!("accepted by {}", outcome.host);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod transport;

pub use error::{DispatchError, Result};
pub use transport::{
    HttpTransport, RequestMethod, ServiceRequest, Transport, TransportError, TransportResponse,
};

use std::collections::HashMap;
use std::sync::Arc;

use gridcast_registry::ServiceRegistry;

/// Acceptable outcomes when the caller does not supply any: plain success.
pub const DEFAULT_ACCEPTABLE: &[u16] = &[200];

/// Response selected by a dispatch sweep
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Host that produced the accepted response
    pub host: String,
    pub status: u16,
    pub body: String,
}

/// Sweeps requests across the cluster in load order
pub struct ServiceDispatcher {
    registry: Arc<ServiceRegistry>,
    transport: Arc<dyn Transport>,
}

impl ServiceDispatcher {
    pub fn new(registry: Arc<ServiceRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Dispatch with the default acceptable set ([`DEFAULT_ACCEPTABLE`]).
    pub async fn dispatch_default(
        &self,
        service_type: &str,
        request: &ServiceRequest,
    ) -> Result<DispatchOutcome> {
        self.dispatch(service_type, request, DEFAULT_ACCEPTABLE).await
    }

    /// Walk the load-ranked hosts for `service_type`, executing `request`
    /// against each until one responds with a status in `acceptable`.
    ///
    /// The first acceptable response wins and is returned immediately. Hosts
    /// that error or answer outside the acceptable set are recorded in the
    /// failure map; when the list runs out the sweep resolves to
    /// [`DispatchError::Exhausted`] carrying that map. Each attempt is
    /// bounded by the transport's timeout, and the returned future can be
    /// dropped between attempts to cancel the sweep.
    pub async fn dispatch(
        &self,
        service_type: &str,
        request: &ServiceRequest,
        acceptable: &[u16],
    ) -> Result<DispatchOutcome> {
        let candidates = self.registry.registrations_by_load(service_type).await?;

        if candidates.is_empty() {
            tracing::warn!("No active host to dispatch '{}' requests to", service_type);
        }

        let mut failures: HashMap<String, String> = HashMap::new();

        for registration in &candidates {
            let url = join_url(&registration.host, &registration.path, &request.path);
            tracing::debug!("Attempting '{}' request on {}", service_type, url);

            match self.transport.execute(&url, request).await {
                Ok(response) if acceptable.contains(&response.status) => {
                    tracing::debug!(
                        "Host {} accepted '{}' request with status {}",
                        registration.host,
                        service_type,
                        response.status
                    );
                    return Ok(DispatchOutcome {
                        host: registration.host.clone(),
                        status: response.status,
                        body: response.body,
                    });
                }
                Ok(response) => {
                    tracing::debug!(
                        "Host {} answered {} for '{}', trying next host",
                        registration.host,
                        response.status,
                        service_type
                    );
                    failures.insert(
                        registration.host.clone(),
                        format!("unacceptable status {}", response.status),
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        "Host {} failed '{}' request: {}",
                        registration.host,
                        service_type,
                        err
                    );
                    failures.insert(registration.host.clone(), err.to_string());
                }
            }
        }

        Err(DispatchError::Exhausted {
            service_type: service_type.to_string(),
            failures,
        })
    }
}

/// Join host base URL, registration path and request path with single
/// slashes.
fn join_url(host: &str, service_path: &str, request_path: &str) -> String {
    let mut url = host.trim_end_matches('/').to_string();
    for part in [service_path, request_path] {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            url.push('/');
            url.push_str(part);
        }
    }
    url
}
