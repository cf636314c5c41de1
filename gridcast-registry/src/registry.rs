//! Registry core
//!
//! Registration and unregistration of hosts and services, maintenance-mode
//! toggling, the job ledger, and load-ranked host selection. The registry is
//! a passive ledger: it never drives jobs through their lifecycle itself,
//! it records the transitions callers report and enforces their legality.

use std::sync::Arc;

use chrono::Utc;
use gridcast_core::domain::job::{Job, JobStatus};
use gridcast_core::domain::registration::{
    HostRegistration, ServiceRegistration, ServiceStatistics,
};
use gridcast_core::dto::job::CreateJob;
use gridcast_core::dto::service::RegisterService;

use crate::error::RegistryError;
use crate::load;
use crate::store::{NewJob, RegistryStore};

/// Job statuses that influence how load balancing is calculated
const LOAD_BEARING_STATUSES: [JobStatus; 2] = [JobStatus::Queued, JobStatus::Running];

/// The registry core, built over an abstract durable store
pub struct ServiceRegistry {
    store: Arc<dyn RegistryStore>,
}

impl ServiceRegistry {
    /// Create a registry over the given store. All dependencies come in
    /// here; there is no ambient container.
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // Hosts
    // =========================================================================

    /// Record a host's capacity hint. Idempotent: re-registering overwrites
    /// the capacity value.
    pub async fn register_host(&self, host: &str, max_jobs: i32) -> Result<(), RegistryError> {
        if host.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "host must not be blank".to_string(),
            ));
        }

        self.store
            .upsert_host(&HostRegistration {
                host: host.to_string(),
                max_jobs,
            })
            .await?;

        tracing::info!("Registered host {} with capacity {}", host, max_jobs);
        Ok(())
    }

    /// Remove the host's capacity record and every service registration it
    /// owns. Idempotent: unknown hosts are not an error.
    pub async fn unregister_host(&self, host: &str) -> Result<(), RegistryError> {
        self.store.remove_host(host).await?;
        self.store.remove_registrations_by_host(host).await?;

        tracing::info!("Unregistered host {} and all its services", host);
        Ok(())
    }

    /// Look up a host's capacity record.
    pub async fn get_host(&self, host: &str) -> Result<Option<HostRegistration>, RegistryError> {
        Ok(self.store.get_host(host).await?)
    }

    // =========================================================================
    // Service Registrations
    // =========================================================================

    /// Create or refresh the registration for `(service_type, host)`.
    ///
    /// A pre-existing registration keeps its maintenance flag; path and
    /// producer flag are overwritten. A blank path is only legal when the
    /// pair already exists, in which case the stored path is kept.
    pub async fn register_service(
        &self,
        req: RegisterService,
    ) -> Result<ServiceRegistration, RegistryError> {
        if req.service_type.trim().is_empty() || req.host.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "service_type and host must not be blank".to_string(),
            ));
        }

        let existing = self
            .store
            .get_registration(&req.service_type, &req.host)
            .await?;

        let registration = match existing {
            Some(existing) => ServiceRegistration {
                service_type: req.service_type,
                host: req.host,
                path: if req.path.trim().is_empty() {
                    existing.path
                } else {
                    req.path
                },
                job_producer: req.job_producer,
                maintenance: existing.maintenance,
            },
            None => {
                if req.path.trim().is_empty() {
                    return Err(RegistryError::InvalidArgument(
                        "path must not be blank when registering a new service".to_string(),
                    ));
                }
                ServiceRegistration::new(req.service_type, req.host, req.path, req.job_producer)
            }
        };

        self.store.put_registration(&registration).await?;

        tracing::info!(
            "Registered '{}' on host '{}' with path '{}'",
            registration.service_type,
            registration.host,
            registration.path
        );
        Ok(registration)
    }

    /// Remove the registration matching `(service_type, host)` if present;
    /// no-op otherwise.
    pub async fn unregister_service(
        &self,
        service_type: &str,
        host: &str,
    ) -> Result<(), RegistryError> {
        self.store.remove_registration(service_type, host).await?;

        tracing::info!("Unregistered '{}' on host '{}'", service_type, host);
        Ok(())
    }

    /// Flip maintenance mode on the matching registration, or on every
    /// registration of the host when `service_type` is `None`.
    pub async fn set_maintenance(
        &self,
        service_type: Option<&str>,
        host: &str,
        maintenance: bool,
    ) -> Result<(), RegistryError> {
        let on_host = self.store.registrations_by_host(host).await?;
        if on_host.is_empty() {
            return Err(RegistryError::NotFound(format!(
                "no services registered on host '{host}'"
            )));
        }

        for mut registration in on_host {
            if service_type.is_none_or(|t| t == registration.service_type) {
                registration.maintenance = maintenance;
                self.store.put_registration(&registration).await?;
            }
        }

        tracing::info!(
            "Host '{}' maintenance mode set to {} for {}",
            host,
            maintenance,
            service_type.unwrap_or("all services")
        );
        Ok(())
    }

    /// Look up the registration for `(service_type, host)`.
    pub async fn get_registration(
        &self,
        service_type: &str,
        host: &str,
    ) -> Result<Option<ServiceRegistration>, RegistryError> {
        Ok(self.store.get_registration(service_type, host).await?)
    }

    /// Every registration in the cluster, maintenance entries included.
    pub async fn registrations(&self) -> Result<Vec<ServiceRegistration>, RegistryError> {
        Ok(self.store.all_registrations().await?)
    }

    /// All registrations for a type, maintenance entries included.
    pub async fn registrations_by_type(
        &self,
        service_type: &str,
    ) -> Result<Vec<ServiceRegistration>, RegistryError> {
        Ok(self.store.registrations_by_type(service_type).await?)
    }

    /// All registrations on a host.
    pub async fn registrations_by_host(
        &self,
        host: &str,
    ) -> Result<Vec<ServiceRegistration>, RegistryError> {
        Ok(self.store.registrations_by_host(host).await?)
    }

    /// Non-maintenance registrations for a type, ordered from least to most
    /// loaded. This is the dispatch-ready sequence; it is recomputed from a
    /// fresh snapshot on every call.
    pub async fn registrations_by_load(
        &self,
        service_type: &str,
    ) -> Result<Vec<ServiceRegistration>, RegistryError> {
        let registrations = self.store.registrations_by_type(service_type).await?;
        let loads = self
            .store
            .job_counts_by_host(service_type, &LOAD_BEARING_STATUSES)
            .await?;
        Ok(load::rank_by_load(registrations, &loads))
    }

    /// Job figures per registration: current queued and running counts plus
    /// mean queue and run times of finished work, ordered by service type
    /// then host. Registrations that never saw a job report zero counts.
    pub async fn service_statistics(&self) -> Result<Vec<ServiceStatistics>, RegistryError> {
        let registrations = self.store.all_registrations().await?;
        let figures = self.store.job_statistics().await?;

        let mut statistics: Vec<ServiceStatistics> = registrations
            .into_iter()
            .map(|registration| {
                let stats = figures
                    .get(&(registration.service_type.clone(), registration.host.clone()))
                    .copied()
                    .unwrap_or_default();
                ServiceStatistics {
                    registration,
                    queued_jobs: stats.queued,
                    running_jobs: stats.running,
                    mean_queue_time: stats.mean_queue_time,
                    mean_run_time: stats.mean_run_time,
                }
            })
            .collect();

        statistics.sort_by(|a, b| {
            let left = (&a.registration.service_type, &a.registration.host);
            let right = (&b.registration.service_type, &b.registration.host);
            left.cmp(&right)
        });
        Ok(statistics)
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Allocate a new job. Queued unless `start`, in which case it begins
    /// life Running with its start time stamped.
    ///
    /// A type with no active registration only warns; the job stays queued
    /// for when capacity appears.
    pub async fn create_job(&self, req: CreateJob) -> Result<Job, RegistryError> {
        if req.job_type.trim().is_empty() || req.operation.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "job_type and operation must not be blank".to_string(),
            ));
        }

        let registrations = self.store.registrations_by_type(&req.job_type).await?;
        if !registrations.iter().any(|r| !r.maintenance) {
            tracing::warn!("Service '{}' not available, queuing job anyway", req.job_type);
        }

        let now = Utc::now();
        let status = if req.start {
            JobStatus::Running
        } else {
            JobStatus::Queued
        };

        let job = self
            .store
            .insert_job(NewJob {
                job_type: req.job_type,
                operation: req.operation,
                arguments: req.arguments,
                payload: req.payload,
                status,
                host: None,
                date_created: now,
                date_started: req.start.then_some(now),
            })
            .await?;

        tracing::info!("Job {} created for type '{}'", job.id, job.job_type);
        Ok(job)
    }

    /// Persist a caller-reported job state.
    ///
    /// The stored predecessor decides transition legality; entering Running
    /// stamps the start time, entering a terminal state stamps completion.
    /// Creation time never changes after the fact.
    pub async fn update_job(&self, job: &Job) -> Result<Job, RegistryError> {
        let stored = self
            .store
            .get_job(job.id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("job {} does not exist", job.id)))?;

        if stored.status != job.status && !stored.status.can_transition(job.status) {
            return Err(RegistryError::InvalidTransition {
                from: stored.status,
                to: job.status,
            });
        }

        let mut updated = job.clone();
        updated.date_created = stored.date_created;

        let now = Utc::now();
        if updated.status == JobStatus::Running && updated.date_started.is_none() {
            updated.date_started = Some(now);
            updated.queue_time = Some((now - updated.date_created).num_milliseconds());
        }
        if updated.status.is_terminal() && updated.date_completed.is_none() {
            updated.date_completed = Some(now);
            if let Some(started) = updated.date_started {
                updated.run_time = Some((now - started).num_milliseconds());
            }
        }

        if !self.store.update_job(&updated).await? {
            return Err(RegistryError::NotFound(format!(
                "job {} does not exist",
                updated.id
            )));
        }

        tracing::debug!("Job {} updated to {}", updated.id, updated.status);
        Ok(updated)
    }

    /// Fetch a job by id.
    pub async fn get_job(&self, id: i64) -> Result<Job, RegistryError> {
        self.store
            .get_job(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("job {id} does not exist")))
    }

    /// All jobs matching the filters; `None` matches anything.
    pub async fn get_jobs(
        &self,
        job_type: Option<&str>,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, RegistryError> {
        Ok(self.store.find_jobs(job_type, status).await?)
    }

    /// Count jobs matching the filters, optionally narrowed to the host the
    /// work ran or is running on.
    pub async fn count_jobs(
        &self,
        job_type: Option<&str>,
        status: Option<JobStatus>,
        host: Option<&str>,
    ) -> Result<u64, RegistryError> {
        Ok(self.store.count_jobs(job_type, status, host).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn register(service_type: &str, host: &str) -> RegisterService {
        RegisterService {
            service_type: service_type.to_string(),
            host: host.to_string(),
            path: format!("/{service_type}"),
            job_producer: false,
        }
    }

    async fn running_job_on(registry: &ServiceRegistry, job_type: &str, host: &str) -> Job {
        let mut job = registry
            .create_job(CreateJob::new(job_type, "run"))
            .await
            .unwrap();
        job.status = JobStatus::Running;
        job.host = Some(host.to_string());
        registry.update_job(&job).await.unwrap()
    }

    #[tokio::test]
    async fn test_reregistration_preserves_maintenance() {
        let registry = registry();
        registry
            .register_service(register("encode", "http://h1"))
            .await
            .unwrap();
        registry
            .set_maintenance(Some("encode"), "http://h1", true)
            .await
            .unwrap();

        let mut refresh = register("encode", "http://h1");
        refresh.path = "/encode/v2".to_string();
        refresh.job_producer = true;
        let updated = registry.register_service(refresh).await.unwrap();

        assert!(updated.maintenance);
        assert!(updated.job_producer);
        assert_eq!(updated.path, "/encode/v2");
    }

    #[tokio::test]
    async fn test_new_registration_requires_path() {
        let registry = registry();
        let mut req = register("encode", "http://h1");
        req.path = String::new();
        let err = registry.register_service(req).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_created_job_starts_queued_with_creation_date() {
        let registry = registry();
        let job = registry
            .create_job(CreateJob::new("encode", "track"))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.date_started.is_none());
        assert!(job.date_completed.is_none());
        assert!(job.host.is_none());
    }

    #[tokio::test]
    async fn test_created_job_may_start_running() {
        let registry = registry();
        let job = registry
            .create_job(CreateJob::new("encode", "track").started())
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Running);
        assert!(job.date_started.is_some());
    }

    #[tokio::test]
    async fn test_creation_date_never_changes() {
        let registry = registry();
        let created = registry
            .create_job(CreateJob::new("encode", "track"))
            .await
            .unwrap();

        let mut tampered = created.clone();
        tampered.status = JobStatus::Running;
        tampered.date_created = Utc::now() + chrono::Duration::hours(1);
        let updated = registry.update_job(&tampered).await.unwrap();

        assert_eq!(updated.date_created, created.date_created);
    }

    #[tokio::test]
    async fn test_update_job_stamps_lifecycle_dates() {
        let registry = registry();
        let mut job = registry
            .create_job(CreateJob::new("encode", "track"))
            .await
            .unwrap();

        job.status = JobStatus::Running;
        let job = registry.update_job(&job).await.unwrap();
        assert!(job.date_started.is_some());
        assert!(job.queue_time.is_some());

        let mut job = job;
        job.status = JobStatus::Finished;
        let job = registry.update_job(&job).await.unwrap();
        assert!(job.date_completed.is_some());
        assert!(job.run_time.is_some());
    }

    #[tokio::test]
    async fn test_update_rejects_illegal_transitions() {
        let registry = registry();
        let mut job = registry
            .create_job(CreateJob::new("encode", "track"))
            .await
            .unwrap();

        job.status = JobStatus::Running;
        let mut job = registry.update_job(&job).await.unwrap();
        job.status = JobStatus::Finished;
        let mut job = registry.update_job(&job).await.unwrap();

        job.status = JobStatus::Queued;
        let err = registry.update_job(&job).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidTransition {
                from: JobStatus::Finished,
                to: JobStatus::Queued,
            }
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_job_is_not_found() {
        // Scenario D: updating a job that was never created.
        let registry = registry();
        let mut job = registry
            .create_job(CreateJob::new("encode", "track"))
            .await
            .unwrap();
        job.id = 404;
        let err = registry.update_job(&job).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_count_matches_get_jobs_len() {
        let registry = registry();
        for _ in 0..3 {
            registry
                .create_job(CreateJob::new("encode", "track"))
                .await
                .unwrap();
        }
        registry
            .create_job(CreateJob::new("distribute", "push").started())
            .await
            .unwrap();

        for (job_type, status) in [
            (Some("encode"), Some(JobStatus::Queued)),
            (Some("encode"), None),
            (None, Some(JobStatus::Running)),
            (None, None),
        ] {
            let count = registry.count_jobs(job_type, status, None).await.unwrap();
            let listed = registry.get_jobs(job_type, status).await.unwrap();
            assert_eq!(count, listed.len() as u64);
        }
    }

    #[tokio::test]
    async fn test_load_ranking_prefers_idle_host() {
        // Scenario A: two running jobs on h1, none on h2.
        let registry = registry();
        registry
            .register_service(register("T1", "http://h1"))
            .await
            .unwrap();
        registry
            .register_service(register("T1", "http://h2"))
            .await
            .unwrap();

        running_job_on(&registry, "T1", "http://h1").await;
        running_job_on(&registry, "T1", "http://h1").await;

        let ranked = registry.registrations_by_load("T1").await.unwrap();
        let hosts: Vec<&str> = ranked.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts, ["http://h2", "http://h1"]);
    }

    #[tokio::test]
    async fn test_maintenance_drains_and_returns() {
        // Scenario B: maintenance removes the host from selection, leaving
        // maintenance brings it back.
        let registry = registry();
        registry
            .register_service(register("T1", "http://h1"))
            .await
            .unwrap();

        registry
            .set_maintenance(Some("T1"), "http://h1", true)
            .await
            .unwrap();
        assert!(registry.registrations_by_load("T1").await.unwrap().is_empty());

        // Still visible to the plain type query.
        assert_eq!(registry.registrations_by_type("T1").await.unwrap().len(), 1);

        registry
            .set_maintenance(Some("T1"), "http://h1", false)
            .await
            .unwrap();
        let ranked = registry.registrations_by_load("T1").await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].host, "http://h1");
    }

    #[tokio::test]
    async fn test_maintenance_without_type_covers_whole_host() {
        let registry = registry();
        registry
            .register_service(register("encode", "http://h1"))
            .await
            .unwrap();
        registry
            .register_service(register("distribute", "http://h1"))
            .await
            .unwrap();

        registry
            .set_maintenance(None, "http://h1", true)
            .await
            .unwrap();

        for registration in registry.registrations_by_host("http://h1").await.unwrap() {
            assert!(registration.maintenance);
        }
    }

    #[tokio::test]
    async fn test_maintenance_on_unknown_host_is_not_found() {
        let registry = registry();
        let err = registry
            .set_maintenance(None, "http://nowhere", true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unregister_host_cascades() {
        let registry = registry();
        registry.register_host("http://h1", 4).await.unwrap();
        registry
            .register_service(register("encode", "http://h1"))
            .await
            .unwrap();
        registry
            .register_service(register("distribute", "http://h1"))
            .await
            .unwrap();

        registry.unregister_host("http://h1").await.unwrap();

        assert!(registry
            .registrations_by_host("http://h1")
            .await
            .unwrap()
            .is_empty());
        assert!(registry.get_host("http://h1").await.unwrap().is_none());

        // Idempotent on a host that is already gone.
        registry.unregister_host("http://h1").await.unwrap();
    }

    #[tokio::test]
    async fn test_statistics_cover_every_registration() {
        let registry = registry();
        registry
            .register_service(register("encode", "http://h1"))
            .await
            .unwrap();
        registry
            .register_service(register("encode", "http://h2"))
            .await
            .unwrap();

        let mut job = running_job_on(&registry, "encode", "http://h1").await;
        job.status = JobStatus::Finished;
        registry.update_job(&job).await.unwrap();
        running_job_on(&registry, "encode", "http://h1").await;

        let stats = registry.service_statistics().await.unwrap();
        assert_eq!(stats.len(), 2);

        // Sorted by type then host, so h1 comes first.
        assert_eq!(stats[0].registration.host, "http://h1");
        assert_eq!(stats[0].running_jobs, 1);
        assert_eq!(stats[0].queued_jobs, 0);
        assert!(stats[0].mean_queue_time.is_some());
        assert!(stats[0].mean_run_time.is_some());

        // h2 never saw a job and still shows up, with zero counts.
        assert_eq!(stats[1].registration.host, "http://h2");
        assert_eq!(stats[1].running_jobs, 0);
        assert_eq!(stats[1].mean_run_time, None);
    }

    #[tokio::test]
    async fn test_registration_lookup_and_listing() {
        let registry = registry();
        registry
            .register_service(register("encode", "http://h1"))
            .await
            .unwrap();
        registry
            .register_service(register("distribute", "http://h2"))
            .await
            .unwrap();

        let found = registry
            .get_registration("encode", "http://h1")
            .await
            .unwrap();
        assert_eq!(found.unwrap().path, "/encode");
        assert!(registry
            .get_registration("encode", "http://h2")
            .await
            .unwrap()
            .is_none());

        assert_eq!(registry.registrations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_job_without_capacity_still_queues() {
        let registry = registry();
        let job = registry
            .create_job(CreateJob::new("inspect", "probe"))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_unregister_service_is_noop_when_absent() {
        let registry = registry();
        registry
            .unregister_service("encode", "http://h1")
            .await
            .unwrap();
    }
}
