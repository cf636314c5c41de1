//! In-memory store
//!
//! Keeps everything behind a single `RwLock`, which serializes mutations and
//! lets reads share. Intended for tests and single-node deployments; the
//! contract it implements is the same one `PgStore` answers from Postgres.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use gridcast_core::domain::job::{Job, JobStatus};
use gridcast_core::domain::registration::{HostRegistration, ServiceRegistration};
use tokio::sync::RwLock;

use super::{JobStats, NewJob, RegistryStore, StoreError};

#[derive(Default)]
struct Inner {
    hosts: HashMap<String, HostRegistration>,
    /// Registration order matters for load-ranking ties, so this is a Vec
    /// and overwrites happen in place.
    registrations: Vec<ServiceRegistration>,
    jobs: BTreeMap<i64, Job>,
    next_job_id: i64,
}

/// In-memory implementation of [`RegistryStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn job_matches(job: &Job, job_type: Option<&str>, status: Option<JobStatus>) -> bool {
    job_type.is_none_or(|t| job.job_type == t) && status.is_none_or(|s| job.status == s)
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn upsert_host(&self, host: &HostRegistration) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.hosts.insert(host.host.clone(), host.clone());
        Ok(())
    }

    async fn remove_host(&self, host: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.hosts.remove(host);
        Ok(())
    }

    async fn get_host(&self, host: &str) -> Result<Option<HostRegistration>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.hosts.get(host).cloned())
    }

    async fn put_registration(
        &self,
        registration: &ServiceRegistration,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let existing = inner.registrations.iter().position(|r| {
            r.service_type == registration.service_type && r.host == registration.host
        });
        match existing {
            Some(index) => inner.registrations[index] = registration.clone(),
            None => inner.registrations.push(registration.clone()),
        }
        Ok(())
    }

    async fn get_registration(
        &self,
        service_type: &str,
        host: &str,
    ) -> Result<Option<ServiceRegistration>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .registrations
            .iter()
            .find(|r| r.service_type == service_type && r.host == host)
            .cloned())
    }

    async fn remove_registration(
        &self,
        service_type: &str,
        host: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .registrations
            .retain(|r| !(r.service_type == service_type && r.host == host));
        Ok(())
    }

    async fn remove_registrations_by_host(&self, host: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.registrations.retain(|r| r.host != host);
        Ok(())
    }

    async fn registrations_by_type(
        &self,
        service_type: &str,
    ) -> Result<Vec<ServiceRegistration>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .registrations
            .iter()
            .filter(|r| r.service_type == service_type)
            .cloned()
            .collect())
    }

    async fn registrations_by_host(
        &self,
        host: &str,
    ) -> Result<Vec<ServiceRegistration>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .registrations
            .iter()
            .filter(|r| r.host == host)
            .cloned()
            .collect())
    }

    async fn all_registrations(&self) -> Result<Vec<ServiceRegistration>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.registrations.clone())
    }

    async fn insert_job(&self, job: NewJob) -> Result<Job, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_job_id += 1;
        let id = inner.next_job_id;
        let job = Job {
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
        };
        inner.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn update_job(&self, job: &Job) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_job(&self, id: i64) -> Result<Option<Job>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn find_jobs(
        &self,
        job_type: Option<&str>,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .jobs
            .values()
            .filter(|j| job_matches(j, job_type, status))
            .cloned()
            .collect())
    }

    async fn count_jobs(
        &self,
        job_type: Option<&str>,
        status: Option<JobStatus>,
        host: Option<&str>,
    ) -> Result<u64, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .jobs
            .values()
            .filter(|j| job_matches(j, job_type, status))
            .filter(|j| host.is_none_or(|h| j.host.as_deref() == Some(h)))
            .count() as u64)
    }

    async fn job_counts_by_host(
        &self,
        job_type: &str,
        statuses: &[JobStatus],
    ) -> Result<HashMap<String, u64>, StoreError> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for job in inner.jobs.values() {
            if job.job_type != job_type || !statuses.contains(&job.status) {
                continue;
            }
            if let Some(host) = &job.host {
                *counts.entry(host.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn job_statistics(&self) -> Result<HashMap<(String, String), JobStats>, StoreError> {
        #[derive(Default)]
        struct Acc {
            queued: u64,
            running: u64,
            queue_sum: i64,
            run_sum: i64,
            finished: i64,
        }

        let inner = self.inner.read().await;
        let mut accs: HashMap<(String, String), Acc> = HashMap::new();
        for job in inner.jobs.values() {
            let Some(host) = &job.host else { continue };
            let acc = accs
                .entry((job.job_type.clone(), host.clone()))
                .or_default();
            match job.status {
                JobStatus::Queued => acc.queued += 1,
                JobStatus::Running => acc.running += 1,
                JobStatus::Finished => {
                    acc.finished += 1;
                    acc.queue_sum += job.queue_time.unwrap_or(0);
                    acc.run_sum += job.run_time.unwrap_or(0);
                }
                JobStatus::Failed => {}
            }
        }

        Ok(accs
            .into_iter()
            .map(|(key, acc)| {
                let stats = JobStats {
                    queued: acc.queued,
                    running: acc.running,
                    mean_queue_time: (acc.finished > 0).then(|| acc.queue_sum / acc.finished),
                    mean_run_time: (acc.finished > 0).then(|| acc.run_sum / acc.finished),
                };
                (key, stats)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_job(job_type: &str, host: Option<&str>, status: JobStatus) -> NewJob {
        NewJob {
            job_type: job_type.to_string(),
            operation: "run".to_string(),
            arguments: Vec::new(),
            payload: None,
            status,
            host: host.map(str::to_string),
            date_created: Utc::now(),
            date_started: None,
        }
    }

    #[tokio::test]
    async fn test_job_ids_are_monotonic() {
        let store = MemoryStore::new();
        let first = store
            .insert_job(new_job("encode", None, JobStatus::Queued))
            .await
            .unwrap();
        let second = store
            .insert_job(new_job("encode", None, JobStatus::Queued))
            .await
            .unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_update_unknown_job_reports_missing() {
        let store = MemoryStore::new();
        let mut job = store
            .insert_job(new_job("encode", None, JobStatus::Queued))
            .await
            .unwrap();
        job.id = 9999;
        assert!(!store.update_job(&job).await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_registration_order() {
        let store = MemoryStore::new();
        store
            .put_registration(&ServiceRegistration::new("encode", "http://h1", "/enc", false))
            .await
            .unwrap();
        store
            .put_registration(&ServiceRegistration::new("encode", "http://h2", "/enc", false))
            .await
            .unwrap();

        // Re-register h1; it must keep its slot ahead of h2.
        let mut updated = ServiceRegistration::new("encode", "http://h1", "/enc2", true);
        updated.maintenance = false;
        store.put_registration(&updated).await.unwrap();

        let regs = store.registrations_by_type("encode").await.unwrap();
        assert_eq!(regs.len(), 2);
        assert_eq!(regs[0].host, "http://h1");
        assert_eq!(regs[0].path, "/enc2");
        assert_eq!(regs[1].host, "http://h2");
    }

    #[tokio::test]
    async fn test_job_counts_by_host_skips_unassigned() {
        let store = MemoryStore::new();
        store
            .insert_job(new_job("encode", Some("http://h1"), JobStatus::Running))
            .await
            .unwrap();
        store
            .insert_job(new_job("encode", Some("http://h1"), JobStatus::Queued))
            .await
            .unwrap();
        store
            .insert_job(new_job("encode", None, JobStatus::Queued))
            .await
            .unwrap();
        store
            .insert_job(new_job("encode", Some("http://h1"), JobStatus::Finished))
            .await
            .unwrap();

        let counts = store
            .job_counts_by_host("encode", &[JobStatus::Queued, JobStatus::Running])
            .await
            .unwrap();
        assert_eq!(counts.get("http://h1"), Some(&2));
        assert_eq!(counts.len(), 1);
    }

    #[tokio::test]
    async fn test_job_statistics_groups_by_type_and_host() {
        let store = MemoryStore::new();
        store
            .insert_job(new_job("encode", Some("http://h1"), JobStatus::Queued))
            .await
            .unwrap();
        store
            .insert_job(new_job("encode", Some("http://h1"), JobStatus::Running))
            .await
            .unwrap();
        store
            .insert_job(new_job("distribute", Some("http://h1"), JobStatus::Running))
            .await
            .unwrap();

        let mut done = store
            .insert_job(new_job("encode", Some("http://h1"), JobStatus::Running))
            .await
            .unwrap();
        done.status = JobStatus::Finished;
        done.queue_time = Some(40);
        done.run_time = Some(200);
        store.update_job(&done).await.unwrap();

        let stats = store.job_statistics().await.unwrap();
        assert_eq!(stats.len(), 2);

        let encode = &stats[&("encode".to_string(), "http://h1".to_string())];
        assert_eq!(encode.queued, 1);
        assert_eq!(encode.running, 1);
        assert_eq!(encode.mean_queue_time, Some(40));
        assert_eq!(encode.mean_run_time, Some(200));

        let distribute = &stats[&("distribute".to_string(), "http://h1".to_string())];
        assert_eq!(distribute.running, 1);
        assert_eq!(distribute.mean_run_time, None);
    }
}
