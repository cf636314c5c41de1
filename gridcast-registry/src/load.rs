//! Load-based ranking of service registrations
//!
//! "Load" is the count of queued plus running jobs of a type attributed to a
//! host. The ranking is recomputed from a fresh snapshot on every call; job
//! counts change continuously, so nothing here is cached.

use std::collections::HashMap;

use gridcast_core::domain::registration::ServiceRegistration;

/// Order registrations from least to most loaded, dropping maintenance
/// entries.
///
/// `loads` maps a host to its queued+running job count for the type being
/// ranked; a host absent from the map counts as zero. The sort is stable
/// over registration order, so a host with no recorded jobs is never
/// penalized relative to a host with an explicit zero.
pub fn rank_by_load(
    registrations: Vec<ServiceRegistration>,
    loads: &HashMap<String, u64>,
) -> Vec<ServiceRegistration> {
    let mut active: Vec<ServiceRegistration> = registrations
        .into_iter()
        .filter(|r| !r.maintenance)
        .collect();
    active.sort_by_key(|r| loads.get(&r.host).copied().unwrap_or(0));
    active
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(host: &str) -> ServiceRegistration {
        ServiceRegistration::new("encode", host, "/encode", false)
    }

    #[test]
    fn test_least_loaded_first() {
        let loads = HashMap::from([
            ("http://h1".to_string(), 3),
            ("http://h2".to_string(), 1),
        ]);
        let ranked = rank_by_load(vec![reg("http://h1"), reg("http://h2")], &loads);
        let hosts: Vec<&str> = ranked.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts, ["http://h2", "http://h1"]);
    }

    #[test]
    fn test_absent_host_ranks_as_zero() {
        // h2 never appears in the load map; it must not rank worse than a
        // host with a recorded zero, and both beat any loaded host.
        let loads = HashMap::from([
            ("http://h1".to_string(), 0),
            ("http://h3".to_string(), 2),
        ]);
        let ranked = rank_by_load(
            vec![reg("http://h1"), reg("http://h2"), reg("http://h3")],
            &loads,
        );
        let hosts: Vec<&str> = ranked.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts, ["http://h1", "http://h2", "http://h3"]);
    }

    #[test]
    fn test_ties_break_by_registration_order() {
        let loads = HashMap::new();
        let ranked = rank_by_load(
            vec![reg("http://h3"), reg("http://h1"), reg("http://h2")],
            &loads,
        );
        let hosts: Vec<&str> = ranked.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts, ["http://h3", "http://h1", "http://h2"]);
    }

    #[test]
    fn test_maintenance_excluded_even_when_idle() {
        let loads = HashMap::from([("http://h2".to_string(), 5)]);
        let mut drained = reg("http://h1");
        drained.maintenance = true;
        let ranked = rank_by_load(vec![drained, reg("http://h2")], &loads);
        let hosts: Vec<&str> = ranked.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts, ["http://h2"]);
    }
}
