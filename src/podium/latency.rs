//! `GetLatency` combination across per-host results (§4.11.1).
//!
//! Fixes a latent bug in `apps/podium.py: _get_latencies`: the original
//! returns as soon as any host yields a non-empty latency list, before the
//! aggregation branch runs, silently dropping every other host's
//! contribution whenever at least one host has data. This combination
//! always aggregates across every host that returned samples.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostLatency {
    pub count: i64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CombinedLatency {
    pub count: i64,
    pub avg_latency: f64,
    pub min_latency: f64,
    pub max_latency: f64,
}

/// `avg` combines as a weighted mean by each host's sample count; `min`/`max`
/// combine as the min/max across all per-host values. Hosts with zero
/// samples are excluded from the weighting but do not short-circuit the
/// aggregation of the hosts that do have data.
pub fn combine_latencies(per_host: &[HostLatency]) -> Option<CombinedLatency> {
    let contributing: Vec<&HostLatency> = per_host.iter().filter(|h| h.count > 0).collect();
    if contributing.is_empty() {
        return None;
    }

    let total_count: i64 = contributing.iter().map(|h| h.count).sum();
    let weighted_avg = contributing.iter().map(|h| h.avg * h.count as f64).sum::<f64>() / total_count as f64;
    let min_latency = contributing.iter().map(|h| h.min).fold(f64::INFINITY, f64::min);
    let max_latency = contributing.iter().map(|h| h.max).fold(f64::NEG_INFINITY, f64::max);

    Some(CombinedLatency {
        count: total_count,
        avg_latency: weighted_avg,
        min_latency,
        max_latency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_every_host_even_when_one_has_no_samples() {
        let per_host = vec![
            HostLatency { count: 10, avg: 2.0, min: 1.0, max: 4.0 },
            HostLatency { count: 0, avg: 0.0, min: 0.0, max: 0.0 },
            HostLatency { count: 5, avg: 5.0, min: 3.0, max: 9.0 },
        ];
        let combined = combine_latencies(&per_host).unwrap();
        assert_eq!(combined.count, 15);
        assert!((combined.avg_latency - 3.0).abs() < 1e-9);
        assert_eq!(combined.min_latency, 1.0);
        assert_eq!(combined.max_latency, 9.0);
    }

    #[test]
    fn no_contributing_hosts_yields_none() {
        let per_host = vec![HostLatency { count: 0, avg: 0.0, min: 0.0, max: 0.0 }];
        assert!(combine_latencies(&per_host).is_none());
    }
}
