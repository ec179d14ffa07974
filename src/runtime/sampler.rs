use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::error::{RuntimeError, SampleError};
use crate::helpers::round2;
use crate::models::records::StatsRecord;
use crate::models::views::ResourceSnapshot;

use super::RuntimeHandle;

/// CPU usage over the engine's own sampling window, scaled by online CPUs.
/// Missing or regressing counters give 0.
pub fn cpu_percent(s: &StatsRecord) -> f64 {
    let cpu_delta = s
        .cpu_total_usage
        .unwrap_or(0)
        .saturating_sub(s.pre_cpu_total_usage.unwrap_or(0));
    let system_delta = s
        .system_cpu_usage
        .unwrap_or(0)
        .saturating_sub(s.pre_system_cpu_usage.unwrap_or(0));
    if system_delta == 0 {
        return 0.0;
    }
    let cpus = s
        .online_cpus
        .filter(|n| *n > 0)
        .or(s.percpu_count.map(|n| n as u64).filter(|n| *n > 0))
        .unwrap_or(1);
    let pct = (cpu_delta as f64 / system_delta as f64) * cpus as f64 * 100.0;
    if pct.is_finite() {
        round2(pct.max(0.0))
    } else {
        0.0
    }
}

pub fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    round2(usage as f64 / limit as f64 * 100.0)
}

pub fn snapshot_from_stats(s: &StatsRecord) -> ResourceSnapshot {
    let usage = s.memory_usage.unwrap_or(0);
    let limit = s.memory_limit.unwrap_or(0);
    ResourceSnapshot {
        cpu_percent: cpu_percent(s),
        memory_usage_bytes: usage,
        memory_limit_bytes: limit,
        memory_percent: memory_percent(usage, limit),
        sampled: true,
        error: None,
    }
}

/// Point-in-time resource sampling with a hard deadline per container.
/// Each sample runs as its own task; a task that misses its deadline is
/// aborted and replaced by a zeroed snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampler;

impl Sampler {
    pub fn new() -> Self {
        Sampler
    }

    pub async fn sample(
        &self,
        handle: &RuntimeHandle,
        container_id: &str,
        deadline: Duration,
    ) -> ResourceSnapshot {
        let task = spawn_stats(handle, container_id);
        settle(container_id, task, Instant::now() + deadline).await
    }

    /// Samples every id concurrently. All deadlines are measured from the
    /// same start, so one slow container cannot push the others past theirs.
    pub async fn sample_many(
        &self,
        handle: &RuntimeHandle,
        container_ids: &[String],
        deadline: Duration,
    ) -> Vec<(String, ResourceSnapshot)> {
        let until = Instant::now() + deadline;
        let tasks: Vec<_> = container_ids
            .iter()
            .map(|id| (id.clone(), spawn_stats(handle, id)))
            .collect();

        let mut out = Vec::with_capacity(tasks.len());
        for (id, task) in tasks {
            let snap = settle(&id, task, until).await;
            out.push((id, snap));
        }
        out
    }
}

fn spawn_stats(
    handle: &RuntimeHandle,
    container_id: &str,
) -> JoinHandle<Result<StatsRecord, RuntimeError>> {
    let client = handle.client.clone();
    let id = container_id.to_string();
    tokio::spawn(async move { client.container_stats(&id).await })
}

async fn settle(
    container_id: &str,
    mut task: JoinHandle<Result<StatsRecord, RuntimeError>>,
    until: Instant,
) -> ResourceSnapshot {
    let outcome = match time::timeout_at(until, &mut task).await {
        Ok(Ok(Ok(stats))) => Ok(stats),
        Ok(Ok(Err(e))) => Err(SampleError::Runtime(e.to_string())),
        Ok(Err(join)) => Err(SampleError::Runtime(join.to_string())),
        Err(_) => {
            task.abort();
            Err(SampleError::Timeout)
        }
    };

    match outcome {
        Ok(stats) => snapshot_from_stats(&stats),
        Err(e) => {
            debug!("stats for {} unavailable: {}", container_id, e);
            ResourceSnapshot::failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mock::{MockRuntime, StatsReply, container};
    use std::sync::Arc;

    fn stats(cpu: (u64, u64), sys: (u64, u64), cpus: u64, mem: (u64, u64)) -> StatsRecord {
        StatsRecord {
            cpu_total_usage: Some(cpu.1),
            pre_cpu_total_usage: Some(cpu.0),
            system_cpu_usage: Some(sys.1),
            pre_system_cpu_usage: Some(sys.0),
            online_cpus: Some(cpus),
            percpu_count: None,
            memory_usage: Some(mem.0),
            memory_limit: Some(mem.1),
        }
    }

    fn handle(rt: MockRuntime) -> RuntimeHandle {
        RuntimeHandle {
            profile_id: "local".to_string(),
            client: Arc::new(rt),
        }
    }

    #[test]
    fn cpu_formula() {
        let s = stats((100, 200), (1000, 2000), 4, (0, 0));
        assert_eq!(cpu_percent(&s), 40.0);
    }

    #[test]
    fn cpu_is_zero_without_system_delta() {
        assert_eq!(cpu_percent(&stats((100, 200), (2000, 2000), 4, (0, 0))), 0.0);
        assert_eq!(cpu_percent(&stats((100, 200), (3000, 2000), 4, (0, 0))), 0.0);
        assert_eq!(cpu_percent(&StatsRecord::default()), 0.0);
    }

    #[test]
    fn cpu_never_negative_when_counters_regress() {
        let s = stats((500, 200), (1000, 2000), 2, (0, 0));
        assert_eq!(cpu_percent(&s), 0.0);
    }

    #[test]
    fn cpu_count_falls_back_to_percpu_entries() {
        let mut s = stats((0, 50), (0, 1000), 0, (0, 0));
        s.online_cpus = None;
        s.percpu_count = Some(2);
        assert_eq!(cpu_percent(&s), 10.0);
    }

    #[test]
    fn memory_formula() {
        assert_eq!(memory_percent(256, 1024), 25.0);
        assert_eq!(memory_percent(256, 0), 0.0);
    }

    #[tokio::test]
    async fn successful_sample_is_marked_sampled() {
        let h = handle(
            MockRuntime::new()
                .with_container(container("c1", "web", "nginx", "running"))
                .with_stats("c1", StatsReply::Ready(stats((0, 10), (0, 100), 1, (50, 200)))),
        );
        let snap = Sampler::new().sample(&h, "c1", Duration::from_secs(1)).await;
        assert!(snap.sampled);
        assert_eq!(snap.cpu_percent, 10.0);
        assert_eq!(snap.memory_percent, 25.0);
        assert_eq!(snap.error, None);
    }

    #[tokio::test]
    async fn runtime_error_is_reported_not_raised() {
        let h = handle(
            MockRuntime::new()
                .with_container(container("c1", "web", "nginx", "running"))
                .with_stats("c1", StatsReply::Fail("boom".to_string())),
        );
        let snap = Sampler::new().sample(&h, "c1", Duration::from_secs(1)).await;
        assert!(!snap.sampled);
        assert_eq!(snap.error.as_deref(), Some("boom"));
        assert_eq!(snap.memory_usage_bytes, 0);
    }

    #[tokio::test]
    async fn hung_runtime_returns_within_deadline() {
        let h = handle(
            MockRuntime::new()
                .with_container(container("c1", "web", "nginx", "running"))
                .with_stats("c1", StatsReply::Hang),
        );
        let started = std::time::Instant::now();
        let snap = Sampler::new().sample(&h, "c1", Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!snap.sampled);
        assert_eq!(snap.error.as_deref(), Some("timeout"));
        assert_eq!(snap.cpu_percent, 0.0);
        assert_eq!(snap.memory_limit_bytes, 0);
        assert_eq!(snap.memory_percent, 0.0);
    }

    #[tokio::test]
    async fn slow_container_does_not_delay_others() {
        let h = handle(
            MockRuntime::new()
                .with_container(container("slow", "a", "x", "running"))
                .with_container(container("fast", "b", "y", "running"))
                .with_stats("slow", StatsReply::Hang)
                .with_stats(
                    "fast",
                    StatsReply::Delayed(
                        Duration::from_millis(10),
                        stats((0, 1), (0, 10), 1, (1, 2)),
                    ),
                ),
        );
        let ids = vec!["slow".to_string(), "fast".to_string()];
        let started = std::time::Instant::now();
        let out = Sampler::new()
            .sample_many(&h, &ids, Duration::from_millis(100))
            .await;
        assert!(started.elapsed() < Duration::from_millis(600));
        assert_eq!(out[0].0, "slow");
        assert_eq!(out[0].1.error.as_deref(), Some("timeout"));
        assert_eq!(out[1].0, "fast");
        assert!(out[1].1.sampled);
    }
}
