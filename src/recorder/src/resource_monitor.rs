//! Periodic system+process resource sampling (§4.10).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sysinfo::{Pid, System};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lydian_traffic::ResourceRecord;

use crate::pipeline::RecordingPipeline;

/// Default sampling cadence.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

pub struct ResourceMonitor {
    running: Arc<AtomicBool>,
    stop: CancellationToken,
    handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            stop: CancellationToken::new(),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Idempotent: a second call while already running is a no-op.
    pub async fn start(&self, pipeline: Arc<RecordingPipeline>, interval: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let stop = self.stop.clone();
        let running = self.running.clone();
        let handle = tokio::spawn(async move {
            sample_loop(pipeline, interval, stop).await;
            running.store(false, Ordering::SeqCst);
        });
        *self.handle.lock().await = Some(handle);
    }

    /// Idempotent: stopping an already-stopped monitor is a no-op.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.stop.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

async fn sample_loop(pipeline: Arc<RecordingPipeline>, interval: Duration, stop: CancellationToken) {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new_all();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {
                system.refresh_all();
                let record = sample(&system, pid);
                if pipeline.enqueue_resource(record).is_err() {
                    debug!("resource record queue full, dropping sample");
                }
            }
        }
    }
}

fn sample(system: &System, pid: Pid) -> ResourceRecord {
    let system_cpu_percent = system.global_cpu_info().cpu_usage() as f64;
    let (system_mem_percent, process_cpu_percent, process_mem_percent) = if system.total_memory() > 0 {
        let mem_pct = (system.used_memory() as f64 / system.total_memory() as f64) * 100.0;
        let (proc_cpu, proc_mem) = system
            .process(pid)
            .map(|p| {
                let mem_pct = if system.total_memory() > 0 {
                    (p.memory() as f64 / system.total_memory() as f64) * 100.0
                } else {
                    0.0
                };
                (p.cpu_usage() as f64, mem_pct)
            })
            .unwrap_or((0.0, 0.0));
        (mem_pct, proc_cpu, proc_mem)
    } else {
        (0.0, 0.0, 0.0)
    };

    ResourceRecord {
        timestamp: Utc::now().timestamp(),
        system_cpu_percent,
        system_mem_percent,
        system_open_conns: count_system_open_conns(),
        process_cpu_percent,
        process_mem_percent,
        process_open_conns: count_process_open_conns(pid),
    }
}

/// Counts established TCP sockets system-wide by reading `/proc/net/tcp{,6}`.
/// Returns 0 on platforms or sandboxes without procfs rather than erroring,
/// since this is an auxiliary metric, not a correctness-critical value.
fn count_system_open_conns() -> i64 {
    ["/proc/net/tcp", "/proc/net/tcp6"]
        .iter()
        .map(|path| std::fs::read_to_string(path).map(|s| s.lines().count().saturating_sub(1)).unwrap_or(0))
        .sum::<usize>() as i64
}

/// Counts this process's open socket file descriptors via `/proc/<pid>/fd`.
fn count_process_open_conns(pid: Pid) -> i64 {
    let fd_dir = format!("/proc/{pid}/fd");
    let Ok(entries) = std::fs::read_dir(&fd_dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            std::fs::read_link(entry.path())
                .map(|target| target.to_string_lossy().starts_with("socket:"))
                .unwrap_or(false)
        })
        .count() as i64
}
