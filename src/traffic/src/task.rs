//! Task layer: wraps a client or server in a supervised async task or, for
//! namespace-bound targets, a dedicated OS thread (§4.3).

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;

use crate::client::{probe_once, DEFAULT_SOCKET_TIMEOUT};
use crate::connection::StopEvent;
use crate::namespace::NamespaceGuard;
use crate::server::run_server;
use crate::types::{Target, TrafficRecord, TrafficRule};

/// Accepts TrafficRecords from client tasks without blocking the prober.
///
/// Implemented by the recorder crate's bounded queue handle; kept as a trait
/// here so `lydian-traffic` does not depend on `lydian-recorder` (§2.1).
pub trait RecordSink: Send + Sync {
    /// Non-blocking enqueue; returns the record back on a full queue so the
    /// caller can log-and-drop per §4.8's back-pressure policy.
    fn try_enqueue(&self, record: TrafficRecord) -> Result<(), TrafficRecord>;
}

/// A no-op sink for tests and for servers, which never produce records.
pub struct NullSink;

impl RecordSink for NullSink {
    fn try_enqueue(&self, _record: TrafficRecord) -> Result<(), TrafficRecord> {
        Ok(())
    }
}

/// Runs either on the tokio multi-threaded runtime (`VMHost`) or pinned to a
/// dedicated OS thread with its own current-thread runtime (`NSHost`), so a
/// `NamespaceGuard` can be held for the task's entire lifetime (§4.3.1).
pub enum TaskHandle {
    Async(tokio::task::JoinHandle<()>),
    Pinned(Option<std::thread::JoinHandle<()>>),
}

impl TaskHandle {
    /// Joins with the bounded timeout `Close()` requires (§5,
    /// `THREADS_JOIN_TIMEOUT`). A pinned thread's join itself cannot be
    /// interrupted, so exceeding the timeout here means we stop waiting, not
    /// that the thread is killed; the stop signal it's polling on should
    /// already have unblocked it by the time `Close()` is called.
    pub async fn join(self, timeout: Duration) -> Result<(), crate::error::TaskError> {
        match self {
            TaskHandle::Async(handle) => {
                match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_join_err)) => Err(crate::error::TaskError::Timeout),
                    Err(_elapsed) => Err(crate::error::TaskError::Timeout),
                }
            }
            TaskHandle::Pinned(Some(thread)) => {
                let joined = tokio::time::timeout(
                    timeout,
                    tokio::task::spawn_blocking(move || thread.join()),
                )
                .await;
                match joined {
                    Ok(Ok(Ok(()))) => Ok(()),
                    _ => Err(crate::error::TaskError::Timeout),
                }
            }
            TaskHandle::Pinned(None) => Ok(()),
        }
    }
}

fn spawn_scoped<F>(namespace: Option<String>, make_future: F) -> TaskHandle
where
    F: FnOnce() -> BoxFuture<'static, ()> + Send + 'static,
{
    match namespace {
        None => TaskHandle::Async(tokio::spawn(async move { make_future().await })),
        Some(ns) => {
            let thread = std::thread::Builder::new()
                .name(format!("lydian-ns-{ns}"))
                .spawn(move || {
                    let _guard = match NamespaceGuard::enter(&ns) {
                        Ok(guard) => guard,
                        Err(err) => {
                            tracing::error!("failed to enter namespace {ns}: {err}");
                            return;
                        }
                    };
                    let runtime = match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(rt) => rt,
                        Err(err) => {
                            tracing::error!("failed to build namespace task runtime: {err}");
                            return;
                        }
                    };
                    runtime.block_on(make_future());
                })
                .expect("spawn namespace-pinned task thread");
            TaskHandle::Pinned(Some(thread))
        }
    }
}

fn namespace_of(target: Option<&Target>) -> Option<String> {
    match target {
        Some(t) if t.is_namespace() => Some(t.name().to_string()),
        _ => None,
    }
}

fn resolve_addr(ip: &str, port: u16) -> Option<SocketAddr> {
    format!("{ip}:{port}").parse().ok().or_else(|| {
        format!("[{ip}]:{port}").parse().ok()
    })
}

/// Owns a running probe loop for one rule. One per `ruleid` (§4.4).
pub struct ClientTask {
    handle: TaskHandle,
    stop: StopEvent,
}

impl ClientTask {
    pub fn spawn(rule: TrafficRule, sink: std::sync::Arc<dyn RecordSink>) -> Self {
        let stop = StopEvent::new();
        stop.clear();
        let namespace = namespace_of(rule.src_target.as_ref());
        let task_stop = stop.clone();
        let handle = spawn_scoped(namespace, move || {
            Box::pin(client_loop(rule, sink, task_stop)) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        Self { handle, stop }
    }

    pub fn stop(&self) {
        self.stop.set();
    }

    pub async fn close(self, join_timeout: Duration) -> Result<(), crate::error::TaskError> {
        self.stop.set();
        self.handle.join(join_timeout).await
    }
}

async fn client_loop(rule: TrafficRule, sink: std::sync::Arc<dyn RecordSink>, stop: StopEvent) {
    let Some(addr) = resolve_addr(&rule.dst, rule.port) else {
        tracing::error!("unable to resolve destination address for rule {}", rule.ruleid);
        return;
    };
    let payload = rule.payload.clone().into_bytes();
    let interval = Duration::from_secs_f64(rule.effective_interval().max(0.0));
    let mut remaining = rule.tries;

    loop {
        if stop.is_set() {
            return;
        }
        if let Some(tries) = remaining {
            if tries == 0 {
                return;
            }
        }

        let outcome = ping_with_retries(rule.protocol, addr, &payload, rule.attempts).await;
        let result = rule.connected == outcome.echoed;
        let record = TrafficRecord {
            timestamp: Utc::now().timestamp(),
            reqid: rule.reqid.clone(),
            ruleid: rule.ruleid.clone(),
            source: rule.src.clone(),
            destination: rule.dst.clone(),
            protocol: rule.protocol.to_string(),
            port: rule.port as i64,
            expected: rule.connected,
            result,
            latency: outcome.latency_ms,
            error: outcome.error,
        }
        .with_truncated_error();

        if let Err(_dropped) = sink.try_enqueue(record) {
            tracing::warn!("traffic record queue full, dropping record for rule {}", rule.ruleid);
        }

        if let Some(tries) = remaining.as_mut() {
            *tries -= 1;
        }

        tokio::select! {
            _ = stop.wait() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Up to `attempts` retries within a single probe, keeping the last outcome
/// (or the first success) per §4.1.
async fn ping_with_retries(
    protocol: crate::types::Protocol,
    addr: SocketAddr,
    payload: &[u8],
    attempts: u32,
) -> crate::client::ProbeOutcome {
    let attempts = attempts.max(1);
    let mut last = crate::client::ProbeOutcome {
        echoed: false,
        latency_ms: 0.0,
        error: "no attempts made".to_string(),
    };
    for _ in 0..attempts {
        last = probe_once(protocol, addr, payload, DEFAULT_SOCKET_TIMEOUT).await;
        if last.echoed {
            break;
        }
    }
    last
}

/// Owns a running echo/status server shared by every rule with the same
/// `(target, protocol, port)` key (§4.4).
pub struct ServerTask {
    handle: TaskHandle,
    stop: StopEvent,
}

impl ServerTask {
    pub fn spawn(target: Target, protocol: crate::types::Protocol, port: u16) -> Self {
        let stop = StopEvent::new();
        stop.clear();
        let namespace = namespace_of(Some(&target));
        let task_stop = stop.clone();
        let bind_ip = if target.is_namespace() {
            "0.0.0.0".to_string()
        } else {
            "0.0.0.0".to_string()
        };
        let handle = spawn_scoped(namespace, move || {
            Box::pin(async move {
                let Some(addr) = resolve_addr(&bind_ip, port) else {
                    tracing::error!("invalid bind address for server on port {port}");
                    return;
                };
                if let Err(err) = run_server(protocol, addr, task_stop).await {
                    tracing::error!("traffic server on port {port} exited with error: {err}");
                }
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        Self { handle, stop }
    }

    pub fn stop(&self) {
        self.stop.set();
    }

    pub async fn close(self, join_timeout: Duration) -> Result<(), crate::error::TaskError> {
        self.stop.set();
        self.handle.join(join_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Protocol, RuleState, Target};
    use std::sync::{Arc, Mutex};

    struct CollectingSink(Arc<Mutex<Vec<TrafficRecord>>>);

    impl RecordSink for CollectingSink {
        fn try_enqueue(&self, record: TrafficRecord) -> Result<(), TrafficRecord> {
            self.0.lock().unwrap().push(record);
            Ok(())
        }
    }

    #[tokio::test]
    async fn client_task_records_successful_tcp_echo() {
        let server_target = Target::VMHost {
            name: "local".into(),
            ip: "127.0.0.1".into(),
        };
        let server = ServerTask::spawn(server_target, Protocol::Tcp, 19465);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn RecordSink> = Arc::new(CollectingSink(collected.clone()));

        let rule = TrafficRule {
            ruleid: "rule-1".into(),
            reqid: "req-1".into(),
            src: "127.0.0.1".into(),
            dst: "127.0.0.1".into(),
            protocol: Protocol::Tcp,
            port: 19465,
            connected: true,
            payload: "hi".into(),
            tries: Some(2),
            attempts: 1,
            frequency: None,
            interval: Some(0.1),
            state: RuleState::Active,
            src_host: Some("127.0.0.1".into()),
            dst_host: Some("127.0.0.1".into()),
            src_target: None,
            dst_target: None,
            tool: None,
        };

        let client = ClientTask::spawn(rule, sink);
        tokio::time::sleep(Duration::from_millis(500)).await;
        client.close(Duration::from_secs(2)).await.unwrap();
        server.close(Duration::from_secs(2)).await.unwrap();

        let records = collected.lock().unwrap();
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.result));
    }
}
