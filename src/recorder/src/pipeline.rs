//! Recording pipeline: one worker per queue, fanning each record out to every
//! configured sink (§4.8).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use lydian_traffic::task::RecordSink;
use lydian_traffic::{ResourceRecord, TrafficRecord};

use crate::queue::{RecordQueue, RECORD_QUEUE_MAXSIZE};
use crate::sinks::{ResourceSink, TrafficSink};

/// How long a worker waits for the next queued record before checking the
/// stop token again.
const WORKER_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Non-blocking handle handed to client tasks; implements `RecordSink` so
/// `lydian-traffic` never needs to know about queues or sinks.
#[derive(Clone)]
pub struct TrafficQueueHandle(RecordQueue<TrafficRecord>);

impl RecordSink for TrafficQueueHandle {
    fn try_enqueue(&self, record: TrafficRecord) -> Result<(), TrafficRecord> {
        self.0.try_enqueue(record)
    }
}

pub struct RecordingPipeline {
    traffic_queue: RecordQueue<TrafficRecord>,
    resource_queue: RecordQueue<ResourceRecord>,
    stop: CancellationToken,
    traffic_worker: tokio::task::JoinHandle<()>,
    resource_worker: tokio::task::JoinHandle<()>,
}

impl RecordingPipeline {
    pub fn start(
        traffic_sinks: Vec<Arc<dyn TrafficSink>>,
        resource_sinks: Vec<Arc<dyn ResourceSink>>,
    ) -> Self {
        let (traffic_queue, traffic_rx) = RecordQueue::bounded(RECORD_QUEUE_MAXSIZE);
        let (resource_queue, resource_rx) = RecordQueue::bounded(RECORD_QUEUE_MAXSIZE);
        let stop = CancellationToken::new();

        let traffic_worker = tokio::spawn(run_traffic_worker(
            traffic_rx,
            traffic_sinks,
            stop.clone(),
        ));
        let resource_worker = tokio::spawn(run_resource_worker(
            resource_rx,
            resource_sinks,
            stop.clone(),
        ));

        Self {
            traffic_queue,
            resource_queue,
            stop,
            traffic_worker,
            resource_worker,
        }
    }

    pub fn traffic_sink_handle(&self) -> TrafficQueueHandle {
        TrafficQueueHandle(self.traffic_queue.clone())
    }

    pub fn enqueue_resource(&self, record: ResourceRecord) -> Result<(), ResourceRecord> {
        self.resource_queue.try_enqueue(record)
    }

    pub fn dropped_traffic_records(&self) -> u64 {
        self.traffic_queue.dropped_count()
    }

    pub fn dropped_resource_records(&self) -> u64 {
        self.resource_queue.dropped_count()
    }

    /// Signals both workers to drain briefly then stop, and joins them with
    /// a bounded wait (`THREADS_JOIN_TIMEOUT`).
    pub async fn close(self, join_timeout: Duration) {
        self.stop.cancel();
        if timeout(join_timeout, self.traffic_worker).await.is_err() {
            warn!("traffic record worker did not stop within {join_timeout:?}");
        }
        if timeout(join_timeout, self.resource_worker).await.is_err() {
            warn!("resource record worker did not stop within {join_timeout:?}");
        }
    }
}

async fn run_traffic_worker(
    mut rx: mpsc::Receiver<TrafficRecord>,
    sinks: Vec<Arc<dyn TrafficSink>>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                while let Ok(record) = rx.try_recv() {
                    dispatch_traffic(&sinks, &record).await;
                }
                return;
            }
            received = timeout(WORKER_POLL_TIMEOUT, rx.recv()) => {
                match received {
                    Ok(Some(record)) => dispatch_traffic(&sinks, &record).await,
                    Ok(None) => return,
                    Err(_elapsed) => continue,
                }
            }
        }
    }
}

async fn dispatch_traffic(sinks: &[Arc<dyn TrafficSink>], record: &TrafficRecord) {
    for sink in sinks {
        if let Err(err) = sink.write(record).await {
            warn!("{} sink failed to write traffic record: {err}", sink.name());
        }
    }
}

async fn run_resource_worker(
    mut rx: mpsc::Receiver<ResourceRecord>,
    sinks: Vec<Arc<dyn ResourceSink>>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                while let Ok(record) = rx.try_recv() {
                    dispatch_resource(&sinks, &record).await;
                }
                return;
            }
            received = timeout(WORKER_POLL_TIMEOUT, rx.recv()) => {
                match received {
                    Ok(Some(record)) => dispatch_resource(&sinks, &record).await,
                    Ok(None) => return,
                    Err(_elapsed) => continue,
                }
            }
        }
    }
}

async fn dispatch_resource(sinks: &[Arc<dyn ResourceSink>], record: &ResourceRecord) {
    for sink in sinks {
        if let Err(err) = sink.write(record).await {
            warn!("{} sink failed to write resource record: {err}", sink.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(Arc<AtomicUsize>);

    #[async_trait]
    impl TrafficSink for CountingSink {
        async fn write(&self, _record: &TrafficRecord) -> Result<(), crate::error::RecorderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn sample_record() -> TrafficRecord {
        TrafficRecord {
            timestamp: 0,
            reqid: "req".into(),
            ruleid: "rule".into(),
            source: "a".into(),
            destination: "b".into(),
            protocol: "TCP".into(),
            port: 1,
            expected: true,
            result: true,
            latency: 1.0,
            error: String::new(),
        }
    }

    #[tokio::test]
    async fn dispatches_to_every_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink: Arc<dyn TrafficSink> = Arc::new(CountingSink(count.clone()));
        let pipeline = RecordingPipeline::start(vec![sink], vec![]);
        let handle = pipeline.traffic_sink_handle();
        handle.try_enqueue(sample_record()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        pipeline.close(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
