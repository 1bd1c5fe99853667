//! Recording pipeline - bounded queues fanning records out to sinks (§4.8)
//!
//! Two bounded queues, one worker each, feed every configured sink (local
//! sqlite, Wavefront, Elasticsearch for traffic records; sqlite for resource
//! records). Enqueue from the prober is always non-blocking: a full queue
//! drops the record and increments a counter surfaced through
//! `dropped_traffic_records`/`dropped_resource_records`.
//!
//! A `ResourceMonitor` samples system and process CPU/memory/open-connection
//! counts on an interval and feeds them through the same pipeline.

pub mod error;
pub mod pipeline;
pub mod queue;
pub mod resource_monitor;
pub mod sinks;

pub use error::RecorderError;
pub use pipeline::{RecordingPipeline, TrafficQueueHandle};
pub use queue::RecordQueue;
pub use resource_monitor::{ResourceMonitor, DEFAULT_SAMPLE_INTERVAL};
pub use sinks::{ElasticsearchSink, ResourceSink, SqliteSink, TrafficSink, WavefrontSink};
