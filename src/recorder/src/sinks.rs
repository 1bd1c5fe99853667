//! Sink implementations for the recording pipeline (§4.8).
//!
//! Every sink honours its own enable flag upstream (the pipeline simply
//! omits disabled sinks from its fan-out list) and must never propagate a
//! write failure as anything but a logged, swallowed error - a flaky remote
//! sink must not stall the queue worker.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::RecorderError;
use lydian_traffic::{ResourceRecord, TrafficRecord};

#[async_trait]
pub trait TrafficSink: Send + Sync {
    async fn write(&self, record: &TrafficRecord) -> Result<(), RecorderError>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ResourceSink: Send + Sync {
    async fn write(&self, record: &ResourceRecord) -> Result<(), RecorderError>;
    fn name(&self) -> &'static str;
}

/// Appends to the local `traffic` / `resource` sqlite tables
/// (`SQLITE_TRAFFIC_RECORDING`).
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub async fn new(pool: SqlitePool) -> Result<Self, RecorderError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS traffic (
                timestamp INTEGER NOT NULL,
                reqid TEXT NOT NULL,
                ruleid TEXT NOT NULL,
                source TEXT NOT NULL,
                destination TEXT NOT NULL,
                protocol TEXT NOT NULL,
                port INTEGER NOT NULL,
                expected INTEGER NOT NULL,
                result INTEGER NOT NULL,
                latency REAL NOT NULL,
                error TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS resource (
                timestamp INTEGER NOT NULL,
                system_cpu_percent REAL NOT NULL,
                system_mem_percent REAL NOT NULL,
                system_open_conns INTEGER NOT NULL,
                process_cpu_percent REAL NOT NULL,
                process_mem_percent REAL NOT NULL,
                process_open_conns INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TrafficSink for SqliteSink {
    async fn write(&self, record: &TrafficRecord) -> Result<(), RecorderError> {
        sqlx::query(
            "INSERT INTO traffic (timestamp, reqid, ruleid, source, destination, protocol, port, expected, result, latency, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(record.timestamp)
        .bind(&record.reqid)
        .bind(&record.ruleid)
        .bind(&record.source)
        .bind(&record.destination)
        .bind(&record.protocol)
        .bind(record.port)
        .bind(record.expected)
        .bind(record.result)
        .bind(record.latency)
        .bind(&record.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[async_trait]
impl ResourceSink for SqliteSink {
    async fn write(&self, record: &ResourceRecord) -> Result<(), RecorderError> {
        sqlx::query(
            "INSERT INTO resource (timestamp, system_cpu_percent, system_mem_percent, system_open_conns, process_cpu_percent, process_mem_percent, process_open_conns)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(record.timestamp)
        .bind(record.system_cpu_percent)
        .bind(record.system_mem_percent)
        .bind(record.system_open_conns)
        .bind(record.process_cpu_percent)
        .bind(record.process_mem_percent)
        .bind(record.process_open_conns)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

/// Writes Wavefront plaintext line-protocol metrics, direct to a proxy
/// (`WAVEFRONT_PROXY_HOST`/`WAVEFRONT_PROXY_PORT`, `WAVEFRONT_TRAFFIC_RECORDING`).
pub struct WavefrontSink {
    host: String,
    port: u16,
    metric_prefix: String,
}

impl WavefrontSink {
    pub fn new(host: impl Into<String>, port: u16, metric_prefix: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            metric_prefix: metric_prefix.into(),
        }
    }

    async fn send_line(&self, line: &str) -> Result<(), RecorderError> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl TrafficSink for WavefrontSink {
    async fn write(&self, record: &TrafficRecord) -> Result<(), RecorderError> {
        let proto = record.protocol.to_ascii_lowercase();
        let tags = format!(
            "source=\"{}\" reqid=\"{}\" ruleid=\"{}\" destination=\"{}\"",
            record.source, record.reqid, record.ruleid, record.destination
        );
        let result_line = format!(
            "{}.{}.result {} {} {}\n",
            self.metric_prefix,
            proto,
            if record.result { 1 } else { 0 },
            record.timestamp,
            tags
        );
        let latency_line = format!(
            "{}.{}.latency {} {} {}\n",
            self.metric_prefix, proto, record.latency, record.timestamp, tags
        );
        self.send_line(&result_line).await?;
        self.send_line(&latency_line).await
    }

    fn name(&self) -> &'static str {
        "wavefront"
    }
}

/// Writes one JSON document per record (`ELASTICSEARCH_HOST`/`INDEX`,
/// `ELASTICSEARCH_TRAFFIC_RECORDING`).
pub struct ElasticsearchSink {
    client: reqwest::Client,
    host: String,
    index: String,
}

impl ElasticsearchSink {
    pub fn new(host: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.into(),
            index: index.into(),
        }
    }
}

#[async_trait]
impl TrafficSink for ElasticsearchSink {
    async fn write(&self, record: &TrafficRecord) -> Result<(), RecorderError> {
        let url = format!("http://{}/{}/_doc", self.host, self.index);
        self.client
            .post(url)
            .json(record)
            .send()
            .await
            .map_err(|err| RecorderError::Sink(err.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "elasticsearch"
    }
}
