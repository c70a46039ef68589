// External collaborator sinks
//
// The worker fetches job payloads from the object store; telemetry points go
// to a time-series write endpoint. Both are narrow contracts behind traits so
// tests can run against the in-memory variants.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;

/// Object storage for job payloads
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, returning the stored object key
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String>;
}

/// S3-style object store over plain HTTP PUT
pub struct HttpBlobStore {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl HttpBlobStore {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
        }
    }

    /// Requires BLOB_ENDPOINT and BLOB_BUCKET
    pub fn from_env() -> Result<Self> {
        let endpoint =
            std::env::var("BLOB_ENDPOINT").context("BLOB_ENDPOINT environment variable required")?;
        let bucket =
            std::env::var("BLOB_BUCKET").context("BLOB_BUCKET environment variable required")?;
        Ok(Self::new(endpoint, bucket))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        let url = format!("{}/{}/{}", self.endpoint, self.bucket, key);
        let response = self
            .client
            .put(&url)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("blob upload to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("blob upload to {url} returned {status}"));
        }
        debug!(key = %key, "payload stored");
        Ok(key.to_string())
    }
}

/// In-memory blob store for tests
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(key.to_string())
    }
}

/// One telemetry point, field values already coerced to floats
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub measurement: String,
    pub tags: HashMap<String, String>,
    pub fields: HashMap<String, f64>,
}

/// Time-series write endpoint
#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    async fn write_point(&self, record: TelemetryRecord) -> Result<()>;
}

/// InfluxDB v2 line-protocol sink
pub struct InfluxSink {
    client: Client,
    url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxSink {
    /// Requires TSDB_URL, TSDB_TOKEN, TSDB_ORG and TSDB_BUCKET
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            url: std::env::var("TSDB_URL").context("TSDB_URL environment variable required")?,
            token: std::env::var("TSDB_TOKEN").context("TSDB_TOKEN environment variable required")?,
            org: std::env::var("TSDB_ORG").context("TSDB_ORG environment variable required")?,
            bucket: std::env::var("TSDB_BUCKET")
                .context("TSDB_BUCKET environment variable required")?,
        })
    }

    fn line_protocol(record: &TelemetryRecord) -> String {
        let mut line = escape_key(&record.measurement);
        let mut tags: Vec<_> = record.tags.iter().collect();
        tags.sort();
        for (key, value) in tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }
        line.push(' ');
        let mut fields: Vec<_> = record.fields.iter().collect();
        fields.sort_by_key(|(key, _)| key.as_str());
        for (i, (key, value)) in fields.into_iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_string());
        }
        line.push(' ');
        line.push_str(&Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string());
        line
    }
}

fn escape_key(raw: &str) -> String {
    raw.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}

#[async_trait]
impl TimeSeriesSink for InfluxSink {
    async fn write_point(&self, record: TelemetryRecord) -> Result<()> {
        let url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ns",
            self.url, self.org, self.bucket
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(Self::line_protocol(&record))
            .send()
            .await
            .context("telemetry write request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("telemetry write returned {status}"));
        }
        Ok(())
    }
}

/// In-memory sink for tests
#[derive(Default)]
pub struct MemorySink {
    points: Mutex<Vec<TelemetryRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> Vec<TelemetryRecord> {
        self.points.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeSeriesSink for MemorySink {
    async fn write_point(&self, record: TelemetryRecord) -> Result<()> {
        self.points.lock().unwrap().push(record);
        Ok(())
    }
}
