//! Persistence of report and certificate snapshots.
//!
//! Snapshots are JSON documents written under date-partitioned keys, either
//! into a local directory or into an S3 bucket, optionally gzip-compressed.

use crate::analyzers::certificate::CertificateSnapshot;
use crate::analyzers::types::CertificateRecord;
use crate::error::{RaterError, RaterResult};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, NaiveDate, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::info;

/// Key under which the certificate snapshot for `date` is stored.
pub fn certificate_snapshot_key(date: NaiveDate) -> String {
    format!("certificates/date={}.json", date.format("%Y-%m-%d"))
}

/// Key under which the ranking report for `date` is stored.
pub fn report_snapshot_key(date: NaiveDate) -> String {
    format!("reports/date={}.json", date.format("%Y-%m-%d"))
}

/// Serializes `value`, gzip-compressing it when asked. Returns the body and
/// the key with a `.gz` suffix if compressed.
fn encode(key: &str, value: &serde_json::Value, gzip: bool) -> RaterResult<(Vec<u8>, String)> {
    let body = serde_json::to_vec(value)?;
    if !gzip {
        return Ok((body, key.to_string()));
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&body)?;
    Ok((encoder.finish()?, format!("{key}.gz")))
}

/// Reverses [`encode`]: bytes of a `.gz` source are decompressed first.
pub fn decode(source: &str, bytes: Vec<u8>) -> RaterResult<Vec<u8>> {
    if !source.ends_with(".gz") {
        return Ok(bytes);
    }
    let mut decoded = Vec::new();
    GzDecoder::new(bytes.as_slice()).read_to_end(&mut decoded)?;
    Ok(decoded)
}

#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Stores `value` under `key`, returning the location written.
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> RaterResult<String>;
}

/// Writes snapshots as files below a root directory.
pub struct LocalSnapshotSink {
    root: PathBuf,
    gzip: bool,
}

impl LocalSnapshotSink {
    pub fn new(root: impl Into<PathBuf>, gzip: bool) -> Self {
        Self {
            root: root.into(),
            gzip,
        }
    }
}

#[async_trait]
impl SnapshotSink for LocalSnapshotSink {
    #[tracing::instrument(skip(self, value), fields(root = %self.root.display()))]
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> RaterResult<String> {
        let (body, key) = encode(key, value, self.gzip)?;
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;

        info!(path = %path.display(), bytes = body.len(), "Snapshot written");
        Ok(path.display().to_string())
    }
}

/// Uploads snapshots to an S3 bucket.
pub struct S3SnapshotSink {
    client: aws_sdk_s3::Client,
    bucket: String,
    gzip: bool,
}

impl S3SnapshotSink {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, gzip: bool) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            gzip,
        }
    }

    /// Builds a client from the ambient AWS environment.
    pub async fn from_env(bucket: impl Into<String>, gzip: bool) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, gzip)
    }
}

#[async_trait]
impl SnapshotSink for S3SnapshotSink {
    #[tracing::instrument(skip(self, value), fields(bucket = %self.bucket))]
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> RaterResult<String> {
        let (body, key) = encode(key, value, self.gzip)?;
        let bytes = body.len();

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json");
        if self.gzip {
            request = request.content_encoding("gzip");
        }
        request
            .send()
            .await
            .map_err(|e| RaterError::Snapshot(format!("s3://{}/{key}: {e}", self.bucket)))?;

        info!(key = %key, bytes, "Snapshot uploaded");
        Ok(format!("s3://{}/{key}", self.bucket))
    }
}

/// Wraps the certificates in a snapshot envelope and stores it under the
/// date of `generated_at`.
pub async fn store_certificates<S: SnapshotSink + ?Sized>(
    sink: &S,
    records: Vec<CertificateRecord>,
    generated_at: DateTime<Utc>,
) -> RaterResult<String> {
    let snapshot = CertificateSnapshot {
        success: true,
        generated_at,
        data: records,
    };
    let key = certificate_snapshot_key(generated_at.date_naive());
    sink.put_json(&key, &serde_json::to_value(&snapshot)?).await
}
