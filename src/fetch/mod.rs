//! Reads data sources from local paths or over HTTP.

mod basic;

pub use basic::BasicClient;

use crate::error::{RaterError, RaterResult};
use async_trait::async_trait;
use reqwest::{Request, Response};
use tracing::debug;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// GETs `url` and returns the body. Non-success statuses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> RaterResult<Vec<u8>> {
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|e| RaterError::Configuration(format!("invalid url {url}: {e}")))?;
    let req = Request::new(reqwest::Method::GET, parsed);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| RaterError::DataSource(format!("{url}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(RaterError::DataSource(format!("{url} returned status {status}")));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| RaterError::DataSource(format!("{url}: {e}")))?;
    Ok(bytes.to_vec())
}

/// Loads a source from a local file path, or fetches it when it looks like a URL.
#[tracing::instrument(skip(client), fields(source = %source))]
pub async fn read_source<C: HttpClient>(client: &C, source: &str) -> RaterResult<Vec<u8>> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_bytes(client, source).await?
    } else {
        tokio::fs::read(source)
            .await
            .map_err(|e| RaterError::DataSource(format!("{source}: {e}")))?
    };
    debug!(bytes = bytes.len(), "Source read");
    Ok(bytes)
}
