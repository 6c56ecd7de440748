//! REST client for the vector store (C10's upsert target). Plain
//! collections/points/search JSON contract per the system design — not
//! a gRPC binding, so it follows the same hand-rolled `reqwest` shape as
//! [`crate::provider::ProviderClient`] rather than pulling in a
//! store-specific SDK.

use ai_plane_core::AiPlaneError;
use ai_plane_core::http_client::HTTP_CLIENT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct VectorStoreClient {
    base_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct VectorsConfig {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorsConfig,
}

#[derive(Serialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

#[derive(Serialize)]
struct UpsertPointsRequest {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    pub id: Value,
    pub score: f32,
    pub payload: Value,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

impl VectorStoreClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, request_timeout: Duration) -> Self {
        Self { base_url: base_url.into(), api_key, request_timeout }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.request_timeout);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        let url = self.endpoint(&format!("/collections/{}", name));
        let response = self
            .request(HTTP_CLIENT.get(&url))
            .send()
            .await
            .context("vector store collection lookup failed")?;
        match response.status() {
            reqwest::StatusCode::OK => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(AiPlaneError::Internal(anyhow::anyhow!(
                "vector store collection lookup returned {}",
                status
            ))
            .into()),
        }
    }

    pub async fn create_collection(&self, name: &str, vector_size: usize, distance: &str) -> Result<()> {
        let url = self.endpoint(&format!("/collections/{}", name));
        let body = CreateCollectionRequest {
            vectors: VectorsConfig { size: vector_size, distance: distance.to_string() },
        };
        let response = self
            .request(HTTP_CLIENT.put(&url))
            .json(&body)
            .send()
            .await
            .context("vector store collection creation failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AiPlaneError::Internal(anyhow::anyhow!(
                "vector store collection creation returned {}: {}",
                status,
                text
            ))
            .into());
        }
        Ok(())
    }

    pub async fn ensure_collection(&self, name: &str, vector_size: usize, distance: &str) -> Result<()> {
        if !self.collection_exists(name).await? {
            self.create_collection(name, vector_size, distance).await?;
        }
        Ok(())
    }

    pub async fn upsert_points(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&format!("/collections/{}/points", collection));
        let response = self
            .request(HTTP_CLIENT.put(&url))
            .json(&UpsertPointsRequest { points })
            .send()
            .await
            .context("vector store upsert failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AiPlaneError::Internal(anyhow::anyhow!(
                "vector store upsert returned {}: {}",
                status,
                text
            ))
            .into());
        }
        Ok(())
    }

    pub async fn search(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let url = self.endpoint(&format!("/collections/{}/points/search", collection));
        let response = self
            .request(HTTP_CLIENT.post(&url))
            .json(&SearchRequest { vector, limit, with_payload: true })
            .send()
            .await
            .context("vector store search failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AiPlaneError::Internal(anyhow::anyhow!(
                "vector store search returned {}: {}",
                status,
                text
            ))
            .into());
        }
        let parsed: SearchResponse = response.json().await.context("failed to parse search response")?;
        Ok(parsed.result)
    }
}
