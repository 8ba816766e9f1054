//! Milvus similarity index over the REST v2 API.
//!
//! Cells are stored in a Milvus collection keyed by an `Int64` primary key
//! with one float vector field. A k-NN query by id takes two steps:
//!
//! ```text
//! ids → POST /v2/vectordb/entities/get    → stored vectors
//!     → POST /v2/vectordb/entities/search → ranked neighbors (one call per vector)
//! ```
//!
//! Collection lifecycle (create, insert, drop) is out of scope here.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use tracing::{debug, warn};

use crate::model::{CellId, NeighborMatch};
use crate::{Error, Result};
use super::{IndexCapabilities, QueryResponse, SimilarityIndex};

/// Hard ceiling Milvus puts on `limit` for a single search.
pub const MILVUS_MAX_TOPK: usize = 16_384;

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for a Milvus collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MilvusConfig {
    pub uri: String,
    pub token: Option<String>,
    pub db_name: Option<String>,
    pub collection: String,
    pub vector_field: String,
    /// Scalar field copied into `NeighborMatch::source` (e.g. the source file).
    pub source_field: Option<String>,
    pub timeout_ms: u64,
    pub max_batch_size: usize,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:19530".to_string(),
            token: None,
            db_name: None,
            collection: String::new(),
            vector_field: "vector".to_string(),
            source_field: None,
            timeout_ms: 30_000,
            max_batch_size: 100,
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Reply<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

// ============================================================================
// MilvusIndex
// ============================================================================

/// Similarity index backed by a Milvus collection.
pub struct MilvusIndex {
    client: Client,
    config: MilvusConfig,
}

impl MilvusIndex {
    /// Build the HTTP client. No request is sent until `health_check` or `query`.
    pub fn connect(config: MilvusConfig) -> Result<Self> {
        if config.collection.is_empty() {
            return Err(Error::InvalidInput("Milvus collection name is empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::IndexUnavailable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MilvusConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v2/vectordb/{}", self.config.uri.trim_end_matches('/'), path)
    }

    fn body(&self, mut fields: Map<String, Json>) -> Json {
        fields.insert("collectionName".into(), json!(self.config.collection));
        if let Some(db) = &self.config.db_name {
            fields.insert("dbName".into(), json!(db));
        }
        Json::Object(fields)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Json) -> std::result::Result<Option<T>, String> {
        let mut request = self.client.post(self.endpoint(path)).json(body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| format!("{path}: request failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("{path}: HTTP {status}"));
        }
        let reply: Reply<T> = response
            .json()
            .await
            .map_err(|e| format!("{path}: malformed reply: {e}"))?;
        if reply.code != 0 {
            return Err(format!(
                "{path}: code {}: {}",
                reply.code,
                reply.message.unwrap_or_default()
            ));
        }
        Ok(reply.data)
    }

    /// Fetch stored vectors for `ids`. Ids without a row are absent from the map.
    async fn fetch_vectors(&self, ids: &[CellId]) -> std::result::Result<HashMap<CellId, Vec<f32>>, String> {
        let mut fields = Map::new();
        fields.insert("id".into(), json!(ids.iter().map(|id| id.0).collect::<Vec<_>>()));
        fields.insert("outputFields".into(), json!([self.config.vector_field]));
        let rows: Vec<Map<String, Json>> = self
            .post("entities/get", &self.body(fields))
            .await?
            .unwrap_or_default();

        let mut vectors = HashMap::with_capacity(rows.len());
        for row in rows {
            let Some(id) = row.get("id").and_then(Json::as_u64) else { continue };
            let Some(values) = row.get(&self.config.vector_field).and_then(Json::as_array) else {
                continue;
            };
            let vector = values.iter().filter_map(Json::as_f64).map(|v| v as f32).collect();
            vectors.insert(CellId(id), vector);
        }
        Ok(vectors)
    }

    async fn search_one(&self, vector: &[f32], k: usize) -> std::result::Result<Vec<NeighborMatch<CellId>>, String> {
        let mut fields = Map::new();
        fields.insert("data".into(), json!([vector]));
        fields.insert("annsField".into(), json!(self.config.vector_field));
        fields.insert("limit".into(), json!(k.min(MILVUS_MAX_TOPK)));
        let output: Vec<&str> = self.config.source_field.iter().map(String::as_str).collect();
        fields.insert("outputFields".into(), json!(output));

        let hits: Vec<Map<String, Json>> = self
            .post("entities/search", &self.body(fields))
            .await?
            .unwrap_or_default();

        Ok(hits
            .iter()
            .filter_map(|hit| {
                let id = hit.get("id").and_then(Json::as_u64)?;
                let score = hit.get("distance").and_then(Json::as_f64).unwrap_or(0.0);
                let mut m = NeighborMatch::new(CellId(id), score);
                if let Some(source) = self.config.source_field.as_ref()
                    .and_then(|f| hit.get(f))
                    .and_then(Json::as_str)
                {
                    m = m.with_source(source);
                }
                Some(m)
            })
            .collect())
    }
}

// ============================================================================
// SimilarityIndex impl
// ============================================================================

#[async_trait]
impl SimilarityIndex for MilvusIndex {
    type Id = CellId;

    async fn health_check(&self) -> Result<()> {
        let body = self.body(Map::new());
        self.post::<Json>("collections/describe", &body)
            .await
            .map(|_| ())
            .map_err(Error::IndexUnavailable)
    }

    async fn query(&self, ids: &[CellId], k: usize) -> Result<QueryResponse<CellId>> {
        let failed = |message: String| Error::BatchQueryFailed {
            ids: ids.iter().map(ToString::to_string).collect(),
            message,
        };

        let vectors = self.fetch_vectors(ids).await.map_err(failed)?;
        let mut response = QueryResponse::new();
        let mut present = Vec::with_capacity(ids.len());
        for id in ids {
            if vectors.contains_key(id) {
                present.push(*id);
            } else {
                response.mark_missing(*id);
            }
        }
        if response.is_partial() {
            debug!(missing = response.missing.len(), "Milvus has no rows for some queried ids");
        }

        let searches = present.iter().map(|id| {
            let vector = &vectors[id];
            async move { self.search_one(vector, k).await.map(|hits| (*id, hits)) }
        });
        let answers = futures::future::try_join_all(searches).await.map_err(|e| {
            warn!(error = %e, "Milvus search failed");
            failed(e)
        })?;

        for (id, hits) in answers {
            response.insert(id, hits);
        }
        Ok(response)
    }

    fn capabilities(&self) -> IndexCapabilities {
        IndexCapabilities {
            max_batch_size: Some(self.config.max_batch_size.max(1)),
            max_neighbors: Some(MILVUS_MAX_TOPK),
            includes_self: true,
        }
    }
}
