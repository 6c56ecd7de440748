//! C10 — rag seed: deterministically upsert rubric/job text into a named
//! vector collection so retrieval results are stable across restarts.

use crate::provider::ProviderClient;
use crate::vector_store::{Point, VectorStoreClient};
use ai_plane_core::AiPlaneError;
use ai_plane_core::config::RagSeedConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
struct SeedDataItem {
    text: String,
    #[serde(rename = "type", default)]
    item_type: Option<String>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    weight: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SeedFileShape {
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    texts: Vec<String>,
    #[serde(default)]
    data: Vec<SeedDataItem>,
}

struct SeedText {
    text: String,
    item_type: Option<String>,
    section: Option<String>,
    weight: Option<f64>,
}

fn point_id(collection: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update(b":");
    hasher.update(text.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Parse the YAML document, preferring `data` (metadata-backed) entries,
/// then `items`, then `texts`. Falls back to a bare string list if none
/// of those shapes produced anything. Result is deduplicated in order of
/// first appearance.
fn parse_seed_texts(raw: &str) -> Vec<SeedText> {
    let mut ordered = Vec::new();
    let mut seen = std::collections::HashSet::new();

    let mut push = |text: String, item_type: Option<String>, section: Option<String>, weight: Option<f64>| {
        let trimmed = text.trim().to_string();
        if trimmed.is_empty() || !seen.insert(trimmed.clone()) {
            return;
        }
        ordered.push(SeedText { text: trimmed, item_type, section, weight });
    };

    if let Ok(shape) = serde_yaml::from_str::<SeedFileShape>(raw) {
        for item in &shape.data {
            push(item.text.clone(), item.item_type.clone(), item.section.clone(), item.weight);
        }
        for item in &shape.items {
            push(item.clone(), None, None, None);
        }
        for item in &shape.texts {
            push(item.clone(), None, None, None);
        }
    }

    if ordered.is_empty()
        && let Ok(bare) = serde_yaml::from_str::<Vec<String>>(raw)
    {
        for item in bare {
            push(item, None, None, None);
        }
    }

    ordered
}

fn resolve_path(path: &Path, allow_absolute: bool) -> Result<PathBuf> {
    if path.is_absolute() {
        if allow_absolute {
            return Ok(path.to_path_buf());
        }
        return Err(AiPlaneError::InvalidArgument(format!(
            "absolute seed path {} rejected (set RAG_SEED_ALLOW_ABSOLUTE_PATHS=true to allow)",
            path.display()
        ))
        .into());
    }
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let joined = cwd.join(path);
    let canonical = joined
        .canonicalize()
        .with_context(|| format!("seed path {} does not exist", joined.display()))?;
    if !canonical.starts_with(&cwd) {
        return Err(AiPlaneError::InvalidArgument(format!(
            "seed path {} escapes the working directory",
            path.display()
        ))
        .into());
    }
    Ok(canonical)
}

pub struct RagSeeder {
    provider: ProviderClient,
    vector_store: VectorStoreClient,
    config: RagSeedConfig,
    embedding_model: String,
    vector_size: usize,
    distance: String,
}

impl RagSeeder {
    pub fn new(
        provider: ProviderClient,
        vector_store: VectorStoreClient,
        config: RagSeedConfig,
        embedding_model: impl Into<String>,
        vector_size: usize,
        distance: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            vector_store,
            config,
            embedding_model: embedding_model.into(),
            vector_size,
            distance: distance.into(),
        }
    }

    /// Parse `path`, embed its deduplicated text list in batches, and
    /// upsert the resulting points into `collection`.
    pub async fn seed_file(&self, path: impl AsRef<Path>, collection: &str) -> Result<usize> {
        let path = path.as_ref();
        let resolved = resolve_path(path, self.config.allow_absolute_paths)?;
        let raw = std::fs::read_to_string(&resolved)
            .with_context(|| format!("failed to read seed file {}", resolved.display()))?;

        let texts = parse_seed_texts(&raw);
        if texts.is_empty() {
            return Ok(0);
        }

        self.vector_store.ensure_collection(collection, self.vector_size, &self.distance).await?;

        let batch_size = self.config.embed_batch_size.max(1);
        let mut upserted = 0usize;
        for chunk in texts.chunks(batch_size) {
            let batch_texts: Vec<String> = chunk.iter().map(|t| t.text.clone()).collect();
            let vectors = self.provider.embed(&self.embedding_model, &batch_texts).await?;

            let points: Vec<Point> = chunk
                .iter()
                .zip(vectors.into_iter())
                .map(|(seed_text, vector)| {
                    let mut payload = json!({
                        "text": seed_text.text,
                        "source": collection,
                    });
                    if let Some(obj) = payload.as_object_mut() {
                        if let Some(t) = &seed_text.item_type {
                            obj.insert("type".to_string(), json!(t));
                        }
                        if let Some(s) = &seed_text.section {
                            obj.insert("section".to_string(), json!(s));
                        }
                        if let Some(w) = seed_text.weight {
                            obj.insert("weight".to_string(), json!(w));
                        }
                    }
                    Point { id: point_id(collection, &seed_text.text), vector, payload }
                })
                .collect();

            let batch_len = points.len();
            self.vector_store.upsert_points(collection, points).await?;
            upserted += batch_len;
        }

        Ok(upserted)
    }

    /// Seed the two fixed collections (`job_description`, `scoring_rubric`)
    /// from the configured default paths.
    pub async fn seed_default(&self) -> Result<()> {
        self.seed_file(&self.config.job_description_path, "job_description").await?;
        self.seed_file(&self.config.scoring_rubric_path, "scoring_rubric").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_deterministic_for_trimmed_text() {
        let a = point_id("job_description", "hello world");
        let b = point_id("job_description", "  hello world  ");
        assert_eq!(a, b);
    }

    #[test]
    fn point_id_differs_by_collection() {
        let a = point_id("job_description", "hello");
        let b = point_id("scoring_rubric", "hello");
        assert_ne!(a, b);
    }

    #[test]
    fn prefers_data_then_items_then_texts_and_dedupes() {
        let yaml = r#"
data:
  - text: "from data"
    type: "requirement"
items:
  - "from items"
  - "from data"
texts:
  - "from texts"
"#;
        let parsed = parse_seed_texts(yaml);
        let ordered: Vec<&str> = parsed.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(ordered, vec!["from data", "from items", "from texts"]);
    }

    #[test]
    fn falls_back_to_bare_string_list() {
        let yaml = "- one\n- two\n- one\n";
        let parsed = parse_seed_texts(yaml);
        let ordered: Vec<&str> = parsed.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(ordered, vec!["one", "two"]);
    }
}
