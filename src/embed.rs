//! Local embedding provider (spec §4.6 vector/hybrid modes, §9 "cached
//! embedding model").
//!
//! The provider is resolved once per process and reused; failure to resolve
//! one (missing feature, model not cached) is not fatal — vector mode
//! reports "not ready" and hybrid downgrades to text-only (spec §7 "Model").

use anyhow::Result;

pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier stored in `chunk_vectors.model_uri` and used to
    /// key the vector table's dimensionality (spec §3 `ChunkVector`).
    fn model_uri(&self) -> &str;

    fn dims(&self) -> usize;

    /// Embed one piece of text. `is_query` task-prefixes query text
    /// differently from document text when the underlying model expects it.
    fn embed(&self, text: &str, is_query: bool) -> Result<Vec<f32>>;
}

pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

#[cfg(feature = "local-embeddings")]
mod fastembed_provider {
    use super::EmbeddingProvider;
    use anyhow::{Context, Result};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Wraps the bundled-ORT `fastembed` model behind a `Mutex` since
    /// `TextEmbedding::embed` takes `&mut self`.
    pub struct FastEmbedProvider {
        model: Mutex<TextEmbedding>,
        model_uri: String,
        dims: usize,
    }

    impl FastEmbedProvider {
        pub fn new(model_name: Option<&str>, cache_dir: &std::path::Path) -> Result<Self> {
            let model = match model_name {
                Some("bge-small-en-v1.5") | None => EmbeddingModel::BGESmallENV15,
                Some("bge-base-en-v1.5") => EmbeddingModel::BGEBaseENV15,
                Some(other) => anyhow::bail!("unknown local embedding model: {other}"),
            };
            let dims = match model {
                EmbeddingModel::BGESmallENV15 => 384,
                EmbeddingModel::BGEBaseENV15 => 768,
                _ => 384,
            };
            let model_uri = format!("fastembed:{model:?}");

            let embedding = TextEmbedding::try_new(
                InitOptions::new(model).with_cache_dir(cache_dir.to_path_buf()),
            )
            .context("failed to initialize local embedding model")?;

            Ok(Self {
                model: Mutex::new(embedding),
                model_uri,
                dims,
            })
        }
    }

    impl EmbeddingProvider for FastEmbedProvider {
        fn model_uri(&self) -> &str {
            &self.model_uri
        }

        fn dims(&self) -> usize {
            self.dims
        }

        fn embed(&self, text: &str, is_query: bool) -> Result<Vec<f32>> {
            let prefixed = if is_query {
                format!("query: {text}")
            } else {
                format!("passage: {text}")
            };
            let mut model = self.model.lock().unwrap();
            let mut vectors = model
                .embed(vec![prefixed], None)
                .map_err(|e| anyhow::anyhow!("embedding failed: {e}"))?;
            vectors
                .pop()
                .ok_or_else(|| anyhow::anyhow!("embedding model returned no vector"))
        }
    }
}

/// Resolve the configured (or default) local embedding provider. Returns
/// `None` when the `local-embeddings` feature is disabled or the model
/// cannot be initialized — callers must treat that as "not ready", not as a
/// hard error.
pub fn resolve_provider(
    model_name: Option<&str>,
    cache_dir: &std::path::Path,
) -> Option<Box<dyn EmbeddingProvider>> {
    #[cfg(feature = "local-embeddings")]
    {
        match fastembed_provider::FastEmbedProvider::new(model_name, cache_dir) {
            Ok(provider) => return Some(Box::new(provider)),
            Err(e) => {
                tracing::warn!(error = %e, "local embedding model not available");
                return None;
            }
        }
    }
    #[cfg(not(feature = "local-embeddings"))]
    {
        let _ = (model_name, cache_dir);
        None
    }
}

/// Outcome of embedding one source's pending (or, with `force`, all)
/// chunks.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct EmbedSummary {
    pub source_name: String,
    pub embedded: u64,
    pub error: Option<String>,
}

const EMBED_BATCH_SIZE: i64 = 64;

/// Embed a single library DB's pending chunks for `provider`'s model (spec
/// §6 `embed [--source S] [--model U] [--force]`).
///
/// Ensures the vector table matches the provider's dimensionality first
/// (spec §3 invariant 5, §8 scenario 6): a dimension change drops every
/// existing vector, so a subsequent `--force` is not required to pick up a
/// new model. With `force`, this model's existing vectors are cleared
/// before re-embedding so every chunk is redone rather than just the
/// previously-unembedded ones.
pub async fn embed_source(
    pool: &sqlx::SqlitePool,
    source_name: &str,
    provider: &dyn EmbeddingProvider,
    force: bool,
) -> anyhow::Result<EmbedSummary> {
    use crate::store::{library, migrations};

    migrations::ensure_vector_table(pool, provider.dims() as i64).await?;
    if force {
        library::clear_embeddings(pool, provider.model_uri()).await?;
    }

    let mut embedded = 0u64;
    loop {
        let chunks = library::find_chunks_missing_embedding(pool, provider.model_uri(), EMBED_BATCH_SIZE).await?;
        if chunks.is_empty() {
            break;
        }
        for chunk in &chunks {
            let vector = provider.embed(&chunk.content, false)?;
            let bytes = vector_to_bytes(&vector);
            library::upsert_embedding(
                pool,
                chunk.id,
                &chunk.document_id,
                provider.model_uri(),
                vector.len() as i64,
                &bytes,
            )
            .await?;
            embedded += 1;
        }
    }

    Ok(EmbedSummary {
        source_name: source_name.to_string(),
        embedded,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_to_bytes_round_trips_little_endian_f32() {
        let vector = vec![1.0f32, -2.5, 0.0];
        let bytes = vector_to_bytes(&vector);
        assert_eq!(bytes.len(), 12);
        let restored: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(restored, vector);
    }
}
