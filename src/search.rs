//! Search engine: word (FTS), vector, and hybrid retrieval (spec §4.6).
//!
//! Hybrid fuses lexical and semantic ranked lists with reciprocal-rank
//! fusion, applies a small keyword boost, and reports a confidence derived
//! from the top score.

use crate::config::SearchConfig;
use crate::embed::EmbeddingProvider;
use crate::models::{Chunk, SearchResultItem};
use crate::store::library::{self, FtsHit, VectorHit};
use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

pub const WORD_LIMIT: i64 = 8;
pub const HYBRID_LIMIT: usize = 8;
const RRF_K: f64 = 60.0;
const CANDIDATE_LIMIT: i64 = 50;
const MAX_ALTERNATIVE_QUERIES: usize = 2;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old", "see",
    "two", "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too", "use", "with",
    "from", "this", "that", "what", "have", "will",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Word,
    Vector,
    Hybrid,
}

impl std::str::FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "word" => Ok(SearchMode::Word),
            "vector" => Ok(SearchMode::Vector),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(anyhow::anyhow!("unknown search mode: {other}")),
        }
    }
}

fn sanitize_query_for_fts(query: &str) -> String {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.join(" AND ")
}

fn relaxed_query_for_fts(query: &str) -> String {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|t| !t.is_empty())
        .map(|t| format!("{t}*"))
        .collect();
    tokens.join(" OR ")
}

fn format_slice(chunk: &Chunk) -> String {
    match (chunk.line_start, chunk.line_end) {
        (Some(start), Some(end)) => format!("{start}:{end}"),
        _ => String::new(),
    }
}

fn to_search_item(chunk: &Chunk, source_name: &str, score: f64, confidence: f64) -> SearchResultItem {
    SearchResultItem {
        chunk_id: chunk.id.to_string(),
        document_id: chunk.document_id.clone(),
        title: chunk.doc_title.clone(),
        path: chunk.doc_path.clone(),
        uri: chunk.doc_uri.clone(),
        source_name: source_name.to_string(),
        context_path: chunk.context_path.clone(),
        slice: format_slice(chunk),
        preview: crate::chunk::preview(&chunk.content),
        token_count: chunk.token_count,
        score,
        confidence,
    }
}

fn finalize_confidence(mut items: Vec<(Chunk, f64)>, source_name: &str) -> Vec<SearchResultItem> {
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top = items.first().map(|(_, score)| *score).unwrap_or(0.0);
    items
        .into_iter()
        .map(|(chunk, score)| {
            let confidence = if top > 0.0 { (score / top).clamp(0.0, 1.0) } else { 0.0 };
            to_search_item(&chunk, source_name, score, confidence)
        })
        .collect()
}

/// Word mode: run FTS with the sanitized query, return up to 8 rows (spec
/// §4.6 "Word mode").
pub async fn search_word(
    pool: &SqlitePool,
    query: &str,
    version_label: Option<&str>,
    source_name: &str,
) -> Result<Vec<SearchResultItem>> {
    let sanitized = sanitize_query_for_fts(query);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }
    let hits = library::search_fts(pool, &sanitized, WORD_LIMIT, version_label).await?;
    let items: Vec<(Chunk, f64)> = hits.into_iter().map(|h| (h.chunk, h.score)).collect();
    Ok(finalize_confidence(items, source_name))
}

/// Vector mode: embed the query and run vector search. Returns an error the
/// caller surfaces as "vector search not ready" when no provider resolves.
pub async fn search_vector(
    pool: &SqlitePool,
    query: &str,
    version_label: Option<&str>,
    source_name: &str,
    provider: Option<&dyn EmbeddingProvider>,
) -> Result<Vec<SearchResultItem>> {
    let Some(provider) = provider else {
        anyhow::bail!("vector search not ready");
    };
    let query_vector = provider.embed(query, true)?;
    let hits = library::search_vector(pool, provider.model_uri(), &query_vector, WORD_LIMIT, version_label).await?;
    let items: Vec<(Chunk, f64)> = hits
        .into_iter()
        .map(|h| (h.chunk, 1.0 / (1.0 + h.distance)))
        .collect();
    Ok(finalize_confidence(items, source_name))
}

struct RankedList {
    weight: f64,
    chunk_ids: Vec<i64>,
}

/// Reciprocal-rank fusion with `k = 60`: each hit at rank `r` (0-based)
/// contributes `weight / (k + r + 1)`, plus a small bonus for rank-1 or
/// top-3 placements (spec §4.6 step 6). Order-stable: identical input lists
/// in the same order always produce the same ranking (spec §8).
fn reciprocal_rank_fusion(lists: &[RankedList]) -> HashMap<i64, f64> {
    let mut scores: HashMap<i64, f64> = HashMap::new();
    for list in lists {
        for (rank, chunk_id) in list.chunk_ids.iter().enumerate() {
            let contribution = list.weight / (RRF_K + rank as f64 + 1.0);
            let bonus = if rank == 0 {
                0.02
            } else if rank < 3 {
                0.01
            } else {
                0.0
            };
            *scores.entry(*chunk_id).or_insert(0.0) += contribution + bonus * list.weight;
        }
    }
    scores
}

fn keyword_tokens(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Small boost (≤ 0.08) for exact substring occurrences of query terms,
/// weighted path > title > context > preview (spec §4.6 step 7).
fn keyword_boost(chunk: &Chunk, tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let path = chunk.doc_path.to_lowercase();
    let title = chunk.doc_title.to_lowercase();
    let context = chunk.context_path.to_lowercase();
    let preview = crate::chunk::preview(&chunk.content).to_lowercase();

    let mut boost = 0.0;
    for token in tokens {
        if path.contains(token.as_str()) {
            boost += 0.03;
        }
        if title.contains(token.as_str()) {
            boost += 0.02;
        }
        if context.contains(token.as_str()) {
            boost += 0.015;
        }
        if preview.contains(token.as_str()) {
            boost += 0.01;
        }
    }
    boost.min(0.08)
}

/// `true` when the top text hit is confident enough to skip query expansion
/// (spec §4.6 step 2, GLOSSARY "Strong signal").
fn is_strong_signal(hits: &[FtsHit], config: &SearchConfig, relaxed: bool) -> bool {
    if relaxed || hits.is_empty() {
        return false;
    }
    let top = hits[0].score;
    if top < config.strong_score {
        return false;
    }
    let gap = if hits.len() > 1 { top - hits[1].score } else { top };
    gap >= config.strong_gap
}

struct ChunksById(HashMap<i64, Chunk>);

impl ChunksById {
    fn new() -> Self {
        Self(HashMap::new())
    }
    fn absorb_fts(&mut self, hits: Vec<FtsHit>) -> Vec<i64> {
        let mut ids = Vec::with_capacity(hits.len());
        for hit in hits {
            ids.push(hit.chunk.id);
            self.0.entry(hit.chunk.id).or_insert(hit.chunk);
        }
        ids
    }
    fn absorb_vector(&mut self, hits: Vec<VectorHit>) -> Vec<i64> {
        let mut ids = Vec::with_capacity(hits.len());
        for hit in hits {
            ids.push(hit.chunk.id);
            self.0.entry(hit.chunk.id).or_insert(hit.chunk);
        }
        ids
    }
}

/// Hybrid mode: text + vector search, reciprocal-rank fusion, keyword boost,
/// confidence scoring (spec §4.6 "Hybrid mode").
pub async fn search_hybrid(
    pool: &SqlitePool,
    query: &str,
    version_label: Option<&str>,
    source_name: &str,
    search_config: &SearchConfig,
    provider: Option<&dyn EmbeddingProvider>,
) -> Result<Vec<SearchResultItem>> {
    let sanitized = sanitize_query_for_fts(query);
    let mut relaxed = false;
    let mut hits = if sanitized.is_empty() {
        Vec::new()
    } else {
        library::search_fts(pool, &sanitized, CANDIDATE_LIMIT, version_label).await?
    };
    if hits.is_empty() {
        let relaxed_query = relaxed_query_for_fts(query);
        if !relaxed_query.is_empty() {
            hits = library::search_fts(pool, &relaxed_query, CANDIDATE_LIMIT, version_label).await?;
            relaxed = !hits.is_empty();
        }
    }

    let strong = is_strong_signal(&hits, search_config, relaxed);

    // Query expansion: local alternative-query generation is not wired to a
    // model in this build (no expansion model is bundled), so the
    // alternative-query list stays empty. Hybrid still runs RRF over the
    // original text + vector lists, matching the "downgrade to text-only
    // weighting" path described for when no expansion model is available.
    let alternatives: Vec<String> = if strong {
        Vec::new()
    } else {
        Vec::with_capacity(MAX_ALTERNATIVE_QUERIES)
    };

    let mut chunks = ChunksById::new();
    let mut lists = Vec::new();

    let text_weight = if relaxed { 1.2 } else { 2.0 };
    let text_ids = chunks.absorb_fts(hits);
    lists.push(RankedList { weight: text_weight, chunk_ids: text_ids });

    if let Some(provider) = provider {
        if let Ok(query_vector) = provider.embed(query, true) {
            let vector_hits =
                library::search_vector(pool, provider.model_uri(), &query_vector, CANDIDATE_LIMIT, version_label)
                    .await?;
            let vector_ids = chunks.absorb_vector(vector_hits);
            lists.push(RankedList { weight: 2.0, chunk_ids: vector_ids });
        }

        let alt_weight = if relaxed { 0.7 } else { 1.0 };
        for alt_query in &alternatives {
            let alt_sanitized = sanitize_query_for_fts(alt_query);
            if !alt_sanitized.is_empty() {
                let alt_hits = library::search_fts(pool, &alt_sanitized, CANDIDATE_LIMIT, version_label).await?;
                let alt_ids = chunks.absorb_fts(alt_hits);
                lists.push(RankedList { weight: alt_weight, chunk_ids: alt_ids });
            }
            if let Ok(alt_vector) = provider.embed(alt_query, true) {
                let alt_vector_hits = library::search_vector(
                    pool,
                    provider.model_uri(),
                    &alt_vector,
                    CANDIDATE_LIMIT,
                    version_label,
                )
                .await?;
                let alt_vector_ids = chunks.absorb_vector(alt_vector_hits);
                lists.push(RankedList { weight: alt_weight, chunk_ids: alt_vector_ids });
            }
        }
    }

    let mut fused = reciprocal_rank_fusion(&lists);
    let tokens = keyword_tokens(query);
    for (chunk_id, score) in fused.iter_mut() {
        if let Some(chunk) = chunks.0.get(chunk_id) {
            *score += keyword_boost(chunk, &tokens);
        }
    }

    let mut items: Vec<(Chunk, f64)> = fused
        .into_iter()
        .filter_map(|(id, score)| chunks.0.remove(&id).map(|chunk| (chunk, score)))
        .collect();
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    items.truncate(HYBRID_LIMIT);

    Ok(finalize_confidence(items, source_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_joins_tokens_with_and() {
        assert_eq!(sanitize_query_for_fts("hello world"), "hello AND world");
    }

    #[test]
    fn relaxed_query_ors_prefix_matches() {
        assert_eq!(relaxed_query_for_fts("hello world"), "hello* OR world*");
    }

    #[test]
    fn keyword_tokens_drop_stopwords_and_short_words() {
        let tokens = keyword_tokens("the Hono framework is fast");
        assert!(tokens.contains(&"hono".to_string()));
        assert!(tokens.contains(&"framework".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"is".to_string()));
    }

    #[test]
    fn rrf_is_order_stable_across_repeated_fusion() {
        let lists = vec![
            RankedList { weight: 2.0, chunk_ids: vec![1, 2, 3] },
            RankedList { weight: 1.0, chunk_ids: vec![2, 1] },
        ];
        let first = reciprocal_rank_fusion(&lists);
        let second = reciprocal_rank_fusion(&lists);
        assert_eq!(first.get(&1), second.get(&1));
        assert_eq!(first.get(&2), second.get(&2));
        assert!(first.get(&2) > first.get(&3));
    }

    #[test]
    fn strong_signal_requires_score_and_gap_thresholds() {
        let config = SearchConfig { strong_score: 0.85, strong_gap: 0.15 };
        let strong_hits = vec![
            FtsHit { chunk: sample_chunk(1), score: 0.95 },
            FtsHit { chunk: sample_chunk(2), score: 0.5 },
        ];
        assert!(is_strong_signal(&strong_hits, &config, false));

        let weak_hits = vec![
            FtsHit { chunk: sample_chunk(1), score: 0.9 },
            FtsHit { chunk: sample_chunk(2), score: 0.88 },
        ];
        assert!(!is_strong_signal(&weak_hits, &config, false));
    }

    fn sample_chunk(id: i64) -> Chunk {
        Chunk {
            id,
            document_id: "doc".to_string(),
            position: 0,
            chunk_type: crate::models::ChunkType::Doc,
            language: None,
            symbol_name: None,
            symbol_type: None,
            symbol_id: None,
            symbol_part_index: None,
            symbol_part_count: None,
            line_start: Some(1),
            line_end: Some(2),
            char_start: Some(0),
            char_end: Some(10),
            token_count: 5,
            chunk_sha: "sha".to_string(),
            content: "hello world".to_string(),
            doc_path: "a.md".to_string(),
            doc_uri: "gh://o/r@main/a.md".to_string(),
            doc_title: "A".to_string(),
            context_path: "A".to_string(),
        }
    }
}
