//! Corpus Index - 인메모리 청크 인덱스
//!
//! 학습 한 번에 통째로 만들어지고, 재학습 시 새 인덱스로 교체됩니다 (병합 없음).

use std::sync::Arc;

use crate::config::KeywordSettings;
use crate::corpus::KnowledgeEntry;
use crate::embedding::EmbeddingProvider;

use super::chunker::Chunker;
use super::keywords::extract_keywords;

// ============================================================================
// Types
// ============================================================================

/// 검색 단위 청크
///
/// 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `{entry.id}-chunk-{index}`
    pub id: String,
    pub text: String,
    pub url: String,
    pub title: String,
    /// 원본 엔트리의 카테고리
    pub category: String,
    pub keywords: Vec<String>,
    /// 임베딩 실패 시 `None` (랭킹에서 제외)
    pub embedding: Option<Vec<f32>>,
}

/// 학습 통계
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingStats {
    pub entries: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub dropped: usize,
    pub dimension: Option<usize>,
}

// ============================================================================
// CorpusIndex
// ============================================================================

/// 인메모리 코퍼스 인덱스
#[derive(Debug, Default)]
pub struct CorpusIndex {
    chunks: Vec<Arc<Chunk>>,
    dimension: Option<usize>,
}

impl CorpusIndex {
    /// 빈 인덱스
    pub fn empty() -> Self {
        Self::default()
    }

    /// 청크 목록으로 생성
    ///
    /// 차원이 첫 임베딩과 다른 청크의 임베딩은 버립니다.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let dimension = chunks
            .iter()
            .find_map(|c| c.embedding.as_ref().map(Vec::len));

        let chunks = chunks
            .into_iter()
            .map(|mut chunk| {
                let len = chunk.embedding.as_ref().map(Vec::len);
                if let (Some(dim), Some(len)) = (dimension, len) {
                    if len != dim {
                        tracing::warn!(
                            "Dropping embedding for chunk {} (dimension {} != {})",
                            chunk.id,
                            len,
                            dim
                        );
                        chunk.embedding = None;
                    }
                }
                Arc::new(chunk)
            })
            .collect();

        Self { chunks, dimension }
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 임베딩이 있는 청크 수
    pub fn embedded_len(&self) -> usize {
        self.chunks.iter().filter(|c| c.embedding.is_some()).count()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn chunk_ids(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.id.clone()).collect()
    }
}

// ============================================================================
// Index Building
// ============================================================================

/// 엔트리를 청크로 분할하고 키워드를 붙임 (임베딩 없음)
pub fn build_chunks(
    entries: &[KnowledgeEntry],
    chunker: &dyn Chunker,
    keyword_settings: &KeywordSettings,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for entry in entries {
        for (index, text) in chunker.chunk(&entry.content).into_iter().enumerate() {
            let keywords = extract_keywords(&text, keyword_settings);
            chunks.push(Chunk {
                id: format!("{}-chunk-{}", entry.id, index),
                text,
                url: entry.url.clone(),
                title: entry.title.clone(),
                category: entry.category.clone(),
                keywords,
                embedding: None,
            });
        }
    }

    tracing::info!(
        "Chunked {} entries into {} chunks",
        entries.len(),
        chunks.len()
    );
    chunks
}

/// 배치 단위로 임베딩 생성
///
/// 배치 실패 시 해당 배치의 항목을 하나씩 재시도하고,
/// 그래도 실패한 항목은 임베딩 없이 남깁니다 (로그만, 치명적이지 않음).
pub async fn embed_chunks(
    chunks: &mut [Chunk],
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
) -> usize {
    let batch_size = batch_size.max(1);
    let total = chunks.len();
    let mut dropped = 0;

    for (batch_index, batch) in chunks.chunks_mut(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        match embedder.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                for (chunk, vector) in batch.iter_mut().zip(vectors) {
                    chunk.embedding = Some(vector);
                }
            }
            outcome => {
                match outcome {
                    Err(e) => tracing::warn!(
                        "Batch {} embedding failed, retrying items individually: {:#}",
                        batch_index,
                        e
                    ),
                    Ok(vectors) => tracing::warn!(
                        "Batch {} returned {} vectors for {} texts, retrying items individually",
                        batch_index,
                        vectors.len(),
                        batch.len()
                    ),
                }

                for chunk in batch.iter_mut() {
                    match embedder.embed(&chunk.text).await {
                        Ok(vector) => chunk.embedding = Some(vector),
                        Err(e) => {
                            dropped += 1;
                            tracing::warn!("Dropping chunk {} from index: {:#}", chunk.id, e);
                        }
                    }
                }
            }
        }

        let done = ((batch_index + 1) * batch_size).min(total);
        tracing::debug!("Generated embeddings for {}/{} chunks", done, total);
    }

    dropped
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunker::paragraph_chunker;

    fn chunk(id: &str, embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("text {}", id),
            url: format!("https://example.com/{}", id),
            title: id.to_string(),
            category: "general".to_string(),
            keywords: vec![],
            embedding,
        }
    }

    #[test]
    fn test_build_chunks_ids_and_inheritance() {
        let entries = vec![KnowledgeEntry {
            id: "renewal".to_string(),
            title: "Renewal".to_string(),
            content: "Renew online today.\n\nOr renew by mail.".to_string(),
            url: "https://example.com/renew".to_string(),
            category: "license_renewal".to_string(),
        }];

        let chunks = build_chunks(
            &entries,
            paragraph_chunker(400).as_ref(),
            &KeywordSettings::default(),
        );

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "renewal-chunk-0");
        assert_eq!(chunks[1].id, "renewal-chunk-1");
        assert!(chunks.iter().all(|c| c.category == "license_renewal"));
        assert!(chunks.iter().all(|c| c.url == "https://example.com/renew"));
        assert_eq!(chunks[0].keywords, vec!["renew", "online", "today"]);
        assert!(chunks.iter().all(|c| c.embedding.is_none()));
    }

    #[test]
    fn test_index_dimension_is_constant() {
        let index = CorpusIndex::from_chunks(vec![
            chunk("a", Some(vec![1.0, 0.0])),
            chunk("b", Some(vec![1.0, 0.0, 0.0])),
            chunk("c", None),
        ]);

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), Some(2));
        assert_eq!(index.embedded_len(), 1);
    }

    /// 배치는 항상 실패하고, "bad"가 들어간 텍스트는 개별 호출도 실패
    struct FlakyEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if text.contains("bad") {
                anyhow::bail!("cannot embed {:?}", text);
            }
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("batch backend down")
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_embed_chunks_degrades_per_item() {
        let mut chunks = vec![chunk("good1", None), chunk("bad", None), chunk("good2", None)];

        let dropped = embed_chunks(&mut chunks, &FlakyEmbedder, 2).await;

        assert_eq!(dropped, 1);
        assert!(chunks[0].embedding.is_some());
        assert!(chunks[1].embedding.is_none());
        assert!(chunks[2].embedding.is_some());
    }

    #[tokio::test]
    async fn test_embed_chunks_batches() {
        let embedder = crate::embedding::HashingEmbedding::new(8);
        let mut chunks: Vec<Chunk> = (0..7).map(|i| chunk(&format!("c{}", i), None)).collect();

        let dropped = embed_chunks(&mut chunks, &embedder, 5).await;

        assert_eq!(dropped, 0);
        assert!(chunks.iter().all(|c| c.embedding.as_ref().map(Vec::len) == Some(8)));
    }

    #[test]
    fn test_empty_index() {
        let index = CorpusIndex::empty();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
        assert!(index.chunk_ids().is_empty());
    }
}
