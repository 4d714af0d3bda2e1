//! 해싱 임베딩 - 오프라인 결정적 임베더
//!
//! 단어 유니그램 + 문자 트라이그램을 SHA-256으로 버킷에 해싱하고
//! 부호 있는 가중치를 누적한 뒤 L2 정규화합니다.
//! 모델 파일이나 네트워크 없이 같은 입력에 항상 같은 벡터를 돌려줍니다.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{normalize, EmbeddingBackend, EmbeddingProvider, ExecutionContext};

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

// ============================================================================
// HashingEmbedding
// ============================================================================

/// 특징 해싱 임베더
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// 동기 임베딩 (내부용)
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            self.accumulate(&mut vector, "w", token, WORD_WEIGHT);

            let padded: Vec<char> = format!("#{}#", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, "c", &trigram, TRIGRAM_WEIGHT);
            }
        }

        normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f32], namespace: &str, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(bytes);

        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

// ============================================================================
// HashingBackend
// ============================================================================

/// 해싱 임베딩 백엔드
///
/// 가속 커널이 없으므로 `Accelerated` 로드는 항상 실패하고 CPU로 폴백됩니다.
#[derive(Debug, Clone)]
pub struct HashingBackend {
    dimension: usize,
}

impl HashingBackend {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingBackend for HashingBackend {
    async fn load(&self, context: ExecutionContext) -> Result<Arc<dyn EmbeddingProvider>> {
        match context {
            ExecutionContext::Accelerated => {
                anyhow::bail!("hashing embedder has no accelerated kernel")
            }
            ExecutionContext::Cpu => Ok(Arc::new(HashingEmbedding::new(self.dimension))),
        }
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
