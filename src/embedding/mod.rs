//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 텍스트를 고정 차원의 정규화된 벡터로 변환합니다.
//!
//! - `EmbeddingProvider`: 단일/배치/질의 임베딩 인터페이스
//! - `EmbeddingBackend`: 실행 컨텍스트(가속/CPU)별 프로바이더 로더
//! - `load_with_fallback`: 가속 컨텍스트 실패 시 CPU로 재시도
//!
//! ## 사용법
//! ```rust,ignore
//! let backend = HashingBackend::new(384);
//! let embedder = load_with_fallback(&backend).await?;
//! let embedding = embedder.embed("How do I renew my license?").await?;
//! ```

mod gemini;
mod hashing;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{EmbeddingSettings, ProviderKind};
use crate::error::{AssistantError, AssistantResult};

pub use gemini::{get_api_key, has_api_key, GeminiBackend, GeminiEmbedding};
pub use hashing::{HashingBackend, HashingEmbedding};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 출력 벡터는 항상 L2 정규화되어 있어야 합니다 (‖v‖≈1).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트(문서) 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 검색 질의 임베딩 (기본 구현: `embed`)
    ///
    /// 질의와 문서를 다르게 인코딩하는 모델은 재정의합니다.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(query).await
    }

    /// 배치 임베딩 (기본 구현: 순차 호출)
    ///
    /// 개별 호출과 의미가 같아야 합니다.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Execution Context
// ============================================================================

/// 임베딩 실행 컨텍스트
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// 가속 장치 (GPU 등)
    Accelerated,
    /// 기본 CPU
    Cpu,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Accelerated => write!(f, "accelerated"),
            ExecutionContext::Cpu => write!(f, "cpu"),
        }
    }
}

/// 실행 컨텍스트별로 프로바이더를 띄우는 백엔드
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// 주어진 컨텍스트에서 프로바이더 로드
    async fn load(&self, context: ExecutionContext) -> Result<Arc<dyn EmbeddingProvider>>;

    /// 백엔드 이름
    fn name(&self) -> &str;
}

/// 가속 컨텍스트 → CPU 순서로 로드
///
/// 둘 다 실패하면 `AssistantError::Initialization`.
pub async fn load_with_fallback(
    backend: &dyn EmbeddingBackend,
) -> AssistantResult<Arc<dyn EmbeddingProvider>> {
    let accelerated_error = match backend.load(ExecutionContext::Accelerated).await {
        Ok(provider) => {
            tracing::info!(
                "Embedding backend '{}' initialized on {}",
                backend.name(),
                ExecutionContext::Accelerated
            );
            return Ok(provider);
        }
        Err(e) => e,
    };

    tracing::warn!(
        "Accelerated context unavailable for '{}', falling back to CPU: {:#}",
        backend.name(),
        accelerated_error
    );

    match backend.load(ExecutionContext::Cpu).await {
        Ok(provider) => {
            tracing::info!(
                "Embedding backend '{}' initialized on {}",
                backend.name(),
                ExecutionContext::Cpu
            );
            Ok(provider)
        }
        Err(cpu_error) => {
            tracing::error!(
                "Failed to initialize embedding backend '{}': {:#}",
                backend.name(),
                cpu_error
            );
            Err(AssistantError::Initialization(format!(
                "backend '{}' unavailable (accelerated: {:#}; cpu: {:#})",
                backend.name(),
                accelerated_error,
                cpu_error
            )))
        }
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 백엔드 생성
pub fn create_backend(settings: &EmbeddingSettings) -> Arc<dyn EmbeddingBackend> {
    match settings.provider {
        ProviderKind::Hashing => Arc::new(HashingBackend::new(settings.dimension)),
        ProviderKind::Gemini => Arc::new(GeminiBackend::new(settings.dimension)),
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// L2 정규화 (영벡터는 그대로)
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_nan() {
        0.0
    } else {
        similarity
    }
}

// ============================================================================
// Tests
// ============================================================================
