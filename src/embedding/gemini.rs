//! Gemini 임베딩 - 원격 API 프로바이더
//!
//! 분당 요청 제한과 429 지수 백오프를 적용합니다.
//! 배치는 `batchEmbedContents` 한 번으로 보냅니다.
//! 응답 벡터는 코사인 비교를 위해 L2 정규화합니다.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{normalize, EmbeddingBackend, EmbeddingProvider, ExecutionContext};

/// source: https://ai.google.dev/gemini-api/docs/embeddings
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "models/gemini-embedding-001";

/// 지원 차원
const SUPPORTED_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

/// 무료 티어: 60 RPM
const REQUESTS_PER_WINDOW: usize = 60;
const WINDOW: Duration = Duration::from_secs(60);
const MIN_SPACING: Duration = Duration::from_millis(1000);

/// 429/전송 실패 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(2000);

/// 한 번의 배치 요청에 담는 최대 텍스트 수
const MAX_BATCH: usize = 100;

// ============================================================================
// Request Window
// ============================================================================

/// 슬라이딩 윈도우 요청 제한
#[derive(Debug, Default)]
struct RequestWindow {
    sent: VecDeque<Instant>,
}

impl RequestWindow {
    /// 요청 가능할 때까지 대기 후 기록
    async fn wait_turn(&mut self) {
        if let Some(&last) = self.sent.back() {
            let since = last.elapsed();
            if since < MIN_SPACING {
                tokio::time::sleep(MIN_SPACING - since).await;
            }
        }

        self.expire();
        if self.sent.len() >= REQUESTS_PER_WINDOW {
            if let Some(&oldest) = self.sent.front() {
                let wait = WINDOW.saturating_sub(oldest.elapsed());
                tracing::debug!("Gemini request window full, waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
            self.expire();
        }

        self.sent.push_back(Instant::now());
    }

    fn expire(&mut self) {
        while let Some(&t) = self.sent.front() {
            if t.elapsed() < WINDOW {
                break;
            }
            self.sent.pop_front();
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    INITIAL_BACKOFF * 2u32.pow(attempt)
}

// ============================================================================
// Wire Types
// ============================================================================

/// 임베딩 용도 (문서는 색인, 질의는 검색)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'static str,
    content: Content<'a>,
    task_type: TaskType,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Values,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<Values>,
}

#[derive(Debug, Deserialize)]
struct Values {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

// ============================================================================
// GeminiEmbedding
// ============================================================================

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    window: Arc<Mutex<RequestWindow>>,
}

impl GeminiEmbedding {
    /// 차원을 지정하여 생성 (768, 1536, 3072)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        if !SUPPORTED_DIMENSIONS.contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be one of {:?}",
                dimension,
                SUPPORTED_DIMENSIONS
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            dimension,
            window: Arc::new(Mutex::new(RequestWindow::default())),
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env_with_dimension(dimension: usize) -> Result<Self> {
        Self::with_dimension(get_api_key()?, dimension)
    }

    fn request<'a>(&self, text: &'a str, task_type: TaskType) -> EmbedRequest<'a> {
        EmbedRequest {
            model: MODEL,
            content: Content {
                parts: [Part { text }],
            },
            task_type,
            output_dimensionality: self.dimension,
        }
    }

    /// 정규화 + 차원 확인
    fn finish(&self, mut values: Vec<f32>) -> Result<Vec<f32>> {
        if values.len() != self.dimension {
            anyhow::bail!(
                "Unexpected embedding dimension: got {}, expected {}",
                values.len(),
                self.dimension
            );
        }
        normalize(&mut values);
        Ok(values)
    }

    /// POST + 429/전송 실패 백오프, 성공 시 응답 본문
    async fn post<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<String> {
        let url = format!("{}/{}:{}", API_BASE, MODEL, method);
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            self.window.lock().await.wait_turn().await;

            // API 키는 URL이 아닌 헤더로 전송
            let sent = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        "Gemini request failed (attempt {}/{}): {}",
                        attempt + 1,
                        MAX_RETRIES + 1,
                        e
                    );
                    last_error = Some(anyhow::Error::new(e).context("Failed to send request"));
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                    continue;
                }
            };

            let status = response.status();
            let text = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return Ok(text);
            }

            if status.as_u16() == 429 {
                tracing::warn!(
                    "Gemini rate limit (429), attempt {}/{}",
                    attempt + 1,
                    MAX_RETRIES + 1
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff(attempt)).await;
                }
                continue;
            }

            match serde_json::from_str::<ApiError>(&text) {
                Ok(api) => anyhow::bail!(
                    "Gemini API error ({}): {}",
                    api.error.status,
                    api.error.message
                ),
                Err(_) => anyhow::bail!("Gemini API error ({}): {}", status, text),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)
        }))
    }

    /// 단건 `embedContent`
    async fn embed_one(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            anyhow::bail!("Cannot embed empty text");
        }

        let body = self
            .post("embedContent", &self.request(text, task_type))
            .await?;
        let parsed: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;
        self.finish(parsed.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text, TaskType::RetrievalDocument).await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_one(query, TaskType::RetrievalQuery).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for group in texts.chunks(MAX_BATCH) {
            if group.iter().any(|t| t.trim().is_empty()) {
                anyhow::bail!("Cannot embed empty text in batch");
            }

            let request = BatchRequest {
                requests: group
                    .iter()
                    .map(|t| self.request(t, TaskType::RetrievalDocument))
                    .collect(),
            };
            let body = self.post("batchEmbedContents", &request).await?;
            let parsed: BatchResponse =
                serde_json::from_str(&body).context("Failed to parse batch embedding response")?;

            if parsed.embeddings.len() != group.len() {
                anyhow::bail!(
                    "Batch returned {} embeddings for {} texts",
                    parsed.embeddings.len(),
                    group.len()
                );
            }

            for values in parsed.embeddings {
                vectors.push(self.finish(values.values)?);
            }
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// GeminiBackend
// ============================================================================

/// Gemini 백엔드
///
/// 원격 API라 실행 컨텍스트와 무관하게 같은 프로바이더를 만듭니다.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    dimension: usize,
}

impl GeminiBackend {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiBackend {
    async fn load(&self, context: ExecutionContext) -> Result<Arc<dyn EmbeddingProvider>> {
        tracing::debug!("Creating Gemini embedder ({} context)", context);
        Ok(Arc::new(GeminiEmbedding::from_env_with_dimension(
            self.dimension,
        )?))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드: `GEMINI_API_KEY`, 없으면 `GOOGLE_AI_API_KEY`
pub fn get_api_key() -> Result<String> {
    ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|key| !key.is_empty()))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
                 Get your API key at: https://aistudio.google.com/app/apikey"
            )
        })
}

pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}
