//! dmv-assist - California DMV 질의응답 어시스턴트
//!
//! 정적 지식 코퍼스를 청크로 나눠 임베딩하고, 시맨틱 + 키워드 + 카테고리
//! 하이브리드 검색으로 찾은 문서를 의도별 템플릿 응답으로 조립합니다.

pub mod assistant;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod knowledge;

// Re-exports
pub use assistant::{Assistant, Intent, IntentClassifier, IntentKind, Response};
pub use config::{get_data_dir, AssistantConfig, KeywordPolicy, ProviderKind};
pub use corpus::{BundledCorpus, CorpusLoader, JsonFileCorpus, KnowledgeEntry, WebCorpusLoader};
pub use embedding::{
    cosine_similarity, get_api_key, has_api_key, EmbeddingBackend, EmbeddingProvider,
    ExecutionContext, GeminiEmbedding, HashingBackend, HashingEmbedding,
};
pub use error::{AssistantError, AssistantResult};
pub use knowledge::{Chunk, ChunkConfig, Chunker, CorpusIndex, SearchResult, TrainingStats};
