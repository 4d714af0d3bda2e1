//! Knowledge 모듈 - 인메모리 하이브리드 검색
//!
//! - Chunker: 문단/문장/단어 경계 텍스트 분할
//! - Keywords: 청크별 어휘 지문
//! - Index: 청크 + 임베딩 + 메타데이터
//! - Hybrid: 시맨틱/키워드/카테고리 가중 랭킹

mod chunker;
mod hybrid;
mod index;
mod keywords;

// Re-exports
pub use chunker::{default_chunker, paragraph_chunker, ChunkConfig, Chunker, ParagraphChunker};
pub use hybrid::{category_score, keyword_score, HybridRanker, SearchResult};
pub use index::{build_chunks, embed_chunks, Chunk, CorpusIndex, TrainingStats};
pub use keywords::{extract_keywords, query_tokens};
