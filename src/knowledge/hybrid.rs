//! 하이브리드 랭킹 - 시맨틱 + 키워드 + 카테고리
//!
//! blended = w_sem · cosine + w_kw · keyword + w_cat · category
//!
//! 임베딩이 없는 청크는 0점이 아니라 후보에서 아예 빠집니다.
//! 정렬은 안정 정렬이므로 동점은 인덱스 순서를 유지합니다.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::RankingSettings;
use crate::embedding::cosine_similarity;

use super::index::{Chunk, CorpusIndex};
use super::keywords::query_tokens;

/// 카테고리 → 관련어 테이블
const CATEGORY_TERMS: &[(&str, &[&str])] = &[
    ("license_renewal", &["renew", "renewal", "license", "expire"]),
    ("real_id", &["real id", "realid", "identification"]),
    ("appointment", &["appointment", "schedule", "book"]),
    ("vehicle_registration", &["vehicle", "car", "registration", "smog"]),
    ("fees", &["fee", "cost", "price", "payment"]),
    ("office_locations", &["office", "location", "address", "hours"]),
];

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 (설명 가능성을 위해 세부 점수 보존)
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Arc<Chunk>,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub category_score: f32,
    pub blended_score: f32,
}

// ============================================================================
// HybridRanker
// ============================================================================

/// 하이브리드 랭커
#[derive(Debug, Clone, Default)]
pub struct HybridRanker {
    settings: RankingSettings,
}

impl HybridRanker {
    pub fn new(settings: RankingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RankingSettings {
        &self.settings
    }

    /// 질의 벡터로 인덱스를 스코어링하고 상위 `top_k`를 반환
    ///
    /// # Arguments
    /// * `index` - 코퍼스 인덱스
    /// * `query` - 원문 질의 (키워드/카테고리 점수용)
    /// * `query_vector` - 정규화된 질의 임베딩
    /// * `top_k` - 최대 결과 수
    pub fn rank(
        &self,
        index: &CorpusIndex,
        query: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Vec<SearchResult> {
        let query_lower = query.to_lowercase();
        let tokens = query_tokens(query);

        let mut results: Vec<SearchResult> = index
            .chunks()
            .iter()
            .filter_map(|chunk| {
                let embedding = chunk.embedding.as_ref()?;

                let semantic_score = cosine_similarity(query_vector, embedding);
                let keyword_score = keyword_score(&tokens, &chunk.keywords);
                let category_score = category_score(&query_lower, &chunk.category);
                let blended_score = self.settings.semantic_weight * semantic_score
                    + self.settings.keyword_weight * keyword_score
                    + self.settings.category_weight * category_score;

                Some(SearchResult {
                    chunk: Arc::clone(chunk),
                    semantic_score,
                    keyword_score,
                    category_score,
                    blended_score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.blended_score
                .partial_cmp(&a.blended_score)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(top_k);

        results
    }
}

// ============================================================================
// Scoring Functions
// ============================================================================

/// 키워드 점수
///
/// 질의 토큰과 부분 문자열 관계(양방향)인 청크 키워드 수 /
/// max(키워드 수, 질의 토큰 수)
pub fn keyword_score(query_tokens: &[String], keywords: &[String]) -> f32 {
    let denominator = keywords.len().max(query_tokens.len());
    if denominator == 0 {
        return 0.0;
    }

    let matched = keywords
        .iter()
        .filter(|k| {
            query_tokens
                .iter()
                .any(|w| w.contains(k.as_str()) || k.contains(w.as_str()))
        })
        .count();

    matched as f32 / denominator as f32
}

/// 카테고리 점수
///
/// - 1.0: 질의에 카테고리 이름(`_` → 공백)이 포함됨
/// - 0.5: 카테고리 관련어가 포함됨
/// - 0.0: 그 외
pub fn category_score(query_lower: &str, category: &str) -> f32 {
    if category.is_empty() {
        return 0.0;
    }

    let category = category.to_lowercase();
    if query_lower.contains(&category.replace('_', " ")) {
        return 1.0;
    }

    let related = CATEGORY_TERMS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, terms)| *terms)
        .unwrap_or(&[]);

    if related.iter().any(|term| query_lower.contains(term)) {
        0.5
    } else {
        0.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, category: &str, keywords: &[&str], embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("text {}", id),
            url: format!("https://example.com/{}", id),
            title: id.to_string(),
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            embedding,
        }
    }

    /// 질의 벡터 [1, 0]에 대해 코사인 값이 `cos`인 단위 벡터
    fn at_cosine(cos: f32) -> Vec<f32> {
        vec![cos, (1.0 - cos * cos).sqrt()]
    }

    #[test]
    fn test_semantic_ordering() {
        let index = CorpusIndex::from_chunks(vec![
            chunk("low", "general", &[], Some(at_cosine(0.5))),
            chunk("high", "general", &[], Some(at_cosine(0.9))),
        ]);

        let results = HybridRanker::default().rank(&index, "question", &[1.0, 0.0], 3);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "high");
        assert!((results[0].semantic_score - 0.9).abs() < 1e-5);
        assert!((results[0].blended_score - 0.63).abs() < 1e-5);
    }

    #[test]
    fn test_chunks_without_embedding_excluded() {
        let index = CorpusIndex::from_chunks(vec![
            chunk("missing", "general", &[], None),
            chunk("present", "general", &[], Some(at_cosine(-0.2))),
        ]);

        let results = HybridRanker::default().rank(&index, "question", &[1.0, 0.0], 3);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "present");
    }

    #[test]
    fn test_top_k_and_stable_ties() {
        let index = CorpusIndex::from_chunks(
            ["a", "b", "c", "d"]
                .iter()
                .map(|id| chunk(id, "general", &[], Some(at_cosine(0.4))))
                .collect(),
        );

        let results = HybridRanker::default().rank(&index, "question", &[1.0, 0.0], 3);
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let results = HybridRanker::default().rank(&CorpusIndex::empty(), "q", &[1.0], 3);
        assert!(results.is_empty());
    }

    #[test]
    fn test_keyword_score_substring_both_ways() {
        let tokens = query_tokens("renewing licenses online");
        let keywords: Vec<String> = ["renew", "licenses", "mail", "office"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        // renew ⊆ renewing, licenses == licenses → 2 / max(4, 3)
        assert!((keyword_score(&tokens, &keywords) - 0.5).abs() < 1e-6);
        assert_eq!(keyword_score(&[], &[]), 0.0);
    }

    #[test]
    fn test_category_score() {
        assert_eq!(category_score("what is real id?", "real_id"), 1.0);
        assert_eq!(category_score("how do i renew", "license_renewal"), 0.5);
        assert_eq!(category_score("office hours", "office_locations"), 0.5);
        assert_eq!(category_score("smog check", "fees"), 0.0);
        assert_eq!(category_score("anything", "driving_test"), 0.0);
    }

    #[test]
    fn test_boosts_break_semantic_tie() {
        let index = CorpusIndex::from_chunks(vec![
            chunk("plain", "general", &[], Some(at_cosine(0.6))),
            chunk("fees", "fees", &["fee"], Some(at_cosine(0.6))),
        ]);

        let results = HybridRanker::default().rank(&index, "what fee applies", &[1.0, 0.0], 2);

        assert_eq!(results[0].chunk.id, "fees");
        assert!(results[0].keyword_score > 0.0);
        assert_eq!(results[0].category_score, 0.5);
    }
}
