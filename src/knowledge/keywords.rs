//! 키워드 추출 - 청크별 어휘 지문
//!
//! 랭킹에서 보조 신호(키워드 부스트)로만 쓰입니다.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::{KeywordPolicy, KeywordSettings};

/// 불용어
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "have", "has", "had", "will", "would", "could",
    "should", "may", "might", "can", "must", "shall", "this", "that", "these", "those",
];

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid non-word regex"))
}

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// 키워드 추출
///
/// 소문자화 → 비단어 문자 제거 → 공백 분할 → 짧은 토큰/불용어 제거 후
/// 정책에 따라 최대 `max_keywords`개를 고릅니다. 결과에 중복은 없습니다.
pub fn extract_keywords(text: &str, settings: &KeywordSettings) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = non_word_re().replace_all(&lowered, " ");

    let candidates: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() >= settings.min_token_length)
        .filter(|w| !stopwords().contains(w))
        .collect();

    match settings.policy {
        KeywordPolicy::DocumentOrder => {
            let mut seen = HashSet::new();
            candidates
                .into_iter()
                .filter(|w| seen.insert(*w))
                .take(settings.max_keywords)
                .map(str::to_string)
                .collect()
        }
        KeywordPolicy::Frequency => {
            let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
            for (position, word) in candidates.iter().enumerate() {
                counts.entry(*word).or_insert((0, position)).0 += 1;
            }

            let mut ranked: Vec<(&str, usize, usize)> = counts
                .into_iter()
                .map(|(word, (count, first))| (word, count, first))
                .collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

            ranked
                .into_iter()
                .take(settings.max_keywords)
                .map(|(word, _, _)| word.to_string())
                .collect()
        }
    }
}

/// 질의 토큰화 (소문자, 앞뒤 구두점 제거)
pub fn query_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(policy: KeywordPolicy) -> KeywordSettings {
        KeywordSettings {
            policy,
            ..KeywordSettings::default()
        }
    }

    #[test]
    fn test_document_order() {
        let text = "Renew your California license online. The renewal notice will arrive by mail.";
        let keywords = extract_keywords(text, &settings(KeywordPolicy::DocumentOrder));
        assert_eq!(
            keywords,
            vec!["renew", "your", "california", "license", "online", "renewal", "notice", "arrive", "mail"]
        );
    }

    #[test]
    fn test_short_and_stopwords_dropped() {
        let keywords = extract_keywords(
            "the DMV has these offices and those hours",
            &settings(KeywordPolicy::DocumentOrder),
        );
        assert_eq!(keywords, vec!["offices", "hours"]);
    }

    #[test]
    fn test_truncates_to_max() {
        let text = (0..30).map(|i| format!("word{:02}", i)).collect::<Vec<_>>().join(" ");
        let keywords = extract_keywords(&text, &settings(KeywordPolicy::DocumentOrder));
        assert_eq!(keywords.len(), 10);
        assert_eq!(keywords[0], "word00");
        assert_eq!(keywords[9], "word09");
    }

    #[test]
    fn test_frequency_policy() {
        let text = "alpha beta beta gamma gamma gamma delta";
        let keywords = extract_keywords(text, &settings(KeywordPolicy::Frequency));
        assert_eq!(keywords, vec!["gamma", "beta", "alpha", "delta"]);
    }

    #[test]
    fn test_query_tokens() {
        assert_eq!(
            query_tokens("How do I renew my License online?"),
            vec!["how", "do", "i", "renew", "my", "license", "online"]
        );
        assert!(query_tokens(" ?! ").is_empty());
    }
}
