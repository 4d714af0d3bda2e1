//! Text Chunking Module
//!
//! 문단 → 문장 → 단어 경계 순서로 텍스트를 최대 길이 이하의 청크로 나눕니다.
//! 최대 길이보다 긴 단일 단어는 자르지 않고 그대로 하나의 청크가 됩니다.

use std::sync::OnceLock;

use regex::Regex;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { max_characters: 400 }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// ParagraphChunker
// ============================================================================

/// 문단 인식 청커
///
/// - 빈 줄 경계로 문단 분할
/// - 긴 문단은 문장(`.!?`) 단위로 탐욕적 패킹
/// - 긴 문장은 단어 단위로 탐욕적 패킹
pub struct ParagraphChunker {
    config: ChunkConfig,
}

impl ParagraphChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 긴 문단을 문장 단위로 패킹
    fn split_long_paragraph(&self, paragraph: &str, chunks: &mut Vec<String>) {
        let max = self.config.max_characters;
        let mut current = String::new();

        for sentence in split_sentences(paragraph) {
            if char_len(&sentence) > max {
                // 문장 자체가 최대 크기 초과: 버퍼를 비우고 단어 단위로
                flush(&mut current, chunks);
                current = self.pack_words(&sentence, chunks);
                continue;
            }

            let proposed = if current.is_empty() {
                char_len(&sentence)
            } else {
                char_len(&current) + 1 + char_len(&sentence)
            };

            if proposed > max {
                flush(&mut current, chunks);
                current = sentence;
            } else {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&sentence);
            }
        }

        flush(&mut current, chunks);
    }

    /// 단어 단위 패킹. 남은 버퍼를 반환합니다.
    fn pack_words(&self, sentence: &str, chunks: &mut Vec<String>) -> String {
        let max = self.config.max_characters;
        let mut current = String::new();

        for word in sentence.split_whitespace() {
            if char_len(word) > max {
                // 한 단어가 한도를 넘으면 자르지 않고 단독 청크
                flush(&mut current, chunks);
                chunks.push(word.to_string());
                continue;
            }

            let proposed = if current.is_empty() {
                char_len(word)
            } else {
                char_len(&current) + 1 + char_len(word)
            };

            if proposed > max {
                flush(&mut current, chunks);
                current.push_str(word);
            } else {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
        }

        current
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut chunks = Vec::new();

        for paragraph in paragraph_re().split(text) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            if char_len(paragraph) <= self.config.max_characters {
                chunks.push(paragraph.to_string());
            } else {
                self.split_long_paragraph(paragraph, &mut chunks);
            }
        }

        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }

    fn name(&self) -> &'static str {
        "ParagraphChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"))
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid sentence regex"))
}

/// 문장 분할 (구두점 유지, 공백 정리)
fn split_sentences(paragraph: &str) -> Vec<String> {
    sentence_re()
        .find_iter(paragraph)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// 버퍼가 비어있지 않으면 청크로 내보냄
fn flush(current: &mut String, chunks: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

/// 문자 수 (UTF-8 안전)
#[inline]
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(ParagraphChunker::with_defaults())
}

/// 최대 길이를 지정한 청커 생성
pub fn paragraph_chunker(max_characters: usize) -> Box<dyn Chunker> {
    Box::new(ParagraphChunker::new(ChunkConfig { max_characters }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max: usize) -> ParagraphChunker {
        ParagraphChunker::new(ChunkConfig {
            max_characters: max,
        })
    }

    /// 모든 청크가 한도 이하이거나, 한도를 넘는 단일 토큰이어야 함
    fn assert_bounded(chunks: &[String], max: usize) {
        for c in chunks {
            let single_token = c.split_whitespace().count() == 1;
            assert!(
                char_len(c) <= max || single_token,
                "chunk exceeds {}: {:?}",
                max,
                c
            );
        }
    }

    #[test]
    fn test_chunker_empty() {
        assert!(chunker(400).chunk("").is_empty());
        assert!(chunker(400).chunk("  \n\n  ").is_empty());
    }

    #[test]
    fn test_short_paragraphs_verbatim() {
        let text = "First paragraph.\n\nSecond paragraph!\n   \nThird?";
        let chunks = chunker(400).chunk(text);
        assert_eq!(
            chunks,
            vec!["First paragraph.", "Second paragraph!", "Third?"]
        );
    }

    #[test]
    fn test_long_paragraph_packs_sentences() {
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota. Kappa lambda mu.";
        let chunks = chunker(40).chunk(text);

        assert_eq!(
            chunks,
            vec![
                "Alpha beta gamma. Delta epsilon zeta.",
                "Eta theta iota. Kappa lambda mu."
            ]
        );
        assert_bounded(&chunks, 40);
    }

    #[test]
    fn test_long_sentence_packs_words() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let chunks = chunker(20).chunk(text);

        assert!(chunks.len() > 1);
        assert_bounded(&chunks, 20);
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_overlong_word_kept_whole() {
        let long_word = "x".repeat(50);
        let text = format!("short {} tail words here", long_word);
        let chunks = chunker(20).chunk(&text);

        assert!(chunks.contains(&long_word));
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert_bounded(&chunks, 20);
    }

    #[test]
    fn test_bound_holds_on_bundled_style_text() {
        let text = "California requires title transfer for any change in vehicle ownership. \
            Process must be completed within 10 days to avoid penalties:\n\n\
            **Required Documents:**\n• California Certificate of Title (pink slip)\n\
            • Application for Title/Registration (REG 343) if title unavailable\n\
            • Signatures of all buyers and sellers\n• Lienholder signature (if applicable)\n\
            • Bill of sale for private party transactions\n• Smog certificate (if required)";

        for max in [30, 60, 120, 400] {
            let chunks = chunker(max).chunk(text);
            assert!(!chunks.is_empty());
            assert_bounded(&chunks, max);
        }
    }

    #[test]
    fn test_unicode_counts_characters() {
        let text = "안녕하세요 세계. 반갑습니다 여러분.";
        let chunks = chunker(12).chunk(text);
        assert_bounded(&chunks, 12);
    }

    #[test]
    fn test_order_preserved() {
        let text = "A first.\n\nB second.\n\nC third.";
        let chunks = chunker(400).chunk(text);
        assert_eq!(chunks[0], "A first.");
        assert_eq!(chunks[2], "C third.");
    }
}
