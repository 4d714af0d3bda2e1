//! 에러 타입
//!
//! 오케스트레이터 경계를 넘는 실패는 `Initialization`, `Indexing` 두 가지뿐입니다.
//! 나머지는 질의 단위에서 흡수되어 낮은 신뢰도의 응답으로 변환됩니다.

use thiserror::Error;

/// 어시스턴트 에러
#[derive(Debug, Error)]
pub enum AssistantError {
    /// 임베딩 백엔드를 어떤 실행 컨텍스트에서도 시작할 수 없음 (치명적)
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// 학습(인덱싱)을 진행할 수 없음 (치명적)
    #[error("Indexing error: {0}")]
    Indexing(String),

    /// 스코어링 중 실패 (복구: 빈 결과)
    #[error("Search error: {0}")]
    Search(String),

    /// 분류/렌더링 중 실패 (복구: 사과 메시지)
    #[error("Response generation error: {0}")]
    ResponseGeneration(String),

    /// 잘못된 설정
    #[error("Configuration error: {0}")]
    Config(String),

    /// 코퍼스 로드/검증 실패
    #[error("Corpus error: {0}")]
    Corpus(String),
}

impl AssistantError {
    /// 오케스트레이터 경계를 넘어 전파되는 치명적 에러인지
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AssistantError::Initialization(_) | AssistantError::Indexing(_)
        )
    }
}

pub type AssistantResult<T> = std::result::Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(AssistantError::Initialization("x".into()).is_fatal());
        assert!(AssistantError::Indexing("x".into()).is_fatal());
        assert!(!AssistantError::Search("x".into()).is_fatal());
        assert!(!AssistantError::ResponseGeneration("x".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = AssistantError::Initialization("no backend".into());
        assert_eq!(err.to_string(), "Initialization error: no backend");
    }
}
