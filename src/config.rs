//! 설정 모듈
//!
//! 모든 튜닝 값(청크 길이, 키워드 정책, 랭킹 가중치, 오프토픽 임계값 등)을
//! 한 곳에 모읍니다. JSON 파일에서 읽고, 파일이 없으면 기본값을 사용합니다.
//!
//! 기본 위치: `<data_local_dir>/.dmv-assist/config.json`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, AssistantResult};

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.dmv-assist/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dmv-assist")
}

/// 기본 설정 파일 경로
pub fn default_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

// ============================================================================
// Sections
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSettings {
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self { max_characters: 400 }
    }
}

/// 키워드 선택 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeywordPolicy {
    /// 살아남은 토큰을 문서 순서대로 앞에서부터
    #[default]
    DocumentOrder,
    /// 빈도 내림차순 (동률은 첫 등장 순서)
    Frequency,
}

/// 키워드 추출 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSettings {
    pub max_keywords: usize,
    /// 이 길이 이상인 토큰만 유지
    pub min_token_length: usize,
    pub policy: KeywordPolicy,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            max_keywords: 10,
            min_token_length: 4,
            policy: KeywordPolicy::DocumentOrder,
        }
    }
}

/// 하이브리드 랭킹 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub category_weight: f32,
    pub top_k: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.2,
            category_weight: 0.1,
            top_k: 3,
        }
    }
}

/// 의도 분류 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// DMV 키워드가 없는 질의가 이 길이(문자)를 넘으면 오프토픽
    pub off_topic_length: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self { off_topic_length: 50 }
    }
}

/// 학습 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// 임베딩 배치 크기
    pub batch_size: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self { batch_size: 5 }
    }
}

/// 임베딩 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// 오프라인 해싱 임베딩
    #[default]
    Hashing,
    /// Gemini API
    Gemini,
}

/// 임베딩 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Hashing,
            dimension: 384,
        }
    }
}

// ============================================================================
// AssistantConfig
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub chunk: ChunkSettings,
    pub keywords: KeywordSettings,
    pub ranking: RankingSettings,
    pub classifier: ClassifierSettings,
    pub training: TrainingSettings,
    pub embedding: EmbeddingSettings,
}

impl AssistantConfig {
    /// 파일에서 로드 (없으면 기본값)
    pub fn load(path: &Path) -> AssistantResult<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| AssistantError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| AssistantError::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// 기본 위치에서 로드
    pub fn load_default() -> AssistantResult<Self> {
        Self::load(&default_config_path())
    }

    /// 값 검증
    pub fn validate(&self) -> AssistantResult<()> {
        if self.chunk.max_characters == 0 {
            return Err(AssistantError::Config(
                "chunk.max_characters must be greater than 0".into(),
            ));
        }
        if self.training.batch_size == 0 {
            return Err(AssistantError::Config(
                "training.batch_size must be greater than 0".into(),
            ));
        }
        if self.ranking.top_k == 0 {
            return Err(AssistantError::Config(
                "ranking.top_k must be greater than 0".into(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(AssistantError::Config(
                "embedding.dimension must be greater than 0".into(),
            ));
        }

        let weights = [
            self.ranking.semantic_weight,
            self.ranking.keyword_weight,
            self.ranking.category_weight,
        ];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(AssistantError::Config(
                "ranking weights must be finite".into(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AssistantConfig::default();
        assert_eq!(config.chunk.max_characters, 400);
        assert_eq!(config.keywords.max_keywords, 10);
        assert_eq!(config.keywords.policy, KeywordPolicy::DocumentOrder);
        assert_eq!(config.ranking.top_k, 3);
        assert_eq!(config.classifier.off_topic_length, 50);
        assert_eq!(config.training.batch_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AssistantConfig::load(&dir.path().join("nope.json")).expect("load");
        assert_eq!(config, AssistantConfig::default());
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"keywords": {{"policy": "frequency"}}, "ranking": {{"top_k": 5}}}}"#
        )
        .expect("write");

        let config = AssistantConfig::load(file.path()).expect("load");
        assert_eq!(config.keywords.policy, KeywordPolicy::Frequency);
        assert_eq!(config.keywords.max_keywords, 10);
        assert_eq!(config.ranking.top_k, 5);
        assert_eq!(config.ranking.semantic_weight, 0.7);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"training": {{"batch_size": 0}}}}"#).expect("write");

        let result = AssistantConfig::load(file.path());
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "not json").expect("write");

        assert!(AssistantConfig::load(file.path()).is_err());
    }
}
