//! Corpus 모듈 - 지식 코퍼스 로더
//!
//! 코퍼스는 한 번에 통째로 로드되며 프로세스 수명 동안 불변입니다.
//!
//! - `BundledCorpus`: 바이너리에 포함된 DMV 코퍼스
//! - `JsonFileCorpus`: 같은 레코드 형식의 JSON 파일
//! - `WebCorpusLoader`: 웹 페이지 수집 (reqwest + scraper)

mod web;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AssistantError;

pub use web::{WebCorpusLoader, DEFAULT_DMV_PAGES};

/// 번들 코퍼스 원본
const BUNDLED_CORPUS_JSON: &str = include_str!("../../data/dmv_corpus.json");

// ============================================================================
// Types
// ============================================================================

/// 지식 엔트리 (코퍼스 레코드)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    /// 토픽 태그 (예: `license_renewal`, `real_id`)
    pub category: String,
}

// ============================================================================
// CorpusLoader Trait
// ============================================================================

/// 코퍼스 로더 트레이트
#[async_trait]
pub trait CorpusLoader: Send + Sync {
    /// 전체 코퍼스 로드
    async fn load(&self) -> Result<Vec<KnowledgeEntry>>;

    /// 로더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Loaders
// ============================================================================

/// 바이너리에 포함된 DMV 코퍼스
#[derive(Debug, Default, Clone, Copy)]
pub struct BundledCorpus;

impl BundledCorpus {
    /// 동기 로드 (테스트/상태 표시용)
    pub fn entries() -> Result<Vec<KnowledgeEntry>> {
        parse_corpus(BUNDLED_CORPUS_JSON).context("Failed to parse bundled corpus")
    }
}

#[async_trait]
impl CorpusLoader for BundledCorpus {
    async fn load(&self) -> Result<Vec<KnowledgeEntry>> {
        Self::entries()
    }

    fn name(&self) -> &str {
        "bundled"
    }
}

/// JSON 파일 코퍼스
#[derive(Debug, Clone)]
pub struct JsonFileCorpus {
    path: PathBuf,
}

impl JsonFileCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CorpusLoader for JsonFileCorpus {
    async fn load(&self) -> Result<Vec<KnowledgeEntry>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read corpus file {:?}", self.path))?;

        parse_corpus(&raw).with_context(|| format!("Invalid corpus file {:?}", self.path))
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// JSON 파싱 + 검증
pub fn parse_corpus(raw: &str) -> Result<Vec<KnowledgeEntry>> {
    let entries: Vec<KnowledgeEntry> =
        serde_json::from_str(raw).context("Failed to parse corpus JSON")?;
    validate_entries(&entries)?;
    Ok(entries)
}

/// 엔트리 검증: id/content 필수, id 중복 금지
pub fn validate_entries(entries: &[KnowledgeEntry]) -> Result<()> {
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.id.trim().is_empty() {
            return Err(corpus_error(format!("entry with empty id (title: {:?})", entry.title)));
        }
        if entry.content.trim().is_empty() {
            return Err(corpus_error(format!("entry {:?} has empty content", entry.id)));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(corpus_error(format!("duplicate entry id {:?}", entry.id)));
        }
    }

    Ok(())
}

fn corpus_error(message: String) -> anyhow::Error {
    AssistantError::Corpus(message).into()
}

/// 코퍼스를 JSON 파일로 저장
///
/// 다시 읽을 수 없는 코퍼스(빈 id, 중복 id 등)는 쓰지 않습니다.
pub fn write_corpus(path: &Path, entries: &[KnowledgeEntry]) -> Result<()> {
    validate_entries(entries).context("Refusing to write invalid corpus")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create corpus directory")?;
        }
    }

    let json = serde_json::to_string_pretty(entries).context("Failed to serialize corpus")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write corpus {:?}", path))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
