//! Assistant 모듈 - 질의응답 오케스트레이터
//!
//! - Intent: 규칙 캐스케이드 의도 분류
//! - Response: 구조화된 응답 빌더 + 의도별 템플릿
//! - Legal: 법적 절차 카탈로그
//! - Validator: 내장 검증 질의 세트
//!
//! `Assistant`는 프로세스 시작 시 한 번 만들어 참조로 넘기는 서비스 객체입니다.
//! 명시적인 `initialize`/`shutdown` 생명주기를 가집니다.

mod intent;
pub mod legal;
mod response;
mod validator;

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::Mutex;

use crate::config::AssistantConfig;
use crate::corpus::CorpusLoader;
use crate::embedding::{load_with_fallback, EmbeddingBackend, EmbeddingProvider};
use crate::error::{AssistantError, AssistantResult};
use crate::knowledge::{
    build_chunks, embed_chunks, paragraph_chunker, Chunker, CorpusIndex, HybridRanker,
    SearchResult, TrainingStats,
};

// Re-exports
pub use intent::{is_greeting, is_off_topic, Intent, IntentClassifier, IntentKind, Rule};
pub use legal::LegalProcedure;
pub use response::{
    assemble, combined_confidence, draft_response, finalize, Response, ResponseDraft, Section,
    APOLOGY_MESSAGE, GREETING_MESSAGE, LOW_CONFIDENCE, NO_RESULTS_MESSAGE, OFF_TOPIC_MESSAGE,
};
pub use validator::{
    check_response, run_validation, validation_cases, ValidationCase, ValidationOutcome,
    ValidationReport,
};

// ============================================================================
// Assistant
// ============================================================================

/// DMV 질의응답 어시스턴트
pub struct Assistant {
    config: AssistantConfig,
    loader: Arc<dyn CorpusLoader>,
    backend: Arc<dyn EmbeddingBackend>,
    chunker: Box<dyn Chunker>,
    classifier: IntentClassifier,
    ranker: HybridRanker,
    /// `Some`이면 초기화 완료. 초기화 중에는 잠금을 쥐고 있어 동시 호출자가 기다립니다.
    embedder: Mutex<Option<Arc<dyn EmbeddingProvider>>>,
    /// 재학습 시 통째로 교체
    index: RwLock<Arc<CorpusIndex>>,
    /// 학습 직렬화
    training: Mutex<()>,
}

impl Assistant {
    pub fn new(
        config: AssistantConfig,
        loader: Arc<dyn CorpusLoader>,
        backend: Arc<dyn EmbeddingBackend>,
    ) -> Self {
        let chunker = paragraph_chunker(config.chunk.max_characters);
        let classifier = IntentClassifier::new(&config.classifier);
        let ranker = HybridRanker::new(config.ranking.clone());

        Self {
            config,
            loader,
            backend,
            chunker,
            classifier,
            ranker,
            embedder: Mutex::new(None),
            index: RwLock::new(Arc::new(CorpusIndex::empty())),
            training: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// 임베딩 백엔드 초기화 (멱등)
    ///
    /// 가속 컨텍스트 → CPU 순서로 시도하고, 둘 다 실패하면 `Initialization` 에러.
    pub async fn initialize(&self) -> AssistantResult<()> {
        let mut slot = self.embedder.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        tracing::info!("Initializing embedding backend '{}'", self.backend.name());
        let provider = load_with_fallback(self.backend.as_ref()).await?;
        tracing::info!(
            "Embedding provider '{}' ready (dimension {})",
            provider.name(),
            provider.dimension()
        );

        *slot = Some(provider);
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.embedder.lock().await.is_some()
    }

    /// 코퍼스를 로드해 인덱스를 새로 만들고 교체
    ///
    /// 새 인덱스가 완성될 때까지 기존 인덱스로 검색이 계속됩니다.
    pub async fn train(&self) -> AssistantResult<TrainingStats> {
        // shutdown과 같은 잠금 순서 (training → embedder)
        let _guard = self.training.lock().await;

        self.initialize()
            .await
            .map_err(|e| AssistantError::Indexing(e.to_string()))?;
        let embedder = self
            .current_embedder()
            .await
            .ok_or_else(|| AssistantError::Indexing("embedder was shut down".into()))?;

        let started = Instant::now();

        tracing::info!("Loading corpus from '{}' loader", self.loader.name());
        let entries = self
            .loader
            .load()
            .await
            .map_err(|e| AssistantError::Indexing(format!("{:#}", e)))?;

        let mut chunks = build_chunks(&entries, self.chunker.as_ref(), &self.config.keywords);
        let dropped = embed_chunks(
            &mut chunks,
            embedder.as_ref(),
            self.config.training.batch_size,
        )
        .await;

        let index = CorpusIndex::from_chunks(chunks);
        let stats = TrainingStats {
            entries: entries.len(),
            chunks: index.len(),
            embedded: index.embedded_len(),
            dropped,
            dimension: index.dimension(),
        };

        self.replace_index(index);

        tracing::info!(
            "Training complete: {} entries, {} chunks, {} embedded, {} dropped ({:.2?})",
            stats.entries,
            stats.chunks,
            stats.embedded,
            stats.dropped,
            started.elapsed()
        );

        Ok(stats)
    }

    /// 질의 분류 (검색 없음)
    pub fn classify(&self, query: &str) -> Intent {
        self.classifier.classify(query)
    }

    /// 하이브리드 검색 (상위 `ranking.top_k`)
    ///
    /// 학습 전이거나 검색 중 실패하면 빈 결과.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        self.search_top(query, self.config.ranking.top_k).await
    }

    /// 하이브리드 검색 (상위 `top_k`)
    pub async fn search_top(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        match self.try_search(query, top_k).await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("{}", e);
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query: &str, top_k: usize) -> AssistantResult<Vec<SearchResult>> {
        let index = self.snapshot();
        if index.embedded_len() == 0 {
            tracing::debug!("Index has no embedded chunks, skipping search");
            return Ok(Vec::new());
        }

        let Some(embedder) = self.current_embedder().await else {
            return Ok(Vec::new());
        };

        let query_vector = embedder
            .embed_query(query)
            .await
            .map_err(|e| AssistantError::Search(format!("query embedding failed: {:#}", e)))?;

        if Some(query_vector.len()) != index.dimension() {
            return Err(AssistantError::Search(format!(
                "query dimension {} does not match index dimension {:?}",
                query_vector.len(),
                index.dimension()
            )));
        }

        Ok(self.ranker.rank(&index, query, &query_vector, top_k))
    }

    /// 질의에 답변
    ///
    /// 에러를 반환하지 않습니다. 내부 실패는 낮은 신뢰도의 고정 응답이 됩니다.
    pub async fn answer(&self, query: &str) -> Response {
        let intent = self.classifier.classify(query);
        tracing::debug!("Classified {:?} as {}", query, intent.kind);

        match intent.kind {
            IntentKind::Greeting => return Response::greeting(),
            IntentKind::OffTopic => return Response::off_topic(),
            _ => {}
        }

        if let Err(e) = self.initialize().await {
            tracing::error!("Cannot answer without an embedder: {}", e);
            return Response::apology();
        }

        let docs = self.search(query).await;
        if docs.is_empty() {
            return Response::no_results();
        }

        match assemble(&intent, query, &docs) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("{}", e);
                Response::apology()
            }
        }
    }

    /// 임베더를 내려놓고 인덱스를 비움
    pub async fn shutdown(&self) {
        let _guard = self.training.lock().await;
        self.embedder.lock().await.take();
        self.replace_index(CorpusIndex::empty());
        tracing::info!("Assistant shut down");
    }

    pub fn index_len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn chunk_ids(&self) -> Vec<String> {
        self.snapshot().chunk_ids()
    }

    async fn current_embedder(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        self.embedder.lock().await.clone()
    }

    fn snapshot(&self) -> Arc<CorpusIndex> {
        match self.index.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn replace_index(&self, index: CorpusIndex) {
        let index = Arc::new(index);
        match self.index.write() {
            Ok(mut guard) => *guard = index,
            Err(poisoned) => *poisoned.into_inner() = index,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{BundledCorpus, KnowledgeEntry};
    use crate::embedding::{ExecutionContext, HashingBackend};
    use crate::embedding::HashingEmbedding;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn bundled_assistant() -> Assistant {
        Assistant::new(
            AssistantConfig::default(),
            Arc::new(BundledCorpus),
            Arc::new(HashingBackend::new(384)),
        )
    }

    /// 고정 엔트리를 돌려주는 로더
    struct StaticCorpus(Vec<KnowledgeEntry>);

    #[async_trait]
    impl CorpusLoader for StaticCorpus {
        async fn load(&self) -> anyhow::Result<Vec<KnowledgeEntry>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// 로드 횟수를 세는 백엔드
    struct CountingBackend {
        inner: HashingBackend,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingBackend for CountingBackend {
        async fn load(
            &self,
            context: ExecutionContext,
        ) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.load(context).await
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    /// 어떤 컨텍스트에서도 뜨지 않는 백엔드
    struct BrokenBackend;

    #[async_trait]
    impl EmbeddingBackend for BrokenBackend {
        async fn load(&self, context: ExecutionContext) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
            anyhow::bail!("no device for {}", context)
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    /// 두 번째 로드부터 `release`를 기다리는 로더
    struct GatedCorpus {
        first: Vec<KnowledgeEntry>,
        second: Vec<KnowledgeEntry>,
        loads: AtomicUsize,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CorpusLoader for GatedCorpus {
        async fn load(&self) -> anyhow::Result<Vec<KnowledgeEntry>> {
            if self.loads.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(self.first.clone());
            }
            self.started.notify_one();
            self.release.notified().await;
            Ok(self.second.clone())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    /// 문서 임베딩은 되고 질의 임베딩만 실패
    struct QueryFailingEmbedding(HashingEmbedding);

    #[async_trait]
    impl EmbeddingProvider for QueryFailingEmbedding {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.0.embed(text).await
        }

        async fn embed_query(&self, _query: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("query encoder offline")
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }

        fn name(&self) -> &str {
            "query-failing"
        }
    }

    struct QueryFailingBackend;

    #[async_trait]
    impl EmbeddingBackend for QueryFailingBackend {
        async fn load(&self, _context: ExecutionContext) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
            Ok(Arc::new(QueryFailingEmbedding(HashingEmbedding::new(64))))
        }

        fn name(&self) -> &str {
            "query-failing"
        }
    }

    fn entry(id: &str, content: &str, category: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: id.into(),
            title: id.to_uppercase(),
            content: content.into(),
            url: format!("https://www.dmv.ca.gov/{}", id),
            category: category.into(),
        }
    }

    #[tokio::test]
    async fn test_greeting_short_circuits() {
        let assistant = bundled_assistant();

        let response = assistant.answer("hi").await;

        assert_eq!(response.confidence, 1.0);
        assert!(response.sources.is_empty());
        assert_eq!(response.message, GREETING_MESSAGE);
        // 인사는 검색을 타지 않으므로 초기화도 하지 않음
        assert!(!assistant.is_initialized().await);
    }

    #[tokio::test]
    async fn test_long_off_topic_query() {
        let assistant = bundled_assistant();
        assistant.train().await.unwrap();

        let response = assistant
            .answer("Could you explain the plot of a famous novel about a white whale?")
            .await;

        assert_eq!(response.message, OFF_TOPIC_MESSAGE);
        assert_eq!(response.confidence, 1.0);
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_license_renewal_answer() {
        let assistant = bundled_assistant();
        let stats = assistant.train().await.unwrap();
        assert_eq!(stats.entries, 24);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.dimension, Some(384));

        let response = assistant.answer("How do I renew my license online?").await;
        let message = response.message.to_lowercase();

        assert!(response.confidence > 0.5);
        assert!(message.contains("license"));
        assert!(message.contains("renew"));
        assert!(!response.sources.is_empty());
        assert!(response
            .message
            .contains(&format!("Visit the official DMV page: {}", response.sources[0])));
    }

    #[tokio::test]
    async fn test_retrain_is_idempotent() {
        let assistant = bundled_assistant();

        let first = assistant.train().await.unwrap();
        let ids = assistant.chunk_ids();
        let second = assistant.train().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(assistant.index_len(), ids.len());
        assert_eq!(assistant.chunk_ids(), ids);
    }

    #[tokio::test]
    async fn test_untrained_search_is_empty() {
        let assistant = bundled_assistant();
        assert!(assistant.search("real id documents").await.is_empty());

        assistant.initialize().await.unwrap();
        assert!(assistant.search("real id documents").await.is_empty());
    }

    #[tokio::test]
    async fn test_untrained_answer_has_no_results() {
        let assistant = bundled_assistant();

        let response = assistant.answer("What do I need for a REAL ID?").await;

        assert_eq!(response.message, NO_RESULTS_MESSAGE);
        assert_eq!(response.confidence, LOW_CONFIDENCE);
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_initialize_loads_once() {
        let backend = Arc::new(CountingBackend {
            inner: HashingBackend::new(32),
            loads: AtomicUsize::new(0),
        });
        let assistant = Assistant::new(
            AssistantConfig::default(),
            Arc::new(BundledCorpus),
            backend.clone(),
        );

        let results =
            futures::future::join_all((0..8).map(|_| assistant.initialize())).await;

        assert!(results.iter().all(Result::is_ok));
        assert!(assistant.is_initialized().await);
        // 가속 실패 1회 + CPU 성공 1회
        assert_eq!(backend.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_initialization_failure() {
        let assistant = Assistant::new(
            AssistantConfig::default(),
            Arc::new(BundledCorpus),
            Arc::new(BrokenBackend),
        );

        let err = assistant.initialize().await.unwrap_err();
        assert!(matches!(err, AssistantError::Initialization(_)));

        let err = assistant.train().await.unwrap_err();
        assert!(matches!(err, AssistantError::Indexing(_)));
        assert!(err.is_fatal());

        // answer는 실패를 흡수
        let response = assistant.answer("How do I renew my license?").await;
        assert_eq!(response.message, APOLOGY_MESSAGE);
        assert_eq!(response.confidence, LOW_CONFIDENCE);
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_search_prefers_matching_category() {
        let entries = vec![
            KnowledgeEntry {
                id: "smog".into(),
                title: "Smog Check".into(),
                content: "A smog check is required for most vehicles before registration renewal."
                    .into(),
                url: "https://www.dmv.ca.gov/smog".into(),
                category: "vehicle_registration".into(),
            },
            KnowledgeEntry {
                id: "realid".into(),
                title: "REAL ID".into(),
                content: "REAL ID cards need proof of identity and two proofs of residency.".into(),
                url: "https://www.dmv.ca.gov/real-id".into(),
                category: "real_id".into(),
            },
        ];
        let assistant = Assistant::new(
            AssistantConfig::default(),
            Arc::new(StaticCorpus(entries)),
            Arc::new(HashingBackend::new(256)),
        );
        assistant.train().await.unwrap();

        let results = assistant.search("what proof of residency does a real id need").await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "realid-chunk-0");
        assert_eq!(results[0].category_score, 1.0);
    }

    #[tokio::test]
    async fn test_search_sees_old_index_during_retrain() {
        let loader = Arc::new(GatedCorpus {
            first: vec![entry(
                "smog",
                "A smog check is required for most vehicles before registration renewal.",
                "vehicle_registration",
            )],
            second: vec![entry(
                "realid",
                "REAL ID cards need proof of identity and two proofs of residency.",
                "real_id",
            )],
            loads: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let assistant = Assistant::new(
            AssistantConfig::default(),
            loader.clone(),
            Arc::new(HashingBackend::new(128)),
        );
        assistant.train().await.unwrap();

        let (retrained, during) = tokio::join!(assistant.train(), async {
            loader.started.notified().await;
            let results = assistant.search("smog check").await;
            let ids = assistant.chunk_ids();
            loader.release.notify_one();
            (results, ids)
        });

        let (results, ids) = during;
        assert_eq!(ids, vec!["smog-chunk-0"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "smog-chunk-0");

        retrained.unwrap();
        assert_eq!(assistant.chunk_ids(), vec!["realid-chunk-0"]);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_yields_no_results() {
        let assistant = Assistant::new(
            AssistantConfig::default(),
            Arc::new(BundledCorpus),
            Arc::new(QueryFailingBackend),
        );
        let stats = assistant.train().await.unwrap();
        assert_eq!(stats.dropped, 0);
        assert!(assistant.index_len() > 0);

        assert!(assistant.search("renew my license").await.is_empty());

        let response = assistant.answer("How do I renew my license?").await;
        assert_eq!(response.message, NO_RESULTS_MESSAGE);
        assert_eq!(response.confidence, LOW_CONFIDENCE);
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_train_queued_behind_shutdown_reinitializes() {
        let assistant = bundled_assistant();
        assistant.train().await.unwrap();

        // 진행 중인 학습을 흉내 내어 잠금을 쥔 채로 shutdown과 train을 줄 세움
        let held = assistant.training.lock().await;
        let (_, retrained, _) = tokio::join!(assistant.shutdown(), assistant.train(), async move {
            tokio::task::yield_now().await;
            drop(held);
        });

        retrained.unwrap();
        assert!(assistant.is_initialized().await);
        assert!(assistant.index_len() > 0);
    }

    #[tokio::test]
    async fn test_shutdown_resets_state() {
        let assistant = bundled_assistant();
        assistant.train().await.unwrap();
        assert!(assistant.index_len() > 0);

        assistant.shutdown().await;

        assert!(!assistant.is_initialized().await);
        assert_eq!(assistant.index_len(), 0);
        assert!(assistant.search("renew license").await.is_empty());

        // 다시 학습 가능
        assistant.train().await.unwrap();
        assert!(assistant.is_initialized().await);
    }
}
