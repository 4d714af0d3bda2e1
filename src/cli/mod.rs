//! CLI 모듈
//!
//! dmv-assist CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::assistant::{run_validation, Assistant, Response};
use crate::config::{default_config_path, AssistantConfig, ProviderKind};
use crate::corpus::{
    validate_entries, write_corpus, BundledCorpus, CorpusLoader, JsonFileCorpus, WebCorpusLoader,
};
use crate::embedding::{create_backend, has_api_key};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "dmv-assist")]
#[command(version, about = "California DMV 질의응답 어시스턴트", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: 데이터 디렉토리의 config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 코퍼스 JSON 파일 (기본: 내장 코퍼스)
    #[arg(long, global = true)]
    pub corpus: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문 하나에 답변
    Ask {
        /// 질문
        query: String,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 대화형 모드 (exit/quit 또는 EOF로 종료)
    Chat,

    /// 하이브리드 검색 결과와 세부 점수 출력
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// 내장 검증 질의 세트 실행
    Validate,

    /// DMV 페이지를 가져와 코퍼스 JSON으로 저장
    Crawl {
        /// 저장할 파일
        #[arg(short, long)]
        out: PathBuf,

        /// 가져올 URL (생략 시 기본 DMV 페이지)
        #[arg(short, long)]
        url: Vec<String>,

        /// --url 로 지정한 페이지의 카테고리
        #[arg(long, default_value = "general")]
        category: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AssistantConfig::load(&config_path).context("설정 로드 실패")?;

    match cli.command {
        Commands::Ask { query, json } => {
            cmd_ask(config, cli.corpus.as_deref(), &query, json).await
        }
        Commands::Chat => cmd_chat(config, cli.corpus.as_deref()).await,
        Commands::Search { query, limit } => {
            cmd_search(config, cli.corpus.as_deref(), &query, limit).await
        }
        Commands::Validate => cmd_validate(config, cli.corpus.as_deref()).await,
        Commands::Crawl { out, url, category } => cmd_crawl(&out, url, &category).await,
        Commands::Status => cmd_status(&config, &config_path, cli.corpus.as_deref()).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 질문 명령어 (ask)
async fn cmd_ask(
    config: AssistantConfig,
    corpus: Option<&Path>,
    query: &str,
    json: bool,
) -> Result<()> {
    let assistant = trained_assistant(config, corpus).await?;
    let response = assistant.answer(query).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    assistant.shutdown().await;
    Ok(())
}

/// 대화 명령어 (chat)
async fn cmd_chat(config: AssistantConfig, corpus: Option<&Path>) -> Result<()> {
    let assistant = trained_assistant(config, corpus).await?;

    println!("DMV 어시스턴트입니다. 질문을 입력하세요 (종료: exit)");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let response = assistant.answer(query).await;
        println!();
        print_response(&response);
    }

    assistant.shutdown().await;
    Ok(())
}

/// 검색 명령어 (search)
///
/// 시맨틱/키워드/카테고리 점수를 모두 보여줍니다.
async fn cmd_search(
    config: AssistantConfig,
    corpus: Option<&Path>,
    query: &str,
    limit: usize,
) -> Result<()> {
    let assistant = trained_assistant(config, corpus).await?;

    println!("[*] 검색 중: \"{}\"", query);
    let results = assistant.search_top(query, limit).await;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [점수: {:.4}] {} ({})",
            i + 1,
            result.blended_score,
            result.chunk.id,
            result.chunk.category
        );
        println!(
            "   시맨틱 {:.4} | 키워드 {:.4} | 카테고리 {:.1}",
            result.semantic_score, result.keyword_score, result.category_score
        );
        println!("   제목: {}", result.chunk.title);
        println!("   URL: {}", result.chunk.url);
        println!("   내용: {}", preview(&result.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 검증 명령어 (validate)
async fn cmd_validate(config: AssistantConfig, corpus: Option<&Path>) -> Result<()> {
    let assistant = trained_assistant(config, corpus).await?;
    let report = run_validation(&assistant).await;

    for (i, outcome) in report.outcomes.iter().enumerate() {
        let mark = if outcome.passed { "[OK]" } else { "[!]" };
        println!(
            "{} {}/{} {}",
            mark,
            i + 1,
            report.total(),
            outcome.case.description
        );
        println!("     질문: \"{}\"", outcome.case.query);
        println!(
            "     의도: {} (기대: {}) | 신뢰도: {:.1}% | {:.2?}",
            outcome.classified,
            outcome.case.expected,
            outcome.response.confidence * 100.0,
            outcome.elapsed
        );
        println!("     응답: {}", preview(&outcome.response.message, 100));
    }

    println!();
    println!(
        "[*] 검증 완료: {}/{} 통과 ({:.1}%)",
        report.passed(),
        report.total(),
        report.success_rate()
    );

    let misclassified = report.misclassified();
    if !misclassified.is_empty() {
        println!("[!] 의도 불일치 {} 건:", misclassified.len());
        for outcome in misclassified {
            println!(
                "     \"{}\" -> {} (기대: {})",
                outcome.case.query, outcome.classified, outcome.case.expected
            );
        }
    }

    if !report.all_passed() {
        bail!("검증 실패: {} 건", report.total() - report.passed());
    }

    Ok(())
}

/// 크롤 명령어 (crawl)
async fn cmd_crawl(out: &Path, urls: Vec<String>, category: &str) -> Result<()> {
    let loader = if urls.is_empty() {
        WebCorpusLoader::with_default_pages()?
    } else {
        let pages = urls
            .into_iter()
            .map(|url| (url, category.to_string()))
            .collect();
        WebCorpusLoader::new(pages)?
    };

    println!("[*] 페이지 수집 중...");
    let entries = loader.load().await.context("페이지 수집 실패")?;

    if entries.is_empty() {
        bail!("수집된 페이지가 없습니다");
    }

    validate_entries(&entries).context("수집 결과 검증 실패")?;
    write_corpus(out, &entries).context("코퍼스 저장 실패")?;

    println!("[OK] {} 건 저장됨: {}", entries.len(), out.display());
    for entry in &entries {
        println!(
            "     {} [{}] {} chars",
            entry.id,
            entry.category,
            entry.content.chars().count()
        );
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(
    config: &AssistantConfig,
    config_path: &Path,
    corpus: Option<&Path>,
) -> Result<()> {
    println!("dmv-assist v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if config_path.exists() {
        println!("[OK] 설정 파일: {}", config_path.display());
    } else {
        println!("[*] 설정 파일 없음 (기본값 사용): {}", config_path.display());
    }

    let loader = corpus_loader(corpus);
    match loader.load().await {
        Ok(entries) => {
            let total_chars: usize = entries.iter().map(|e| e.content.chars().count()).sum();
            println!(
                "[OK] 코퍼스 ({}): {} 건, {} chars",
                loader.name(),
                entries.len(),
                total_chars
            );
        }
        Err(e) => println!("[!] 코퍼스 로드 실패: {:#}", e),
    }

    println!(
        "[*] 임베딩: {:?} ({} 차원)",
        config.embedding.provider, config.embedding.dimension
    );
    if config.embedding.provider == ProviderKind::Gemini {
        if has_api_key() {
            println!("[OK] API 키: 설정됨");
        } else {
            println!("[!] API 키: 미설정");
            println!("    설정: export GEMINI_API_KEY=your-key");
        }
    }

    println!(
        "[*] 청크 {} chars | 키워드 {} ({:?}) | top_k {} | 배치 {}",
        config.chunk.max_characters,
        config.keywords.max_keywords,
        config.keywords.policy,
        config.ranking.top_k,
        config.training.batch_size
    );

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn corpus_loader(corpus: Option<&Path>) -> Arc<dyn CorpusLoader> {
    match corpus {
        Some(path) => Arc::new(JsonFileCorpus::new(path)),
        None => Arc::new(BundledCorpus),
    }
}

/// 어시스턴트 생성 + 학습
async fn trained_assistant(config: AssistantConfig, corpus: Option<&Path>) -> Result<Assistant> {
    if config.embedding.provider == ProviderKind::Gemini && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    let backend = create_backend(&config.embedding);
    let assistant = Assistant::new(config, corpus_loader(corpus), backend);

    let stats = assistant.train().await.context("학습 실패")?;
    tracing::info!(
        "Index ready: {} chunks from {} entries",
        stats.chunks,
        stats.entries
    );

    Ok(assistant)
}

fn print_response(response: &Response) {
    println!("{}", response.message);
    println!();
    println!("[*] 신뢰도: {:.1}%", response.confidence * 100.0);

    if !response.sources.is_empty() {
        println!("[*] 출처:");
        for source in &response.sources {
            println!("    {}", source);
        }
    }
}

/// 한 줄 미리보기: 공백을 접고 단어 경계에서 자름
fn preview(text: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if out.is_empty() { word_len } else { len + 1 + word_len };

        if needed > max_chars {
            if out.is_empty() {
                out = word.chars().take(max_chars).collect();
            }
            out.push_str("...");
            return out;
        }

        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        len = needed;
    }

    out
}

// ============================================================================
// Tests
// ============================================================================
