//! 웹 코퍼스 로더 - URL 콘텐츠 추출
//!
//! 지정된 페이지들을 가져와 제목과 본문을 추출하고 `KnowledgeEntry`로 변환합니다.
//! 실패한 페이지는 로그만 남기고 건너뜁니다.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{CorpusLoader, KnowledgeEntry};

/// 페이지 간 딜레이
const CRAWL_DELAY: Duration = Duration::from_millis(2000);

/// 본문으로 인정할 최소 길이
const MIN_CONTENT_LENGTH: usize = 100;

/// 기본 수집 대상 (URL, 카테고리)
pub const DEFAULT_DMV_PAGES: &[(&str, &str)] = &[
    (
        "https://www.dmv.ca.gov/portal/driver-licenses-identification-cards/",
        "license",
    ),
    (
        "https://www.dmv.ca.gov/portal/driver-licenses-identification-cards/renew-dl-id/",
        "license_renewal",
    ),
    ("https://www.dmv.ca.gov/portal/real-id/", "real_id"),
    (
        "https://www.dmv.ca.gov/portal/vehicle-registration/",
        "vehicle_registration",
    ),
    (
        "https://www.dmv.ca.gov/portal/make-an-appointment/",
        "appointment",
    ),
    ("https://www.dmv.ca.gov/portal/dmv-fees/", "fees"),
    (
        "https://www.dmv.ca.gov/portal/office-locations/",
        "office_locations",
    ),
];

/// 웹 코퍼스 로더
pub struct WebCorpusLoader {
    client: reqwest::Client,
    pages: Vec<(String, String)>,
    delay: Duration,
}

impl WebCorpusLoader {
    /// 새 로더 생성
    ///
    /// # Arguments
    /// * `pages` - (URL, 카테고리) 목록
    pub fn new(pages: Vec<(String, String)>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("dmv-assist/0.1")
            .timeout(Duration::from_secs(30))
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self {
            client,
            pages,
            delay: CRAWL_DELAY,
        })
    }

    /// 기본 DMV 페이지 목록으로 생성
    pub fn with_default_pages() -> Result<Self> {
        let pages = DEFAULT_DMV_PAGES
            .iter()
            .map(|(url, category)| (url.to_string(), category.to_string()))
            .collect();
        Self::new(pages)
    }

    /// 페이지 간 딜레이 변경
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 단일 페이지 수집
    pub async fn fetch(&self, url: &str, category: &str) -> Result<KnowledgeEntry> {
        tracing::info!("Scraping: {}", url);

        let parsed = Url::parse(url).with_context(|| format!("잘못된 URL: {}", url))?;

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .context("HTTP 요청 실패")?
            .error_for_status()
            .context("HTTP 에러 응답")?;

        let html = response.text().await.context("응답 본문 읽기 실패")?;

        page_to_entry(&parsed, &html, category)
    }
}

#[async_trait]
impl CorpusLoader for WebCorpusLoader {
    async fn load(&self) -> Result<Vec<KnowledgeEntry>> {
        let mut entries = Vec::with_capacity(self.pages.len());

        for (i, (url, category)) in self.pages.iter().enumerate() {
            match self.fetch(url, category).await {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Failed to scrape {}: {:#}", url, e),
            }

            if i + 1 < self.pages.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        dedupe_ids(&mut entries);

        tracing::info!(
            "Scraped {}/{} pages",
            entries.len(),
            self.pages.len()
        );
        Ok(entries)
    }

    fn name(&self) -> &str {
        "web"
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// HTML을 엔트리로 변환
pub(crate) fn page_to_entry(url: &Url, html: &str, category: &str) -> Result<KnowledgeEntry> {
    let document = Html::parse_document(html);
    let content = extract_content(&document);

    if content.is_empty() {
        anyhow::bail!("본문이 비어 있습니다: {}", url);
    }

    Ok(KnowledgeEntry {
        id: entry_id(url),
        title: extract_title(&document).unwrap_or_else(|| "DMV Information".to_string()),
        content,
        url: url.to_string(),
        category: category.to_string(),
    })
}

/// URL 경로 전체로 id 생성
///
/// `/portal/real-id/` → `portal-real-id`. `index.html` 같은 인덱스 문서는 빼고,
/// 나머지 세그먼트의 확장자는 떼어냅니다. 경로가 없으면 호스트 이름.
pub(crate) fn entry_id(url: &Url) -> String {
    let parts: Vec<&str> = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| s.rsplit_once('.').map_or(s, |(stem, _)| stem))
                .filter(|s| !s.is_empty() && *s != "index" && *s != "default")
                .collect()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        url.host_str().unwrap_or("page").to_string()
    } else {
        parts.join("-")
    }
}

/// 겹치는 id에 `-2`, `-3`... 접미사
pub(crate) fn dedupe_ids(entries: &mut [KnowledgeEntry]) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for entry in entries.iter_mut() {
        let count = seen.entry(entry.id.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            continue;
        }

        let mut n = *count;
        while seen.contains_key(&format!("{}-{}", entry.id, n)) {
            n += 1;
        }
        seen.insert(entry.id.clone(), n);

        let renamed = format!("{}-{}", entry.id, n);
        tracing::debug!("Renaming duplicate id {} -> {}", entry.id, renamed);
        seen.insert(renamed.clone(), 1);
        entry.id = renamed;
    }
}

/// 제목 추출: <title> → <h1>
fn extract_title(document: &Html) -> Option<String> {
    for tag in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(tag) {
            if let Some(element) = document.select(&selector).next() {
                let title = element.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    None
}

/// 본문 후보 (앞에서부터 우선)
const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role=main]", "#content", "body"];

/// 본문에서 뺄 하위 트리
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "nav", "header", "footer"];

/// 본문 추출
///
/// 충분히 긴 첫 후보를 쓰고, 없으면 짧더라도 가장 긴 후보를 씁니다.
fn extract_content(document: &Html) -> String {
    let candidates: Vec<String> = CONTENT_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .filter_map(|selector| document.select(&selector).next().map(visible_text))
        .collect();

    if let Some(text) = candidates.iter().find(|t| t.len() > MIN_CONTENT_LENGTH) {
        return text.clone();
    }

    candidates
        .into_iter()
        .max_by_key(|t| t.len())
        .unwrap_or_default()
}

/// 보이는 텍스트만 공백 하나로 이어 붙임
fn visible_text(element: ElementRef<'_>) -> String {
    let mut words = Vec::new();
    collect_words(element, &mut words);
    words.join(" ")
}

fn collect_words<'a>(element: ElementRef<'a>, words: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !SKIPPED_ELEMENTS.contains(&child_element.value().name()) {
                collect_words(child_element, words);
            }
        } else if let Some(text) = child.value().as_text() {
            words.extend(text.split_whitespace());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{validate_entries, write_corpus, JsonFileCorpus};

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid url")
    }

    #[test]
    fn test_loader_creation() {
        let loader = WebCorpusLoader::with_default_pages();
        assert!(loader.is_ok());
        assert_eq!(loader.map(|l| l.pages.len()).unwrap_or(0), 7);
    }

    #[test]
    fn test_entry_id_from_path() {
        assert_eq!(
            entry_id(&url("https://www.dmv.ca.gov/portal/real-id/")),
            "portal-real-id"
        );
        assert_eq!(
            entry_id(&url("https://www.dmv.ca.gov/portal/driver-licenses/index.html")),
            "portal-driver-licenses"
        );
        assert_eq!(
            entry_id(&url("https://www.dmv.ca.gov/portal/fees/fee-table.aspx")),
            "portal-fees-fee-table"
        );
        assert_eq!(entry_id(&url("https://example.com")), "example.com");
        assert_eq!(entry_id(&url("https://example.com/index.html")), "example.com");
    }

    #[tokio::test]
    async fn test_index_pages_get_distinct_ids_and_reload() {
        let html = "<html><head><title>DMV</title></head><body><main>\
                    Renew your registration online, by mail, or at a DMV office. \
                    Bring your renewal notice and proof of insurance when you visit.\
                    </main></body></html>";
        let mut entries = vec![
            page_to_entry(
                &url("https://www.dmv.ca.gov/portal/driver-licenses/index.html"),
                html,
                "license",
            )
            .expect("entry"),
            page_to_entry(
                &url("https://www.dmv.ca.gov/portal/vehicle-registration/index.html"),
                html,
                "vehicle_registration",
            )
            .expect("entry"),
        ];
        dedupe_ids(&mut entries);
        assert_ne!(entries[0].id, entries[1].id);

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("crawl.json");
        write_corpus(&path, &entries).expect("write");

        let reloaded = JsonFileCorpus::new(&path).load().await.expect("reload");
        assert_eq!(reloaded, entries);
    }

    #[test]
    fn test_dedupe_ids_suffixes_repeats() {
        let entry = |id: &str| KnowledgeEntry {
            id: id.into(),
            title: "t".into(),
            content: "c".into(),
            url: "https://example.com".into(),
            category: "general".into(),
        };
        let mut entries = vec![entry("faq"), entry("faq"), entry("faq-2"), entry("faq")];

        dedupe_ids(&mut entries);

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["faq", "faq-2", "faq-2-2", "faq-3"]);
        assert!(validate_entries(&entries).is_ok());
    }

    #[test]
    fn test_extract_title_h1_fallback() {
        let html = r#"
            <html>
                <head><title></title></head>
                <body><h1>H1 Heading</h1></body>
            </html>
        "#;
        let document = Html::parse_document(html);
        assert_eq!(extract_title(&document), Some("H1 Heading".to_string()));
    }

    #[test]
    fn test_page_to_entry_prefers_article_and_skips_scripts() {
        let html = r#"
            <html>
                <head><title>REAL ID</title></head>
                <body>
                    <nav>Navigation menu</nav>
                    <article>
                        <script>var tracking = 1;</script>
                        A REAL ID is a federally compliant driver license or identification card.
                        You need it to board domestic flights starting May 7, 2025.
                    </article>
                    <footer>Footer content</footer>
                </body>
            </html>
        "#;

        let entry = page_to_entry(&url("https://www.dmv.ca.gov/portal/real-id/"), html, "real_id")
            .expect("entry");

        assert_eq!(entry.id, "portal-real-id");
        assert_eq!(entry.title, "REAL ID");
        assert_eq!(entry.category, "real_id");
        assert!(entry.content.contains("federally compliant"));
        assert!(!entry.content.contains("tracking"));
        assert!(!entry.content.contains("Navigation"));
    }

    #[test]
    fn test_empty_page_rejected() {
        let html = "<html><body></body></html>";
        assert!(page_to_entry(&url("https://example.com/x"), html, "general").is_err());
    }
}
