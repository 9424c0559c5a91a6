//! 문서 크롤러 모듈 - 루트 URL 하위의 문서 페이지 탐색
//!
//! 루트 URL에서 시작하는 제한된 BFS 순회입니다.
//! - FIFO 프론티어 + 방문 집합 (재방문 없음)
//! - 페이지 요청은 한 번에 하나씩, 타임아웃 적용
//! - 실패한 요청은 방문 처리 후 건너뜀 (재시도 루프 방지)
//! - 본문 영역 + (헤더 또는 코드 블록)이 있는 페이지만 문서로 수집
//! - 문서가 아닌 페이지의 링크도 계속 따라감

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::CrawlSettings;

// ============================================================================
// Types
// ============================================================================

/// 페이지 요청 결과
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 200 응답
    Ok { status: u16, html: String },
    /// 200 이외의 응답
    HttpStatus(u16),
    /// 타임아웃
    Timeout,
    /// 연결 실패 등 네트워크 에러
    Network(String),
}

/// 가져온 문서 페이지
#[derive(Debug, Clone)]
pub struct Page {
    /// 페이지 URL
    pub url: String,
    /// 본문 텍스트 (HTML 태그 제거됨)
    pub raw_text: String,
    /// HTTP 상태 코드
    pub fetch_status: u16,
}

/// 크롤링 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// 응답을 받은 페이지 수 (max_pages 기준)
    pub visited: usize,
    pub doc_pages: usize,
    pub non_doc_pages: usize,
    pub http_errors: usize,
    pub timeouts: usize,
    pub network_errors: usize,
}

/// 크롤링 결과
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// 문서 페이지 URL (발견 순서)
    pub doc_urls: Vec<String>,
    /// 문서 페이지 본문 (doc_urls와 같은 순서)
    pub pages: Vec<Page>,
    pub stats: CrawlStats,
}

/// 페이지 분석 결과 (HTML 파싱은 동기 구간에서만 수행)
struct PageAnalysis {
    is_doc: bool,
    text: String,
    links: Vec<Url>,
}

// ============================================================================
// DocCrawler
// ============================================================================

/// 문서 크롤러
pub struct DocCrawler {
    client: reqwest::Client,
}

impl DocCrawler {
    /// 요청 타임아웃을 지정하여 생성
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cdp-support/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client })
    }

    /// 설정에서 생성
    pub fn from_settings(settings: &CrawlSettings) -> Result<Self> {
        Self::new(Duration::from_secs(settings.fetch_timeout_secs))
    }

    /// 단일 URL 요청
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return FetchOutcome::Timeout,
            Err(e) => return FetchOutcome::Network(e.to_string()),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return FetchOutcome::HttpStatus(status.as_u16());
        }

        match response.text().await {
            Ok(html) => FetchOutcome::Ok {
                status: status.as_u16(),
                html,
            },
            Err(e) if e.is_timeout() => FetchOutcome::Timeout,
            Err(e) => FetchOutcome::Network(e.to_string()),
        }
    }

    /// 루트 URL 하위 문서 페이지 크롤링
    ///
    /// `max_pages`개의 페이지에서 응답을 받거나 프론티어가 비면 종료합니다.
    /// 루트 URL 파싱 실패만 에러로 반환하고, 개별 페이지 실패는 통계에 기록합니다.
    #[tracing::instrument(skip(self), fields(root = %root_url))]
    pub async fn crawl(&self, root_url: &str, max_pages: usize) -> Result<CrawlReport> {
        let root = Url::parse(root_url).with_context(|| format!("잘못된 루트 URL: {}", root_url))?;
        let prefix = root.as_str().to_string();

        let mut frontier: VecDeque<String> = VecDeque::from([prefix.clone()]);
        let mut queued: HashSet<String> = HashSet::from([prefix.clone()]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut report = CrawlReport::default();

        tracing::info!("Starting crawl (max_pages={})", max_pages);

        while report.stats.visited < max_pages {
            let Some(url) = frontier.pop_front() else {
                break;
            };
            queued.remove(&url);

            if !visited.insert(url.clone()) {
                continue;
            }

            tracing::debug!("Visiting {}", url);

            let (status, html) = match self.fetch(&url).await {
                FetchOutcome::Ok { status, html } => (status, html),
                FetchOutcome::HttpStatus(code) => {
                    tracing::warn!("Failed to fetch {}: status {}", url, code);
                    report.stats.visited += 1;
                    report.stats.http_errors += 1;
                    continue;
                }
                FetchOutcome::Timeout => {
                    tracing::warn!("Timed out fetching {}", url);
                    report.stats.timeouts += 1;
                    continue;
                }
                FetchOutcome::Network(e) => {
                    tracing::warn!("Error fetching {}: {}", url, e);
                    report.stats.network_errors += 1;
                    continue;
                }
            };
            report.stats.visited += 1;

            let base = match Url::parse(&url) {
                Ok(base) => base,
                Err(e) => {
                    tracing::warn!("Skipping unparsable URL {}: {}", url, e);
                    continue;
                }
            };
            let analysis = analyze_page(&html, &base);

            if analysis.is_doc {
                report.stats.doc_pages += 1;
                report.doc_urls.push(url.clone());
                report.pages.push(Page {
                    url: url.clone(),
                    raw_text: analysis.text,
                    fetch_status: status,
                });
            } else {
                report.stats.non_doc_pages += 1;
            }

            for link in analysis.links {
                let link = link.to_string();
                if link.starts_with(&prefix) && !visited.contains(&link) && !queued.contains(&link)
                {
                    queued.insert(link.clone());
                    frontier.push_back(link);
                }
            }
        }

        tracing::info!(
            visited = report.stats.visited,
            doc_pages = report.stats.doc_pages,
            failed = report.stats.http_errors + report.stats.timeouts + report.stats.network_errors,
            "Crawl complete. Found {} documentation pages.",
            report.doc_urls.len()
        );

        Ok(report)
    }

    /// 단일 페이지 로드 (문서 판정 없이 본문만 추출)
    pub async fn fetch_page(&self, url: &str) -> Result<Page> {
        match self.fetch(url).await {
            FetchOutcome::Ok { status, html } => {
                let document = Html::parse_document(&html);
                Ok(Page {
                    url: url.to_string(),
                    raw_text: extract_content(&document),
                    fetch_status: status,
                })
            }
            FetchOutcome::HttpStatus(code) => anyhow::bail!("HTTP {} for {}", code, url),
            FetchOutcome::Timeout => anyhow::bail!("Timed out fetching {}", url),
            FetchOutcome::Network(e) => anyhow::bail!("Error fetching {}: {}", url, e),
        }
    }

    /// URL 목록 로드 (실패한 URL은 로그 후 건너뜀)
    pub async fn fetch_pages(&self, urls: &[String]) -> Vec<Page> {
        let mut pages = Vec::with_capacity(urls.len());

        for url in urls {
            match self.fetch_page(url).await {
                Ok(page) => pages.push(page),
                Err(e) => tracing::warn!("Error loading {}: {:#}", url, e),
            }
        }

        tracing::info!("Loaded {} of {} pages", pages.len(), urls.len());
        pages
    }
}

// ============================================================================
// HTML Helpers
// ============================================================================

fn analyze_page(html: &str, base: &Url) -> PageAnalysis {
    let document = Html::parse_document(html);

    let is_doc = is_doc_page(&document);
    let text = if is_doc {
        extract_content(&document)
    } else {
        String::new()
    };

    PageAnalysis {
        is_doc,
        text,
        links: extract_links(&document, base),
    }
}

fn has_any(document: &Html, selector: &str) -> bool {
    Selector::parse(selector)
        .map(|s| document.select(&s).next().is_some())
        .unwrap_or(false)
}

/// 본문 영역 셀렉터 (우선순위 순)
const CONTENT_REGIONS: [&str; 3] = ["article", "main", "[role=main]"];

/// 문서 페이지 판정: 본문 영역 AND (헤더 OR 코드 블록)
pub fn is_doc_page(document: &Html) -> bool {
    has_any(document, "article, main")
        && (has_any(document, "h1, h2, h3") || has_any(document, "pre, code"))
}

/// 링크 추출 (상대 URL 해석, fragment 제거, http(s)만)
fn extract_links(document: &Html, base: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| u.scheme() == "http" || u.scheme() == "https")
        .map(|mut u| {
            u.set_fragment(None);
            u
        })
        .collect()
}

/// 본문 추출 (HTML 태그 제거)
///
/// 문서 판정에 쓰인 본문 영역(article > main > [role=main])의 텍스트를 사용하고,
/// 해당 영역이 없거나 비어 있을 때만 body 전체로 대체합니다.
pub fn extract_content(document: &Html) -> String {
    CONTENT_REGIONS
        .iter()
        .filter_map(|s| first_text(document, s))
        .find(|text| !text.is_empty())
        .or_else(|| first_text(document, "body"))
        .unwrap_or_default()
}

/// 셀렉터에 맞는 첫 요소의 텍스트
fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(extract_text_from_element)
}

/// 요소에서 텍스트 추출 (스크립트/스타일 제외)
fn extract_text_from_element(element: ElementRef) -> String {
    let mut parts = Vec::new();
    collect_text(element, &mut parts);

    parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if matches!(el.value().name(), "script" | "style" | "noscript") {
                continue;
            }
            collect_text(el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push(text);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
