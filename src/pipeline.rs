//! 인덱싱 파이프라인 - 크롤링 → 청킹 → 임베딩 → 인덱스 저장

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::crawler::{CrawlStats, DocCrawler};
use crate::embedding::EmbeddingProvider;
use crate::knowledge::{Chunker, SourceDocument, VectorIndex};

/// 인덱싱 대상 페이지
#[derive(Debug, Clone)]
pub enum PageSource<'a> {
    /// 루트 URL 하위 크롤링
    Crawl { root_url: &'a str, max_pages: usize },
    /// 지정한 URL만 로드
    Urls(&'a [String]),
}

/// 인덱싱 결과 요약
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// 크롤링한 경우의 통계
    pub crawl: Option<CrawlStats>,
    pub pages: usize,
    pub chunks: usize,
    /// 인덱스가 새로 저장되었는지 (청크가 없으면 false)
    pub built: bool,
}

/// 문서를 모아 인덱스 빌드
///
/// 기존 인덱스는 새 인덱스가 완성된 경우에만 교체됩니다.
#[tracing::instrument(skip_all, fields(location = %location.display()))]
pub async fn index_documentation(
    crawler: &DocCrawler,
    chunker: &dyn Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    source: PageSource<'_>,
    location: &Path,
) -> Result<IndexReport> {
    let mut report = IndexReport::default();

    let pages = match source {
        PageSource::Crawl {
            root_url,
            max_pages,
        } => {
            let crawl = crawler.crawl(root_url, max_pages).await?;
            report.crawl = Some(crawl.stats);
            crawl.pages
        }
        PageSource::Urls(urls) => crawler.fetch_pages(urls).await,
    };
    report.pages = pages.len();

    let documents: Vec<SourceDocument> = pages.into_iter().map(SourceDocument::from).collect();
    let chunks = chunker.split(&documents);
    report.chunks = chunks.len();
    tracing::info!(
        "Split {} documents into {} chunks using {}",
        report.pages,
        report.chunks,
        chunker.name()
    );

    let index = VectorIndex::build(&chunks, embedder, location).await?;
    report.built = index.is_some();

    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::SlidingWindowChunker;
    use crate::testing::FakeEmbedder;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(body.to_string())
    }

    #[tokio::test]
    async fn test_crawl_and_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/"))
            .respond_with(html(
                r#"<html><body><main><h1>Docs</h1>
                <p>To add a source open your workspace and click Add Source.</p>
                <a href="/docs/destinations/">Destinations</a></main></body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/destinations/"))
            .respond_with(html(
                r#"<html><body><article><h2>Destinations</h2>
                <p>Pick a destination from the catalog and enable it.</p></article></body></html>"#,
            ))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let location = dir.path().join("segment_docs");
        let crawler = DocCrawler::new(Duration::from_secs(5)).unwrap();
        let root = format!("{}/docs/", server.uri());

        let report = index_documentation(
            &crawler,
            &SlidingWindowChunker::with_defaults(),
            Arc::new(FakeEmbedder::new()),
            PageSource::Crawl {
                root_url: &root,
                max_pages: 10,
            },
            &location,
        )
        .await
        .unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.chunks, 2);
        assert!(report.built);
        assert_eq!(report.crawl.unwrap().doc_pages, 2);
        assert!(VectorIndex::exists(&location));
    }

    #[tokio::test]
    async fn test_nothing_to_index_keeps_location_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let location = dir.path().join("segment_docs");
        let crawler = DocCrawler::new(Duration::from_secs(5)).unwrap();
        let urls = vec![format!("{}/docs/missing", server.uri())];

        let report = index_documentation(
            &crawler,
            &SlidingWindowChunker::with_defaults(),
            Arc::new(FakeEmbedder::new()),
            PageSource::Urls(&urls),
            &location,
        )
        .await
        .unwrap();

        assert_eq!(report.pages, 0);
        assert!(!report.built);
        assert!(!VectorIndex::exists(&location));
    }
}
