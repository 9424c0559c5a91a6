//! CLI 모듈
//!
//! cdp-support CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::agent::{ChatRequest, SupportDesk};
use crate::config::{has_api_key, ProductProfile, SupportConfig};
use crate::crawler::DocCrawler;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::IndexError;
use crate::generation::{GenerativeProvider, OpenAiChat};
use crate::knowledge::{sliding_window_chunker, ChunkConfig, VectorIndex};
use crate::pipeline::{index_documentation, PageSource};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "cdp-support")]
#[command(version, about = "CDP how-to 지원 챗봇", long_about = None)]
pub struct Cli {
    /// 설정 파일 (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 데이터 디렉토리 (설정 파일보다 우선)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서 사이트 크롤링 (인덱스는 만들지 않음)
    Crawl {
        /// 제품 ID
        #[arg(short, long, default_value = "segment")]
        product: String,

        /// 최대 페이지 수
        #[arg(short, long)]
        max_pages: Option<usize>,
    },

    /// 문서 크롤링 후 벡터 인덱스 빌드
    Index {
        /// 제품 ID
        #[arg(short, long, default_value = "segment")]
        product: String,

        /// 최대 페이지 수
        #[arg(short, long)]
        max_pages: Option<usize>,

        /// 크롤링 대신 지정한 URL만 인덱싱 (반복 가능)
        #[arg(short, long)]
        url: Vec<String>,
    },

    /// 인덱스 검색 (생성 없이 검색된 청크만 출력)
    Search {
        /// 검색 쿼리
        query: String,

        #[arg(short, long, default_value = "segment")]
        product: String,

        /// 결과 개수 제한
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// 질문 하나에 답변
    Ask {
        /// 질문
        message: String,

        /// JSON 응답 출력 ({"response": ...})
        #[arg(long)]
        json: bool,
    },

    /// 대화형 채팅
    Chat,

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = SupportConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Crawl { product, max_pages } => cmd_crawl(&config, &product, max_pages).await,
        Commands::Index {
            product,
            max_pages,
            url,
        } => cmd_index(&config, &product, max_pages, &url).await,
        Commands::Search {
            query,
            product,
            limit,
        } => cmd_search(&config, &query, &product, limit).await,
        Commands::Ask { message, json } => cmd_ask(&config, &message, json).await,
        Commands::Chat => cmd_chat(&config).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 크롤링 명령어 (crawl)
///
/// 문서 페이지 URL과 크롤링 통계를 출력합니다.
async fn cmd_crawl(config: &SupportConfig, product: &str, max_pages: Option<usize>) -> Result<()> {
    let profile = find_product(config, product)?;
    let max_pages = max_pages.unwrap_or(config.crawl.max_pages);

    println!("[*] 크롤링 중: {} (최대 {} 페이지)", profile.docs_url, max_pages);

    let crawler = DocCrawler::from_settings(&config.crawl)?;
    let report = crawler.crawl(&profile.docs_url, max_pages).await?;

    for url in &report.doc_urls {
        println!("  {}", url);
    }

    let stats = &report.stats;
    println!();
    println!("[OK] 문서 페이지: {} / 응답 페이지: {}", stats.doc_pages, stats.visited);
    println!(
        "     비문서: {}, HTTP 에러: {}, 타임아웃: {}, 네트워크 에러: {}",
        stats.non_doc_pages, stats.http_errors, stats.timeouts, stats.network_errors
    );

    Ok(())
}

/// 인덱스 빌드 명령어 (index)
async fn cmd_index(
    config: &SupportConfig,
    product: &str,
    max_pages: Option<usize>,
    urls: &[String],
) -> Result<()> {
    let profile = find_product(config, product)?;
    if !profile.enabled {
        bail!("{} 지원은 아직 구현되지 않았습니다", profile.name);
    }
    require_api_key()?;

    let crawler = DocCrawler::from_settings(&config.crawl)?;
    let chunker = sliding_window_chunker(ChunkConfig::new(
        config.window_chars,
        config.overlap_chars,
    )?);
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(create_embedder(&config.embedding_model)?);
    let location = config.index_location(&profile.id);

    let source = if urls.is_empty() {
        PageSource::Crawl {
            root_url: &profile.docs_url,
            max_pages: max_pages.unwrap_or(config.crawl.max_pages),
        }
    } else {
        PageSource::Urls(urls)
    };

    println!("[*] {} 문서 인덱싱 중...", profile.name);

    let report = index_documentation(&crawler, chunker.as_ref(), embedder, source, &location)
        .await
        .context("인덱스 빌드 실패")?;

    if report.built {
        println!(
            "[OK] {} 페이지, {} 청크 인덱싱 완료",
            report.pages, report.chunks
        );
        println!("     위치: {}", location.display());
    } else {
        println!("[!] 인덱싱할 문서가 없습니다. 기존 인덱스는 변경되지 않았습니다.");
    }

    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(
    config: &SupportConfig,
    query: &str,
    product: &str,
    limit: Option<usize>,
) -> Result<()> {
    let profile = find_product(config, product)?;
    require_api_key()?;

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(create_embedder(&config.embedding_model)?);
    let index = VectorIndex::load(&config.index_location(&profile.id), embedder).await?;

    let results = index
        .search(query, limit.unwrap_or(config.top_k))
        .await
        .context("검색 실패")?;

    if results.is_empty() {
        println!("[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("[OK] 검색 결과 ({} 건):\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!("{}. [유사도: {:.4}] {}", i + 1, result.similarity, result.source_url);
        println!("   {}", truncate_text(&result.chunk_text, 200));
        println!();
    }

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: &SupportConfig, message: &str, json: bool) -> Result<()> {
    let desk = open_desk(config).await?;
    let response = desk.respond(ChatRequest::new(message)).await;

    if json {
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{}", response.response);
    }

    Ok(())
}

/// 대화형 채팅 명령어 (chat)
async fn cmd_chat(config: &SupportConfig) -> Result<()> {
    let desk = open_desk(config).await?;

    println!("CDP support chat. Type 'exit' to quit.");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if matches!(line, "exit" | "quit") {
            break;
        }

        let response = desk.respond(ChatRequest::new(line)).await;
        println!("{}", response.response);
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &SupportConfig) -> Result<()> {
    println!("cdp-support v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 임베딩 모델: {}", config.embedding_model);
    println!("[*] 생성 모델: {}", config.chat_model);

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    println!();
    for profile in &config.products {
        if !profile.enabled {
            println!("  {:<10} 준비 중", profile.name);
            continue;
        }

        match VectorIndex::read_manifest(&config.index_location(&profile.id)).await {
            Ok(manifest) => println!(
                "  {:<10} {} 청크 / {} 페이지 ({}, {})",
                profile.name,
                manifest.chunk_count,
                manifest.page_count,
                manifest.provider,
                manifest.built_at.format("%Y-%m-%d %H:%M")
            ),
            Err(IndexError::NoIndex(_)) => {
                println!("  {:<10} 인덱스 없음 (cdp-support index --product {})", profile.name, profile.id)
            }
            Err(e) => println!("  {:<10} 인덱스 읽기 실패: {}", profile.name, e),
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn find_product<'a>(config: &'a SupportConfig, id: &str) -> Result<&'a ProductProfile> {
    config.product(id).with_context(|| {
        let known: Vec<&str> = config.products.iter().map(|p| p.id.as_str()).collect();
        format!("알 수 없는 제품: {} (사용 가능: {})", id, known.join(", "))
    })
}

fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export OPENAI_API_KEY=your-api-key\n\n\
             API 키 발급: https://platform.openai.com/api-keys"
        );
    }
    Ok(())
}

async fn open_desk(config: &SupportConfig) -> Result<SupportDesk> {
    require_api_key()?;

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(create_embedder(&config.embedding_model)?);
    let generator: Arc<dyn GenerativeProvider> =
        Arc::new(OpenAiChat::from_env(config.chat_model.clone())?);

    Ok(SupportDesk::open(config, embedder, generator).await?)
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("click Add Source", 30), "click Add Source");
        assert_eq!(truncate_text("open the workspace", 8), "open the...");
        assert_eq!(truncate_text("step 1\nstep 2", 20), "step 1 step 2");
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::parse_from(["cdp-support", "index", "--url", "https://a", "--url", "https://b"]);
        match cli.command {
            Commands::Index { product, url, .. } => {
                assert_eq!(product, "segment");
                assert_eq!(url.len(), 2);
            }
            _ => panic!("expected index command"),
        }

        let cli = Cli::parse_from(["cdp-support", "ask", "How do I track events?", "--json"]);
        assert!(matches!(cli.command, Commands::Ask { json: true, .. }));

        let cli = Cli::parse_from(["cdp-support", "--data-dir", "/tmp/cdp", "status"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/cdp")));
    }

    #[test]
    fn test_find_product() {
        let config = SupportConfig::default();
        assert_eq!(find_product(&config, "zeotap").unwrap().name, "Zeotap");
        let err = find_product(&config, "braze").unwrap_err().to_string();
        assert!(err.contains("segment"));
    }
}
