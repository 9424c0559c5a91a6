//! 설정 모듈
//!
//! 데이터 디렉토리, 크롤링/청킹/검색 파라미터, 그리고 제품별 분류 규칙 테이블을
//! 한 곳에서 관리합니다. JSON 파일로 덮어쓸 수 있으며, 없으면 기본값을 사용합니다.
//!
//! 분류 규칙(도메인 용어, how-to 패턴)은 코드가 아닌 데이터이므로
//! 새 제품이나 용어를 추가할 때 제어 흐름을 건드릴 필요가 없습니다.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 기본 최대 크롤링 페이지 수
pub const DEFAULT_MAX_PAGES: usize = 100;
/// 페이지 요청 타임아웃 (초)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
/// 청크 윈도우 크기 (문자 수)
pub const DEFAULT_WINDOW_CHARS: usize = 1000;
/// 인접 청크 오버랩 (문자 수)
pub const DEFAULT_OVERLAP_CHARS: usize = 200;
/// 기본 검색 결과 수
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.cdp-support/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cdp-support")
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (`OPENAI_API_KEY` 환경변수)
pub fn get_api_key() -> anyhow::Result<String> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => anyhow::bail!(
            "API key not found. Set OPENAI_API_KEY environment variable.\n\
             Get your API key at: https://platform.openai.com/api-keys"
        ),
    }
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    std::env::var("OPENAI_API_KEY")
        .map(|key| !key.trim().is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Product Profile (rule table)
// ============================================================================

/// 제품별 분류 규칙 및 안내 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductProfile {
    /// 내부 식별자 (소문자, 예: "segment")
    pub id: String,
    /// 표시 이름 (예: "Segment")
    pub name: String,
    /// 라우팅용 추가 이름 (예: "m particle")
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// 문서 루트 URL
    pub docs_url: String,
    /// 도메인 용어 목록
    #[serde(default)]
    pub domain_terms: Vec<String>,
    /// 도메인 판정에 필요한 최소 용어 수
    #[serde(default = "default_term_threshold")]
    pub term_threshold: usize,
    /// how-to 질문 판정 정규식 (대소문자 무시, 부분 일치)
    #[serde(default = "default_how_to_patterns")]
    pub how_to_patterns: Vec<String>,
    /// 도메인 밖 질문에 대한 고정 응답
    pub decline_message: String,
    /// how-to 가 아닌 질문에 대한 고정 응답
    pub redirect_message: String,
    /// 인덱스 미초기화 시 고정 응답
    pub not_initialized_message: String,
    /// 에이전트 구현 여부
    #[serde(default)]
    pub enabled: bool,
}

fn default_term_threshold() -> usize {
    2
}

fn default_how_to_patterns() -> Vec<String> {
    [
        r"how (?:do|can|would|should) i",
        r"how to",
        r"steps to",
        r"guide for",
        r"process (?:of|for)",
        r"way to",
        r"explain how",
        r"instructions for",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl ProductProfile {
    /// Segment 기본 프로필
    pub fn segment() -> Self {
        Self {
            id: "segment".to_string(),
            name: "Segment".to_string(),
            synonyms: Vec::new(),
            docs_url: "https://segment.com/docs/".to_string(),
            domain_terms: [
                "source",
                "destination",
                "workspace",
                "tracking plan",
                "event",
                "identify",
                "track",
                "page",
                "group",
                "alias",
                "protocols",
                "personas",
                "journeys",
                "connections",
                "schema",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            term_threshold: default_term_threshold(),
            how_to_patterns: default_how_to_patterns(),
            decline_message: "This question doesn't appear to be related to Segment CDP. \
                I'm specifically trained to answer questions about Segment CDP. \
                Could you please ask a Segment-related question?"
                .to_string(),
            redirect_message: "I'm designed to answer 'how-to' questions about Segment CDP. \
                It seems you're not asking a 'how-to' question. \
                Could you rephrase your question to ask how to accomplish something in Segment? \
                For example: 'How do I set up a new source in Segment?'"
                .to_string(),
            not_initialized_message:
                "Segment support is not initialized. Please check the server logs.".to_string(),
            enabled: true,
        }
    }

    /// 아직 에이전트가 없는 제품 프로필
    fn placeholder(id: &str, name: &str, synonyms: &[&str], docs_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            docs_url: docs_url.to_string(),
            domain_terms: Vec::new(),
            term_threshold: default_term_threshold(),
            how_to_patterns: default_how_to_patterns(),
            decline_message: format!(
                "This question doesn't appear to be related to {name}. Could you please ask a {name}-related question?"
            ),
            redirect_message: format!(
                "I'm designed to answer 'how-to' questions about {name}. Could you rephrase your question?"
            ),
            not_initialized_message: format!(
                "{name} support is not initialized. Please check the server logs."
            ),
            enabled: false,
        }
    }

    /// 라우팅에 사용하는 모든 이름 (소문자)
    pub fn aliases(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.name.to_lowercase())
            .chain(self.synonyms.iter().map(|s| s.to_lowercase()))
    }
}

/// 기본 제품 목록 (Segment만 구현됨)
pub fn default_products() -> Vec<ProductProfile> {
    vec![
        ProductProfile::segment(),
        ProductProfile::placeholder(
            "mparticle",
            "mParticle",
            &["m particle"],
            "https://docs.mparticle.com/",
        ),
        ProductProfile::placeholder("lytics", "Lytics", &[], "https://docs.lytics.com/"),
        ProductProfile::placeholder("zeotap", "Zeotap", &[], "https://docs.zeotap.com/"),
    ]
}

// ============================================================================
// SupportConfig
// ============================================================================

/// 크롤러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub max_pages: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

/// 라우터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// 비교 질문 신호 단어
    pub comparison_cues: Vec<String>,
    /// 비교 판정에 필요한 최소 신호 단어 수
    pub comparison_threshold: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            comparison_cues: ["compare", "difference", "versus", "vs", "better"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            comparison_threshold: 2,
        }
    }
}

/// 전체 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// 데이터 디렉토리 (인덱스 저장 위치의 부모)
    pub data_dir: PathBuf,
    pub crawl: CrawlSettings,
    pub window_chars: usize,
    pub overlap_chars: usize,
    pub top_k: usize,
    /// 임베딩 모델 ID (빌드와 검색에 동일하게 사용)
    pub embedding_model: String,
    /// 생성 모델 ID
    pub chat_model: String,
    /// 생성 온도 (결정적 응답을 위해 0)
    pub temperature: f32,
    pub router: RouterSettings,
    pub products: Vec<ProductProfile>,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            crawl: CrawlSettings::default(),
            window_chars: DEFAULT_WINDOW_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
            top_k: DEFAULT_TOP_K,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            router: RouterSettings::default(),
            products: default_products(),
        }
    }
}

impl SupportConfig {
    /// JSON 파일에서 로드 (경로가 없으면 기본값)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.overlap_chars >= config.window_chars {
            return Err(ConfigError::Chunk {
                window: config.window_chars,
                overlap: config.overlap_chars,
            });
        }

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// 제품별 인덱스 위치 (<data_dir>/<id>_docs)
    pub fn index_location(&self, product_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}_docs", product_id))
    }

    /// ID로 제품 프로필 조회
    pub fn product(&self, id: &str) -> Option<&ProductProfile> {
        self.products.iter().find(|p| p.id == id)
    }
}

// ============================================================================
// Tests
// ============================================================================
