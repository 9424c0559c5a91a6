//! Text Chunking Module
//!
//! 고정 크기 슬라이딩 윈도우 분할을 제공합니다.
//! 인접 청크는 오버랩 구간을 공유하므로 윈도우 경계에 걸친 문장도
//! 최소 하나의 청크에 온전히 포함됩니다.

use sha2::{Digest, Sha256};

use crate::config::{DEFAULT_OVERLAP_CHARS, DEFAULT_WINDOW_CHARS};
use crate::crawler::Page;
use crate::error::ConfigError;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정 (문자 수 = 유니코드 스칼라 값 개수)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
///
/// 필드는 `new`의 검증(overlap < window)을 거쳐서만 설정됩니다.
pub struct ChunkConfig {
    window_chars: usize,
    overlap_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_chars: DEFAULT_WINDOW_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl ChunkConfig {
    /// 검증 후 생성
    pub fn new(window_chars: usize, overlap_chars: usize) -> Result<Self, ConfigError> {
        if window_chars == 0 || overlap_chars >= window_chars {
            return Err(ConfigError::Chunk {
                window: window_chars,
                overlap: overlap_chars,
            });
        }

        Ok(Self {
            window_chars,
            overlap_chars,
        })
    }

    /// 윈도우 크기
    pub fn window_chars(&self) -> usize {
        self.window_chars
    }

    /// 인접 윈도우 오버랩 크기
    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// 윈도우 이동 간격 (항상 1 이상)
    pub fn step(&self) -> usize {
        self.window_chars.saturating_sub(self.overlap_chars).max(1)
    }
}

// ============================================================================
// Types
// ============================================================================

/// 청킹 입력 문서
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub url: String,
    pub text: String,
}

impl From<Page> for SourceDocument {
    fn from(page: Page) -> Self {
        Self {
            url: page.url,
            text: page.raw_text,
        }
    }
}

/// 문서 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 청크 참조 ID (sha256("{source_url}#{position}"))
    pub chunk_id: String,
    /// 원본 페이지 URL
    pub source_url: String,
    /// 청크 텍스트 (원본 텍스트의 연속 부분 문자열)
    pub text: String,
    /// 문서 내 순번 (0-based)
    pub position: usize,
    /// 원본 텍스트 내 시작 위치 (문자 단위)
    pub start_char: usize,
}

impl Chunk {
    /// 청크 길이 (문자 수)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;

    /// 문서 목록 분할 (문서 경계를 넘지 않음)
    fn split(&self, documents: &[SourceDocument]) -> Vec<Chunk>;
}

// ============================================================================
// SlidingWindowChunker
// ============================================================================

/// 슬라이딩 윈도우 청커
pub struct SlidingWindowChunker {
    config: ChunkConfig,
}

impl SlidingWindowChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성 (1000 / 200)
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 윈도우 목록 계산: (시작 문자 위치, 텍스트)
    fn windows<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        // 문자 인덱스 -> 바이트 오프셋 (마지막에 text.len() 추가)
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        if total == 0 || text.trim().is_empty() {
            return Vec::new();
        }

        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.config.window_chars()).min(total);
            windows.push((start, &text[offsets[start]..offsets[end]]));

            if end >= total {
                break;
            }
            start += self.config.step();
        }

        windows
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        self.windows(text)
            .into_iter()
            .map(|(_, w)| w.to_string())
            .collect()
    }

    fn name(&self) -> &'static str {
        "SlidingWindowChunker"
    }

    fn split(&self, documents: &[SourceDocument]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for doc in documents {
            let windows = self.windows(&doc.text);
            if windows.is_empty() {
                tracing::debug!("No chunks for empty document: {}", doc.url);
                continue;
            }

            for (position, (start_char, text)) in windows.into_iter().enumerate() {
                chunks.push(Chunk {
                    chunk_id: chunk_id(&doc.url, position),
                    source_url: doc.url.clone(),
                    text: text.to_string(),
                    position,
                    start_char,
                });
            }
        }

        chunks
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 청크 참조 ID
pub fn chunk_id(source_url: &str, position: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    hasher.update(b"#");
    hasher.update(position.to_string().as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 슬라이딩 윈도우 청커 생성 (설정 지정)
pub fn sliding_window_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(SlidingWindowChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================
