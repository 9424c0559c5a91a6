//! 에러 타입
//!
//! 호출자가 구분해서 처리해야 하는 실패만 타입으로 정의합니다.
//! 프로바이더/HTTP 배관 에러는 `anyhow`로 전달됩니다.

use std::path::PathBuf;

/// 벡터 인덱스 에러
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// 인덱스 위치에 저장된 인덱스가 없음 (미초기화 상태)
    #[error("no index found at {0:?}")]
    NoIndex(PathBuf),

    /// 인덱스 빌드 실패 (임베딩 프로바이더 연결 불가 등)
    #[error("index build failed: {0}")]
    Build(String),

    /// 빌드 시점과 다른 임베딩 프로바이더로 검색 시도
    #[error("embedding provider mismatch: index built with '{stored}', active provider is '{active}'")]
    ProviderMismatch { stored: String, active: String },

    /// 벡터 차원 불일치
    #[error("embedding dimension mismatch: index has {stored}, provider returned {active}")]
    DimensionMismatch { stored: usize, active: usize },

    /// 질의 임베딩 실패
    #[error("query embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    /// 저장소 I/O 에러
    #[error("index storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// 설정 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid pattern '{pattern}' for product '{product}': {source}")]
    Pattern {
        product: String,
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid chunk config: overlap {overlap} must be smaller than window {window}")]
    Chunk { window: usize, overlap: usize },
}
