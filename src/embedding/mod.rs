//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 인덱스 빌드와 검색은 반드시 같은 프로바이더를 사용해야 합니다.
//! 프로바이더 이름(`name()`)이 인덱스 매니페스트에 저장되어 검색 시 비교됩니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder("text-embedding-3-small")?;
//! let embedding = embedder.embed("How do I add a source?").await?;
//! ```

mod openai;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::{OpenAiEmbedding, OPENAI_API_BASE};

use crate::config::has_api_key;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 고정 차원 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 식별자 (예: "openai/text-embedding-3-small")
    fn name(&self) -> &str;
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성 (OpenAI API)
///
/// 환경변수에서 API 키를 읽어 생성합니다.
pub fn create_embedder(model: &str) -> Result<OpenAiEmbedding> {
    if !has_api_key() {
        anyhow::bail!(
            "OPENAI_API_KEY not set.\n\
             Set: export OPENAI_API_KEY=your-api-key"
        );
    }

    let embedder = OpenAiEmbedding::from_env(model)?;
    tracing::info!(
        "Using OpenAI embedding {} (dimension: {})",
        model,
        embedder.dimension()
    );
    Ok(embedder)
}
