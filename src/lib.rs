//! cdp-support - CDP how-to 지원 챗봇
//!
//! 제품 문서 사이트를 크롤링해 LanceDB 벡터 인덱스를 만들고,
//! 도메인/how-to 질문만 골라 검색된 문서 청크로 답변을 생성합니다.

pub mod agent;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod pipeline;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use agent::{AgentAnswer, ChatRequest, ChatResponse, SupportAgent, SupportDesk};
pub use classifier::{Classification, Gate, QuestionClassifier};
pub use config::{get_api_key, get_data_dir, has_api_key, ProductProfile, SupportConfig};
pub use crawler::{CrawlReport, CrawlStats, DocCrawler, FetchOutcome, Page};
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use error::{ConfigError, IndexError};
pub use generation::{GenerationRequest, GenerativeProvider, OpenAiChat};
pub use knowledge::{
    Chunk, ChunkConfig, Chunker, IndexManifest, IndexStats, SearchResult, SlidingWindowChunker,
    SourceDocument, VectorIndex,
};
pub use pipeline::{index_documentation, IndexReport, PageSource};
pub use router::{CdpRouter, Route};
