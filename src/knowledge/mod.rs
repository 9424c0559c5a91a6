//! Knowledge 모듈 - 문서 청크 인덱스
//!
//! - Chunker: 슬라이딩 윈도우 텍스트 분할
//! - VectorStore: 벡터 저장소 인터페이스 (LanceDB, 메모리)
//! - VectorIndex: 임베딩 빌드/로드/검색 + 매니페스트

mod chunker;
mod index;
mod lance;
mod memory;
mod vector;

// Re-exports
pub use chunker::{
    chunk_id, sliding_window_chunker, Chunk, ChunkConfig, Chunker,
    SlidingWindowChunker, SourceDocument,
};
pub use index::{IndexManifest, IndexStats, VectorIndex};
pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use vector::{cosine_similarity, SearchResult, VectorEntry, VectorStore};
