//! 벡터 인덱스 - 청크 임베딩의 빌드, 로드, 유사도 검색
//!
//! 디스크 구조:
//! ```text
//! <location>/manifest.json   프로바이더 ID, 차원, 청크 수, 빌드 시각
//! <location>/vectors.lance   LanceDB 테이블
//! ```
//!
//! 재빌드는 `<location>.staging`에 전체를 만든 뒤 디렉토리 교체로 반영하므로
//! 검색 측은 절반만 쓰인 인덱스를 보지 않습니다.
//!
//! 임베딩 공간 일관성: 빌드 시 프로바이더 ID가 매니페스트에 저장되고,
//! 다른 프로바이더로 검색하면 `IndexError::ProviderMismatch`를 반환합니다.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::IndexError;

use super::chunker::Chunk;
use super::lance::LanceVectorStore;
use super::memory::MemoryVectorStore;
use super::vector::{SearchResult, VectorEntry, VectorStore};

const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_DIR: &str = "vectors.lance";

// ============================================================================
// Types
// ============================================================================

/// 인덱스 매니페스트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// 빌드에 사용한 임베딩 프로바이더 ID
    pub provider: String,
    /// 임베딩 차원
    pub dimension: usize,
    /// 청크(=임베딩 레코드) 수
    pub chunk_count: usize,
    /// 원본 페이지 수
    pub page_count: usize,
    pub built_at: DateTime<Utc>,
}

/// 인덱스 통계
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub manifest: IndexManifest,
    pub vector_count: usize,
    pub location: Option<PathBuf>,
}

// ============================================================================
// VectorIndex
// ============================================================================

/// 벡터 인덱스 (빌드 후 읽기 전용)
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    manifest: IndexManifest,
    location: Option<PathBuf>,
}

impl VectorIndex {
    /// 인덱스 존재 여부
    pub fn exists(location: &Path) -> bool {
        location.join(MANIFEST_FILE).is_file()
    }

    /// 청크 임베딩 후 디스크에 인덱스 빌드
    ///
    /// 청크가 없으면 아무것도 하지 않고 `Ok(None)`을 반환합니다.
    /// 기존 인덱스는 새 인덱스가 완성된 뒤에만 교체됩니다.
    #[tracing::instrument(skip_all, fields(location = %location.display(), chunks = chunks.len()))]
    pub async fn build(
        chunks: &[Chunk],
        embedder: Arc<dyn EmbeddingProvider>,
        location: &Path,
    ) -> Result<Option<Self>, IndexError> {
        if chunks.is_empty() {
            tracing::info!("No chunks to index, skipping build");
            return Ok(None);
        }

        let entries = embed_chunks(chunks, embedder.as_ref()).await?;
        let manifest = new_manifest(embedder.as_ref(), chunks);

        let staging = sibling(location, "staging");
        if staging.exists() {
            tokio::fs::remove_dir_all(&staging)
                .await
                .context("Failed to clear staging directory")?;
        }
        tokio::fs::create_dir_all(&staging)
            .await
            .context("Failed to create staging directory")?;

        let store = LanceVectorStore::open(&staging.join(VECTORS_DIR), manifest.dimension).await?;
        store.insert_batch(&entries).await?;
        drop(store);

        write_manifest(&staging, &manifest).await?;
        swap_into_place(&staging, location).await?;

        tracing::info!(
            "Vector index created with {} chunks and persisted to {}",
            manifest.chunk_count,
            location.display()
        );

        Self::load(location, embedder).await.map(Some)
    }

    /// 메모리 인덱스 빌드 (영속화 없음)
    pub async fn build_in_memory(
        chunks: &[Chunk],
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Option<Self>, IndexError> {
        if chunks.is_empty() {
            tracing::info!("No chunks to index, skipping build");
            return Ok(None);
        }

        let entries = embed_chunks(chunks, embedder.as_ref()).await?;
        let manifest = new_manifest(embedder.as_ref(), chunks);

        let store = MemoryVectorStore::new();
        store.insert_batch(&entries).await?;

        Ok(Some(Self {
            store: Arc::new(store),
            embedder,
            manifest,
            location: None,
        }))
    }

    /// 저장된 인덱스 로드
    ///
    /// 위치에 인덱스가 없으면 `IndexError::NoIndex` (미초기화 상태).
    pub async fn load(
        location: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, IndexError> {
        if !Self::exists(location) {
            return Err(IndexError::NoIndex(location.to_path_buf()));
        }

        let manifest = Self::read_manifest(location).await?;

        if manifest.provider != embedder.name() {
            tracing::warn!(
                "Index at {} was built with '{}' but active embedder is '{}'; searches will be rejected",
                location.display(),
                manifest.provider,
                embedder.name()
            );
        }

        let store = LanceVectorStore::open(&location.join(VECTORS_DIR), manifest.dimension).await?;

        tracing::info!(
            "Vector index loaded from {} ({} chunks)",
            location.display(),
            manifest.chunk_count
        );

        Ok(Self {
            store: Arc::new(store),
            embedder,
            manifest,
            location: Some(location.to_path_buf()),
        })
    }

    /// 매니페스트만 읽기 (임베더 없이 상태 확인용)
    pub async fn read_manifest(location: &Path) -> Result<IndexManifest, IndexError> {
        if !Self::exists(location) {
            return Err(IndexError::NoIndex(location.to_path_buf()));
        }

        let raw = tokio::fs::read_to_string(location.join(MANIFEST_FILE))
            .await
            .context("Failed to read index manifest")?;
        let manifest: IndexManifest =
            serde_json::from_str(&raw).context("Failed to parse index manifest")?;
        Ok(manifest)
    }

    /// 유사도 검색 (최대 k개, 유사도 내림차순)
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if self.embedder.name() != self.manifest.provider {
            return Err(IndexError::ProviderMismatch {
                stored: self.manifest.provider.clone(),
                active: self.embedder.name().to_string(),
            });
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(IndexError::Embedding)?;

        if query_embedding.len() != self.manifest.dimension {
            return Err(IndexError::DimensionMismatch {
                stored: self.manifest.dimension,
                active: query_embedding.len(),
            });
        }

        let mut results = self.store.search(&query_embedding, k).await?;
        results.truncate(k);

        tracing::debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// 인덱스 통계
    pub async fn stats(&self) -> Result<IndexStats, IndexError> {
        Ok(IndexStats {
            manifest: self.manifest.clone(),
            vector_count: self.store.count().await?,
            location: self.location.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 청크 임베딩 -> 벡터 엔트리
async fn embed_chunks(
    chunks: &[Chunk],
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<VectorEntry>, IndexError> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    let embeddings = embedder
        .embed_batch(&texts)
        .await
        .map_err(|e| IndexError::Build(format!("embedding provider failed: {:#}", e)))?;

    if embeddings.len() != chunks.len() {
        return Err(IndexError::Build(format!(
            "embedding provider returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }

    chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| {
            if embedding.len() != embedder.dimension() {
                return Err(IndexError::DimensionMismatch {
                    stored: embedder.dimension(),
                    active: embedding.len(),
                });
            }
            Ok(VectorEntry {
                chunk_id: chunk.chunk_id.clone(),
                source_url: chunk.source_url.clone(),
                position: i32::try_from(chunk.position).unwrap_or(i32::MAX),
                chunk_text: chunk.text.clone(),
                embedding,
            })
        })
        .collect()
}

fn new_manifest(embedder: &dyn EmbeddingProvider, chunks: &[Chunk]) -> IndexManifest {
    let mut urls: Vec<&str> = chunks.iter().map(|c| c.source_url.as_str()).collect();
    urls.sort_unstable();
    urls.dedup();

    IndexManifest {
        provider: embedder.name().to_string(),
        dimension: embedder.dimension(),
        chunk_count: chunks.len(),
        page_count: urls.len(),
        built_at: Utc::now(),
    }
}

async fn write_manifest(dir: &Path, manifest: &IndexManifest) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(manifest).context("Failed to serialize manifest")?;
    tokio::fs::write(dir.join(MANIFEST_FILE), json)
        .await
        .context("Failed to write index manifest")
}

/// `<location>.<suffix>` 경로
fn sibling(location: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(location.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// 스테이징 디렉토리를 실제 위치로 교체
async fn swap_into_place(staging: &Path, location: &Path) -> anyhow::Result<()> {
    let old = sibling(location, "old");
    if old.exists() {
        tokio::fs::remove_dir_all(&old)
            .await
            .context("Failed to clear previous index backup")?;
    }

    if location.exists() {
        tokio::fs::rename(location, &old)
            .await
            .context("Failed to move previous index aside")?;
    }

    tokio::fs::rename(staging, location)
        .await
        .context("Failed to move new index into place")?;

    if old.exists() {
        tokio::fs::remove_dir_all(&old)
            .await
            .context("Failed to remove previous index")?;
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
