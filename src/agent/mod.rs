//! 제품 지원 에이전트 - 분류 → 검색 → 프롬프트 → 생성
//!
//! 에이전트는 질문 하나에 대해 항상 사용자용 문자열을 돌려줍니다.
//! 인덱스 미초기화, 검색 실패, 생성 실패는 모두 고정 안내 또는
//! 원인을 포함한 안내 문장으로 변환됩니다.

mod desk;

pub use desk::{ChatRequest, ChatResponse, SupportDesk};

use std::sync::Arc;

use crate::classifier::{Gate, QuestionClassifier};
use crate::config::{ProductProfile, DEFAULT_TOP_K};
use crate::error::ConfigError;
use crate::generation::{GenerationRequest, GenerativeProvider};
use crate::knowledge::{SearchResult, VectorIndex};

/// 에이전트 응답
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAnswer {
    /// 사용자에게 보여줄 응답
    pub text: String,
    /// 답변 근거가 된 페이지 URL (검색을 거친 경우만)
    pub sources: Vec<String>,
}

impl AgentAnswer {
    fn fixed(text: &str) -> Self {
        Self {
            text: text.to_string(),
            sources: Vec::new(),
        }
    }
}

/// 단일 제품 지원 에이전트
pub struct SupportAgent {
    profile: ProductProfile,
    classifier: QuestionClassifier,
    index: Option<VectorIndex>,
    generator: Arc<dyn GenerativeProvider>,
    top_k: usize,
    temperature: f32,
}

impl SupportAgent {
    /// 에이전트 생성
    ///
    /// `index`가 `None`이면 미초기화 상태로 동작합니다.
    pub fn new(
        profile: ProductProfile,
        index: Option<VectorIndex>,
        generator: Arc<dyn GenerativeProvider>,
    ) -> Result<Self, ConfigError> {
        let classifier = QuestionClassifier::from_profile(&profile)?;
        Ok(Self {
            profile,
            classifier,
            index,
            generator,
            top_k: DEFAULT_TOP_K,
            temperature: 0.0,
        })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn product_id(&self) -> &str {
        &self.profile.id
    }

    pub fn is_initialized(&self) -> bool {
        self.index.is_some()
    }

    /// 질문에 대한 응답 텍스트
    pub async fn answer(&self, question: &str) -> String {
        self.answer_with_sources(question).await.text
    }

    /// 질문에 대한 응답 + 근거 URL
    #[tracing::instrument(skip(self), fields(product = %self.profile.id))]
    pub async fn answer_with_sources(&self, question: &str) -> AgentAnswer {
        let Some(index) = &self.index else {
            tracing::warn!("Question received before the vector index was initialized");
            return AgentAnswer::fixed(&self.profile.not_initialized_message);
        };

        match self.classifier.gate(question) {
            Gate::Decline(message) => {
                tracing::debug!("Declined out-of-domain question");
                return AgentAnswer::fixed(&message);
            }
            Gate::Redirect(message) => {
                tracing::debug!("Redirected non how-to question");
                return AgentAnswer::fixed(&message);
            }
            Gate::Proceed => {}
        }

        let results = match index.search(question, self.top_k).await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("Retrieval failed: {}", e);
                return AgentAnswer::fixed(&failure_message(&e));
            }
        };

        let prompt = build_prompt(&self.profile.name, &results, question);
        let request = GenerationRequest {
            temperature: self.temperature,
            ..GenerationRequest::deterministic(&prompt)
        };

        match self.generator.generate(&request).await {
            Ok(text) => AgentAnswer {
                text,
                sources: source_urls(&results),
            },
            Err(e) => {
                tracing::error!("Generation failed: {:#}", e);
                AgentAnswer::fixed(&failure_message(&format!("{:#}", e)))
            }
        }
    }
}

/// 검색/생성 실패 안내
fn failure_message(reason: &dyn std::fmt::Display) -> String {
    format!(
        "I encountered an error while trying to answer your question: {}. \
         Please ensure the vector database is properly set up and try again.",
        reason
    )
}

/// 근거 URL (검색 순서, 중복 제거)
fn source_urls(results: &[SearchResult]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for r in results {
        if !urls.contains(&r.source_url) {
            urls.push(r.source_url.clone());
        }
    }
    urls
}

/// 검색된 청크로 답변 프롬프트 구성
pub fn build_prompt(product_name: &str, results: &[SearchResult], question: &str) -> String {
    let context = results
        .iter()
        .map(|r| r.chunk_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful {product} CDP support assistant specialized in answering \"how-to\" questions.\n\
         Use the following pieces of context to answer the question at the end.\n\
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
         Always provide step-by-step instructions when possible.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Provide a clear, detailed answer with step-by-step instructions:",
        product = product_name,
        context = context,
        question = question,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Chunker, SlidingWindowChunker, SourceDocument};
    use crate::testing::{FakeEmbedder, FakeGenerator};

    fn docs() -> Vec<SourceDocument> {
        vec![
            SourceDocument {
                url: "https://segment.com/docs/connections/sources/".to_string(),
                text: "To add a source, open your workspace, click Add Source, \
                       choose a source from the catalog and copy the write key."
                    .to_string(),
            },
            SourceDocument {
                url: "https://segment.com/docs/connections/destinations/".to_string(),
                text: "Destinations receive data from sources. Open the catalog, \
                       pick a destination and enable it."
                    .to_string(),
            },
        ]
    }

    async fn index(embedder: Arc<FakeEmbedder>) -> VectorIndex {
        let chunks = SlidingWindowChunker::with_defaults().split(&docs());
        VectorIndex::build_in_memory(&chunks, embedder)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_out_of_domain_calls_no_provider() {
        let embedder = Arc::new(FakeEmbedder::new());
        let generator = Arc::new(FakeGenerator::replying("unused"));
        let index = index(embedder.clone()).await;
        let embed_calls = embedder.call_count();

        let agent =
            SupportAgent::new(ProductProfile::segment(), Some(index), generator.clone()).unwrap();

        let answer = agent.answer("What's the weather today?").await;
        assert_eq!(answer, ProductProfile::segment().decline_message);
        assert_eq!(embedder.call_count(), embed_calls);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_how_to_redirected() {
        let embedder = Arc::new(FakeEmbedder::new());
        let generator = Arc::new(FakeGenerator::replying("unused"));
        let agent = SupportAgent::new(
            ProductProfile::segment(),
            Some(index(embedder.clone()).await),
            generator.clone(),
        )
        .unwrap();

        let answer = agent.answer("What is a source in Segment?").await;
        assert_eq!(answer, ProductProfile::segment().redirect_message);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_not_initialized() {
        let generator = Arc::new(FakeGenerator::replying("unused"));
        let agent = SupportAgent::new(ProductProfile::segment(), None, generator.clone()).unwrap();

        assert!(!agent.is_initialized());
        // 분류 결과와 무관하게 미초기화 안내
        for question in [
            "How do I set up a new source in Segment?",
            "What is a source in Segment?",
            "How do I fix a segmentation fault?",
        ] {
            assert_eq!(
                agent.answer(question).await,
                "Segment support is not initialized. Please check the server logs."
            );
        }
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_retrieves_top_three_by_default() {
        let documents: Vec<SourceDocument> = (1..=5)
            .map(|i| SourceDocument {
                url: format!("https://segment.com/docs/guides/page-{}/", i),
                text: format!("PASSAGE-{} To add a source open your workspace.", i),
            })
            .collect();
        let chunks = SlidingWindowChunker::with_defaults().split(&documents);
        assert_eq!(chunks.len(), 5);

        let index = VectorIndex::build_in_memory(&chunks, Arc::new(FakeEmbedder::new()))
            .await
            .unwrap();
        let generator = Arc::new(FakeGenerator::replying("1. Open your workspace."));
        let agent = SupportAgent::new(ProductProfile::segment(), index, generator.clone()).unwrap();

        let answer = agent
            .answer_with_sources("How do I set up a new source in Segment?")
            .await;

        let prompt = generator.prompt().unwrap();
        assert_eq!(prompt.matches("PASSAGE-").count(), 3);
        assert_eq!(answer.sources.len(), 3);
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_context() {
        let embedder = Arc::new(FakeEmbedder::new());
        let generator = Arc::new(FakeGenerator::replying("1. Open your workspace."));
        let agent = SupportAgent::new(
            ProductProfile::segment(),
            Some(index(embedder.clone()).await),
            generator.clone(),
        )
        .unwrap();

        let answer = agent
            .answer_with_sources("How do I set up a new source in Segment?")
            .await;

        assert_eq!(answer.text, "1. Open your workspace.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(generator.call_count(), 1);
        assert_eq!(*generator.last_temperature.lock().unwrap(), Some(0.0));

        let prompt = generator.prompt().unwrap();
        assert!(prompt.contains("Question: How do I set up a new source in Segment?"));
        assert!(prompt.contains("click Add Source"));
        assert!(prompt.contains("just say that you don't know"));
        assert!(prompt.contains("step-by-step"));
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_message() {
        let embedder = Arc::new(FakeEmbedder::new());
        let generator = Arc::new(FakeGenerator::failing("rate limit exceeded"));
        let agent = SupportAgent::new(
            ProductProfile::segment(),
            Some(index(embedder.clone()).await),
            generator,
        )
        .unwrap();

        let answer = agent.answer("How do I set up a new source in Segment?").await;
        assert!(answer.starts_with("I encountered an error while trying to answer your question"));
        assert!(answer.contains("rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_provider_mismatch_becomes_message() {
        let dir = tempfile::TempDir::new().unwrap();
        let location = dir.path().join("segment_docs");
        let chunks = SlidingWindowChunker::with_defaults().split(&docs());
        VectorIndex::build(&chunks, Arc::new(FakeEmbedder::named("fake/other")), &location)
            .await
            .unwrap();

        // 다른 임베더로 로드
        let active = Arc::new(FakeEmbedder::new());
        let index = VectorIndex::load(&location, active.clone()).await.unwrap();
        let generator = Arc::new(FakeGenerator::replying("unused"));
        let agent =
            SupportAgent::new(ProductProfile::segment(), Some(index), generator.clone()).unwrap();

        let answer = agent.answer("How do I set up a new source in Segment?").await;
        assert!(answer.contains("fake/other"));
        assert!(answer.contains("vector database"));
        assert_eq!(active.call_count(), 0);
        assert_eq!(generator.call_count(), 0);
    }

    #[test]
    fn test_build_prompt_joins_chunks_in_order() {
        let results = vec![
            SearchResult {
                chunk_text: "first chunk".to_string(),
                source_url: "https://a".to_string(),
                similarity: 0.9,
            },
            SearchResult {
                chunk_text: "second chunk".to_string(),
                source_url: "https://a".to_string(),
                similarity: 0.5,
            },
        ];
        let prompt = build_prompt("Segment", &results, "How do I track?");
        assert!(prompt.starts_with("You are a helpful Segment CDP support assistant"));
        assert!(prompt.contains("first chunk\n\nsecond chunk"));
        assert_eq!(source_urls(&results), vec!["https://a".to_string()]);
    }
}
