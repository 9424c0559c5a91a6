//! 지원 데스크 - 호출자 진입점
//!
//! `{message}` → `{response}`. 라우팅 후 제품 에이전트에 위임하며,
//! 어떤 실패도 호출자에게 원시 에러로 노출하지 않습니다.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use super::SupportAgent;
use crate::config::{ProductProfile, SupportConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{ConfigError, IndexError};
use crate::generation::GenerativeProvider;
use crate::knowledge::VectorIndex;
use crate::router::{CdpRouter, Route};

const EMPTY_MESSAGE_REPLY: &str = "Please ask a question.";
const COMPARISON_REPLY: &str = "Cross-CDP comparison is coming soon.";

/// 채팅 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 채팅 응답
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// 여러 제품 에이전트를 묶는 진입점
pub struct SupportDesk {
    router: CdpRouter,
    products: Vec<ProductProfile>,
    agents: HashMap<String, SupportAgent>,
}

impl SupportDesk {
    pub fn new(
        products: Vec<ProductProfile>,
        router: CdpRouter,
        agents: Vec<SupportAgent>,
    ) -> Self {
        let agents = agents
            .into_iter()
            .map(|a| (a.product_id().to_string(), a))
            .collect();
        Self {
            router,
            products,
            agents,
        }
    }

    /// 설정에 따라 활성 제품의 인덱스를 로드하고 데스크 구성
    ///
    /// 인덱스가 없거나 로드에 실패한 제품은 미초기화 상태의 에이전트가 됩니다.
    pub async fn open(
        config: &SupportConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerativeProvider>,
    ) -> Result<Self, ConfigError> {
        let router = CdpRouter::new(&config.products, &config.router)?;
        let mut agents = Vec::new();

        for profile in config.products.iter().filter(|p| p.enabled) {
            let location = config.index_location(&profile.id);
            let index = match VectorIndex::load(&location, embedder.clone()).await {
                Ok(index) => Some(index),
                Err(IndexError::NoIndex(path)) => {
                    tracing::warn!(
                        "No {} index at {}. Run `cdp-support index --product {}` first",
                        profile.name,
                        path.display(),
                        profile.id
                    );
                    None
                }
                Err(e) => {
                    tracing::error!("Failed to load {} index: {}", profile.name, e);
                    None
                }
            };

            let agent = SupportAgent::new(profile.clone(), index, generator.clone())?
                .with_top_k(config.top_k)
                .with_temperature(config.temperature);
            agents.push(agent);
        }

        tracing::info!("Support desk ready with {} agent(s)", agents.len());
        Ok(Self::new(config.products.clone(), router, agents))
    }

    pub fn agent(&self, product_id: &str) -> Option<&SupportAgent> {
        self.agents.get(product_id)
    }

    /// 요청 처리 (절대 실패하지 않음)
    pub async fn respond(&self, request: ChatRequest) -> ChatResponse {
        let outcome = AssertUnwindSafe(self.dispatch(&request.message))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(text) => text,
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                tracing::error!("Request handling panicked: {}", reason);
                format!("I encountered an error: {}", reason)
            }
        };

        ChatResponse { response }
    }

    async fn dispatch(&self, message: &str) -> String {
        let question = message.trim();
        if question.is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }

        match self.router.route(question) {
            Route::Product(id) => match self.agents.get(&id) {
                Some(agent) => agent.answer(question).await,
                None => format!("Support for {} questions is coming soon.", self.display_name(&id)),
            },
            Route::Comparison => COMPARISON_REPLY.to_string(),
            Route::Unknown => self.unknown_reply(),
        }
    }

    fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.products
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.as_str())
            .unwrap_or(id)
    }

    /// 제품을 특정할 수 없을 때의 안내
    fn unknown_reply(&self) -> String {
        let names: Vec<&str> = self.products.iter().map(|p| p.name.as_str()).collect();
        let listed = match names.split_last() {
            Some((last, rest)) if !rest.is_empty() => format!("{}, or {}", rest.join(", "), last),
            Some((last, _)) => last.to_string(),
            None => "a supported CDP".to_string(),
        };

        let example = self
            .products
            .iter()
            .find(|p| p.enabled)
            .map(|p| format!(" For example: 'How do I set up a new source in {}?'", p.name))
            .unwrap_or_default();

        format!(
            "I'm a CDP support chatbot. Please ask a question about {}.{}",
            listed, example
        )
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected internal failure".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
