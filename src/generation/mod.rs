//! 생성 모델 모듈 - 프롬프트로부터 답변 생성
//!
//! 지원 문서 답변은 재현 가능해야 하므로 기본 온도는 0입니다.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::get_api_key;
use crate::embedding::OPENAI_API_BASE;

/// 기본 최대 생성 토큰 수
const DEFAULT_MAX_TOKENS: usize = 800;

// ============================================================================
// GenerativeProvider Trait
// ============================================================================

/// 생성 요청
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl<'a> GenerationRequest<'a> {
    /// 결정적 디코딩 요청 (temperature = 0)
    pub fn deterministic(prompt: &'a str) -> Self {
        Self {
            prompt,
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// 생성 모델 프로바이더 트레이트
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// 프롬프트로부터 텍스트 생성
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;

    /// 프로바이더 식별자
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Chat Completions
// ============================================================================

/// OpenAI Chat Completions 구현체
pub struct OpenAiChat {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build OpenAI HTTP client")?;

        Ok(Self {
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
            model: model.into(),
            client,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        Self::new(get_api_key()?, model)
    }

    /// API 기본 URL 변경 (프록시, 테스트 서버)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl GenerativeProvider for OpenAiChat {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI chat completions")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("OpenAI returned {}: {}", status, text);
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("failed to parse OpenAI response")?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no message content"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_deterministic_request() {
        let request = GenerationRequest::deterministic("prompt");
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_generate_sends_temperature_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "1. Open Connections" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("k".to_string(), "gpt-4o-mini")
            .unwrap()
            .with_base_url(server.uri());

        let answer = chat
            .generate(&GenerationRequest::deterministic("How do I add a source?"))
            .await
            .unwrap();
        assert_eq!(answer, "1. Open Connections");
    }

    #[tokio::test]
    async fn test_generate_surfaces_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("k".to_string(), "gpt-4o-mini")
            .unwrap()
            .with_base_url(server.uri());

        let err = chat
            .generate(&GenerationRequest::deterministic("q"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }
}
