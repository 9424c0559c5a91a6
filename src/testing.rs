//! 테스트용 가짜 프로바이더 (네트워크 없음, 호출 횟수 기록)

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::generation::{GenerationRequest, GenerativeProvider};

pub(crate) const FAKE_DIMENSION: usize = 16;

/// 단어 해시 기반 bag-of-words 임베딩
pub(crate) struct FakeEmbedder {
    name: String,
    fail: bool,
    pub(crate) calls: AtomicUsize,
}

impl FakeEmbedder {
    pub(crate) fn new() -> Self {
        Self::named("fake/bow")
    }

    pub(crate) fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// 항상 실패하는 임베더 (프로바이더 연결 불가 상황)
    pub(crate) fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; FAKE_DIMENSION];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let h = word
            .bytes()
            .fold(2166136261u32, |acc, b| (acc ^ b as u32).wrapping_mul(16777619));
        v[h as usize % FAKE_DIMENSION] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(bag_of_words(text))
    }

    fn dimension(&self) -> usize {
        FAKE_DIMENSION
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 프롬프트를 기록하고 고정 응답을 돌려주는 생성기
pub(crate) struct FakeGenerator {
    reply: Result<String, String>,
    pub(crate) calls: AtomicUsize,
    pub(crate) last_prompt: std::sync::Mutex<Option<String>>,
    pub(crate) last_temperature: std::sync::Mutex<Option<f32>>,
}

impl FakeGenerator {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_prompt: std::sync::Mutex::new(None),
            last_temperature: std::sync::Mutex::new(None),
        }
    }

    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            ..Self::replying("")
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl GenerativeProvider for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.last_prompt.lock() {
            *p = Some(request.prompt.to_string());
        }
        if let Ok(mut t) = self.last_temperature.lock() {
            *t = Some(request.temperature);
        }
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }

    fn name(&self) -> &str {
        "fake/generator"
    }
}
